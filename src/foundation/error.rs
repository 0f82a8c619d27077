/// Convenience result type used across ribalta.
pub type RibaltaResult<T> = Result<T, RibaltaError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum RibaltaError {
    /// Invalid construction-time options (surface sizes, pixel ratios, search bounds).
    #[error("config error: {0}")]
    Config(String),

    /// API misuse that would corrupt the tree or produce nonsense geometry
    /// (inadmissible child types, cycles, singular transforms).
    #[error("usage error: {0}")]
    Usage(String),

    /// Errors raised while rasterizing surfaces or cache bitmaps.
    #[error("raster error: {0}")]
    Raster(String),

    /// Errors when serializing or deserializing scene trees.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RibaltaError {
    /// Build a [`RibaltaError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`RibaltaError::Usage`] value.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Build a [`RibaltaError::Raster`] value.
    pub fn raster(msg: impl Into<String>) -> Self {
        Self::Raster(msg.into())
    }

    /// Build a [`RibaltaError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
