//! 2D affine transform with in-place chaining operations.
//!
//! The matrix layout follows the 2D canvas convention: six coefficients
//! `[a, b, c, d, e, f]` mapping a point as `x' = a·x + c·y + e`,
//! `y' = b·x + d·y + f`. This is the same coefficient order as
//! [`kurbo::Affine`], so conversion in either direction is lossless.

use crate::foundation::core::{Affine, Point};
use crate::foundation::error::{RibaltaError, RibaltaResult};

/// Determinants at or below this magnitude are treated as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// A 2×3 affine transform.
///
/// Mutating operations compose in place and return `&mut Self` for chaining;
/// the type is `Copy`, so an independent snapshot is a plain assignment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    m: [f64; 6],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// The result of [`Transform::decompose`].
///
/// `skew_x`/`skew_y` are shear factors (not angles), directly usable as node
/// skew attributes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decomposition {
    /// Translation x.
    pub x: f64,
    /// Translation y.
    pub y: f64,
    /// Rotation in radians.
    pub rotation: f64,
    /// Scale factor along x.
    pub scale_x: f64,
    /// Scale factor along y.
    pub scale_y: f64,
    /// Shear factor along x.
    pub skew_x: f64,
    /// Shear factor along y.
    pub skew_y: f64,
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        m: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
    };

    /// Build from raw coefficients `[a, b, c, d, e, f]`.
    pub const fn from_coeffs(m: [f64; 6]) -> Self {
        Self { m }
    }

    /// Raw coefficients `[a, b, c, d, e, f]`.
    pub const fn coeffs(&self) -> [f64; 6] {
        self.m
    }

    /// A pure translation.
    pub fn translation(x: f64, y: f64) -> Self {
        Self {
            m: [1.0, 0.0, 0.0, 1.0, x, y],
        }
    }

    /// A pure (possibly non-uniform) scale.
    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self {
            m: [sx, 0.0, 0.0, sy, 0.0, 0.0],
        }
    }

    /// Append a translation by `(x, y)`.
    pub fn translate(&mut self, x: f64, y: f64) -> &mut Self {
        self.m[4] += self.m[0] * x + self.m[2] * y;
        self.m[5] += self.m[1] * x + self.m[3] * y;
        self
    }

    /// Append a scale by `(sx, sy)`.
    pub fn scale(&mut self, sx: f64, sy: f64) -> &mut Self {
        self.m[0] *= sx;
        self.m[1] *= sx;
        self.m[2] *= sy;
        self.m[3] *= sy;
        self
    }

    /// Append a rotation by `rad` radians.
    pub fn rotate(&mut self, rad: f64) -> &mut Self {
        let c = rad.cos();
        let s = rad.sin();
        let m11 = self.m[0] * c + self.m[2] * s;
        let m12 = self.m[1] * c + self.m[3] * s;
        let m21 = self.m[0] * -s + self.m[2] * c;
        let m22 = self.m[1] * -s + self.m[3] * c;
        self.m[0] = m11;
        self.m[1] = m12;
        self.m[2] = m21;
        self.m[3] = m22;
        self
    }

    /// Append a shear by factors `(sx, sy)`.
    pub fn skew(&mut self, sx: f64, sy: f64) -> &mut Self {
        let m11 = self.m[0] + self.m[2] * sy;
        let m12 = self.m[1] + self.m[3] * sy;
        let m21 = self.m[0] * sx + self.m[2];
        let m22 = self.m[1] * sx + self.m[3];
        self.m[0] = m11;
        self.m[1] = m12;
        self.m[2] = m21;
        self.m[3] = m22;
        self
    }

    /// Right-multiply by `other`: the combined transform applies `other`
    /// first, then `self`.
    pub fn multiply(&mut self, other: &Transform) -> &mut Self {
        let m11 = self.m[0] * other.m[0] + self.m[2] * other.m[1];
        let m12 = self.m[1] * other.m[0] + self.m[3] * other.m[1];
        let m21 = self.m[0] * other.m[2] + self.m[2] * other.m[3];
        let m22 = self.m[1] * other.m[2] + self.m[3] * other.m[3];
        let dx = self.m[0] * other.m[4] + self.m[2] * other.m[5] + self.m[4];
        let dy = self.m[1] * other.m[4] + self.m[3] * other.m[5] + self.m[5];
        self.m = [m11, m12, m21, m22, dx, dy];
        self
    }

    /// Map a point through this transform.
    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.m[0] * p.x + self.m[2] * p.y + self.m[4],
            self.m[1] * p.x + self.m[3] * p.y + self.m[5],
        )
    }

    /// The determinant of the linear part.
    pub fn determinant(&self) -> f64 {
        self.m[0] * self.m[3] - self.m[1] * self.m[2]
    }

    /// Invert in place. Fails on a (near-)singular matrix, leaving `self`
    /// untouched.
    pub fn invert(&mut self) -> RibaltaResult<&mut Self> {
        let det = self.determinant();
        if det.abs() <= SINGULAR_EPS {
            return Err(RibaltaError::usage(format!(
                "cannot invert a singular transform (determinant {det:e})"
            )));
        }
        let d = 1.0 / det;
        let m0 = self.m[3] * d;
        let m1 = -self.m[1] * d;
        let m2 = -self.m[2] * d;
        let m3 = self.m[0] * d;
        let m4 = d * (self.m[2] * self.m[5] - self.m[3] * self.m[4]);
        let m5 = d * (self.m[1] * self.m[4] - self.m[0] * self.m[5]);
        self.m = [m0, m1, m2, m3, m4, m5];
        Ok(self)
    }

    /// The inverse as a new transform; `self` is untouched.
    pub fn inverse(&self) -> RibaltaResult<Transform> {
        let mut out = *self;
        out.invert()?;
        Ok(out)
    }

    /// Decompose into translate/rotate/scale/skew components.
    ///
    /// The decomposition is exact when the matrix was composed without a
    /// y-shear (`skew_y == 0` in the result); for matrices that do carry a
    /// y-shear it returns an equivalent-looking approximation that folds the
    /// residual shear into `skew_x`/`scale_y`. This mirrors the behavior of
    /// established 2D canvas scene graphs and is kept as-is so decomposed
    /// values round-trip with node attributes. Fails on a singular matrix.
    pub fn decompose(&self) -> RibaltaResult<Decomposition> {
        let [a, b, c, d, e, f] = self.m;
        let delta = a * d - b * c;
        if delta.abs() <= SINGULAR_EPS {
            return Err(RibaltaError::usage(format!(
                "cannot decompose a singular transform (determinant {delta:e})"
            )));
        }

        // The determinant guard rules out a == b == 0, so r is non-zero.
        let r = (a * a + b * b).sqrt();
        let rotation = if b > 0.0 { (a / r).acos() } else { -(a / r).acos() };

        Ok(Decomposition {
            x: e,
            y: f,
            rotation,
            scale_x: r,
            scale_y: delta / r,
            skew_x: (a * c + b * d) / delta,
            skew_y: 0.0,
        })
    }

    /// Convert to a [`kurbo::Affine`] (lossless).
    pub fn to_affine(&self) -> Affine {
        Affine::new(self.m)
    }

    /// Build from a [`kurbo::Affine`] (lossless).
    pub fn from_affine(a: Affine) -> Self {
        Self { m: a.as_coeffs() }
    }
}

#[cfg(test)]
#[path = "../tests/unit/transform.rs"]
mod tests;
