use crate::foundation::error::{RibaltaError, RibaltaResult};
use std::fmt;

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// Straight-alpha RGBA8 color used by public style attributes.
///
/// Serializes as a `#RRGGBB` / `#RRGGBBAA` hex string; deserializes from the
/// same hex forms, a `{r, g, b, a}` object, or a `[r, g, b (, a)]` array with
/// 0..=255 components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgba8 {
    /// Red component.
    pub r: u8,
    /// Green component.
    pub g: u8,
    /// Blue component.
    pub b: u8,
    /// Alpha component (255 = opaque).
    pub a: u8,
}

impl Rgba8 {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Opaque color from RGB components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Color from RGBA components (straight alpha).
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA` (leading `#` optional, case-insensitive).
    pub fn from_hex(s: &str) -> RibaltaResult<Self> {
        let t = s.trim();
        let t = t.strip_prefix('#').unwrap_or(t);

        fn hex_byte(pair: &str) -> RibaltaResult<u8> {
            u8::from_str_radix(pair, 16)
                .map_err(|_| RibaltaError::serde(format!("invalid hex byte \"{pair}\"")))
        }

        match t.len() {
            6 => Ok(Self::rgb(
                hex_byte(&t[0..2])?,
                hex_byte(&t[2..4])?,
                hex_byte(&t[4..6])?,
            )),
            8 => Ok(Self::rgba(
                hex_byte(&t[0..2])?,
                hex_byte(&t[2..4])?,
                hex_byte(&t[4..6])?,
                hex_byte(&t[6..8])?,
            )),
            _ => Err(RibaltaError::serde(format!(
                "hex color must be #RRGGBB or #RRGGBBAA, got \"{s}\""
            ))),
        }
    }

    /// Hex form, `#rrggbb` when opaque, `#rrggbbaa` otherwise.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Alpha as 0..=1.
    pub fn alpha_f32(self) -> f32 {
        f32::from(self.a) / 255.0
    }

    /// Convert to premultiplied form.
    pub fn premultiply(self) -> Rgba8Premul {
        Rgba8Premul::from_straight_rgba(self.r, self.g, self.b, self.a)
    }
}

impl serde::Serialize for Rgba8 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Rgba8 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Hex(String),
            Obj {
                r: u8,
                g: u8,
                b: u8,
                #[serde(default = "opaque")]
                a: u8,
            },
            Arr(Vec<u8>),
        }

        fn opaque() -> u8 {
            255
        }

        match Repr::deserialize(deserializer)? {
            Repr::Hex(s) => Rgba8::from_hex(&s).map_err(serde::de::Error::custom),
            Repr::Obj { r, g, b, a } => Ok(Rgba8::rgba(r, g, b, a)),
            Repr::Arr(v) => match v.as_slice() {
                [r, g, b] => Ok(Rgba8::rgb(*r, *g, *b)),
                [r, g, b, a] => Ok(Rgba8::rgba(*r, *g, *b, *a)),
                _ => Err(serde::de::Error::custom(
                    "color array must have len 3 ([r,g,b]) or 4 ([r,g,b,a])",
                )),
            },
        }
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a). This is the pixel
/// format of every surface in the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba8Premul {
    /// Premultiplied red.
    pub r: u8,
    /// Premultiplied green.
    pub g: u8,
    /// Premultiplied blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent pixel.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Premultiply straight-alpha components.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Component bytes in `[r, g, b, a]` order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Undo premultiplication (rounded). Transparent pixels map to
    /// transparent black.
    pub fn to_straight(self) -> Rgba8 {
        if self.a == 0 {
            return Rgba8::TRANSPARENT;
        }

        fn unpremul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            ((c * 255 + a / 2) / a).min(255) as u8
        }

        Rgba8::rgba(
            unpremul(self.r, self.a),
            unpremul(self.g, self.a),
            unpremul(self.b, self.a),
            self.a,
        )
    }
}

/// Identity of one live shape on the hit surface: a 24-bit RGB value drawn
/// from a palette of `2^24 - 1` keys (zero is reserved so a fully-opaque hit
/// pixel can never decode to "nothing").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorKey(u32);

impl ColorKey {
    /// Largest representable key value.
    pub const MAX: u32 = 0x00FF_FFFF;

    /// Build a key from its 24-bit value; `None` for zero or out-of-range
    /// values.
    pub fn new(value: u32) -> Option<Self> {
        (value != 0 && value <= Self::MAX).then_some(Self(value))
    }

    /// Decode a key from hit-surface RGB components; `None` when the pixel is
    /// the reserved zero value.
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Option<Self> {
        Self::new(u32::from(r) << 16 | u32::from(g) << 8 | u32::from(b))
    }

    /// RGB encoding of this key as painted on the hit surface.
    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }

    /// Opaque straight-alpha color carrying this key.
    pub fn to_rgba8(self) -> Rgba8 {
        let (r, g, b) = self.rgb();
        Rgba8::rgb(r, g, b)
    }

    /// Raw 24-bit value.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ColorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}
