//! Shape payloads: the draw callback, fill/stroke/shadow styles, and the
//! buffered-draw decision.

use crate::foundation::core::{BezPath, Point, Rgba8, Vec2};
use crate::render::context::DrawingContext;
use crate::render::surface::Bitmap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A shape's draw callback: arbitrary geometry against the drawing-context
/// capability surface. The same callback runs for the scene pass and the hit
/// pass; the context decides what fills and strokes mean.
pub type DrawFn = Box<dyn Fn(&mut DrawingContext<'_>)>;

/// Build a draw callback that fills and strokes one fixed path with the
/// shape's current style.
pub fn path_draw_fn(path: BezPath) -> DrawFn {
    Box::new(move |dc| dc.fill_stroke_path(&path))
}

/// One gradient color stop.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    /// Position along the gradient axis, 0..=1.
    pub offset: f32,
    /// Stop color.
    pub color: Rgba8,
}

/// A linear gradient between two points in shape-local coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearGradient {
    /// Gradient start point.
    pub start: Point,
    /// Gradient end point.
    pub end: Point,
    /// Color stops, offsets ascending.
    pub stops: Vec<GradientStop>,
}

/// A radial gradient around a center in shape-local coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadialGradient {
    /// Gradient center.
    pub center: Point,
    /// Inner radius (0 for a plain radial fill).
    pub start_radius: f64,
    /// Outer radius.
    pub end_radius: f64,
    /// Color stops, offsets ascending.
    pub stops: Vec<GradientStop>,
}

/// A repeating bitmap pattern anchored at the shape-local origin.
#[derive(Clone, Debug)]
pub struct Pattern {
    /// Source pixels.
    pub bitmap: Bitmap,
    /// Tile the bitmap beyond its bounds instead of padding edge pixels.
    pub repeat: bool,
}

/// What a fill paints with. On the hit pass every variant collapses to the
/// shape's flat color key.
#[derive(Clone, Debug)]
pub enum Fill {
    /// Flat color.
    Solid(Rgba8),
    /// Linear gradient.
    LinearGradient(LinearGradient),
    /// Radial gradient.
    RadialGradient(RadialGradient),
    /// Bitmap pattern. Not serializable; hosts re-attach after import.
    Pattern(Pattern),
}

/// Stroke line-cap form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCap {
    /// Flat cap at the endpoint.
    #[default]
    Butt,
    /// Rounded cap.
    Round,
    /// Square cap extending half a width.
    Square,
}

/// Stroke join form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineJoin {
    /// Mitered corner.
    #[default]
    Miter,
    /// Rounded corner.
    Round,
    /// Beveled corner.
    Bevel,
}

/// Fill rule for self-intersecting paths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillRule {
    /// Non-zero winding rule.
    #[default]
    NonZero,
    /// Even-odd rule.
    EvenOdd,
}

/// Stroke style.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Stroke color.
    pub color: Rgba8,
    /// Stroke width in local units.
    pub width: f64,
    /// Endpoint caps.
    #[serde(default)]
    pub cap: LineCap,
    /// Corner joins.
    #[serde(default)]
    pub join: LineJoin,
    /// Miter limit (canvas default).
    #[serde(default = "default_miter_limit")]
    pub miter_limit: f64,
    /// Dash pattern lengths; `None` for a solid stroke.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dash: Option<Vec<f64>>,
    /// Offset into the dash pattern.
    #[serde(default)]
    pub dash_offset: f64,
}

fn default_miter_limit() -> f64 {
    10.0
}

impl Stroke {
    /// A solid stroke of the given color and width.
    pub fn new(color: Rgba8, width: f64) -> Self {
        Self {
            color,
            width,
            cap: LineCap::default(),
            join: LineJoin::default(),
            miter_limit: default_miter_limit(),
            dash: None,
            dash_offset: 0.0,
        }
    }

    /// Set a dash pattern.
    pub fn with_dash(mut self, pattern: Vec<f64>, offset: f64) -> Self {
        self.dash = Some(pattern);
        self.dash_offset = offset;
        self
    }
}

/// Drop shadow cast by a shape's geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    /// Shadow color.
    pub color: Rgba8,
    /// Gaussian blur radius in local units (0 = hard shadow).
    #[serde(default)]
    pub blur: f64,
    /// Shadow offset in local units.
    #[serde(default)]
    pub offset: Vec2,
    /// Shadow opacity multiplier, 0..=1.
    #[serde(default = "one")]
    pub opacity: f64,
    /// Whether the stroke silhouette casts shadow too.
    #[serde(default = "yes")]
    pub for_stroke: bool,
}

fn one() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

impl Shadow {
    /// A plain shadow of the given color and blur radius.
    pub fn new(color: Rgba8, blur: f64) -> Self {
        Self {
            color,
            blur,
            offset: Vec2::ZERO,
            opacity: 1.0,
            for_stroke: true,
        }
    }

    /// Shadow with an offset.
    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// Whether this shadow produces any visible output.
    pub(crate) fn is_visible(&self) -> bool {
        self.opacity > 0.0 && (self.blur > 0.0 || self.offset.x != 0.0 || self.offset.y != 0.0)
    }
}

/// Fill/stroke/shadow description of a shape, consulted by the drawing
/// context when the draw callback asks for a styled fill or stroke.
#[derive(Clone, Debug)]
pub struct ShapeStyle {
    /// Fill paint; `None` = unfilled.
    pub fill: Option<Fill>,
    /// Stroke; `None` = unstroked.
    pub stroke: Option<Stroke>,
    /// Drop shadow; `None` = no shadow.
    pub shadow: Option<Shadow>,
    /// Fill rule for both fills and clips produced by this shape.
    pub fill_rule: FillRule,
    /// Allow the intermediate compositing buffer when fill, stroke, and
    /// translucency (or a fill-only shadow) coincide. Disabling trades the
    /// seam artifact for one less offscreen pass.
    pub perfect_draw: bool,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            shadow: None,
            fill_rule: FillRule::default(),
            perfect_draw: true,
        }
    }
}

impl ShapeStyle {
    /// Style with only a solid fill.
    pub fn filled(color: Rgba8) -> Self {
        Self {
            fill: Some(Fill::Solid(color)),
            ..Self::default()
        }
    }

    /// Style with only a stroke.
    pub fn stroked(color: Rgba8, width: f64) -> Self {
        Self {
            stroke: Some(Stroke::new(color, width)),
            ..Self::default()
        }
    }

    /// Replace the fill.
    pub fn with_fill(mut self, fill: Fill) -> Self {
        self.fill = Some(fill);
        self
    }

    /// Replace the stroke.
    pub fn with_stroke(mut self, stroke: Stroke) -> Self {
        self.stroke = Some(stroke);
        self
    }

    /// Replace the shadow.
    pub fn with_shadow(mut self, shadow: Shadow) -> Self {
        self.shadow = Some(shadow);
        self
    }

    /// Replace the fill rule.
    pub fn with_fill_rule(mut self, rule: FillRule) -> Self {
        self.fill_rule = rule;
        self
    }

    /// Whether a fill paint is present.
    pub fn has_fill(&self) -> bool {
        self.fill.is_some()
    }

    /// Whether a stroke with a non-zero width is present.
    pub fn has_stroke(&self) -> bool {
        self.stroke.as_ref().is_some_and(|s| s.width != 0.0)
    }

    /// Whether a visible shadow is present.
    pub fn has_shadow(&self) -> bool {
        self.shadow.as_ref().is_some_and(Shadow::is_visible)
    }

    /// Whether drawing this style at `abs_opacity` needs the intermediate
    /// compositing buffer.
    ///
    /// A translucent fill+stroke pair drawn naively double-blends where the
    /// stroke overlaps the fill; likewise a shadow that must sit under the
    /// fill only. Both cases draw into an offscreen scratch at full opacity
    /// first and blit the result once.
    pub(crate) fn needs_buffer(&self, abs_opacity: f64) -> bool {
        if !self.perfect_draw {
            return false;
        }
        if !(self.has_fill() && self.has_stroke()) {
            return false;
        }
        if abs_opacity < 1.0 {
            return true;
        }
        matches!(&self.shadow, Some(s) if s.is_visible() && !s.for_stroke)
    }
}

/// Per-shape storage: style plus the optional draw callback. The callback is
/// `None` for shapes restored from a serialized tree until the host
/// re-attaches one; such shapes draw nothing.
pub(crate) struct ShapeData {
    pub(crate) style: ShapeStyle,
    pub(crate) draw: Option<DrawFn>,
}

impl ShapeData {
    pub(crate) fn new(draw: DrawFn) -> Self {
        Self {
            style: ShapeStyle::default(),
            draw: Some(draw),
        }
    }

    pub(crate) fn without_draw_fn() -> Self {
        Self {
            style: ShapeStyle::default(),
            draw: None,
        }
    }
}

impl fmt::Debug for ShapeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeData")
            .field("style", &self.style)
            .field("draw", &self.draw.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
