//! The drawing context handed to shape draw callbacks.
//!
//! One callback serves both passes. In scene mode, fills and strokes use the
//! shape's style; in hit mode the same geometry is painted with the shape's
//! flat color key so a pixel read identifies the shape underneath. A third,
//! internal mode replays the callback as a flat-color silhouette for shadow
//! casting.

use crate::foundation::core::{BezPath, ColorKey, Rect, Rgba8};
use crate::render::surface::Bitmap;
use crate::scene::shape::{Fill, FillRule, GradientStop, LineCap, LineJoin, ShapeStyle, Stroke};
use crate::transform::Transform;
use kurbo::Shape as _;
use smallvec::SmallVec;

#[derive(Clone, Copy)]
pub(crate) enum PaintMode {
    Scene,
    Hit { key: ColorKey },
}

#[derive(Clone, Copy)]
struct Silhouette {
    color: Rgba8,
    include_stroke: bool,
}

/// Capability surface for draw callbacks: a transform stack plus fill,
/// stroke, and bitmap operations that resolve against the owning shape's
/// style and the active pass.
pub struct DrawingContext<'a> {
    ctx: &'a mut vello_cpu::RenderContext,
    mode: PaintMode,
    style: &'a ShapeStyle,
    /// Device transform of the shape-local origin.
    base: Transform,
    /// Callback-local transform, composed on top of `base`.
    local: Transform,
    saved: SmallVec<[Transform; 4]>,
    silhouette: Option<Silhouette>,
}

impl<'a> DrawingContext<'a> {
    pub(crate) fn new_scene(
        ctx: &'a mut vello_cpu::RenderContext,
        style: &'a ShapeStyle,
        base: Transform,
    ) -> Self {
        Self {
            ctx,
            mode: PaintMode::Scene,
            style,
            base,
            local: Transform::IDENTITY,
            saved: SmallVec::new(),
            silhouette: None,
        }
    }

    pub(crate) fn new_hit(
        ctx: &'a mut vello_cpu::RenderContext,
        style: &'a ShapeStyle,
        base: Transform,
        key: ColorKey,
    ) -> Self {
        Self {
            ctx,
            mode: PaintMode::Hit { key },
            style,
            base,
            local: Transform::IDENTITY,
            saved: SmallVec::new(),
            silhouette: None,
        }
    }

    /// Scene-mode context that paints everything in one flat color, for
    /// shadow silhouettes. When `include_stroke` is false, stroke calls
    /// draw nothing.
    pub(crate) fn new_silhouette(
        ctx: &'a mut vello_cpu::RenderContext,
        style: &'a ShapeStyle,
        base: Transform,
        color: Rgba8,
        include_stroke: bool,
    ) -> Self {
        Self {
            ctx,
            mode: PaintMode::Scene,
            style,
            base,
            local: Transform::IDENTITY,
            saved: SmallVec::new(),
            silhouette: Some(Silhouette {
                color,
                include_stroke,
            }),
        }
    }

    /// Push the current callback-local transform.
    pub fn save(&mut self) {
        self.saved.push(self.local);
    }

    /// Pop back to the most recent [`save`](Self::save). Without a matching
    /// save this does nothing, like a canvas restore on an empty stack.
    pub fn restore(&mut self) {
        if let Some(t) = self.saved.pop() {
            self.local = t;
        }
    }

    /// Compose a transform onto the callback-local stack.
    pub fn transform(&mut self, t: &Transform) -> &mut Self {
        self.local.multiply(t);
        self
    }

    /// Translate subsequent geometry.
    pub fn translate(&mut self, x: f64, y: f64) -> &mut Self {
        self.local.translate(x, y);
        self
    }

    /// Scale subsequent geometry.
    pub fn scale(&mut self, sx: f64, sy: f64) -> &mut Self {
        self.local.scale(sx, sy);
        self
    }

    /// Rotate subsequent geometry by `radians`.
    pub fn rotate(&mut self, radians: f64) -> &mut Self {
        self.local.rotate(radians);
        self
    }

    /// The full device transform currently applied to geometry.
    pub fn current_transform(&self) -> Transform {
        let mut t = self.base;
        t.multiply(&self.local);
        t
    }

    /// Fill `path` with the shape's fill, or its color key on the hit pass.
    /// No-op when the shape has no fill.
    pub fn fill_path(&mut self, path: &BezPath) {
        if !self.style.has_fill() {
            return;
        }
        self.apply_geometry_transform();
        self.ctx
            .set_fill_rule(fill_rule_to_cpu(self.style.fill_rule));
        let cpu_path = bezpath_to_cpu(path);
        match self.mode {
            PaintMode::Hit { key } => {
                self.set_flat_paint(key.to_rgba8());
                self.ctx.fill_path(&cpu_path);
            }
            PaintMode::Scene => {
                if let Some(s) = self.silhouette {
                    self.set_flat_paint(s.color);
                    self.ctx.fill_path(&cpu_path);
                } else if self.set_fill_paint() {
                    self.ctx.fill_path(&cpu_path);
                }
            }
        }
    }

    /// Stroke `path` with the shape's stroke, or its color key on the hit
    /// pass. No-op when the shape has no stroke or a zero stroke width.
    pub fn stroke_path(&mut self, path: &BezPath) {
        let Some(stroke) = self.style.stroke.as_ref() else {
            return;
        };
        if stroke.width == 0.0 {
            return;
        }
        if let Some(s) = self.silhouette
            && !s.include_stroke
        {
            return;
        }

        self.apply_geometry_transform();
        let cpu_path = bezpath_to_cpu(path);
        match self.mode {
            PaintMode::Hit { key } => {
                // Dashes stay solid on the hit surface so a dashed outline is
                // hit-testable along its whole length.
                self.ctx.set_stroke(stroke_to_cpu(stroke, false));
                self.set_flat_paint(key.to_rgba8());
                self.ctx.stroke_path(&cpu_path);
            }
            PaintMode::Scene => {
                self.ctx.set_stroke(stroke_to_cpu(stroke, true));
                let color = match self.silhouette {
                    Some(s) => s.color,
                    None => stroke.color,
                };
                self.set_flat_paint(color);
                self.ctx.stroke_path(&cpu_path);
            }
        }
    }

    /// Fill then stroke `path`.
    pub fn fill_stroke_path(&mut self, path: &BezPath) {
        self.fill_path(path);
        self.stroke_path(path);
    }

    /// Fill an axis-aligned rectangle in local coordinates.
    pub fn fill_rect(&mut self, rect: Rect) {
        self.fill_path(&rect.to_path(0.1));
    }

    /// Draw a bitmap scaled into `width × height` local units at the origin.
    /// On the hit pass the bitmap's rectangle is painted with the color key.
    pub fn draw_bitmap(&mut self, bitmap: &Bitmap, width: f64, height: f64) {
        if width <= 0.0 || height <= 0.0 || bitmap.width() == 0 || bitmap.height() == 0 {
            return;
        }
        self.apply_geometry_transform();
        let dst = vello_cpu::kurbo::Rect::new(0.0, 0.0, width, height);
        match self.mode {
            PaintMode::Hit { key } => {
                self.set_flat_paint(key.to_rgba8());
                self.ctx.fill_rect(&dst);
            }
            PaintMode::Scene => {
                if let Some(s) = self.silhouette {
                    self.set_flat_paint(s.color);
                    self.ctx.fill_rect(&dst);
                } else {
                    let sx = width / f64::from(bitmap.width());
                    let sy = height / f64::from(bitmap.height());
                    self.ctx.set_paint(bitmap.paint(false));
                    self.ctx
                        .set_paint_transform(vello_cpu::kurbo::Affine::scale_non_uniform(sx, sy));
                    self.ctx.fill_rect(&dst);
                }
            }
        }
    }

    fn apply_geometry_transform(&mut self) {
        self.ctx
            .set_transform(affine_to_cpu(self.current_transform().to_affine()));
    }

    fn set_flat_paint(&mut self, color: Rgba8) {
        self.ctx
            .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint(color_to_cpu(color));
    }

    /// Configure the scene fill paint. Returns false when there is nothing
    /// to paint (e.g. a gradient without stops).
    fn set_fill_paint(&mut self) -> bool {
        match self.style.fill.as_ref() {
            None => false,
            Some(Fill::Solid(c)) => {
                self.set_flat_paint(*c);
                true
            }
            Some(Fill::LinearGradient(g)) => {
                let Some(stops) = gradient_stops_to_cpu(&g.stops) else {
                    return false;
                };
                self.ctx
                    .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
                self.ctx.set_paint(vello_cpu::peniko::Gradient {
                    kind: vello_cpu::peniko::GradientKind::Linear(
                        vello_cpu::peniko::LinearGradientPosition::new(
                            (g.start.x, g.start.y),
                            (g.end.x, g.end.y),
                        ),
                    ),
                    extend: vello_cpu::peniko::Extend::Pad,
                    stops,
                    ..Default::default()
                });
                true
            }
            Some(Fill::RadialGradient(g)) => {
                let Some(stops) = gradient_stops_to_cpu(&g.stops) else {
                    return false;
                };
                self.ctx
                    .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
                self.ctx.set_paint(vello_cpu::peniko::Gradient {
                    kind: vello_cpu::peniko::GradientKind::Radial(
                        vello_cpu::peniko::RadialGradientPosition::new_two_point(
                            (g.center.x, g.center.y),
                            g.start_radius as f32,
                            (g.center.x, g.center.y),
                            g.end_radius as f32,
                        ),
                    ),
                    extend: vello_cpu::peniko::Extend::Pad,
                    stops,
                    ..Default::default()
                });
                true
            }
            Some(Fill::Pattern(p)) => {
                self.ctx
                    .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
                self.ctx.set_paint(p.bitmap.paint(p.repeat));
                true
            }
        }
    }
}

pub(crate) fn affine_to_cpu(a: kurbo::Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

pub(crate) fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

pub(crate) fn color_to_cpu(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn fill_rule_to_cpu(rule: FillRule) -> vello_cpu::peniko::Fill {
    match rule {
        FillRule::NonZero => vello_cpu::peniko::Fill::NonZero,
        FillRule::EvenOdd => vello_cpu::peniko::Fill::EvenOdd,
    }
}

fn stroke_to_cpu(s: &Stroke, with_dash: bool) -> vello_cpu::kurbo::Stroke {
    let cap = match s.cap {
        LineCap::Butt => vello_cpu::kurbo::Cap::Butt,
        LineCap::Round => vello_cpu::kurbo::Cap::Round,
        LineCap::Square => vello_cpu::kurbo::Cap::Square,
    };
    let mut out = vello_cpu::kurbo::Stroke::new(s.width);
    out.start_cap = cap;
    out.end_cap = cap;
    out.join = match s.join {
        LineJoin::Miter => vello_cpu::kurbo::Join::Miter,
        LineJoin::Round => vello_cpu::kurbo::Join::Round,
        LineJoin::Bevel => vello_cpu::kurbo::Join::Bevel,
    };
    out.miter_limit = s.miter_limit;
    if with_dash && let Some(dash) = &s.dash {
        out = out.with_dashes(s.dash_offset, dash.iter().copied());
    }
    out
}

/// Build rasterizer color stops, clamping offsets into `0..=1`, sorting, and
/// padding both ends so the gradient extends cleanly. `None` when `stops` is
/// empty.
fn gradient_stops_to_cpu(stops: &[GradientStop]) -> Option<vello_cpu::peniko::ColorStops> {
    if stops.is_empty() {
        return None;
    }
    let mut sorted: Vec<GradientStop> = stops
        .iter()
        .map(|s| GradientStop {
            offset: s.offset.clamp(0.0, 1.0),
            color: s.color,
        })
        .collect();
    sorted.sort_by(|a, b| a.offset.total_cmp(&b.offset));
    if let Some(first) = sorted.first().copied()
        && first.offset > 0.0
    {
        sorted.insert(0, GradientStop {
            offset: 0.0,
            color: first.color,
        });
    }
    if let Some(last) = sorted.last().copied()
        && last.offset < 1.0
    {
        sorted.push(GradientStop {
            offset: 1.0,
            color: last.color,
        });
    }

    let out: Vec<vello_cpu::peniko::ColorStop> = sorted
        .iter()
        .map(|s| vello_cpu::peniko::ColorStop::from((s.offset, color_to_cpu(s.color))))
        .collect();
    Some(vello_cpu::peniko::ColorStops::from(out.as_slice()))
}

#[cfg(test)]
#[path = "../../tests/unit/render/context.rs"]
mod tests;
