//! Path builders for the common shape geometries.
//!
//! Draw callbacks take arbitrary [`BezPath`]s; these helpers cover the
//! frequent cases so callers do not hand-assemble Bezier arcs for a circle.

use crate::foundation::core::{BezPath, Point};
use kurbo::Shape as _;

/// Curve flattening tolerance for the canned geometries, in local units.
const PATH_TOLERANCE: f64 = 0.01;

/// A circle centered at `(cx, cy)`.
pub fn circle(cx: f64, cy: f64, radius: f64) -> BezPath {
    kurbo::Circle::new((cx, cy), radius).to_path(PATH_TOLERANCE)
}

/// An axis-aligned ellipse centered at `(cx, cy)`.
pub fn ellipse(cx: f64, cy: f64, rx: f64, ry: f64) -> BezPath {
    kurbo::Ellipse::new((cx, cy), (rx, ry), 0.0).to_path(PATH_TOLERANCE)
}

/// An axis-aligned rectangle with its top-left corner at `(x, y)`.
pub fn rect(x: f64, y: f64, width: f64, height: f64) -> BezPath {
    kurbo::Rect::new(x, y, x + width, y + height).to_path(PATH_TOLERANCE)
}

/// A rectangle with uniformly rounded corners.
pub fn rounded_rect(x: f64, y: f64, width: f64, height: f64, corner_radius: f64) -> BezPath {
    kurbo::RoundedRect::new(x, y, x + width, y + height, corner_radius).to_path(PATH_TOLERANCE)
}

/// An open polyline through `points`.
pub fn polyline(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        path.move_to(*first);
        for p in iter {
            path.line_to(*p);
        }
    }
    path
}

/// A closed polygon through `points`.
pub fn polygon(points: &[Point]) -> BezPath {
    let mut path = polyline(points);
    if !points.is_empty() {
        path.close_path();
    }
    path
}
