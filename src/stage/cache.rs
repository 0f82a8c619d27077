//! Subtree bitmap caching: freeze a subtree into a scene/hit pixmap pair.

use crate::foundation::core::ColorKey;
use crate::foundation::error::{RibaltaError, RibaltaResult};
use crate::render::painter::{Painter, PassKind, WalkBase};
use crate::scene::node::NodeId;
use crate::scene::tree::SceneArena;
use crate::transform::Transform;
use kurbo::Rect;
use std::sync::Arc;

/// Capture options for [`Stage::cache`](crate::Stage::cache).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheOpts {
    /// Bounds of the subtree in the cached node's local coordinates. The
    /// caller supplies them; geometry outside is not captured.
    pub rect: Rect,
    /// Extra resolution multiplier on top of the node's absolute scale
    /// (e.g. 2.0 captures at double density for later upscaling).
    pub pixel_ratio: f64,
}

impl CacheOpts {
    /// Capture `rect` at the node's current absolute scale.
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            pixel_ratio: 1.0,
        }
    }

    /// Override the capture density multiplier.
    pub fn with_pixel_ratio(mut self, pixel_ratio: f64) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }
}

/// A frozen subtree: one scene pixmap, one hit pixmap, and the geometry they
/// were captured at. While present on a node, the painter blits these instead
/// of recursing into the node's children.
#[derive(Debug)]
pub(crate) struct SubtreeCache {
    pub(crate) scene: Arc<vello_cpu::Pixmap>,
    pub(crate) hit: Arc<vello_cpu::Pixmap>,
    /// Captured region in the owner's local coordinates.
    pub(crate) rect: Rect,
    /// Cache pixels per local unit along each axis at capture time.
    pub(crate) scale: (f64, f64),
}

/// Render `id`'s subtree into a fresh cache entry.
///
/// The subtree's absolute memos must be resolved and `id`'s own cache slot
/// empty (otherwise the capture would blit the stale cache into itself).
/// Pixels hold the subtree at opacity relative to the owner; the owner's
/// absolute opacity applies at blit time. The hit pixmap is not a per-child
/// hit pass: it is the scene capture's alpha silhouette filled with the
/// owner's key, so the whole cached subtree hits as one entity.
pub(crate) fn capture(
    painter: &mut Painter,
    arena: &SceneArena,
    id: NodeId,
    owner_key: ColorKey,
    opts: &CacheOpts,
    stage_pixel_ratio: f64,
    alpha_threshold: u8,
) -> RibaltaResult<SubtreeCache> {
    let rect = opts.rect;
    if !(rect.width() > 0.0 && rect.height() > 0.0)
        || !rect.width().is_finite()
        || !rect.height().is_finite()
    {
        return Err(RibaltaError::usage(format!(
            "cache bounds must have positive finite extent, got {rect:?}"
        )));
    }
    if !(opts.pixel_ratio.is_finite() && opts.pixel_ratio > 0.0) {
        return Err(RibaltaError::usage(format!(
            "cache pixel ratio must be finite and > 0, got {}",
            opts.pixel_ratio
        )));
    }

    let node = arena
        .get(id)
        .ok_or_else(|| RibaltaError::usage("cannot cache a dead node"))?;
    let (abs_sx, abs_sy) = node
        .abs_scale
        .ok_or_else(|| RibaltaError::raster("subtree not resolved before cache capture"))?;
    let abs = node
        .abs_transform
        .ok_or_else(|| RibaltaError::raster("subtree not resolved before cache capture"))?;
    let abs_opacity = node
        .abs_opacity
        .ok_or_else(|| RibaltaError::raster("subtree not resolved before cache capture"))?;

    // Cache pixels per local unit: the node's absolute scale times the stage
    // and capture density ratios.
    let density = stage_pixel_ratio * opts.pixel_ratio;
    let sx = abs_sx.abs() * density;
    let sy = abs_sy.abs() * density;
    if !(sx > 0.0 && sy > 0.0 && sx.is_finite() && sy.is_finite()) {
        return Err(RibaltaError::usage(format!(
            "cannot cache at a degenerate absolute scale ({abs_sx}, {abs_sy})"
        )));
    }

    let w_px = (rect.width() * sx).ceil();
    let h_px = (rect.height() * sy).ceil();
    if !(w_px >= 1.0 && h_px >= 1.0 && w_px <= f64::from(u16::MAX) && h_px <= f64::from(u16::MAX)) {
        return Err(RibaltaError::usage(format!(
            "cache capture of {w_px}x{h_px} px is outside the rasterizer's 1..=65535 range"
        )));
    }
    let (w, h) = (w_px as u16, h_px as u16);

    // Base such that painting the node lands its local `rect` on the pixmap:
    // scale to cache pixels, shift the rect origin to (0, 0), then undo the
    // node's absolute transform so the walk's `base * abs` composes back to
    // local space. Opacity is likewise captured relative to the owner; the
    // owner's absolute opacity applies when the cache is blitted.
    let mut transform = Transform::scaling(sx, sy);
    transform.translate(-rect.x0, -rect.y0);
    let inv_abs = abs.inverse().map_err(|_| {
        RibaltaError::usage("cannot cache a node with a singular absolute transform")
    })?;
    transform.multiply(&inv_abs);
    let base = WalkBase {
        transform,
        scale: (
            sx / abs_sx.abs().max(f64::EPSILON),
            sy / abs_sy.abs().max(f64::EPSILON),
        ),
        opacity: if abs_opacity > 0.0 {
            1.0 / abs_opacity
        } else {
            1.0
        },
    };

    let mut scene = vello_cpu::Pixmap::new(w, h);
    painter.paint_subtree(arena, id, PassKind::Scene, base, &mut scene)?;

    let mut hit = vello_cpu::Pixmap::new(w, h);
    let (kr, kg, kb) = owner_key.rgb();
    for (src, dst) in scene
        .data_as_u8_slice()
        .chunks_exact(4)
        .zip(hit.data_as_u8_slice_mut().chunks_exact_mut(4))
    {
        if src[3] > alpha_threshold {
            dst.copy_from_slice(&[kr, kg, kb, 255]);
        }
    }

    tracing::debug!(node = ?id, width = w, height = h, "captured subtree cache");

    Ok(SubtreeCache {
        scene: Arc::new(scene),
        hit: Arc::new(hit),
        rect,
        scale: (sx, sy),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/stage/cache.rs"]
mod tests;
