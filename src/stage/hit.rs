//! Color-key registry and hit-surface sampling.

use crate::foundation::core::ColorKey;
use crate::foundation::error::{RibaltaError, RibaltaResult};
use crate::render::surface::Surface;
use crate::scene::node::NodeId;
use std::collections::HashMap;

/// Hit-query tuning knobs, fixed per stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HitOpts {
    /// Spiral-search bound in device pixels for anti-aliased edge pixels.
    pub search_radius_px: u32,
    /// Scene alpha above which a cached subtree's pixel joins its hit
    /// silhouette.
    pub cache_alpha_threshold: u8,
}

impl Default for HitOpts {
    fn default() -> Self {
        Self {
            search_radius_px: 2,
            cache_alpha_threshold: 0,
        }
    }
}

/// Bidirectional shape identity: allocates color keys unique among live
/// shapes and resolves sampled keys back to node ids. Owned by one stage;
/// dropping the stage releases every key.
#[derive(Debug, Default)]
pub(crate) struct KeyRegistry {
    by_key: HashMap<ColorKey, NodeId>,
    next: u32,
}

impl KeyRegistry {
    pub(crate) fn new() -> Self {
        Self {
            by_key: HashMap::new(),
            next: 1,
        }
    }

    /// Allocate an unused key for `id`. Sequential with wrap-around; skips
    /// values still in use, so keys stay unique across release/reuse churn.
    pub(crate) fn allocate(&mut self, id: NodeId) -> RibaltaResult<ColorKey> {
        if self.by_key.len() as u32 >= ColorKey::MAX {
            return Err(RibaltaError::usage(
                "color key palette exhausted (2^24 - 1 live shapes)",
            ));
        }
        loop {
            let value = self.next;
            self.next = if value >= ColorKey::MAX { 1 } else { value + 1 };
            let Some(key) = ColorKey::new(value) else {
                continue;
            };
            if let std::collections::hash_map::Entry::Vacant(e) = self.by_key.entry(key) {
                e.insert(id);
                return Ok(key);
            }
        }
    }

    pub(crate) fn release(&mut self, key: ColorKey) {
        self.by_key.remove(&key);
    }

    pub(crate) fn resolve(&self, key: ColorKey) -> Option<NodeId> {
        self.by_key.get(&key).copied()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }
}

/// Offsets at Chebyshev distance 1..=`max_radius`, ring by ring. The center
/// is not included; callers sample it first.
pub(crate) fn spiral_offsets(max_radius: u32) -> Vec<(i32, i32)> {
    let mut out = Vec::new();
    for r in 1..=max_radius as i32 {
        for dx in -r..=r {
            out.push((dx, -r));
            out.push((dx, r));
        }
        for dy in (-r + 1)..r {
            out.push((-r, dy));
            out.push((r, dy));
        }
    }
    out
}

/// Resolve the hit-surface sample at device pixel `(x, y)` to a color key.
///
/// A fully opaque pixel decodes directly; a fully transparent one is a miss.
/// Partially covered pixels (anti-aliased shape edges) trigger a short spiral
/// search for a decisive neighbor; if the search exhausts its radius the last
/// partial sample decides by majority alpha.
pub(crate) fn resolve_hit(
    surface: &Surface,
    x: i64,
    y: i64,
    search_radius_px: u32,
) -> Option<ColorKey> {
    let center = pixel(surface, x, y)?;
    match center.a {
        0 => None,
        255 => decode(center),
        _ => {
            let mut last = center;
            for (dx, dy) in spiral_offsets(search_radius_px) {
                let Some(px) = pixel(surface, x + i64::from(dx), y + i64::from(dy)) else {
                    continue;
                };
                match px.a {
                    0 => return None,
                    255 => return decode(px),
                    _ => last = px,
                }
            }
            if last.a > 127 { decode(last) } else { None }
        }
    }
}

fn pixel(surface: &Surface, x: i64, y: i64) -> Option<crate::foundation::core::Rgba8Premul> {
    let (w, h) = surface.physical_size();
    if x < 0 || y < 0 || x >= i64::from(w) || y >= i64::from(h) {
        return None;
    }
    surface.pixel_at(x as u16, y as u16)
}

fn decode(px: crate::foundation::core::Rgba8Premul) -> Option<ColorKey> {
    let s = px.to_straight();
    ColorKey::from_rgb(s.r, s.g, s.b)
}

#[cfg(test)]
#[path = "../../tests/unit/stage/hit.rs"]
mod tests;
