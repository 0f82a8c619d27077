//! Pixel surfaces.
//!
//! [`Surface`] is a premultiplied-RGBA8 pixmap plus the logical size and
//! pixel ratio it was allocated for; layers keep one for the scene and one
//! for hits. [`Bitmap`] is an immutable shared pixmap used as a pattern or
//! image paint.

use crate::foundation::core::{Rgba8, Rgba8Premul};
use crate::foundation::error::{RibaltaError, RibaltaResult};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A CPU pixel surface at `logical size × pixel ratio` physical pixels.
pub struct Surface {
    pixmap: vello_cpu::Pixmap,
    width: u32,
    height: u32,
    pixel_ratio: f64,
}

impl Surface {
    /// Allocate a transparent surface. The physical extent on each axis is
    /// `round(logical × pixel_ratio)` and must fit the rasterizer's u16
    /// coordinate space.
    pub(crate) fn new(width: u32, height: u32, pixel_ratio: f64) -> RibaltaResult<Self> {
        let pw = physical_extent(width, pixel_ratio)?;
        let ph = physical_extent(height, pixel_ratio)?;
        Ok(Self {
            pixmap: vello_cpu::Pixmap::new(pw, ph),
            width,
            height,
            pixel_ratio,
        })
    }

    /// Logical size in user-space units.
    pub fn logical_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Physical pixel size.
    pub fn physical_size(&self) -> (u16, u16) {
        (self.pixmap.width(), self.pixmap.height())
    }

    /// Physical pixels per logical unit.
    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub(crate) fn pixmap(&self) -> &vello_cpu::Pixmap {
        &self.pixmap
    }

    pub(crate) fn pixmap_mut(&mut self) -> &mut vello_cpu::Pixmap {
        &mut self.pixmap
    }

    /// Premultiplied RGBA8 bytes, row-major.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    /// Reset every pixel to transparent.
    pub(crate) fn clear(&mut self) {
        self.pixmap.data_as_u8_slice_mut().fill(0);
    }

    /// Reset pixels inside a logical-coordinate rectangle to transparent.
    pub(crate) fn clear_rect(&mut self, rect: crate::foundation::core::Rect) {
        let (pw, ph) = self.physical_size();
        let x0 = ((rect.x0 * self.pixel_ratio).floor().max(0.0) as usize).min(usize::from(pw));
        let y0 = ((rect.y0 * self.pixel_ratio).floor().max(0.0) as usize).min(usize::from(ph));
        let x1 = ((rect.x1 * self.pixel_ratio).ceil().max(0.0) as usize).min(usize::from(pw));
        let y1 = ((rect.y1 * self.pixel_ratio).ceil().max(0.0) as usize).min(usize::from(ph));
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        let stride = usize::from(pw) * 4;
        let data = self.pixmap.data_as_u8_slice_mut();
        for y in y0..y1 {
            data[y * stride + x0 * 4..y * stride + x1 * 4].fill(0);
        }
    }

    /// Flood the surface with one color.
    pub(crate) fn fill(&mut self, color: Rgba8) {
        let px = color.premultiply().to_array();
        for out in self.pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
            out.copy_from_slice(&px);
        }
    }

    /// The premultiplied pixel at physical coordinates, or `None` when out of
    /// bounds.
    pub fn pixel_at(&self, x: u16, y: u16) -> Option<Rgba8Premul> {
        if x >= self.pixmap.width() || y >= self.pixmap.height() {
            return None;
        }
        let idx = (usize::from(y) * usize::from(self.pixmap.width()) + usize::from(x)) * 4;
        let d = self.pixmap.data_as_u8_slice();
        Some(Rgba8Premul {
            r: d[idx],
            g: d[idx + 1],
            b: d[idx + 2],
            a: d[idx + 3],
        })
    }

    /// Copy out as a straight-alpha image.
    pub fn to_rgba_image(&self) -> RibaltaResult<image::RgbaImage> {
        let (w, h) = self.physical_size();
        let mut out = Vec::with_capacity(self.data().len());
        for px in self.data().chunks_exact(4) {
            let s = Rgba8Premul {
                r: px[0],
                g: px[1],
                b: px[2],
                a: px[3],
            }
            .to_straight();
            out.extend_from_slice(&[s.r, s.g, s.b, s.a]);
        }
        image::RgbaImage::from_raw(u32::from(w), u32::from(h), out)
            .ok_or_else(|| RibaltaError::raster("surface byte length mismatch"))
    }

    /// Write the surface to a PNG file, unpremultiplying on the way out.
    pub fn write_png(&self, path: impl AsRef<Path>) -> RibaltaResult<()> {
        let img = self.to_rgba_image()?;
        let (w, h) = self.physical_size();
        image::save_buffer_with_format(
            path.as_ref(),
            img.as_raw(),
            u32::from(w),
            u32::from(h),
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| {
            RibaltaError::raster(format!("write png '{}': {e}", path.as_ref().display()))
        })
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_ratio", &self.pixel_ratio)
            .finish_non_exhaustive()
    }
}

/// An immutable shared bitmap usable as a pattern or image paint.
#[derive(Clone)]
pub struct Bitmap {
    pixmap: Arc<vello_cpu::Pixmap>,
}

impl Bitmap {
    /// Build from straight-alpha RGBA8 bytes, row-major, `width * height * 4`
    /// bytes long.
    pub fn from_rgba8(width: u32, height: u32, rgba: &[u8]) -> RibaltaResult<Self> {
        let w: u16 = width
            .try_into()
            .map_err(|_| RibaltaError::raster("bitmap width exceeds u16"))?;
        let h: u16 = height
            .try_into()
            .map_err(|_| RibaltaError::raster("bitmap height exceeds u16"))?;
        let expected = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        if rgba.len() != expected {
            return Err(RibaltaError::raster("bitmap byte length mismatch"));
        }

        let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
            (width as usize) * (height as usize),
        );
        for px in rgba.chunks_exact(4) {
            let p = Rgba8 {
                r: px[0],
                g: px[1],
                b: px[2],
                a: px[3],
            }
            .premultiply();
            pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array(
                p.to_array(),
            ));
        }
        Ok(Self {
            pixmap: Arc::new(vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true)),
        })
    }

    /// Build from a decoded image.
    pub fn from_image(img: &image::RgbaImage) -> RibaltaResult<Self> {
        Self::from_rgba8(img.width(), img.height(), img.as_raw())
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        u32::from(self.pixmap.width())
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        u32::from(self.pixmap.height())
    }

    /// The image paint for this bitmap. `repeat` tiles it; otherwise edge
    /// pixels pad.
    pub(crate) fn paint(&self, repeat: bool) -> vello_cpu::Image {
        let extend = if repeat {
            vello_cpu::peniko::Extend::Repeat
        } else {
            vello_cpu::peniko::Extend::Pad
        };
        vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(self.pixmap.clone()),
            sampler: vello_cpu::peniko::ImageSampler {
                x_extend: extend,
                y_extend: extend,
                ..vello_cpu::peniko::ImageSampler::default()
            },
        }
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

pub(crate) fn physical_extent(logical: u32, pixel_ratio: f64) -> RibaltaResult<u16> {
    if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
        return Err(RibaltaError::config(format!(
            "pixel ratio must be finite and > 0, got {pixel_ratio}"
        )));
    }
    if logical == 0 {
        return Err(RibaltaError::config("surface size must be non-zero"));
    }
    let px = (logical as f64 * pixel_ratio).round();
    if px < 1.0 || px > f64::from(u16::MAX) {
        return Err(RibaltaError::config(format!(
            "surface extent {logical} at pixel ratio {pixel_ratio} is outside 1..={}",
            u16::MAX
        )));
    }
    Ok(px as u16)
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
