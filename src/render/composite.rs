//! Premultiplied-alpha source-over compositing on raw RGBA8 buffers.
//!
//! The rasterizer composites everything inside one layer; this module covers
//! the one place pixels from different surfaces meet outside it, merging
//! per-layer surfaces into a single exported image.

use crate::foundation::error::{RibaltaError, RibaltaResult};

pub(crate) type PremulPx = [u8; 4];

/// `src` over `dst`, both premultiplied, with an extra opacity on `src`.
pub(crate) fn over(dst: PremulPx, src: PremulPx, opacity: f32) -> PremulPx {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = mul_div255(u16::from(dst[3]), inv).saturating_add(sa);

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// `src` over `dst` across two equal-length premultiplied RGBA8 buffers.
pub(crate) fn over_in_place(dst: &mut [u8], src: &[u8], opacity: f32) -> RibaltaResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(RibaltaError::raster(
            "source-over expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Rounded `x * y / 255` for byte-range values.
pub(crate) fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
