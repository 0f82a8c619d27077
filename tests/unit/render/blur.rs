use super::*;

fn blur(src: &[u8], w: u32, h: u32, radius: u32, sigma: f32) -> Vec<u8> {
    let kernel = gaussian_kernel_q16(radius, sigma).unwrap();
    let mut dst = vec![0u8; src.len()];
    let mut tmp = vec![0u8; src.len()];
    blur_rgba8_premul_q16(src, &mut dst, &mut tmp, w, h, &kernel);
    dst
}

#[test]
fn kernel_radius_0_is_identity() {
    assert_eq!(gaussian_kernel_q16(0, 1.0).unwrap(), vec![1 << 16]);
    // sigma is ignored at radius 0
    assert_eq!(gaussian_kernel_q16(0, f32::NAN).unwrap(), vec![1 << 16]);
}

#[test]
fn kernel_rejects_bad_sigma() {
    assert!(gaussian_kernel_q16(2, 0.0).is_err());
    assert!(gaussian_kernel_q16(2, -1.0).is_err());
    assert!(gaussian_kernel_q16(2, f32::NAN).is_err());
    assert!(gaussian_kernel_q16(2, f32::INFINITY).is_err());
}

#[test]
fn kernel_weights_sum_to_one_in_q16() {
    for radius in [1u32, 2, 5, 11] {
        let k = gaussian_kernel_q16(radius, radius as f32 / 2.0).unwrap();
        assert_eq!(k.len() as u32, 2 * radius + 1);
        assert_eq!(k.iter().map(|&w| u64::from(w)).sum::<u64>(), 1 << 16);
    }
}

#[test]
fn blur_radius_0_is_identity() {
    let src = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
    assert_eq!(blur(&src, 1, 2, 0, 1.0), src);
}

#[test]
fn blur_constant_image_is_identity() {
    let (w, h) = (4u32, 3u32);
    let px = [10u8, 20u8, 30u8, 40u8];
    let src = px.repeat((w * h) as usize);
    assert_eq!(blur(&src, w, h, 3, 2.0), src);
}

#[test]
fn blur_spreads_energy_from_single_pixel() {
    let (w, h) = (5u32, 5u32);
    let mut src = vec![0u8; (w * h * 4) as usize];
    let center = ((2 * w + 2) * 4) as usize;
    src[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

    let out = blur(&src, w, h, 2, 1.2);

    let nonzero = out.chunks_exact(4).filter(|px| px[3] != 0).count();
    assert!(nonzero > 1);

    let sum_a: u32 = out.chunks_exact(4).map(|px| u32::from(px[3])).sum();
    assert!((sum_a as i32 - 255).abs() <= 4);
}
