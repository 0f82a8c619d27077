use super::*;

#[test]
fn physical_size_scales_with_pixel_ratio() {
    let s = Surface::new(100, 50, 2.0).unwrap();
    assert_eq!(s.logical_size(), (100, 50));
    assert_eq!(s.physical_size(), (200, 100));
}

#[test]
fn fractional_ratio_rounds_physical_extent() {
    let s = Surface::new(100, 100, 1.5).unwrap();
    assert_eq!(s.physical_size(), (150, 150));

    let s = Surface::new(3, 3, 1.5).unwrap();
    // 4.5 rounds up
    assert_eq!(s.physical_size(), (5, 5));
}

#[test]
fn oversized_or_degenerate_extents_are_rejected() {
    assert!(Surface::new(0, 10, 1.0).is_err());
    assert!(Surface::new(10, 0, 1.0).is_err());
    assert!(Surface::new(u32::from(u16::MAX) + 1, 10, 1.0).is_err());
    assert!(Surface::new(40_000, 10, 2.0).is_err());
    assert!(Surface::new(10, 10, 0.0).is_err());
    assert!(Surface::new(10, 10, f64::NAN).is_err());
    assert!(Surface::new(10, 10, -1.0).is_err());
}

#[test]
fn fill_and_pixel_at_round_trip_premultiplied() {
    let mut s = Surface::new(4, 4, 1.0).unwrap();
    s.fill(Rgba8::rgba(255, 0, 0, 128));

    let px = s.pixel_at(2, 2).unwrap();
    assert_eq!(px.a, 128);
    assert_eq!(px.r, 128);
    assert_eq!(px.g, 0);

    assert!(s.pixel_at(4, 2).is_none());
    assert!(s.pixel_at(2, 4).is_none());

    s.clear();
    assert_eq!(s.pixel_at(2, 2).unwrap(), Rgba8Premul::transparent());
}

#[test]
fn to_rgba_image_unpremultiplies() {
    let mut s = Surface::new(2, 2, 1.0).unwrap();
    s.fill(Rgba8::rgba(255, 0, 0, 128));

    let img = s.to_rgba_image().unwrap();
    let px = img.get_pixel(0, 0);
    assert_eq!(px[3], 128);
    // 128/255-premultiplied 255 unpremultiplies back to 255.
    assert_eq!(px[0], 255);
}

#[test]
fn bitmap_rejects_wrong_byte_length() {
    assert!(Bitmap::from_rgba8(2, 2, &[0u8; 15]).is_err());
    assert!(Bitmap::from_rgba8(2, 2, &[0u8; 16]).is_ok());
}
