use super::*;

fn assert_close(a: f64, b: f64, eps: f64) {
    assert!((a - b).abs() <= eps, "expected {a} ≈ {b} (eps {eps})");
}

fn assert_coeffs_close(a: &Transform, b: &Transform, eps: f64) {
    let (ca, cb) = (a.coeffs(), b.coeffs());
    for i in 0..6 {
        assert!(
            (ca[i] - cb[i]).abs() <= eps,
            "coeff {i}: {} vs {}",
            ca[i],
            cb[i]
        );
    }
}

/// Rebuild a transform from decomposed attributes in node order
/// (translate, rotate, skew, scale).
fn recompose(d: &Decomposition) -> Transform {
    let mut t = Transform::IDENTITY;
    t.translate(d.x, d.y)
        .rotate(d.rotation)
        .skew(d.skew_x, d.skew_y)
        .scale(d.scale_x, d.scale_y);
    t
}

#[test]
fn identity_maps_points_unchanged() {
    let t = Transform::IDENTITY;
    let p = Point::new(3.5, -2.0);
    assert_eq!(t.apply(p), p);
    assert_eq!(Transform::default(), Transform::IDENTITY);
}

#[test]
fn chained_ops_match_kurbo_composition() {
    let mut t = Transform::IDENTITY;
    t.translate(10.0, 5.0).rotate(0.7).scale(2.0, 3.0);

    let a = Affine::translate((10.0, 5.0))
        * Affine::rotate(0.7)
        * Affine::scale_non_uniform(2.0, 3.0);

    for p in [
        Point::new(0.0, 0.0),
        Point::new(1.0, 0.0),
        Point::new(-4.0, 7.5),
    ] {
        let ours = t.apply(p);
        let theirs = a * p;
        assert_close(ours.x, theirs.x, 1e-9);
        assert_close(ours.y, theirs.y, 1e-9);
    }

    assert_coeffs_close(&t, &Transform::from_affine(a), 1e-9);
    assert_coeffs_close(&Transform::from_affine(t.to_affine()), &t, 0.0);
}

#[test]
fn multiply_applies_other_first() {
    let mut t = Transform::translation(10.0, 0.0);
    t.multiply(&Transform::scaling(2.0, 2.0));

    // Scale runs before the translation.
    let p = t.apply(Point::new(1.0, 0.0));
    assert_close(p.x, 12.0, 1e-12);
    assert_close(p.y, 0.0, 1e-12);
}

#[test]
fn invert_round_trips() {
    let mut t = Transform::IDENTITY;
    t.translate(3.0, -8.0).rotate(1.2).scale(0.5, 4.0).skew(0.3, 0.0);
    let original = t;

    t.invert().unwrap();
    t.invert().unwrap();
    assert_coeffs_close(&t, &original, 1e-9);

    let inv = original.inverse().unwrap();
    let p = Point::new(7.0, -2.5);
    let back = inv.apply(original.apply(p));
    assert_close(back.x, p.x, 1e-9);
    assert_close(back.y, p.y, 1e-9);
}

#[test]
fn singular_invert_fails_and_leaves_matrix_untouched() {
    let mut t = Transform::scaling(0.0, 5.0);
    let before = t.coeffs();
    assert!(t.invert().is_err());
    assert_eq!(t.coeffs(), before);
    assert!(t.decompose().is_err());
}

#[test]
fn decompose_is_exact_without_y_shear() {
    let mut t = Transform::IDENTITY;
    t.translate(12.0, -3.0).rotate(0.7).scale(2.0, 0.5);

    let d = t.decompose().unwrap();
    assert_close(d.x, 12.0, 1e-9);
    assert_close(d.y, -3.0, 1e-9);
    assert_close(d.rotation, 0.7, 1e-9);
    assert_close(d.scale_x, 2.0, 1e-9);
    assert_close(d.scale_y, 0.5, 1e-9);
    assert_close(d.skew_x, 0.0, 1e-9);
    assert_close(d.skew_y, 0.0, 1e-9);

    assert_coeffs_close(&recompose(&d), &t, 1e-9);
}

#[test]
fn decompose_recovers_x_shear() {
    let mut t = Transform::IDENTITY;
    t.translate(1.0, 2.0)
        .rotate(-0.4)
        .skew(0.6, 0.0)
        .scale(1.5, 2.5);

    let d = t.decompose().unwrap();
    assert_close(d.rotation, -0.4, 1e-9);
    assert_close(d.skew_x, 0.6, 1e-9);
    assert_close(d.skew_y, 0.0, 1e-9);
    assert_coeffs_close(&recompose(&d), &t, 1e-9);
}

#[test]
fn decompose_with_y_shear_is_an_approximation() {
    let mut t = Transform::IDENTITY;
    t.rotate(0.3).skew(0.2, 0.5).scale(1.0, 1.0);

    // The decomposition flattens skew_y to zero, so recomposition is close in
    // spirit but not equal; the divergence is the documented limitation.
    let d = t.decompose().unwrap();
    assert_close(d.skew_y, 0.0, 0.0);

    let r = recompose(&d);
    let diff: f64 = t
        .coeffs()
        .iter()
        .zip(r.coeffs())
        .map(|(a, b)| (a - b).abs())
        .sum();
    assert!(diff > 1e-6, "expected the recomposition to differ, got {diff}");
}

#[test]
fn quarter_turn_decomposes_exactly() {
    // a == 0 exercises the acos edge of the rotation recovery.
    let t = Transform::from_coeffs([0.0, 2.0, -3.0, 0.0, 0.0, 0.0]);
    let d = t.decompose().unwrap();
    assert_close(d.rotation, std::f64::consts::FRAC_PI_2, 1e-9);
    assert_coeffs_close(&recompose(&d), &t, 1e-9);
}
