use super::*;
use crate::scene::paths;

fn render_to_bytes(ctx: &mut vello_cpu::RenderContext, w: u16, h: u16) -> Vec<u8> {
    let mut pm = vello_cpu::Pixmap::new(w, h);
    ctx.flush();
    ctx.render_to_pixmap(&mut pm);
    pm.data_as_u8_slice().to_vec()
}

fn px(bytes: &[u8], width: usize, x: usize, y: usize) -> [u8; 4] {
    let idx = (y * width + x) * 4;
    [bytes[idx], bytes[idx + 1], bytes[idx + 2], bytes[idx + 3]]
}

#[test]
fn transform_stack_saves_and_restores() {
    let mut raw = vello_cpu::RenderContext::new(8, 8);
    let style = ShapeStyle::default();
    let mut dc = DrawingContext::new_scene(&mut raw, &style, Transform::IDENTITY);

    dc.translate(10.0, 0.0);
    dc.save();
    dc.scale(2.0, 2.0);
    let scaled = dc.current_transform();
    assert_eq!(scaled.coeffs(), [2.0, 0.0, 0.0, 2.0, 10.0, 0.0]);

    dc.restore();
    let back = dc.current_transform();
    assert_eq!(back.coeffs(), [1.0, 0.0, 0.0, 1.0, 10.0, 0.0]);

    // restore without a save is a no-op
    dc.restore();
    dc.restore();
    assert_eq!(dc.current_transform().coeffs(), back.coeffs());
}

#[test]
fn base_transform_composes_under_local_ops() {
    let mut raw = vello_cpu::RenderContext::new(8, 8);
    let style = ShapeStyle::default();
    let mut base = Transform::IDENTITY;
    base.translate(100.0, 50.0);
    let mut dc = DrawingContext::new_scene(&mut raw, &style, base);

    dc.translate(1.0, 2.0);
    let t = dc.current_transform();
    let p = t.apply(crate::foundation::core::Point::new(0.0, 0.0));
    assert_eq!((p.x, p.y), (101.0, 52.0));
}

#[test]
fn styleless_shape_paints_nothing() {
    let mut raw = vello_cpu::RenderContext::new(4, 4);
    let style = ShapeStyle::default();
    let mut dc = DrawingContext::new_scene(&mut raw, &style, Transform::IDENTITY);
    dc.fill_stroke_path(&paths::rect(0.0, 0.0, 4.0, 4.0));

    let bytes = render_to_bytes(&mut raw, 4, 4);
    assert!(bytes.iter().all(|&b| b == 0));
}

#[test]
fn hit_mode_paints_the_flat_key() {
    let key = ColorKey::new(0x00AB_CDEF).unwrap();
    let mut raw = vello_cpu::RenderContext::new(4, 4);
    let style = ShapeStyle::filled(Rgba8::rgba(1, 2, 3, 4));
    let mut dc = DrawingContext::new_hit(&mut raw, &style, Transform::IDENTITY, key);
    dc.fill_path(&paths::rect(0.0, 0.0, 4.0, 4.0));

    let bytes = render_to_bytes(&mut raw, 4, 4);
    // Interior pixel: fully opaque, carrying the key, not the scene fill.
    assert_eq!(px(&bytes, 4, 1, 1), [0xAB, 0xCD, 0xEF, 0xFF]);
}

#[test]
fn silhouette_mode_flattens_fill_color() {
    let mut raw = vello_cpu::RenderContext::new(4, 4);
    let style = ShapeStyle::filled(Rgba8::rgb(10, 200, 30));
    let mut dc = DrawingContext::new_silhouette(
        &mut raw,
        &style,
        Transform::IDENTITY,
        Rgba8::BLACK,
        true,
    );
    dc.fill_path(&paths::rect(0.0, 0.0, 4.0, 4.0));

    let bytes = render_to_bytes(&mut raw, 4, 4);
    assert_eq!(px(&bytes, 4, 2, 2), [0, 0, 0, 255]);
}

#[test]
fn silhouette_can_exclude_stroke() {
    let mut raw = vello_cpu::RenderContext::new(8, 8);
    let style = ShapeStyle::stroked(Rgba8::BLACK, 2.0);
    let mut dc = DrawingContext::new_silhouette(
        &mut raw,
        &style,
        Transform::IDENTITY,
        Rgba8::BLACK,
        false,
    );
    dc.stroke_path(&paths::rect(1.0, 1.0, 6.0, 6.0));

    let bytes = render_to_bytes(&mut raw, 8, 8);
    assert!(bytes.iter().all(|&b| b == 0));
}

#[test]
fn gradient_stops_normalize_sorted_and_padded() {
    let stops = [
        GradientStop {
            offset: 0.8,
            color: Rgba8::WHITE,
        },
        GradientStop {
            offset: 0.3,
            color: Rgba8::BLACK,
        },
    ];
    let out = gradient_stops_to_cpu(&stops).unwrap();
    let offsets: Vec<f32> = out.iter().map(|s| s.offset).collect();
    assert_eq!(offsets, vec![0.0, 0.3, 0.8, 1.0]);

    assert!(gradient_stops_to_cpu(&[]).is_none());
}

#[test]
fn stroke_conversion_honors_dash_flag() {
    let stroke = Stroke::new(Rgba8::BLACK, 3.0).with_dash(vec![4.0, 2.0], 1.0);
    let dashed = stroke_to_cpu(&stroke, true);
    assert_eq!(dashed.dash_pattern.as_slice(), &[4.0, 2.0]);
    assert_eq!(dashed.dash_offset, 1.0);

    let solid = stroke_to_cpu(&stroke, false);
    assert!(solid.dash_pattern.is_empty());
    assert_eq!(solid.width, 3.0);
}

#[test]
fn bezpath_conversion_preserves_every_element() {
    let mut p = BezPath::new();
    p.move_to((0.0, 0.0));
    p.line_to((10.0, 0.0));
    p.quad_to((15.0, 5.0), (10.0, 10.0));
    p.curve_to((8.0, 12.0), (2.0, 12.0), (0.0, 10.0));
    p.close_path();

    let cpu = bezpath_to_cpu(&p);
    assert_eq!(cpu.elements().len(), p.elements().len());
}
