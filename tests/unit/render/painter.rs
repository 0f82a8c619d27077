use kurbo::Rect;

use super::*;
use crate::foundation::core::{ColorKey, Rgba8};
use crate::render::pool::SurfacePoolOpts;
use crate::scene::node::{LayerData, NodeData, NodeKind, Parent};
use crate::scene::paths;
use crate::scene::shape::{Shadow, ShapeData, ShapeStyle, Stroke, path_draw_fn};

fn layer(arena: &mut SceneArena) -> NodeId {
    let mut n = NodeData::new(NodeKind::Layer(LayerData::default()));
    n.parent = Parent::Stage;
    arena.insert(n)
}

fn shape(arena: &mut SceneArena, style: ShapeStyle, path: kurbo::BezPath, key: u32) -> NodeId {
    let mut data = ShapeData::new(path_draw_fn(path));
    data.style = style;
    let mut n = NodeData::new(NodeKind::Shape(data));
    n.key = ColorKey::new(key);
    arena.insert(n)
}

fn attach(arena: &mut SceneArena, parent: NodeId, child: NodeId) {
    arena.get_mut(child).unwrap().parent = Parent::Node(parent);
    arena.get_mut(parent).unwrap().children.push(child);
}

/// Fill in the absolute-transform/opacity/scale memos the way the stage does
/// before painting.
fn resolve(arena: &mut SceneArena, id: NodeId, tr: Transform, op: f64, scale: (f64, f64)) {
    let (abs, abs_op, abs_scale, children) = {
        let node = arena.get_mut(id).unwrap();
        let mut abs = tr;
        abs.multiply(&node.attrs.local_transform());
        let abs_op = op * node.attrs.clamped_opacity();
        let abs_scale = (scale.0 * node.attrs.scale_x, scale.1 * node.attrs.scale_y);
        node.abs_transform = Some(abs);
        node.abs_opacity = Some(abs_op);
        node.abs_scale = Some(abs_scale);
        (abs, abs_op, abs_scale, node.children.clone())
    };
    for child in children {
        resolve(arena, child, abs, abs_op, abs_scale);
    }
}

fn paint(
    arena: &SceneArena,
    root: NodeId,
    pass: PassKind,
    w: u16,
    h: u16,
) -> vello_cpu::Pixmap {
    let mut painter = Painter::new(SurfacePoolOpts::default());
    let mut pm = vello_cpu::Pixmap::new(w, h);
    painter
        .paint_subtree(arena, root, pass, WalkBase::scaling(1.0), &mut pm)
        .unwrap();
    pm
}

fn px(pm: &vello_cpu::Pixmap, x: u16, y: u16) -> [u8; 4] {
    let i = (usize::from(y) * usize::from(pm.width()) + usize::from(x)) * 4;
    let d = pm.data_as_u8_slice();
    [d[i], d[i + 1], d[i + 2], d[i + 3]]
}

#[test]
fn scene_pass_fills_shape_geometry() {
    let mut arena = SceneArena::new();
    let root = layer(&mut arena);
    let s = shape(
        &mut arena,
        ShapeStyle::filled(Rgba8::rgb(255, 0, 0)),
        paths::rect(2.0, 2.0, 4.0, 4.0),
        1,
    );
    attach(&mut arena, root, s);
    resolve(&mut arena, root, Transform::IDENTITY, 1.0, (1.0, 1.0));

    let pm = paint(&arena, root, PassKind::Scene, 8, 8);
    assert_eq!(px(&pm, 4, 4), [255, 0, 0, 255]);
    assert_eq!(px(&pm, 0, 0), [0, 0, 0, 0]);
}

#[test]
fn hit_pass_paints_the_color_key_and_ignores_opacity() {
    let mut arena = SceneArena::new();
    let root = layer(&mut arena);
    let s = shape(
        &mut arena,
        ShapeStyle::filled(Rgba8::rgb(10, 20, 30)),
        paths::rect(2.0, 2.0, 4.0, 4.0),
        0x00AB_CDEF,
    );
    attach(&mut arena, root, s);
    arena.get_mut(s).unwrap().attrs.opacity = 0.2;
    resolve(&mut arena, root, Transform::IDENTITY, 1.0, (1.0, 1.0));

    let pm = paint(&arena, root, PassKind::Hit, 8, 8);
    assert_eq!(px(&pm, 4, 4), [0xAB, 0xCD, 0xEF, 255]);
}

#[test]
fn hit_pass_skips_non_listening_subtrees() {
    let mut arena = SceneArena::new();
    let root = layer(&mut arena);
    let s = shape(
        &mut arena,
        ShapeStyle::filled(Rgba8::WHITE),
        paths::rect(0.0, 0.0, 8.0, 8.0),
        7,
    );
    attach(&mut arena, root, s);
    arena.get_mut(s).unwrap().attrs.listening = false;
    resolve(&mut arena, root, Transform::IDENTITY, 1.0, (1.0, 1.0));

    let pm = paint(&arena, root, PassKind::Hit, 8, 8);
    assert_eq!(px(&pm, 4, 4), [0, 0, 0, 0]);

    // The scene pass still draws it.
    let pm = paint(&arena, root, PassKind::Scene, 8, 8);
    assert_eq!(px(&pm, 4, 4), [255, 255, 255, 255]);
}

#[test]
fn invisible_nodes_are_skipped_by_both_passes() {
    let mut arena = SceneArena::new();
    let root = layer(&mut arena);
    let s = shape(
        &mut arena,
        ShapeStyle::filled(Rgba8::WHITE),
        paths::rect(0.0, 0.0, 8.0, 8.0),
        7,
    );
    attach(&mut arena, root, s);
    arena.get_mut(s).unwrap().attrs.visible = false;
    resolve(&mut arena, root, Transform::IDENTITY, 1.0, (1.0, 1.0));

    assert_eq!(px(&paint(&arena, root, PassKind::Scene, 8, 8), 4, 4), [0; 4]);
    assert_eq!(px(&paint(&arena, root, PassKind::Hit, 8, 8), 4, 4), [0; 4]);
}

#[test]
fn node_transform_attributes_move_painted_geometry() {
    let mut arena = SceneArena::new();
    let root = layer(&mut arena);
    let s = shape(
        &mut arena,
        ShapeStyle::filled(Rgba8::rgb(0, 255, 0)),
        paths::rect(0.0, 0.0, 2.0, 2.0),
        1,
    );
    attach(&mut arena, root, s);
    {
        let attrs = &mut arena.get_mut(s).unwrap().attrs;
        attrs.x = 4.0;
        attrs.y = 4.0;
        attrs.scale_x = 2.0;
        attrs.scale_y = 2.0;
    }
    resolve(&mut arena, root, Transform::IDENTITY, 1.0, (1.0, 1.0));

    // The 2x2 rect lands scaled to (4,4)-(8,8).
    let pm = paint(&arena, root, PassKind::Scene, 8, 8);
    assert_eq!(px(&pm, 6, 6), [0, 255, 0, 255]);
    assert_eq!(px(&pm, 2, 2), [0, 0, 0, 0]);
}

#[test]
fn opacity_modulates_scene_alpha_per_leaf() {
    let mut arena = SceneArena::new();
    let root = layer(&mut arena);
    let s = shape(
        &mut arena,
        ShapeStyle::filled(Rgba8::WHITE),
        paths::rect(0.0, 0.0, 8.0, 8.0),
        1,
    );
    attach(&mut arena, root, s);
    arena.get_mut(s).unwrap().attrs.opacity = 0.5;
    resolve(&mut arena, root, Transform::IDENTITY, 1.0, (1.0, 1.0));

    let pm = paint(&arena, root, PassKind::Scene, 8, 8);
    let [_, _, _, a] = px(&pm, 4, 4);
    assert!((i16::from(a) - 128).abs() <= 2, "alpha {a} not near 128");
}

#[test]
fn buffered_draw_does_not_double_blend_fill_and_stroke() {
    let mut arena = SceneArena::new();
    let root = layer(&mut arena);
    let style = ShapeStyle::filled(Rgba8::WHITE)
        .with_stroke(Stroke::new(Rgba8::WHITE, 2.0));
    let s = shape(
        &mut arena,
        style,
        paths::rect(2.0, 2.0, 4.0, 4.0),
        1,
    );
    attach(&mut arena, root, s);
    arena.get_mut(s).unwrap().attrs.opacity = 0.5;
    resolve(&mut arena, root, Transform::IDENTITY, 1.0, (1.0, 1.0));

    let pm = paint(&arena, root, PassKind::Scene, 8, 8);
    // (2, 2) is covered by both the fill and the stroke band. A naive draw
    // would blend twice and land near 0.75; buffered stays at the node
    // opacity.
    let [_, _, _, a] = px(&pm, 2, 2);
    assert!(a > 100, "alpha {a} too low, shape missing");
    assert!(a < 150, "alpha {a} suggests fill and stroke blended twice");
}

#[test]
fn shadow_paints_offset_silhouette_under_the_shape() {
    let mut arena = SceneArena::new();
    let root = layer(&mut arena);
    let style = ShapeStyle::filled(Rgba8::WHITE).with_shadow(
        Shadow::new(Rgba8::BLACK, 0.0).with_offset(kurbo::Vec2::new(6.0, 6.0)),
    );
    let s = shape(
        &mut arena,
        style,
        paths::rect(1.0, 1.0, 4.0, 4.0),
        1,
    );
    attach(&mut arena, root, s);
    resolve(&mut arena, root, Transform::IDENTITY, 1.0, (1.0, 1.0));

    let pm = paint(&arena, root, PassKind::Scene, 12, 12);
    // Shape pixels stay the fill color.
    assert_eq!(px(&pm, 3, 3), [255, 255, 255, 255]);
    // The offset silhouette shows where only the shadow lands.
    assert_eq!(px(&pm, 9, 9), [0, 0, 0, 255]);
    // Outside both, nothing.
    assert_eq!(px(&pm, 11, 1), [0, 0, 0, 0]);
}

#[test]
fn fill_only_shadow_sits_under_the_content_and_skips_the_stroke() {
    let mut arena = SceneArena::new();
    let root = layer(&mut arena);
    let mut shadow = Shadow::new(Rgba8::BLACK, 0.0).with_offset(kurbo::Vec2::new(8.0, 0.0));
    shadow.for_stroke = false;
    let style = ShapeStyle::filled(Rgba8::WHITE)
        .with_stroke(Stroke::new(Rgba8::rgb(0, 0, 255), 4.0))
        .with_shadow(shadow);
    // Fill [4,12]^2, stroke band [2,14]^2 minus [6,10]^2, shadow at +8 in x.
    let s = shape(&mut arena, style, paths::rect(4.0, 4.0, 8.0, 8.0), 1);
    attach(&mut arena, root, s);
    resolve(&mut arena, root, Transform::IDENTITY, 1.0, (1.0, 1.0));

    let pm = paint(&arena, root, PassKind::Scene, 24, 24);
    // Fill and stroke land intact on top of the shadow.
    assert_eq!(px(&pm, 8, 8), [255, 255, 255, 255]);
    assert_eq!(px(&pm, 3, 8), [0, 0, 255, 255]);
    assert_eq!(px(&pm, 13, 8), [0, 0, 255, 255]);
    // Past the stroke, the offset fill silhouette shows.
    assert_eq!(px(&pm, 16, 8), [0, 0, 0, 255]);
    // The stroke band casts nothing: its offset ring stays empty.
    assert_eq!(px(&pm, 21, 8), [0, 0, 0, 0]);
    assert_eq!(px(&pm, 16, 2), [0, 0, 0, 0]);
}

#[test]
fn shadow_does_not_appear_on_the_hit_pass() {
    let mut arena = SceneArena::new();
    let root = layer(&mut arena);
    let style = ShapeStyle::filled(Rgba8::WHITE).with_shadow(
        Shadow::new(Rgba8::BLACK, 0.0).with_offset(kurbo::Vec2::new(6.0, 6.0)),
    );
    let s = shape(
        &mut arena,
        style,
        paths::rect(1.0, 1.0, 4.0, 4.0),
        3,
    );
    attach(&mut arena, root, s);
    resolve(&mut arena, root, Transform::IDENTITY, 1.0, (1.0, 1.0));

    let pm = paint(&arena, root, PassKind::Hit, 12, 12);
    assert_ne!(px(&pm, 3, 3), [0, 0, 0, 0]);
    assert_eq!(px(&pm, 9, 9), [0, 0, 0, 0]);
}

#[test]
fn container_clip_applies_to_both_passes() {
    use crate::scene::node::{Clip, GroupData};

    let mut arena = SceneArena::new();
    let root = layer(&mut arena);
    let g = arena.insert(NodeData::new(NodeKind::Group(GroupData {
        clip: Some(Clip::Rect(Rect::new(0.0, 0.0, 4.0, 8.0))),
    })));
    let s = shape(
        &mut arena,
        ShapeStyle::filled(Rgba8::WHITE),
        paths::rect(0.0, 0.0, 8.0, 8.0),
        1,
    );
    attach(&mut arena, root, g);
    attach(&mut arena, g, s);
    resolve(&mut arena, root, Transform::IDENTITY, 1.0, (1.0, 1.0));

    for pass in [PassKind::Scene, PassKind::Hit] {
        let pm = paint(&arena, root, pass, 8, 8);
        assert_ne!(px(&pm, 2, 4), [0, 0, 0, 0], "{pass:?} lost clipped-in pixels");
        assert_eq!(px(&pm, 6, 4), [0, 0, 0, 0], "{pass:?} leaked outside the clip");
    }
}

#[test]
fn shape_without_draw_callback_paints_nothing() {
    let mut arena = SceneArena::new();
    let root = layer(&mut arena);
    let mut data = ShapeData::without_draw_fn();
    data.style = ShapeStyle::filled(Rgba8::WHITE);
    let mut n = NodeData::new(NodeKind::Shape(data));
    n.key = ColorKey::new(1);
    let s = arena.insert(n);
    attach(&mut arena, root, s);
    resolve(&mut arena, root, Transform::IDENTITY, 1.0, (1.0, 1.0));

    let pm = paint(&arena, root, PassKind::Scene, 8, 8);
    assert!(pm.data_as_u8_slice().iter().all(|&b| b == 0));
}

#[test]
fn painting_fails_on_unresolved_memos() {
    let mut arena = SceneArena::new();
    let root = layer(&mut arena);
    let s = shape(
        &mut arena,
        ShapeStyle::filled(Rgba8::WHITE),
        paths::rect(0.0, 0.0, 4.0, 4.0),
        1,
    );
    attach(&mut arena, root, s);

    let mut painter = Painter::new(SurfacePoolOpts::default());
    let mut pm = vello_cpu::Pixmap::new(8, 8);
    let err = painter
        .paint_subtree(&arena, root, PassKind::Scene, WalkBase::scaling(1.0), &mut pm)
        .unwrap_err();
    assert!(err.to_string().contains("absolute transform"));
}
