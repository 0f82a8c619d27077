//! The stage: tree ownership, drawing, and hit queries.
//!
//! A [`Stage`] owns the node arena, an ordered list of layers, the color-key
//! registry, and the painter. Applications create nodes through the stage,
//! mutate attributes through it, and ask it to redraw layers and answer
//! "what is under this point" queries. Everything is single-threaded; the
//! stage is the single writer for the whole scene.
//!
//! Mutations are cheap: setters update the attribute bag, mark memoized
//! absolute transforms dirty, drop invalidated subtree caches, and flag the
//! owning layer's hit surface stale. The expensive work (rasterizing, hit
//! repaint) happens on [`Stage::draw`] and on the first query that needs a
//! current hit surface.

pub mod cache;
pub mod hit;

use crate::foundation::core::{ColorKey, Point, Rect, Rgba8Premul};
use crate::foundation::error::{RibaltaError, RibaltaResult};
use crate::render::composite;
use crate::render::painter::{Painter, PassKind, WalkBase};
use crate::render::pool::{SurfacePoolOpts, SurfacePoolStats};
use crate::render::surface::{Surface, physical_extent};
use crate::scene::attrs::{Attr, NodeAttrs};
use crate::scene::node::{Clip, LayerData, NodeData, NodeId, NodeKind, NodeType, Parent};
use crate::scene::shape::{DrawFn, ShapeData, ShapeStyle};
use crate::scene::tree::SceneArena;
use crate::stage::cache::CacheOpts;
use crate::stage::hit::{HitOpts, KeyRegistry};
use crate::transform::Transform;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Host hook for coalescing deferred redraws.
///
/// [`Stage::batch_draw`] marks layers pending and calls
/// [`request_frame`](Self::request_frame) once per burst; the host answers by
/// calling [`Stage::run_pending_draws`] on its next frame tick.
pub trait FrameScheduler {
    /// Ask the host for one frame callback.
    fn request_frame(&mut self);
}

/// Default scheduler: does nothing. Hosts drive pending draws manually.
#[derive(Debug, Default)]
pub struct NoopScheduler;

impl FrameScheduler for NoopScheduler {
    fn request_frame(&mut self) {}
}

/// What a pointer did, in the host's input stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerEventKind {
    /// Contact began.
    Down,
    /// Contact moved.
    Move,
    /// Contact ended.
    Up,
    /// Contact was aborted by the platform.
    Cancel,
}

/// One normalized pointer/touch event, already translated into stage
/// coordinates by the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    /// Host-assigned stable id of the pointer (finger, mouse).
    pub pointer_id: u64,
    /// Event kind.
    pub kind: PointerEventKind,
    /// Position in stage logical coordinates.
    pub position: Point,
}

/// Stage construction options.
#[derive(Clone, Copy, Debug)]
pub struct StageOpts {
    /// Viewport width in logical units.
    pub width: u32,
    /// Viewport height in logical units.
    pub height: u32,
    /// Physical pixels per logical unit.
    pub pixel_ratio: f64,
    /// Hit-query tuning.
    pub hit_opts: HitOpts,
    /// Scratch surface pool bounds.
    pub pool_opts: SurfacePoolOpts,
}

impl StageOpts {
    /// Options for a `width × height` stage at pixel ratio 1.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_ratio: 1.0,
            hit_opts: HitOpts::default(),
            pool_opts: SurfacePoolOpts::default(),
        }
    }

    /// Override the pixel ratio.
    pub fn with_pixel_ratio(mut self, pixel_ratio: f64) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }

    /// Override the hit-query tuning.
    pub fn with_hit_opts(mut self, hit_opts: HitOpts) -> Self {
        self.hit_opts = hit_opts;
        self
    }

    /// Override the scratch pool bounds.
    pub fn with_pool_opts(mut self, pool_opts: SurfacePoolOpts) -> Self {
        self.pool_opts = pool_opts;
        self
    }
}

/// Handle for removing a registered attribute observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObserverId(u64);

type ObserverFn = Box<dyn FnMut(NodeId, Attr)>;

/// The composition root: node arena, layers, key registry, painter, and
/// pointer state.
///
/// # Node id discipline
///
/// Structural operations ([`add`](Self::add), [`remove`](Self::remove),
/// [`cache`](Self::cache), ...) return [`RibaltaResult`] and report a dead id
/// as a usage error. Plain attribute accessors ([`x`](Self::x),
/// [`set_x`](Self::set_x), ...) panic on a dead id, the same contract as
/// indexing a slice out of bounds.
pub struct Stage {
    arena: SceneArena,
    /// Attached layers, paint order (back to front).
    layers: Vec<NodeId>,
    registry: KeyRegistry,
    painter: Painter,
    width: u32,
    height: u32,
    pixel_ratio: f64,
    phys_width: u16,
    phys_height: u16,
    hit_opts: HitOpts,
    pointers: HashMap<u64, Point>,
    scheduler: Box<dyn FrameScheduler>,
    frame_requested: bool,
    observers: Vec<(ObserverId, ObserverFn)>,
    next_observer: u64,
}

impl Stage {
    /// Build a stage, validating the viewport against the rasterizer's
    /// coordinate limits.
    pub fn new(opts: StageOpts) -> RibaltaResult<Self> {
        let phys_width = physical_extent(opts.width, opts.pixel_ratio)?;
        let phys_height = physical_extent(opts.height, opts.pixel_ratio)?;
        Ok(Self {
            arena: SceneArena::new(),
            layers: Vec::new(),
            registry: KeyRegistry::new(),
            painter: Painter::new(opts.pool_opts),
            width: opts.width,
            height: opts.height,
            pixel_ratio: opts.pixel_ratio,
            phys_width,
            phys_height,
            hit_opts: opts.hit_opts,
            pointers: HashMap::new(),
            scheduler: Box::new(NoopScheduler),
            frame_requested: false,
            observers: Vec::new(),
            next_observer: 0,
        })
    }

    /// Viewport width in logical units.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Viewport height in logical units.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Physical pixels per logical unit.
    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    /// The hit-query tuning this stage was built with.
    pub fn hit_opts(&self) -> HitOpts {
        self.hit_opts
    }

    /// Attached layers in paint order.
    pub fn layers(&self) -> &[NodeId] {
        &self.layers
    }

    /// Number of live nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Whether `id` refers to a live node of this stage.
    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id)
    }

    /// Scratch-pool counters, for diagnostics.
    pub fn pool_stats(&self) -> SurfacePoolStats {
        self.painter.pool_stats()
    }

    /// Replace the frame scheduler consulted by [`batch_draw`](Self::batch_draw).
    pub fn set_scheduler(&mut self, scheduler: Box<dyn FrameScheduler>) {
        self.scheduler = scheduler;
    }

    // ------------------------------------------------------------------
    // Node construction and tree surgery
    // ------------------------------------------------------------------

    /// Create a layer and attach it above every existing layer. Its surface
    /// pair is allocated at the stage's current size.
    pub fn new_layer(&mut self) -> RibaltaResult<NodeId> {
        let id = self
            .arena
            .insert(NodeData::new(NodeKind::Layer(LayerData::default())));
        self.attach_layer(id)?;
        Ok(id)
    }

    /// Re-attach a previously removed layer above every existing layer.
    /// No-op when already attached.
    pub fn attach_layer(&mut self, id: NodeId) -> RibaltaResult<()> {
        let node = self.node(id)?;
        if node.node_type() != NodeType::Layer {
            return Err(RibaltaError::usage("only layers attach to the stage"));
        }
        match node.parent {
            Parent::Stage => return Ok(()),
            Parent::Node(_) => {
                return Err(RibaltaError::usage(
                    "layer is attached below another node; this tree is corrupt",
                ));
            }
            Parent::Detached => {}
        }

        let scene = Surface::new(self.width, self.height, self.pixel_ratio)?;
        let hit = Surface::new(self.width, self.height, self.pixel_ratio)?;
        let data = self.layer_data_mut(id)?;
        data.scene = Some(scene);
        data.hit = Some(hit);
        data.hit_stale = true;
        data.draw_pending = false;
        self.node_mut(id)?.parent = Parent::Stage;
        self.layers.push(id);
        self.mark_memos_dirty(id);
        Ok(())
    }

    /// Create a detached group.
    pub fn new_group(&mut self) -> NodeId {
        self.arena
            .insert(NodeData::new(NodeKind::Group(Default::default())))
    }

    /// Create a detached shape with a style and draw callback, allocating its
    /// color key.
    pub fn new_shape(&mut self, style: ShapeStyle, draw: DrawFn) -> RibaltaResult<NodeId> {
        let mut data = ShapeData::new(draw);
        data.style = style;
        self.insert_shape(data)
    }

    /// Create a detached shape with no draw callback; it draws nothing until
    /// [`set_draw_fn`](Self::set_draw_fn) attaches one. Used when restoring a
    /// serialized tree.
    pub fn new_shape_without_draw(&mut self, style: ShapeStyle) -> RibaltaResult<NodeId> {
        let mut data = ShapeData::without_draw_fn();
        data.style = style;
        self.insert_shape(data)
    }

    fn insert_shape(&mut self, data: ShapeData) -> RibaltaResult<NodeId> {
        let id = self.arena.insert(NodeData::new(NodeKind::Shape(data)));
        let key = match self.registry.allocate(id) {
            Ok(key) => key,
            Err(e) => {
                self.arena.remove(id);
                return Err(e);
            }
        };
        self.node_mut(id)?.key = Some(key);
        Ok(id)
    }

    /// Insert `child` at the top of `parent`'s children, moving it atomically
    /// if it currently lives elsewhere.
    ///
    /// Admission: layers and groups admit shapes and groups; nothing else is
    /// admitted anywhere (layers attach only to the stage, shapes admit
    /// nothing). Violations error without touching the tree.
    pub fn add(&mut self, parent: NodeId, child: NodeId) -> RibaltaResult<()> {
        let parent_type = self.node(parent)?.node_type();
        let child_type = self.node(child)?.node_type();
        if !matches!(parent_type, NodeType::Group | NodeType::Layer) {
            return Err(RibaltaError::usage(format!(
                "{parent_type:?} nodes admit no children"
            )));
        }
        if !matches!(child_type, NodeType::Group | NodeType::Shape) {
            return Err(RibaltaError::usage(format!(
                "a {child_type:?} cannot be added below a {parent_type:?}"
            )));
        }
        // Reject cycles: walking up from the parent must not meet the child.
        let mut cur = Some(parent);
        while let Some(n) = cur {
            if n == child {
                return Err(RibaltaError::usage(
                    "cannot add a node below its own descendant",
                ));
            }
            cur = self.parent_of(n);
        }

        let old_parent = self.node(child)?.parent;
        if let Parent::Node(op) = old_parent {
            let old_layer = self.owning_layer(op);
            self.node_mut(op)?.children.retain(|&c| c != child);
            self.drop_caches_above(op);
            self.mark_hit_stale(old_layer);
        }

        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Parent::Node(parent);
        self.mark_memos_dirty(child);
        self.drop_caches_above(parent);
        let new_layer = self.owning_layer(parent);
        self.mark_hit_stale(new_layer);
        Ok(())
    }

    /// Detach `id` from its parent, keeping the node (and its color key)
    /// alive for re-insertion. Detaching an already detached node is a no-op.
    pub fn remove(&mut self, id: NodeId) -> RibaltaResult<()> {
        let parent = self.node(id)?.parent;
        match parent {
            Parent::Detached => Ok(()),
            Parent::Stage => {
                self.layers.retain(|&l| l != id);
                self.node_mut(id)?.parent = Parent::Detached;
                self.mark_memos_dirty(id);
                Ok(())
            }
            Parent::Node(p) => {
                let layer = self.owning_layer(p);
                self.node_mut(p)?.children.retain(|&c| c != id);
                self.node_mut(id)?.parent = Parent::Detached;
                self.drop_caches_above(p);
                self.mark_hit_stale(layer);
                self.mark_memos_dirty(id);
                Ok(())
            }
        }
    }

    /// Detach and free `id` and its whole subtree, releasing every color key
    /// held below it. All ids into the subtree become stale.
    pub fn destroy(&mut self, id: NodeId) -> RibaltaResult<()> {
        self.node(id)?;
        self.remove(id)?;

        let mut stack: SmallVec<[NodeId; 16]> = SmallVec::new();
        let mut doomed: Vec<NodeId> = Vec::new();
        stack.push(id);
        while let Some(n) = stack.pop() {
            doomed.push(n);
            if let Some(node) = self.arena.get(n) {
                stack.extend(node.children.iter().copied());
            }
        }
        for n in doomed {
            if let Some(data) = self.arena.remove(n)
                && let Some(key) = data.key
            {
                self.registry.release(key);
            }
        }
        Ok(())
    }

    /// Destroy every child of `parent` (the parent itself survives).
    pub fn destroy_children(&mut self, parent: NodeId) -> RibaltaResult<()> {
        let children: SmallVec<[NodeId; 16]> =
            self.node(parent)?.children.iter().copied().collect();
        for child in children {
            self.destroy(child)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sibling order
    // ------------------------------------------------------------------

    /// Move `id` to the top of its siblings (drawn last, hit-tested first).
    pub fn move_to_top(&mut self, id: NodeId) -> RibaltaResult<()> {
        self.reorder(id, |_, len| len - 1)
    }

    /// Move `id` to the bottom of its siblings.
    pub fn move_to_bottom(&mut self, id: NodeId) -> RibaltaResult<()> {
        self.reorder(id, |_, _| 0)
    }

    /// Swap `id` one step toward the top.
    pub fn move_up(&mut self, id: NodeId) -> RibaltaResult<()> {
        self.reorder(id, |i, _| i + 1)
    }

    /// Swap `id` one step toward the bottom.
    pub fn move_down(&mut self, id: NodeId) -> RibaltaResult<()> {
        self.reorder(id, |i, _| i.saturating_sub(1))
    }

    /// Place `id` at sibling index `z` (0 = bottom). Out-of-range indices
    /// clamp with a warning.
    pub fn set_z_index(&mut self, id: NodeId, z: usize) -> RibaltaResult<()> {
        self.reorder(id, move |_, len| {
            if z >= len {
                tracing::warn!(z, len, "z-index beyond sibling count, clamping");
            }
            z
        })
    }

    /// Sibling index of `id` (0 = bottom), `None` when detached.
    ///
    /// # Panics
    ///
    /// Panics on a dead id.
    pub fn z_index(&self, id: NodeId) -> Option<usize> {
        match self.node_ref(id).parent {
            Parent::Detached => None,
            Parent::Stage => self.layers.iter().position(|&n| n == id),
            Parent::Node(p) => self.node_ref(p).children.iter().position(|&n| n == id),
        }
    }

    fn reorder(
        &mut self,
        id: NodeId,
        target: impl FnOnce(usize, usize) -> usize,
    ) -> RibaltaResult<()> {
        let parent = self.node(id)?.parent;
        let (list, parent_node) = match parent {
            Parent::Detached => {
                return Err(RibaltaError::usage("cannot reorder a detached node"));
            }
            Parent::Stage => (&mut self.layers, None),
            Parent::Node(p) => {
                let node = self
                    .arena
                    .get_mut(p)
                    .ok_or_else(|| RibaltaError::usage("dead parent id"))?;
                (&mut node.children, Some(p))
            }
        };
        let idx = list
            .iter()
            .position(|&n| n == id)
            .ok_or_else(|| RibaltaError::usage("node missing from its parent's children"))?;
        let new_idx = target(idx, list.len()).min(list.len() - 1);
        if new_idx != idx {
            let n = list.remove(idx);
            list.insert(new_idx, n);
            if let Some(p) = parent_node {
                self.drop_caches_above(p);
                let layer = self.owning_layer(p);
                self.mark_hit_stale(layer);
            }
            // Layer reorder leaves per-layer surfaces valid; only the
            // composite/test order changes, which is read live.
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Position x. Panics on a dead id, like every plain attribute accessor.
    pub fn x(&self, id: NodeId) -> f64 {
        self.attrs(id).x
    }

    /// Set position x.
    pub fn set_x(&mut self, id: NodeId, x: f64) {
        let a = self.attrs_mut(id);
        a.x = finite_or(a.x, x, "x");
        self.note_mutation(id, Attr::X);
    }

    /// Position y.
    pub fn y(&self, id: NodeId) -> f64 {
        self.attrs(id).y
    }

    /// Set position y.
    pub fn set_y(&mut self, id: NodeId, y: f64) {
        let a = self.attrs_mut(id);
        a.y = finite_or(a.y, y, "y");
        self.note_mutation(id, Attr::Y);
    }

    /// Position as a point.
    pub fn position(&self, id: NodeId) -> Point {
        let a = self.attrs(id);
        Point::new(a.x, a.y)
    }

    /// Set both position coordinates.
    pub fn set_position(&mut self, id: NodeId, x: f64, y: f64) {
        self.set_x(id, x);
        self.set_y(id, y);
    }

    /// Scale factors `(x, y)`.
    pub fn scale(&self, id: NodeId) -> (f64, f64) {
        let a = self.attrs(id);
        (a.scale_x, a.scale_y)
    }

    /// Set scale factor x.
    pub fn set_scale_x(&mut self, id: NodeId, sx: f64) {
        let a = self.attrs_mut(id);
        a.scale_x = finite_or(a.scale_x, sx, "scale_x");
        self.note_mutation(id, Attr::ScaleX);
    }

    /// Set scale factor y.
    pub fn set_scale_y(&mut self, id: NodeId, sy: f64) {
        let a = self.attrs_mut(id);
        a.scale_y = finite_or(a.scale_y, sy, "scale_y");
        self.note_mutation(id, Attr::ScaleY);
    }

    /// Set both scale factors.
    pub fn set_scale(&mut self, id: NodeId, sx: f64, sy: f64) {
        self.set_scale_x(id, sx);
        self.set_scale_y(id, sy);
    }

    /// Rotation in radians.
    pub fn rotation(&self, id: NodeId) -> f64 {
        self.attrs(id).rotation
    }

    /// Set rotation in radians.
    pub fn set_rotation(&mut self, id: NodeId, radians: f64) {
        let a = self.attrs_mut(id);
        a.rotation = finite_or(a.rotation, radians, "rotation");
        self.note_mutation(id, Attr::Rotation);
    }

    /// Shear factors `(x, y)`.
    pub fn skew(&self, id: NodeId) -> (f64, f64) {
        let a = self.attrs(id);
        (a.skew_x, a.skew_y)
    }

    /// Set both shear factors.
    pub fn set_skew(&mut self, id: NodeId, sx: f64, sy: f64) {
        {
            let a = self.attrs_mut(id);
            a.skew_x = finite_or(a.skew_x, sx, "skew_x");
        }
        self.note_mutation(id, Attr::SkewX);
        {
            let a = self.attrs_mut(id);
            a.skew_y = finite_or(a.skew_y, sy, "skew_y");
        }
        self.note_mutation(id, Attr::SkewY);
    }

    /// Pivot offset as a point.
    pub fn offset(&self, id: NodeId) -> Point {
        let a = self.attrs(id);
        Point::new(a.offset_x, a.offset_y)
    }

    /// Set the pivot offset: the local point that lands at `(x, y)` and
    /// anchors rotation and scale.
    pub fn set_offset(&mut self, id: NodeId, ox: f64, oy: f64) {
        {
            let a = self.attrs_mut(id);
            a.offset_x = finite_or(a.offset_x, ox, "offset_x");
        }
        self.note_mutation(id, Attr::OffsetX);
        {
            let a = self.attrs_mut(id);
            a.offset_y = finite_or(a.offset_y, oy, "offset_y");
        }
        self.note_mutation(id, Attr::OffsetY);
    }

    /// Node opacity (raw; clamped to 0..=1 when composing).
    pub fn opacity(&self, id: NodeId) -> f64 {
        self.attrs(id).opacity
    }

    /// Set node opacity. Multiplies down the subtree when rendering.
    pub fn set_opacity(&mut self, id: NodeId, opacity: f64) {
        let a = self.attrs_mut(id);
        a.opacity = finite_or(a.opacity, opacity, "opacity");
        self.note_mutation(id, Attr::Opacity);
    }

    /// Visibility flag.
    pub fn visible(&self, id: NodeId) -> bool {
        self.attrs(id).visible
    }

    /// Show or hide the node and its subtree (both passes skip hidden
    /// subtrees).
    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        self.attrs_mut(id).visible = visible;
        self.note_mutation(id, Attr::Visible);
    }

    /// Hit-testing participation flag.
    pub fn listening(&self, id: NodeId) -> bool {
        self.attrs(id).listening
    }

    /// Include or exclude the node's subtree from hit testing.
    pub fn set_listening(&mut self, id: NodeId, listening: bool) {
        self.attrs_mut(id).listening = listening;
        // The hit surface encodes listening, so flipping it stales the
        // surface even though the scene is unchanged.
        let layer = self.owning_layer(id);
        self.mark_hit_stale(layer);
        self.note_mutation(id, Attr::Listening);
    }

    /// Node name (empty when unnamed).
    pub fn name(&self, id: NodeId) -> &str {
        &self.attrs(id).name
    }

    /// Set the node name used by [`find_by_name`](Self::find_by_name) and
    /// ancestor predicates.
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) {
        self.attrs_mut(id).name = name.into();
        self.note_mutation(id, Attr::Name);
    }

    /// Container clip region, if any.
    pub fn clip(&self, id: NodeId) -> Option<&Clip> {
        self.node_ref(id).clip()
    }

    /// Set or clear a container's clip region (applies to both passes).
    /// Usage error on a shape.
    pub fn set_clip(&mut self, id: NodeId, clip: Option<Clip>) -> RibaltaResult<()> {
        let node = self.node_mut(id)?;
        match &mut node.kind {
            NodeKind::Group(g) => g.clip = clip,
            NodeKind::Layer(l) => l.clip = clip,
            NodeKind::Shape(_) => {
                return Err(RibaltaError::usage("shapes do not clip; style them instead"));
            }
        }
        self.note_mutation(id, Attr::Clip);
        Ok(())
    }

    /// A shape's style, `None` for containers.
    ///
    /// # Panics
    ///
    /// Panics on a dead id.
    pub fn style(&self, id: NodeId) -> Option<&ShapeStyle> {
        match &self.node_ref(id).kind {
            NodeKind::Shape(s) => Some(&s.style),
            _ => None,
        }
    }

    /// Replace a shape's style. Usage error on a container.
    pub fn set_style(&mut self, id: NodeId, style: ShapeStyle) -> RibaltaResult<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Shape(s) => s.style = style,
            _ => return Err(RibaltaError::usage("only shapes carry a style")),
        }
        self.note_mutation(id, Attr::Style);
        Ok(())
    }

    /// Replace a shape's draw callback. Usage error on a container.
    pub fn set_draw_fn(&mut self, id: NodeId, draw: DrawFn) -> RibaltaResult<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Shape(s) => s.draw = Some(draw),
            _ => return Err(RibaltaError::usage("only shapes carry a draw callback")),
        }
        self.note_mutation(id, Attr::DrawFn);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// The node's kind.
    ///
    /// # Panics
    ///
    /// Panics on a dead id.
    pub fn node_type(&self, id: NodeId) -> NodeType {
        self.node_ref(id).node_type()
    }

    /// The parent node, `None` for layers and detached nodes.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent_of_checked(id)
    }

    /// Children in paint order (empty for shapes).
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node_ref(id).children
    }

    /// A shape's color key (containers only carry one once cached).
    pub fn color_key(&self, id: NodeId) -> Option<ColorKey> {
        self.node_ref(id).key
    }

    /// All attached nodes named `name`, in tree order.
    pub fn find_by_name(&self, name: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.layers.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.arena.get(id) {
                if node.attrs.name == name {
                    out.push(id);
                }
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Register an observer called after every attribute mutation with the
    /// node id and the attribute that changed.
    pub fn observe(&mut self, f: impl FnMut(NodeId, Attr) + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(f)));
        id
    }

    /// Remove a registered observer. Unknown ids are ignored.
    pub fn unobserve(&mut self, id: ObserverId) {
        self.observers.retain(|(oid, _)| *oid != id);
    }

    // ------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------

    /// The node's local transform, composed from its attributes.
    pub fn local_transform(&self, id: NodeId) -> Transform {
        self.attrs(id).local_transform()
    }

    /// The composed transform from the stage root down to `id`, memoized
    /// until an ancestor (or the node itself) moves.
    pub fn absolute_transform(&mut self, id: NodeId) -> RibaltaResult<Transform> {
        self.resolve_chain(id)?;
        self.node(id)?
            .abs_transform
            .ok_or_else(|| RibaltaError::raster("transform memo missing after resolve"))
    }

    /// Product of the node's and every ancestor's opacity, clamped per node.
    pub fn absolute_opacity(&mut self, id: NodeId) -> RibaltaResult<f64> {
        self.resolve_chain(id)?;
        self.node(id)?
            .abs_opacity
            .ok_or_else(|| RibaltaError::raster("opacity memo missing after resolve"))
    }

    /// The transform of `id` relative to `ancestor` (which must be on `id`'s
    /// parent chain).
    pub fn transform_relative_to(
        &mut self,
        id: NodeId,
        ancestor: NodeId,
    ) -> RibaltaResult<Transform> {
        let mut cur = self.parent_of(id);
        let mut found = false;
        while let Some(n) = cur {
            if n == ancestor {
                found = true;
                break;
            }
            cur = self.parent_of(n);
        }
        if !found {
            return Err(RibaltaError::usage(
                "transform_relative_to requires an ancestor of the node",
            ));
        }
        let abs_anc = self.absolute_transform(ancestor)?;
        let abs_id = self.absolute_transform(id)?;
        let mut rel = abs_anc.inverse()?;
        rel.multiply(&abs_id);
        Ok(rel)
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    #[tracing::instrument(skip(self))]
    /// Redraw every attached layer's scene surface, in paint order.
    pub fn draw(&mut self) -> RibaltaResult<()> {
        let layers: SmallVec<[NodeId; 8]> = self.layers.iter().copied().collect();
        for layer in layers {
            self.draw_layer_inner(layer)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    /// Redraw one layer's scene surface. The hit surface is left stale and
    /// repainted lazily by the next query.
    pub fn draw_layer(&mut self, layer: NodeId) -> RibaltaResult<()> {
        self.draw_layer_inner(layer)
    }

    fn draw_layer_inner(&mut self, layer: NodeId) -> RibaltaResult<()> {
        self.ensure_subtree_resolved(layer)?;
        let mut surface = self
            .layer_data_mut(layer)?
            .scene
            .take()
            .ok_or_else(|| RibaltaError::raster("layer has no scene surface (detached?)"))?;
        let result = self.painter.paint_subtree(
            &self.arena,
            layer,
            PassKind::Scene,
            WalkBase::scaling(self.pixel_ratio),
            surface.pixmap_mut(),
        );
        let data = self.layer_data_mut(layer)?;
        data.scene = Some(surface);
        if result.is_ok() {
            data.hit_stale = true;
            data.draw_pending = false;
        }
        result
    }

    /// Queue a deferred redraw for one layer and ask the scheduler for a
    /// frame. Multiple batched draws before the frame coalesce into one.
    pub fn batch_draw(&mut self, layer: NodeId) -> RibaltaResult<()> {
        self.layer_data_mut(layer)?.draw_pending = true;
        self.request_frame_once();
        Ok(())
    }

    /// Queue a deferred redraw for every attached layer.
    pub fn batch_draw_all(&mut self) {
        let layers: SmallVec<[NodeId; 8]> = self.layers.iter().copied().collect();
        for layer in layers {
            if let Ok(data) = self.layer_data_mut(layer) {
                data.draw_pending = true;
            }
        }
        self.request_frame_once();
    }

    fn request_frame_once(&mut self) {
        if !self.frame_requested {
            self.frame_requested = true;
            self.scheduler.request_frame();
        }
    }

    /// Run every queued deferred redraw. Hosts call this from the frame
    /// callback requested via [`FrameScheduler`].
    pub fn run_pending_draws(&mut self) -> RibaltaResult<()> {
        self.frame_requested = false;
        let pending: SmallVec<[NodeId; 8]> = self
            .layers
            .iter()
            .copied()
            .filter(|&l| {
                matches!(
                    self.arena.get(l),
                    Some(NodeData {
                        kind: NodeKind::Layer(data),
                        ..
                    }) if data.draw_pending
                )
            })
            .collect();
        for layer in pending {
            self.draw_layer_inner(layer)?;
        }
        Ok(())
    }

    /// Wipe a layer's surfaces (both scene and hit) to transparent, either
    /// inside `bounds` (logical coordinates) or entirely. The tree is
    /// untouched; the next draw repaints.
    pub fn clear_layer(&mut self, layer: NodeId, bounds: Option<Rect>) -> RibaltaResult<()> {
        let data = self.layer_data_mut(layer)?;
        for surface in [data.scene.as_mut(), data.hit.as_mut()].into_iter().flatten() {
            match bounds {
                Some(rect) => surface.clear_rect(rect),
                None => surface.clear(),
            }
        }
        Ok(())
    }

    /// Resize the viewport, reallocating every attached layer's surface pair.
    /// Surfaces come back blank; call [`draw`](Self::draw) to repaint.
    pub fn set_size(&mut self, width: u32, height: u32) -> RibaltaResult<()> {
        let phys_width = physical_extent(width, self.pixel_ratio)?;
        let phys_height = physical_extent(height, self.pixel_ratio)?;
        self.width = width;
        self.height = height;
        self.phys_width = phys_width;
        self.phys_height = phys_height;

        let layers: SmallVec<[NodeId; 8]> = self.layers.iter().copied().collect();
        for layer in layers {
            let scene = Surface::new(width, height, self.pixel_ratio)?;
            let hit = Surface::new(width, height, self.pixel_ratio)?;
            let data = self.layer_data_mut(layer)?;
            data.scene = Some(scene);
            data.hit = Some(hit);
            data.hit_stale = true;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Hit testing
    // ------------------------------------------------------------------

    #[tracing::instrument(skip(self))]
    /// The topmost listening shape under `point` (stage logical
    /// coordinates), or `None`. Repaints stale hit surfaces on demand.
    pub fn intersection(&mut self, point: Point) -> RibaltaResult<Option<NodeId>> {
        let Some((px, py)) = self.device_pixel(point) else {
            return Ok(None);
        };
        let layers: SmallVec<[NodeId; 8]> = self.layers.iter().rev().copied().collect();
        for layer in layers {
            let Some(node) = self.arena.get(layer) else {
                continue;
            };
            if !node.attrs.visible || !node.attrs.listening {
                continue;
            }
            self.ensure_hit_current(layer)?;
            let data = self.layer_data(layer)?;
            let Some(surface) = data.hit.as_ref() else {
                continue;
            };
            if let Some(key) = hit::resolve_hit(surface, px, py, self.hit_opts.search_radius_px) {
                match self.registry.resolve(key) {
                    Some(id) => return Ok(Some(id)),
                    None => {
                        // An anti-aliased blend of two keys can decode to a
                        // value nobody owns; treat it as a miss on this layer.
                        tracing::debug!(%key, "sampled color key has no owner");
                    }
                }
            }
        }
        Ok(None)
    }

    /// Like [`intersection`](Self::intersection), then walk up from the hit
    /// shape to the nearest node (itself included) matching `pred`, which
    /// receives the node's id, type, and name.
    pub fn intersection_where<F>(
        &mut self,
        point: Point,
        mut pred: F,
    ) -> RibaltaResult<Option<NodeId>>
    where
        F: FnMut(NodeId, NodeType, &str) -> bool,
    {
        let Some(shape) = self.intersection(point)? else {
            return Ok(None);
        };
        let mut cur = Some(shape);
        while let Some(id) = cur {
            let node = self
                .arena
                .get(id)
                .ok_or_else(|| RibaltaError::raster("hit node vanished during ancestor walk"))?;
            if pred(id, node.node_type(), &node.attrs.name) {
                return Ok(Some(id));
            }
            cur = match node.parent {
                Parent::Node(p) => Some(p),
                _ => None,
            };
        }
        Ok(None)
    }

    /// Whether `id`'s drawn geometry covers `point`, tested alone on a
    /// scratch hit surface. Ignores siblings, ancestor clips, and listening
    /// flags; respects visibility.
    pub fn shape_intersects(&mut self, id: NodeId, point: Point) -> RibaltaResult<bool> {
        if self.node(id)?.node_type() != NodeType::Shape {
            return Err(RibaltaError::usage("shape_intersects requires a shape"));
        }
        let Some((px, py)) = self.device_pixel(point) else {
            return Ok(false);
        };
        self.resolve_chain(id)?;

        let mut pm = self.painter.pool.borrow(self.phys_width, self.phys_height);
        let base = Transform::scaling(self.pixel_ratio, self.pixel_ratio);
        let result = self
            .painter
            .paint_node_hit_isolated(&self.arena, id, base, &mut pm);
        let hit = result.map(|()| {
            let idx = (py as usize * usize::from(self.phys_width) + px as usize) * 4;
            pm.data_as_u8_slice()[idx + 3] > 0
        });
        self.painter.pool.release(pm);
        hit
    }

    /// Record a pointer event; `Down`/`Move` update the stored position,
    /// `Up`/`Cancel` forget the pointer.
    pub fn pointer_event(&mut self, event: PointerEvent) {
        match event.kind {
            PointerEventKind::Down | PointerEventKind::Move => {
                self.pointers.insert(event.pointer_id, event.position);
            }
            PointerEventKind::Up | PointerEventKind::Cancel => {
                self.pointers.remove(&event.pointer_id);
            }
        }
    }

    /// The last recorded position of a pointer, if it is currently down or
    /// hovering.
    pub fn pointer_position(&self, pointer_id: u64) -> Option<Point> {
        self.pointers.get(&pointer_id).copied()
    }

    /// [`intersection`](Self::intersection) at a pointer's last recorded
    /// position; `None` when the pointer is unknown.
    pub fn intersection_at_pointer(&mut self, pointer_id: u64) -> RibaltaResult<Option<NodeId>> {
        match self.pointers.get(&pointer_id).copied() {
            Some(p) => self.intersection(p),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Subtree caching
    // ------------------------------------------------------------------

    #[tracing::instrument(skip(self))]
    /// Freeze `id`'s subtree into a scene/hit bitmap pair; later draws blit
    /// it as an opaque leaf until an attribute inside mutates or
    /// [`clear_cache`](Self::clear_cache) drops it. Containers are assigned
    /// a color key here if they lack one (the cached silhouette hits as the
    /// container itself).
    pub fn cache(&mut self, id: NodeId, opts: CacheOpts) -> RibaltaResult<()> {
        let key = match self.node(id)?.key {
            Some(key) => key,
            None => {
                let key = self.registry.allocate(id)?;
                self.node_mut(id)?.key = Some(key);
                key
            }
        };
        // Drop any previous capture first so it cannot blit into itself.
        self.node_mut(id)?.cache = None;
        self.ensure_subtree_resolved(id)?;
        let entry = cache::capture(
            &mut self.painter,
            &self.arena,
            id,
            key,
            &opts,
            self.pixel_ratio,
            self.hit_opts.cache_alpha_threshold,
        )?;
        self.node_mut(id)?.cache = Some(entry);
        let layer = self.owning_layer(id);
        self.mark_hit_stale(layer);
        Ok(())
    }

    /// Drop `id`'s subtree cache, returning to live recursion on the next
    /// draw. Clearing a node with no cache is a no-op.
    pub fn clear_cache(&mut self, id: NodeId) -> RibaltaResult<()> {
        if self.node_mut(id)?.cache.take().is_some() {
            tracing::debug!(node = ?id, "cleared subtree cache");
            let layer = self.owning_layer(id);
            self.mark_hit_stale(layer);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// A layer's scene surface.
    pub fn layer_surface(&self, layer: NodeId) -> RibaltaResult<&Surface> {
        self.layer_data(layer)?
            .scene
            .as_ref()
            .ok_or_else(|| RibaltaError::raster("layer has no scene surface (detached?)"))
    }

    /// A layer's hit surface, for debugging. Stale until a query (or
    /// [`draw`](Self::draw) plus a query) repaints it.
    pub fn layer_hit_surface(&self, layer: NodeId) -> RibaltaResult<&Surface> {
        self.layer_data(layer)?
            .hit
            .as_ref()
            .ok_or_else(|| RibaltaError::raster("layer has no hit surface (detached?)"))
    }

    /// Composite every visible layer's scene surface into one straight-alpha
    /// image, bottom to top.
    pub fn to_image(&self) -> RibaltaResult<image::RgbaImage> {
        let (w, h) = (usize::from(self.phys_width), usize::from(self.phys_height));
        let mut acc = vec![0u8; w * h * 4];
        for &layer in &self.layers {
            let Some(node) = self.arena.get(layer) else {
                continue;
            };
            if !node.attrs.visible {
                continue;
            }
            let Some(surface) = self.layer_data(layer)?.scene.as_ref() else {
                continue;
            };
            composite::over_in_place(&mut acc, surface.data(), 1.0)?;
        }

        let mut out = Vec::with_capacity(acc.len());
        for px in acc.chunks_exact(4) {
            let s = Rgba8Premul {
                r: px[0],
                g: px[1],
                b: px[2],
                a: px[3],
            }
            .to_straight();
            out.extend_from_slice(&[s.r, s.g, s.b, s.a]);
        }
        image::RgbaImage::from_raw(w as u32, h as u32, out)
            .ok_or_else(|| RibaltaError::raster("stage byte length mismatch"))
    }

    /// Write the composited stage to a PNG file.
    pub fn write_png(&self, path: impl AsRef<Path>) -> RibaltaResult<()> {
        let img = self.to_image()?;
        image::save_buffer_with_format(
            path.as_ref(),
            img.as_raw(),
            u32::from(self.phys_width),
            u32::from(self.phys_height),
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| {
            RibaltaError::raster(format!("write png '{}': {e}", path.as_ref().display()))
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    pub(crate) fn arena(&self) -> &SceneArena {
        &self.arena
    }

    /// Replace a node's whole attribute bag at once. Used when restoring a
    /// serialized tree; skips per-attribute observer notifications.
    pub(crate) fn set_attrs_bulk(&mut self, id: NodeId, attrs: NodeAttrs) -> RibaltaResult<()> {
        self.node_mut(id)?.attrs = attrs;
        self.mark_memos_dirty(id);
        Ok(())
    }

    fn node(&self, id: NodeId) -> RibaltaResult<&NodeData> {
        self.arena
            .get(id)
            .ok_or_else(|| RibaltaError::usage(format!("dead or foreign node id {id:?}")))
    }

    fn node_mut(&mut self, id: NodeId) -> RibaltaResult<&mut NodeData> {
        self.arena
            .get_mut(id)
            .ok_or_else(|| RibaltaError::usage(format!("dead or foreign node id {id:?}")))
    }

    #[track_caller]
    fn node_ref(&self, id: NodeId) -> &NodeData {
        match self.arena.get(id) {
            Some(node) => node,
            None => panic!("no live node for id {id:?}"),
        }
    }

    #[track_caller]
    fn attrs(&self, id: NodeId) -> &NodeAttrs {
        &self.node_ref(id).attrs
    }

    #[track_caller]
    fn attrs_mut(&mut self, id: NodeId) -> &mut NodeAttrs {
        match self.arena.get_mut(id) {
            Some(node) => &mut node.attrs,
            None => panic!("no live node for id {id:?}"),
        }
    }

    fn layer_data(&self, id: NodeId) -> RibaltaResult<&LayerData> {
        match &self.node(id)?.kind {
            NodeKind::Layer(data) => Ok(data),
            _ => Err(RibaltaError::usage("node is not a layer")),
        }
    }

    fn layer_data_mut(&mut self, id: NodeId) -> RibaltaResult<&mut LayerData> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Layer(data) => Ok(data),
            _ => Err(RibaltaError::usage("node is not a layer")),
        }
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        match self.arena.get(id)?.parent {
            Parent::Node(p) => Some(p),
            _ => None,
        }
    }

    fn parent_of_checked(&self, id: NodeId) -> Option<NodeId> {
        match self.node_ref(id).parent {
            Parent::Node(p) => Some(p),
            _ => None,
        }
    }

    /// The layer whose subtree holds `id`, if attached.
    fn owning_layer(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = id;
        loop {
            match self.arena.get(cur)?.parent {
                Parent::Stage => return Some(cur),
                Parent::Node(p) => cur = p,
                Parent::Detached => return None,
            }
        }
    }

    fn mark_hit_stale(&mut self, layer: Option<NodeId>) {
        if let Some(layer) = layer
            && let Ok(data) = self.layer_data_mut(layer)
        {
            data.hit_stale = true;
        }
    }

    /// Bookkeeping shared by every attribute setter: dirty the memos that
    /// depend on the attribute, drop invalidated caches, stale the hit
    /// surface, then tell observers.
    fn note_mutation(&mut self, id: NodeId, attr: Attr) {
        if attr.affects_transform() || attr == Attr::Opacity {
            self.mark_memos_dirty(id);
        }
        if attr.affects_rendering() {
            self.drop_caches_above(id);
            let layer = self.owning_layer(id);
            self.mark_hit_stale(layer);
        }
        for (_, f) in &mut self.observers {
            f(id, attr);
        }
    }

    /// Clear the absolute-transform/opacity/scale memos of `id`'s subtree.
    /// Prunes at already-dirty nodes: a dirty node's descendants are dirty.
    fn mark_memos_dirty(&mut self, id: NodeId) {
        let mut stack: SmallVec<[NodeId; 16]> = SmallVec::new();
        stack.push(id);
        while let Some(n) = stack.pop() {
            let Some(node) = self.arena.get_mut(n) else {
                continue;
            };
            if node.abs_transform.is_none()
                && node.abs_opacity.is_none()
                && node.abs_scale.is_none()
            {
                continue;
            }
            node.abs_transform = None;
            node.abs_opacity = None;
            node.abs_scale = None;
            stack.extend(node.children.iter().copied());
        }
    }

    /// Drop the caches of `id` and every ancestor; their captures contain
    /// the mutated node.
    fn drop_caches_above(&mut self, id: NodeId) {
        let mut cur = Some(id);
        while let Some(n) = cur {
            let Some(node) = self.arena.get_mut(n) else {
                break;
            };
            if node.cache.take().is_some() {
                tracing::debug!(node = ?n, "dropped subtree cache after mutation");
            }
            cur = match node.parent {
                Parent::Node(p) => Some(p),
                _ => None,
            };
        }
    }

    /// Resolve the absolute memos of `id` and its ancestors (top down).
    fn resolve_chain(&mut self, id: NodeId) -> RibaltaResult<()> {
        let mut chain: SmallVec<[NodeId; 16]> = SmallVec::new();
        let mut cur = id;
        loop {
            chain.push(cur);
            match self.node(cur)?.parent {
                Parent::Node(p) => cur = p,
                _ => break,
            }
        }

        let mut tr = Transform::IDENTITY;
        let mut op = 1.0;
        let mut sc = (1.0, 1.0);
        for &n in chain.iter().rev() {
            let node = self
                .arena
                .get_mut(n)
                .ok_or_else(|| RibaltaError::usage("dead node in parent chain"))?;
            match (node.abs_transform, node.abs_opacity, node.abs_scale) {
                (Some(t), Some(o), Some(s)) => {
                    tr = t;
                    op = o;
                    sc = s;
                }
                _ => {
                    tr.multiply(&node.attrs.local_transform());
                    op *= node.attrs.clamped_opacity();
                    sc = (sc.0 * node.attrs.scale_x, sc.1 * node.attrs.scale_y);
                    node.abs_transform = Some(tr);
                    node.abs_opacity = Some(op);
                    node.abs_scale = Some(sc);
                }
            }
        }
        Ok(())
    }

    /// Resolve the absolute memos of `id`'s whole subtree (the painter reads
    /// them without recomputing). Skips descending into cached nodes, which
    /// the painter blits without visiting children.
    fn ensure_subtree_resolved(&mut self, root: NodeId) -> RibaltaResult<()> {
        let (ptr, pop, psc) = match self.node(root)?.parent {
            Parent::Node(p) => {
                self.resolve_chain(p)?;
                let parent = self.node(p)?;
                match (parent.abs_transform, parent.abs_opacity, parent.abs_scale) {
                    (Some(t), Some(o), Some(s)) => (t, o, s),
                    _ => {
                        return Err(RibaltaError::raster("parent memo missing after resolve"));
                    }
                }
            }
            _ => (Transform::IDENTITY, 1.0, (1.0, 1.0)),
        };

        let mut stack: SmallVec<[(NodeId, Transform, f64, (f64, f64)); 16]> = SmallVec::new();
        stack.push((root, ptr, pop, psc));
        while let Some((id, ptr, pop, psc)) = stack.pop() {
            let node = self
                .arena
                .get_mut(id)
                .ok_or_else(|| RibaltaError::raster("dead node in resolved subtree"))?;
            let (tr, op, sc) = match (node.abs_transform, node.abs_opacity, node.abs_scale) {
                (Some(t), Some(o), Some(s)) => (t, o, s),
                _ => {
                    let mut t = ptr;
                    t.multiply(&node.attrs.local_transform());
                    let o = pop * node.attrs.clamped_opacity();
                    let s = (psc.0 * node.attrs.scale_x, psc.1 * node.attrs.scale_y);
                    node.abs_transform = Some(t);
                    node.abs_opacity = Some(o);
                    node.abs_scale = Some(s);
                    (t, o, s)
                }
            };
            if node.cache.is_none() {
                let children: SmallVec<[NodeId; 8]> = node.children.iter().copied().collect();
                for c in children {
                    stack.push((c, tr, op, sc));
                }
            }
        }
        Ok(())
    }

    /// Repaint a layer's hit surface if flagged stale.
    fn ensure_hit_current(&mut self, layer: NodeId) -> RibaltaResult<()> {
        if !self.layer_data(layer)?.hit_stale {
            return Ok(());
        }
        self.ensure_subtree_resolved(layer)?;
        let mut surface = self
            .layer_data_mut(layer)?
            .hit
            .take()
            .ok_or_else(|| RibaltaError::raster("layer has no hit surface (detached?)"))?;
        let result = self.painter.paint_subtree(
            &self.arena,
            layer,
            PassKind::Hit,
            WalkBase::scaling(self.pixel_ratio),
            surface.pixmap_mut(),
        );
        let data = self.layer_data_mut(layer)?;
        data.hit = Some(surface);
        if result.is_ok() {
            data.hit_stale = false;
        }
        result
    }

    /// Map a logical point to a device pixel, warning and yielding `None`
    /// outside the surface.
    fn device_pixel(&self, point: Point) -> Option<(i64, i64)> {
        let px = (point.x * self.pixel_ratio).floor();
        let py = (point.y * self.pixel_ratio).floor();
        if !(px >= 0.0
            && py >= 0.0
            && px < f64::from(self.phys_width)
            && py < f64::from(self.phys_height))
        {
            tracing::warn!(?point, "hit query outside the stage surface");
            return None;
        }
        Some((px as i64, py as i64))
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_ratio", &self.pixel_ratio)
            .field("layers", &self.layers.len())
            .field("nodes", &self.arena.len())
            .finish_non_exhaustive()
    }
}

fn finite_or(prev: f64, value: f64, attr: &str) -> f64 {
    if value.is_finite() {
        value
    } else {
        tracing::warn!(value, attr, "ignoring non-finite attribute value");
        prev
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stage/mod.rs"]
mod tests;
