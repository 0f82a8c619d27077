//! Node identity and per-node storage shared by every kind of tree entity.

use crate::foundation::core::{BezPath, ColorKey, Rect};
use crate::scene::attrs::NodeAttrs;
use crate::scene::shape::ShapeData;
use crate::stage::cache::SubtreeCache;
use crate::transform::Transform;

/// Handle to a node owned by a [`Stage`](crate::Stage) arena.
///
/// Handles are generational: destroying a node invalidates every copy of its
/// id, and a slot reused by a later node yields a distinct id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// The kind of a node, as visible to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    /// Plain container: admits shapes and groups.
    Group,
    /// Composition root member: owns a scene/hit surface pair; admits shapes
    /// and groups; only the stage admits layers.
    Layer,
    /// Leaf drawable with a draw callback, style, and color key.
    Shape,
}

/// A clip region applied by a container to its subtree, in the container's
/// local coordinates. Applies identically to scene and hit passes.
#[derive(Clone, Debug, PartialEq)]
pub enum Clip {
    /// Axis-aligned rectangle.
    Rect(Rect),
    /// Arbitrary path region.
    Path(BezPath),
}

/// Where a node currently hangs in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Parent {
    /// Not in any tree (freshly created or removed).
    Detached,
    /// Directly under the stage: only layers live here.
    Stage,
    /// Under another node.
    Node(NodeId),
}

/// Payload specific to plain groups.
#[derive(Clone, Debug, Default)]
pub(crate) struct GroupData {
    pub(crate) clip: Option<Clip>,
}

/// Payload specific to layers: the surface pair plus redraw bookkeeping.
///
/// Surfaces are allocated when the layer is attached to the stage (that is
/// when the viewport size is known) and are briefly taken out of the slot
/// while the painter writes to them.
#[derive(Debug, Default)]
pub(crate) struct LayerData {
    pub(crate) scene: Option<crate::render::surface::Surface>,
    pub(crate) hit: Option<crate::render::surface::Surface>,
    pub(crate) clip: Option<Clip>,
    /// Hit surface no longer matches the tree; repainted on next query.
    pub(crate) hit_stale: bool,
    /// A batched draw is queued for this layer.
    pub(crate) draw_pending: bool,
}

/// Discriminated per-kind payload.
#[derive(Debug)]
pub(crate) enum NodeKind {
    Group(GroupData),
    Layer(LayerData),
    Shape(ShapeData),
}

/// Everything stored for one live node.
#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) attrs: NodeAttrs,
    pub(crate) parent: Parent,
    /// Paint order, back to front. Always empty for shapes.
    pub(crate) children: Vec<NodeId>,
    pub(crate) kind: NodeKind,
    /// Hit identity. Shapes allocate one at construction; containers only
    /// when cached (the cache silhouette needs an owner key).
    pub(crate) key: Option<ColorKey>,
    /// Memoized stage-absolute transform. `None` = dirty.
    pub(crate) abs_transform: Option<Transform>,
    /// Memoized product of ancestor opacities. `None` = dirty.
    pub(crate) abs_opacity: Option<f64>,
    /// Memoized product of ancestor scale attributes (not a matrix
    /// decomposition), used to size shadows in device pixels. `None` = dirty.
    pub(crate) abs_scale: Option<(f64, f64)>,
    pub(crate) cache: Option<SubtreeCache>,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            attrs: NodeAttrs::default(),
            parent: Parent::Detached,
            children: Vec::new(),
            kind,
            key: None,
            abs_transform: None,
            abs_opacity: None,
            abs_scale: None,
            cache: None,
        }
    }

    pub(crate) fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Group(_) => NodeType::Group,
            NodeKind::Layer(_) => NodeType::Layer,
            NodeKind::Shape(_) => NodeType::Shape,
        }
    }

    pub(crate) fn clip(&self) -> Option<&Clip> {
        match &self.kind {
            NodeKind::Group(g) => g.clip.as_ref(),
            NodeKind::Layer(l) => l.clip.as_ref(),
            NodeKind::Shape(_) => None,
        }
    }
}
