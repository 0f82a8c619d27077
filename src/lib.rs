//! Ribalta is a retained-mode 2D scene graph with pixel-accurate hit
//! testing, rendered on a CPU raster backend.
//!
//! The public API is stage-oriented:
//!
//! - Build a [`Stage`] and attach layers, groups, and shapes to it
//! - Mutate node attributes and redraw with [`Stage::draw`], or coalesce
//!   redraws through [`Stage::batch_draw`]
//! - Map pointer positions back to shapes with [`Stage::intersection`]
//! - Snapshot expensive subtrees with [`Stage::cache`] and export the tree
//!   with [`Stage::to_json`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;
mod transform;

pub mod render;
pub mod scene;
pub mod stage;

pub use crate::foundation::core::{
    Affine, BezPath, ColorKey, Point, Rect, Rgba8, Rgba8Premul, Vec2,
};
pub use crate::foundation::error::{RibaltaError, RibaltaResult};

pub use crate::render::context::DrawingContext;
pub use crate::render::pool::{SurfacePoolOpts, SurfacePoolStats};
pub use crate::render::surface::{Bitmap, Surface};
pub use crate::scene::attrs::{Attr, NodeAttrs};
pub use crate::scene::model::{AttrsDef, ClipDef, FillDef, LayerDef, NodeDef, StageDef, StyleDef};
pub use crate::scene::node::{Clip, NodeId, NodeType};
pub use crate::scene::paths;
pub use crate::scene::shape::{
    DrawFn, Fill, FillRule, GradientStop, LineCap, LineJoin, LinearGradient, Pattern,
    RadialGradient, Shadow, ShapeStyle, Stroke, path_draw_fn,
};
pub use crate::stage::cache::CacheOpts;
pub use crate::stage::hit::HitOpts;
pub use crate::stage::{
    FrameScheduler, NoopScheduler, ObserverId, PointerEvent, PointerEventKind, Stage, StageOpts,
};
pub use crate::transform::{Decomposition, Transform};
