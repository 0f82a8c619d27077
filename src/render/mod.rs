//! CPU rasterization: pixel surfaces, the draw-callback context, and the
//! painters that walk a layer's subtree for the scene and hit passes.

pub(crate) mod blur;
pub(crate) mod composite;
pub mod context;
pub(crate) mod painter;
pub(crate) mod pool;
pub mod surface;
