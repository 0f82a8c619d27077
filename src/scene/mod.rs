//! The scene graph data model: nodes, attributes, shapes, and the arena
//! they live in.

pub mod attrs;
pub mod model;
pub mod node;
pub mod paths;
pub mod shape;
pub(crate) mod tree;
