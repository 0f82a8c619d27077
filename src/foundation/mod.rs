//! Shared primitives: geometry re-exports, color types, and the crate
//! error taxonomy.

pub mod core;
pub mod error;
