//! Resource management
//!
//! Mesh geometry generation and background image loading.

mod loader;
mod mesh;

pub use loader::*;
pub use mesh::*;
