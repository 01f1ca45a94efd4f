//! Render Graph System
//!
//! Render passes declare the passes they depend on by name. Compiling the
//! graph sorts them topologically; executing it runs every draw pass with the
//! shader resource bookkeeping of [`transition`] around it.

pub mod graph;
pub mod pass;
pub mod resource;
pub mod transition;

pub use graph::*;
pub use pass::*;
pub use resource::*;
pub use transition::*;
