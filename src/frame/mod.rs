//! Per-frame state: constant buffer payloads, dedup caches and the
//! multi-buffered frame ring.

pub mod cache;
pub mod constants;
pub mod context;
pub mod ring;

pub use cache::{ConstantBufferCache, ConstantBufferList};
pub use constants::*;
pub use context::{ConstantBuffer, FrameCapacities, FrameContext};
pub use ring::FrameRing;
