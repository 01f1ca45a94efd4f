//! Backend abstraction layer
//!
//! Provides the [`Backend`] trait and two implementations that run without a
//! GPU: [`DummyBackend`] and [`RecordingBackend`].

pub mod dummy;
pub mod recording;
pub mod traits;
pub mod types;

pub use dummy::DummyBackend;
pub use recording::{BackendCall, RecordingBackend};
pub use traits::*;
pub use types::*;
