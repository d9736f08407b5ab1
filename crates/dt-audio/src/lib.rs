//! Audio output sinks for duotone.

mod cpal_backend;
mod memory;
mod traits;

pub use cpal_backend::{CpalOpener, CpalSink, STALL_TIMEOUT};
pub use memory::{Capture, MemoryOpener, MemorySink, SinkEvent};
pub use traits::{AudioSink, SinkError, SinkOpener};
