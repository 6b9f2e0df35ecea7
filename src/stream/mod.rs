//! Frame exchange between the capture thread and its consumers.

mod dispatcher;
mod slot;
mod stats;

pub use dispatcher::{FrameDispatcher, FrameListener};
pub use slot::FrameSlot;
pub use stats::{StatsSnapshot, StreamStats};
