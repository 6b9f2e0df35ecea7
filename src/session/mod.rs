//! Capture session lifecycle.
//!
//! ```text
//! Closed → Opening → Ready ⇄ ScanningQr
//!                      ↓         ↓
//!                   Closing → Closed
//! ```
//!
//! A second `open` closes the current session first, so at most one device
//! handle is held at a time.

mod engine;
mod error;
mod state;

pub use engine::{CameraEngine, SessionId, SessionInfo};
pub use error::SessionError;
pub use state::{SessionState, StateCell};
