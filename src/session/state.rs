//! Session lifecycle states.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a capture session.
///
/// `Ready` already streams to the display; `ScanningQr` additionally feeds
/// the QR pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// No hardware held.
    Closed,
    /// Acquiring and configuring the device.
    Opening,
    /// Streaming to the display.
    Ready,
    /// Streaming and scanning.
    ScanningQr,
    /// Releasing the device.
    Closing,
}

impl SessionState {
    /// True when hardware callbacks should be acted upon.
    pub fn is_streaming(self) -> bool {
        matches!(self, SessionState::Ready | SessionState::ScanningQr)
    }

    /// Numeric form used by the state gauge.
    pub fn as_u8(self) -> u8 {
        match self {
            SessionState::Closed => 0,
            SessionState::Opening => 1,
            SessionState::Ready => 2,
            SessionState::ScanningQr => 3,
            SessionState::Closing => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Opening,
            2 => SessionState::Ready,
            3 => SessionState::ScanningQr,
            4 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Closed => "closed",
            SessionState::Opening => "opening",
            SessionState::Ready => "ready",
            SessionState::ScanningQr => "scanningQr",
            SessionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Atomically readable session state.
///
/// Written only by the control path (under the engine's session lock) and
/// read lock-free by the hardware callback.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Creates a cell in `state`.
    pub fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    /// Current state.
    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `state`, returning the previous one.
    pub fn set(&self, state: SessionState) -> SessionState {
        SessionState::from_u8(self.0.swap(state.as_u8(), Ordering::AcqRel))
    }
}
