//! QR Camera Library
//!
//! A camera capture and frame-streaming engine. It enumerates devices, opens
//! one capture session at a negotiated resolution, streams frames to a
//! display surface, and optionally scans those frames for QR codes.
//!
//! # Architecture
//!
//! ```text
//! hardware callback → dispatcher → display slot → display (copy_latest_frame)
//!                         ↓
//!                  QR slot → decode worker → scan events
//! ```
//!
//! # Design Principles
//!
//! - **Lock-free frame path**: the hardware callback never blocks; frames are
//!   exchanged through latest-wins slots and older frames are dropped
//! - **Serialized control path**: open, scan and close are guarded by one
//!   mutex and may block on hardware acquisition
//! - **No callbacks after close**: every hardware callback checks the session
//!   state before acting
//! - **Pluggable hardware**: a mock backend for tests and demos, `nokhwa`
//!   behind the `camera` feature
//!
//! # Example
//!
//! ```no_run
//! use qr_camera::{CameraEngine, Event, MockBackend, MockDevice, ResolutionPreset};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let backend = MockBackend::with_synthetic_stream(
//!     vec![MockDevice::standard("0", (1280, 720))],
//!     Duration::from_millis(33),
//! );
//! let engine = CameraEngine::new(Arc::new(backend));
//!
//! let info = engine.open("0", ResolutionPreset::High).unwrap();
//! println!("streaming {}x{}", info.preview_width, info.preview_height);
//!
//! let scans = engine.scan_events();
//! engine.start_scanning().unwrap();
//! if let Some(Event::QrDecoded { text }) = scans.recv_blocking() {
//!     println!("decoded: {text}");
//! }
//!
//! engine.close(info.session_id);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod commands;
pub mod events;
pub mod metrics;
pub mod qr;
pub mod session;
pub mod stream;

// Re-export commonly used types at crate root
pub use capture::{
    negotiate, CameraBackend, CaptureFormat, DeviceInfo, FileConfig, Frame, MockBackend,
    MockDevice, ResolutionPreset, SharedFrame,
};
pub use commands::{CommandHandler, MethodCall, Reply};
pub use events::{Event, EventStream};
pub use qr::{QrDetector, RqrrDetector};
pub use session::{CameraEngine, SessionError, SessionInfo, SessionState};
pub use stream::{FrameListener, StatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
