//! Prometheus metrics exporter for the capture engine.
//!
//! Counters mirror [`StatsSnapshot`](crate::stream::StatsSnapshot) and are
//! exposed in Prometheus format via an HTTP endpoint when the `metrics`
//! feature is enabled.
//!
//! # Metrics Exposed
//!
//! ## Frame path
//! - `qr_camera_frames_received_total` - Hardware callbacks received
//! - `qr_camera_frames_published_total` - Frames published to the display slot
//! - `qr_camera_frames_malformed_total` - Callbacks skipped as malformed
//! - `qr_camera_frames_discarded_total` - Callbacks arriving outside a streaming session
//! - `qr_camera_device_faults_total` - Asynchronous device faults
//!
//! ## QR pipeline
//! - `qr_camera_qr_frames_offered_total` - Frames handed to the decoder
//! - `qr_camera_qr_decoded_total` - QR strings decoded
//!
//! ## Session
//! - `qr_camera_sessions_opened_total` - Sessions opened
//! - `qr_camera_session_state` - Current session state
//!
//! # Example
//!
//! ```no_run
//! use qr_camera::metrics::{MetricsRegistry, MetricsSnapshot};
//! use qr_camera::{CameraEngine, MockBackend};
//! use std::sync::Arc;
//!
//! let engine = CameraEngine::new(Arc::new(MockBackend::new(Vec::new())));
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! registry.update(&MetricsSnapshot::from_stats(engine.stats(), engine.state()));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
