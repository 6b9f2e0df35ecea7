//! Metrics collection and registry.

use crate::session::SessionState;
use crate::stream::StatsSnapshot;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of engine state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Frame path counters.
    pub stats: StatsSnapshot,
    /// Numeric session state, see [`SessionState::as_u8`].
    pub session_state: u8,
}

impl MetricsSnapshot {
    /// Combines frame counters with the current session state.
    pub fn from_stats(stats: StatsSnapshot, state: SessionState) -> Self {
        Self {
            stats,
            session_state: state.as_u8(),
        }
    }
}

/// Prometheus metrics registry for the capture engine.
pub struct MetricsRegistry {
    registry: Registry,

    // Frame path
    frames_received: IntCounter,
    frames_published: IntCounter,
    frames_malformed: IntCounter,
    frames_discarded: IntCounter,
    device_faults: IntCounter,

    // QR pipeline
    qr_frames_offered: IntCounter,
    qr_decoded: IntCounter,

    // Session
    sessions_opened: IntCounter,
    session_state: IntGauge,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, MetricsError> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Counters only move forward, so apply the difference from the last update.
fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

impl MetricsRegistry {
    /// Creates a new registry with all camera metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_received = counter(
            &registry,
            "qr_camera_frames_received_total",
            "Hardware callbacks received",
        )?;
        let frames_published = counter(
            &registry,
            "qr_camera_frames_published_total",
            "Frames published to the display slot",
        )?;
        let frames_malformed = counter(
            &registry,
            "qr_camera_frames_malformed_total",
            "Callbacks skipped because the buffer was unusable",
        )?;
        let frames_discarded = counter(
            &registry,
            "qr_camera_frames_discarded_total",
            "Callbacks ignored because no session was streaming",
        )?;
        let device_faults = counter(
            &registry,
            "qr_camera_device_faults_total",
            "Asynchronous device faults",
        )?;
        let qr_frames_offered = counter(
            &registry,
            "qr_camera_qr_frames_offered_total",
            "Frames handed to the QR pipeline",
        )?;
        let qr_decoded = counter(
            &registry,
            "qr_camera_qr_decoded_total",
            "QR strings decoded",
        )?;
        let sessions_opened = counter(
            &registry,
            "qr_camera_sessions_opened_total",
            "Capture sessions successfully opened",
        )?;

        let session_state = IntGauge::new(
            "qr_camera_session_state",
            "Session state (0=closed, 1=opening, 2=ready, 3=scanning, 4=closing)",
        )?;
        registry.register(Box::new(session_state.clone()))?;

        Ok(Self {
            registry,
            frames_received,
            frames_published,
            frames_malformed,
            frames_discarded,
            device_faults,
            qr_frames_offered,
            qr_decoded,
            sessions_opened,
            session_state,
        })
    }

    /// Updates all metrics from a snapshot.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        let stats = &snapshot.stats;
        advance(&self.frames_received, stats.frames_received);
        advance(&self.frames_published, stats.frames_published);
        advance(&self.frames_malformed, stats.frames_malformed);
        advance(&self.frames_discarded, stats.frames_discarded);
        advance(&self.device_faults, stats.device_faults);
        advance(&self.qr_frames_offered, stats.qr_frames_offered);
        advance(&self.qr_decoded, stats.qr_decoded);
        advance(&self.sessions_opened, stats.sessions_opened);

        self.session_state.set(i64::from(snapshot.session_state));
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        assert!(MetricsRegistry::new().is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();
        let stats = StatsSnapshot {
            frames_received: 12,
            frames_published: 10,
            frames_malformed: 1,
            frames_discarded: 1,
            qr_frames_offered: 4,
            qr_decoded: 2,
            sessions_opened: 1,
            ..Default::default()
        };
        registry.update(&MetricsSnapshot::from_stats(stats, SessionState::ScanningQr));

        let output = registry.encode().unwrap();
        assert!(output.contains("qr_camera_frames_published_total 10"));
        assert!(output.contains("qr_camera_qr_decoded_total 2"));
        assert!(output.contains("qr_camera_session_state 3"));
    }

    #[test]
    fn test_counters_never_decrease() {
        let registry = MetricsRegistry::new().unwrap();
        let mut stats = StatsSnapshot {
            frames_received: 5,
            ..Default::default()
        };
        registry.update(&MetricsSnapshot::from_stats(stats, SessionState::Ready));
        stats.frames_received = 3;
        registry.update(&MetricsSnapshot::from_stats(stats, SessionState::Closed));

        let output = registry.encode().unwrap();
        assert!(output.contains("qr_camera_frames_received_total 5"));
        assert!(output.contains("qr_camera_session_state 0"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("qr_camera_frames_received_total"));
        assert!(output.contains("qr_camera_sessions_opened_total"));
        assert!(output.contains("qr_camera_session_state"));
    }
}
