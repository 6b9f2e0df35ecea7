//! Frame path counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated on the frame path with relaxed atomics.
#[derive(Debug, Default)]
pub struct StreamStats {
    frames_received: AtomicU64,
    frames_published: AtomicU64,
    frames_malformed: AtomicU64,
    frames_discarded: AtomicU64,
    device_faults: AtomicU64,
    qr_frames_offered: AtomicU64,
    qr_decoded: AtomicU64,
    sessions_opened: AtomicU64,
}

/// Point-in-time copy of [`StreamStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Hardware callbacks received.
    pub frames_received: u64,
    /// Frames published to the display slot.
    pub frames_published: u64,
    /// Callbacks rejected as malformed.
    pub frames_malformed: u64,
    /// Callbacks ignored because the session was not streaming.
    pub frames_discarded: u64,
    /// Asynchronous device faults.
    pub device_faults: u64,
    /// Frames handed to the QR pipeline.
    pub qr_frames_offered: u64,
    /// QR strings decoded.
    pub qr_decoded: u64,
    /// Sessions successfully opened.
    pub sessions_opened: u64,
}

impl StreamStats {
    pub(crate) fn received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn published(&self) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn malformed(&self) {
        self.frames_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn discarded(&self) {
        self.frames_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn device_fault(&self) {
        self.device_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn qr_offered(&self) {
        self.qr_frames_offered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn qr_decoded(&self) {
        self.qr_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            device_faults: self.device_faults.load(Ordering::Relaxed),
            qr_frames_offered: self.qr_frames_offered.load(Ordering::Relaxed),
            qr_decoded: self.qr_decoded.load(Ordering::Relaxed),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
        }
    }
}
