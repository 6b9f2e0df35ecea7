//! Per-callback frame fan-out.

use super::slot::FrameSlot;
use super::stats::StreamStats;
use crate::capture::{Frame, FrameCallback, FrameError, HardwareEvent, RawImage};
use crate::events::{ErrorCode, Event, EventHub};
use crate::qr::QrDecodePipeline;
use crate::session::{SessionState, StateCell};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Display-side notification that a new frame sits in the slot.
pub trait FrameListener: Send + Sync {
    /// Called once per published frame on the capture thread. Must not block.
    fn on_frame_available(&self);
}

impl<F> FrameListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_frame_available(&self) {
        self()
    }
}

/// Runs on the hardware callback thread for one session.
///
/// Every step is non-blocking: slot publication is a CAS loop, the QR hand-off
/// is a slot publish plus `try_send`, and events go to unbounded queues.
pub struct FrameDispatcher {
    state: Arc<StateCell>,
    display: Arc<FrameSlot>,
    listener: Option<Arc<dyn FrameListener>>,
    qr: Arc<QrDecodePipeline>,
    events: Arc<EventHub>,
    stats: Arc<StreamStats>,
    sequence: AtomicU64,
}

impl FrameDispatcher {
    /// Creates a dispatcher bound to one session's state.
    pub fn new(
        state: Arc<StateCell>,
        display: Arc<FrameSlot>,
        listener: Option<Arc<dyn FrameListener>>,
        qr: Arc<QrDecodePipeline>,
        events: Arc<EventHub>,
        stats: Arc<StreamStats>,
    ) -> Self {
        Self {
            state,
            display,
            listener,
            qr,
            events,
            stats,
            sequence: AtomicU64::new(0),
        }
    }

    /// Wraps this dispatcher as a hardware callback.
    pub fn callback(self: &Arc<Self>) -> FrameCallback {
        let dispatcher = Arc::clone(self);
        Arc::new(move |event| dispatcher.on_hardware_event(event))
    }

    /// Handles one hardware callback.
    pub fn on_hardware_event(&self, event: HardwareEvent) {
        self.stats.received();

        let state = self.state.get();
        if !state.is_streaming() {
            self.stats.discarded();
            trace!(%state, "Callback discarded");
            return;
        }

        match event {
            HardwareEvent::Frame(raw) => {
                if let Err(e) = self.dispatch(raw, state) {
                    self.report_malformed(e);
                }
            }
            HardwareEvent::BufferNotReady(reason) => {
                self.report_malformed(FrameError::NotReady(reason));
            }
            HardwareEvent::Fault(reason) => {
                self.stats.device_fault();
                warn!(reason = %reason, "Camera device fault");
                self.events.session.emit(Event::Error {
                    code: ErrorCode::Device,
                    message: reason,
                });
            }
        }
    }

    fn dispatch(&self, raw: RawImage, state: SessionState) -> Result<(), FrameError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = Arc::new(Frame::from_raw(raw, sequence)?);

        self.display.publish(Arc::clone(&frame));
        self.stats.published();
        if let Some(listener) = &self.listener {
            listener.on_frame_available();
        }

        if state == SessionState::ScanningQr {
            self.stats.qr_offered();
            self.qr.offer(frame);
        }
        trace!(sequence, "Frame dispatched");
        Ok(())
    }

    fn report_malformed(&self, error: FrameError) {
        self.stats.malformed();
        warn!(error = %error, "Skipping malformed frame");
        self.events.session.emit(Event::Error {
            code: ErrorCode::MalformedFrame,
            message: error.to_string(),
        });
    }
}
