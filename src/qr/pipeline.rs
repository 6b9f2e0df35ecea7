//! Latest-wins QR decoding off the capture thread.
//!
//! The dispatcher offers frames by publishing into the pipeline's own
//! [`FrameSlot`] and poking a capacity-1 wake channel with `try_send`, which
//! never blocks. A worker thread drains the slot and decodes whatever frame is
//! newest when it gets around to it; frames offered while a decode is running
//! replace each other and only the last one is looked at.

use super::detector::QrDetector;
use super::luma::to_luma;
use super::orientation::upright;
use super::DecodeAccuracy;
use crate::capture::{Frame, ScanConfig, SharedFrame};
use crate::events::{ErrorCode, Event, EventHub};
use crate::stream::{FrameSlot, StreamStats};
use async_channel::{Receiver, Sender};
use image::imageops::{self, FilterType};
use image::GrayImage;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Decodes a single frame and reports the result.
pub struct QrDecoder {
    detector: Arc<dyn QrDetector>,
    config: ScanConfig,
    events: Arc<EventHub>,
    stats: Arc<StreamStats>,
}

impl QrDecoder {
    /// Creates a decoder reporting to `events`.
    pub fn new(
        detector: Arc<dyn QrDetector>,
        config: ScanConfig,
        events: Arc<EventHub>,
        stats: Arc<StreamStats>,
    ) -> Self {
        Self {
            detector,
            config,
            events,
            stats,
        }
    }

    /// Decodes the first QR code in `frame`, emitting it as
    /// [`Event::QrDecoded`] on the scan channel.
    ///
    /// Finding nothing is not an error. A frame that cannot be converted to
    /// luma is reported on the session channel.
    pub fn decode(&self, frame: &Frame) -> Option<String> {
        let luma = match to_luma(frame) {
            Ok(luma) => luma,
            Err(e) => {
                warn!(sequence = frame.sequence(), error = %e, "Frame unusable for QR decode");
                self.events.session.emit(Event::Error {
                    code: ErrorCode::MalformedFrame,
                    message: e.to_string(),
                });
                return None;
            }
        };

        let orientation = frame
            .orientation()
            .unwrap_or(self.config.default_orientation);
        let luma = upright(luma, orientation);
        let luma = match self.config.accuracy {
            DecodeAccuracy::High => luma,
            DecodeAccuracy::Fast => downscale(luma, self.config.fast_max_dimension),
        };

        let Some(text) = self.detector.detect(&luma).into_iter().next() else {
            trace!(sequence = frame.sequence(), "No QR code in frame");
            return None;
        };

        self.stats.qr_decoded();
        info!(sequence = frame.sequence(), len = text.len(), "QR code decoded");
        self.events.scan.emit(Event::QrDecoded { text: text.clone() });
        Some(text)
    }
}

fn downscale(image: GrayImage, max_dimension: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if longest <= max_dimension {
        return image;
    }
    let scale = max_dimension as f32 / longest as f32;
    let new_width = ((width as f32 * scale) as u32).max(1);
    let new_height = ((height as f32 * scale) as u32).max(1);
    imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}

/// Per-session QR consumer of the frame stream.
pub struct QrDecodePipeline {
    decoder: Arc<QrDecoder>,
    pending: Arc<FrameSlot>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QrDecodePipeline {
    /// Creates an idle pipeline; call [`start`](Self::start) to spawn the worker.
    pub fn new(decoder: Arc<QrDecoder>) -> Self {
        let (wake_tx, wake_rx) = async_channel::bounded(1);
        Self {
            decoder,
            pending: Arc::new(FrameSlot::new()),
            wake_tx,
            wake_rx,
            worker: Mutex::new(None),
        }
    }

    /// Hands a frame to the worker. Never blocks.
    pub fn offer(&self, frame: SharedFrame) {
        self.pending.publish(frame);
        // A full channel means a wake-up is already pending.
        let _ = self.wake_tx.try_send(());
    }

    /// Spawns the decode worker if it is not running yet.
    pub fn start(&self) -> std::io::Result<()> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return Ok(());
        }

        let decoder = Arc::clone(&self.decoder);
        let pending = Arc::clone(&self.pending);
        let wake = self.wake_rx.clone();
        let handle = std::thread::Builder::new()
            .name("qr-decode".into())
            .spawn(move || {
                debug!("QR decode worker started");
                while wake.recv_blocking().is_ok() {
                    if let Some(frame) = pending.take() {
                        decoder.decode(&frame);
                    }
                }
                debug!("QR decode worker exiting");
            })?;

        *worker = Some(handle);
        Ok(())
    }

    /// True once the worker has been spawned and not shut down.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drops any frame waiting to be decoded.
    pub fn discard_pending(&self) {
        self.pending.clear();
    }

    /// Stops the worker after it finishes queued work and releases the
    /// pending frame. Idempotent.
    pub fn shutdown(&self) {
        self.wake_tx.close();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("QR decode worker panicked");
            }
        }
        self.pending.clear();
    }
}

impl Drop for QrDecodePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
