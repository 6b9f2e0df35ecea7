//! The camera engine: one capture session at a time.
//!
//! Control operations (`open`, `start_scanning`, `stop_scanning`, `close`) are
//! serialized by a mutex around the active session. They may block while the
//! backend acquires or releases hardware. The frame path never takes that
//! lock; it reads the session state through an atomic [`StateCell`].

use super::error::SessionError;
use super::state::{SessionState, StateCell};
use crate::capture::{
    negotiate_with_fps, CameraBackend, CaptureFormat, DeviceInfo, HardwareSession, ResolutionPreset,
    ScanConfig, SharedFrame,
};
use crate::events::{Event, EventHub, EventStream};
use crate::qr::{QrDecodePipeline, QrDecoder, QrDetector, RqrrDetector};
use crate::stream::{FrameDispatcher, FrameListener, FrameSlot, StatsSnapshot, StreamStats};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Identifier handed out by [`CameraEngine::open`].
pub type SessionId = u64;

/// Result of a successful open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Pass to [`CameraEngine::close`].
    pub session_id: SessionId,
    /// Width of frames delivered to the display.
    pub preview_width: u32,
    /// Height of frames delivered to the display.
    pub preview_height: u32,
    /// Width of frames offered to the QR scanner.
    pub capture_width: u32,
    /// Height of frames offered to the QR scanner.
    pub capture_height: u32,
}

impl SessionInfo {
    fn new(session_id: SessionId, format: &CaptureFormat) -> Self {
        // One stream feeds both the display and the scanner.
        Self {
            session_id,
            preview_width: format.width,
            preview_height: format.height,
            capture_width: format.width,
            capture_height: format.height,
        }
    }
}

struct CameraSession {
    id: SessionId,
    device_id: String,
    format: CaptureFormat,
    state: Arc<StateCell>,
    hardware: Box<dyn HardwareSession>,
    qr: Arc<QrDecodePipeline>,
}

/// Owns the active capture session and the channels it reports through.
pub struct CameraEngine {
    backend: Arc<dyn CameraBackend>,
    detector: Arc<dyn QrDetector>,
    scan_config: ScanConfig,
    max_fps: u32,
    display: Arc<FrameSlot>,
    events: Arc<EventHub>,
    stats: Arc<StreamStats>,
    listener: Mutex<Option<Arc<dyn FrameListener>>>,
    next_id: AtomicU64,
    session: Mutex<Option<CameraSession>>,
}

impl CameraEngine {
    /// Creates an engine decoding QR codes with [`RqrrDetector`].
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        Self::with_detector(backend, Arc::new(RqrrDetector::new()), ScanConfig::default())
    }

    /// Creates an engine with a custom detector and scan settings.
    pub fn with_detector(
        backend: Arc<dyn CameraBackend>,
        detector: Arc<dyn QrDetector>,
        scan_config: ScanConfig,
    ) -> Self {
        Self {
            backend,
            detector,
            scan_config,
            max_fps: u32::MAX,
            display: Arc::new(FrameSlot::new()),
            events: Arc::new(EventHub::new()),
            stats: Arc::new(StreamStats::default()),
            listener: Mutex::new(None),
            next_id: AtomicU64::new(0),
            session: Mutex::new(None),
        }
    }

    /// Prefers capture formats at or below `fps` when a device offers the
    /// same size at several rates.
    pub fn with_max_fps(mut self, fps: u32) -> Self {
        self.max_fps = fps;
        self
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<CameraSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lists the backend's devices.
    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, SessionError> {
        self.backend.devices().map_err(SessionError::from_backend)
    }

    /// Installs the display's frame-available callback.
    ///
    /// Applies to sessions opened after this call.
    pub fn set_frame_listener(&self, listener: impl FrameListener + 'static) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(listener));
    }

    /// Removes the frame-available callback for future sessions.
    pub fn clear_frame_listener(&self) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Opens `device_id` at the best format for `preset`.
    ///
    /// Any session already open is closed first. Blocks while the backend
    /// acquires the device.
    pub fn open(
        &self,
        device_id: &str,
        preset: ResolutionPreset,
    ) -> Result<SessionInfo, SessionError> {
        let mut active = self.lock_session();
        if let Some(previous) = active.take() {
            info!(session_id = previous.id, "Replacing open camera session");
            self.teardown(previous);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let state = Arc::new(StateCell::new(SessionState::Opening));
        info!(session_id = id, device_id, %preset, "Opening camera session");

        let session = match self.acquire(id, device_id, preset, &state) {
            Ok(session) => session,
            Err(e) => {
                state.set(SessionState::Closed);
                warn!(session_id = id, device_id, error = %e, "Camera open failed");
                return Err(e);
            }
        };

        let info = SessionInfo::new(id, &session.format);
        info!(
            session_id = id,
            format = %session.format,
            "Camera session ready"
        );
        *active = Some(session);
        self.stats.session_opened();
        Ok(info)
    }

    fn acquire(
        &self,
        id: SessionId,
        device_id: &str,
        preset: ResolutionPreset,
        state: &Arc<StateCell>,
    ) -> Result<CameraSession, SessionError> {
        let formats = self
            .backend
            .formats(device_id)
            .map_err(SessionError::from_backend)?;
        let format = negotiate_with_fps(preset, &formats, self.max_fps)?;
        let mut hardware = self
            .backend
            .open(device_id)
            .map_err(SessionError::from_backend)?;

        let decoder = QrDecoder::new(
            Arc::clone(&self.detector),
            self.scan_config.clone(),
            Arc::clone(&self.events),
            Arc::clone(&self.stats),
        );
        let qr = Arc::new(QrDecodePipeline::new(Arc::new(decoder)));
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let dispatcher = Arc::new(FrameDispatcher::new(
            Arc::clone(state),
            Arc::clone(&self.display),
            listener,
            Arc::clone(&qr),
            Arc::clone(&self.events),
            Arc::clone(&self.stats),
        ));

        let started = hardware
            .configure(&format)
            .and_then(|()| hardware.start(dispatcher.callback()));
        if let Err(e) = started {
            hardware.close();
            return Err(SessionError::from_backend(e));
        }

        state.set(SessionState::Ready);
        debug!(session_id = id, "Hardware streaming");
        Ok(CameraSession {
            id,
            device_id: device_id.to_string(),
            format,
            state: Arc::clone(state),
            hardware,
            qr,
        })
    }

    /// Attaches the QR pipeline to the running stream.
    pub fn start_scanning(&self) -> Result<(), SessionError> {
        let active = self.lock_session();
        let session = active.as_ref().ok_or(SessionError::NotOpen)?;
        match session.state.get() {
            SessionState::Ready => {
                session.qr.start()?;
                session.state.set(SessionState::ScanningQr);
                info!(session_id = session.id, "QR scanning started");
                Ok(())
            }
            SessionState::ScanningQr => Err(SessionError::AlreadyScanning),
            _ => Err(SessionError::NotOpen),
        }
    }

    /// Detaches the QR pipeline; display streaming continues.
    pub fn stop_scanning(&self) -> Result<(), SessionError> {
        let active = self.lock_session();
        let session = active.as_ref().ok_or(SessionError::NotOpen)?;
        match session.state.get() {
            SessionState::ScanningQr => {
                session.state.set(SessionState::Ready);
                session.qr.discard_pending();
                info!(session_id = session.id, "QR scanning stopped");
                Ok(())
            }
            SessionState::Ready => Err(SessionError::NotScanning),
            _ => Err(SessionError::NotOpen),
        }
    }

    /// Closes the session with `session_id`. Closing an unknown or already
    /// closed session is a no-op.
    pub fn close(&self, session_id: SessionId) {
        let mut active = self.lock_session();
        match active.as_ref() {
            Some(session) if session.id == session_id => {
                if let Some(session) = active.take() {
                    self.teardown(session);
                }
            }
            _ => debug!(session_id, "Close ignored, session not open"),
        }
    }

    /// Closes whatever session is open. No-op when none is.
    pub fn close_active(&self) {
        if let Some(session) = self.lock_session().take() {
            self.teardown(session);
        }
    }

    fn teardown(&self, mut session: CameraSession) {
        session.state.set(SessionState::Closing);
        self.events.session.emit(Event::SessionClosing);

        if let Err(e) = session.hardware.stop() {
            warn!(session_id = session.id, error = %e, "Failed to stop capture");
        }
        session.hardware.close();
        session.qr.shutdown();
        session.state.set(SessionState::Closed);
        self.display.clear();

        info!(
            session_id = session.id,
            device_id = %session.device_id,
            "Camera session closed"
        );
    }

    /// State of the active session, `Closed` when none is open.
    pub fn state(&self) -> SessionState {
        self.lock_session()
            .as_ref()
            .map_or(SessionState::Closed, |s| s.state.get())
    }

    /// Identifier of the active session.
    pub fn session_id(&self) -> Option<SessionId> {
        self.lock_session().as_ref().map(|s| s.id)
    }

    /// Negotiated format of the active session.
    pub fn format(&self) -> Option<CaptureFormat> {
        self.lock_session().as_ref().map(|s| s.format)
    }

    /// Takes the newest frame for display.
    ///
    /// The caller owns the returned reference and keeps showing it until
    /// the next frame-available notification; `None` means nothing newer
    /// arrived since the last call.
    pub fn copy_latest_frame(&self) -> Option<SharedFrame> {
        self.display.take()
    }

    /// Subscribes to errors and session-closing notifications.
    pub fn session_events(&self) -> EventStream {
        self.events.session.listen()
    }

    /// Subscribes to decoded QR strings.
    pub fn scan_events(&self) -> EventStream {
        self.events.scan.listen()
    }

    /// Stops delivering session events. Idempotent.
    pub fn cancel_session_events(&self) {
        self.events.session.cancel();
    }

    /// Stops delivering scan results. Idempotent.
    pub fn cancel_scan_events(&self) {
        self.events.scan.cancel();
    }

    /// Frame path counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for CameraEngine {
    fn drop(&mut self) {
        self.close_active();
    }
}
