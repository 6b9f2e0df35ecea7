//! In-process camera backend for tests and demos.
//!
//! Devices, their formats and open failures are configured up front. Frames
//! reach the started session either through [`MockBackend::emit`], which runs
//! the callback on the caller's thread, or through an optional synthetic
//! producer thread. Either way frames are stamped with the device's sensor
//! orientation, and `stop` waits for callbacks already in flight.

use super::backend::{
    with_sensor_orientation, BackendError, CameraBackend, DeviceInfo, FrameCallback,
    HardwareEvent, HardwareSession, LensFacing,
};
use super::format::{CaptureFormat, Orientation, PixelFormat};
use super::frame::RawImage;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// A simulated device.
#[derive(Debug, Clone)]
pub struct MockDevice {
    /// Enumeration data.
    pub info: DeviceInfo,
    /// Formats reported by `formats()`.
    pub formats: Vec<CaptureFormat>,
    /// Makes `open()` fail with `AccessDenied`.
    pub fail_open: bool,
}

impl MockDevice {
    /// Creates a device with the given formats.
    pub fn new(id: &str, facing: LensFacing, formats: Vec<CaptureFormat>) -> Self {
        Self {
            info: DeviceInfo {
                id: id.to_string(),
                name: format!("Mock Camera {id}"),
                facing,
                orientation_degrees: 0,
            },
            formats,
            fail_open: false,
        }
    }

    /// A back camera offering the usual preset sizes from 176x144 to `max`.
    pub fn standard(id: &str, max: (u32, u32)) -> Self {
        let formats = [
            (3840, 2160),
            (1920, 1080),
            (1280, 720),
            (640, 480),
            (352, 288),
            (176, 144),
        ]
        .into_iter()
        .filter(|&(w, h)| u64::from(w) * u64::from(h) <= u64::from(max.0) * u64::from(max.1))
        .map(|(w, h)| CaptureFormat::new(w, h, PixelFormat::Nv12, 30))
        .collect();
        Self::new(id, LensFacing::Back, formats)
    }

    /// Sets the sensor orientation.
    pub fn with_orientation(mut self, degrees: u32) -> Self {
        self.info.orientation_degrees = degrees;
        self
    }

    /// Makes every open attempt fail.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

#[derive(Default)]
struct MockState {
    devices: Vec<MockDevice>,
    open_handles: AtomicUsize,
    next_handle: AtomicU64,
    // Held for reading while `emit` runs a callback, so `stop` waits for it.
    active: RwLock<Option<(u64, FrameCallback)>>,
    synthetic_interval: Option<Duration>,
}

impl MockState {
    fn active(&self) -> RwLockReadGuard<'_, Option<(u64, FrameCallback)>> {
        self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_mut(&self) -> RwLockWriteGuard<'_, Option<(u64, FrameCallback)>> {
        self.active.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mock backend. Clones share state, so a test can keep one handle while the
/// engine owns another.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<MockState>,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("devices", &self.state.devices.len())
            .field("open_handles", &self.open_handles())
            .finish()
    }
}

impl MockBackend {
    /// Creates a backend with the given devices.
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self {
            state: Arc::new(MockState {
                devices,
                ..Default::default()
            }),
        }
    }

    /// Creates a backend whose started sessions produce synthetic frames
    /// every `interval` on a background thread.
    pub fn with_synthetic_stream(devices: Vec<MockDevice>, interval: Duration) -> Self {
        Self {
            state: Arc::new(MockState {
                devices,
                synthetic_interval: Some(interval),
                ..Default::default()
            }),
        }
    }

    /// Number of device handles currently held open.
    pub fn open_handles(&self) -> usize {
        self.state.open_handles.load(Ordering::SeqCst)
    }

    /// Delivers `event` to the started session's callback on this thread.
    ///
    /// Returns false if no session is streaming. A concurrent `stop` blocks
    /// until the callback returns.
    pub fn emit(&self, event: HardwareEvent) -> bool {
        let active = self.state.active();
        match active.as_ref() {
            Some((_, callback)) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    /// Shorthand for emitting a frame.
    pub fn emit_frame(&self, raw: RawImage) -> bool {
        self.emit(HardwareEvent::Frame(raw))
    }

    fn device(&self, device_id: &str) -> Result<&MockDevice, BackendError> {
        self.state
            .devices
            .iter()
            .find(|d| d.info.id == device_id)
            .ok_or_else(|| BackendError::DeviceNotFound(device_id.to_string()))
    }
}

impl CameraBackend for MockBackend {
    fn devices(&self) -> Result<Vec<DeviceInfo>, BackendError> {
        Ok(self.state.devices.iter().map(|d| d.info.clone()).collect())
    }

    fn formats(&self, device_id: &str) -> Result<Vec<CaptureFormat>, BackendError> {
        Ok(self.device(device_id)?.formats.clone())
    }

    fn open(&self, device_id: &str) -> Result<Box<dyn HardwareSession>, BackendError> {
        let device = self.device(device_id)?;
        if device.fail_open {
            return Err(BackendError::AccessDenied(device_id.to_string()));
        }

        let handle = self.state.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.open_handles.fetch_add(1, Ordering::SeqCst);
        tracing::info!(device_id, handle, "MockBackend opened device");

        Ok(Box::new(MockSession {
            handle,
            orientation: Orientation::from_degrees(device.info.orientation_degrees),
            state: Arc::clone(&self.state),
            format: None,
            producer: None,
            released: false,
        }))
    }
}

struct Producer {
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// A device handle held by the engine.
struct MockSession {
    handle: u64,
    orientation: Orientation,
    state: Arc<MockState>,
    format: Option<CaptureFormat>,
    producer: Option<Producer>,
    released: bool,
}

impl MockSession {
    fn spawn_producer(
        format: CaptureFormat,
        interval: Duration,
        callback: FrameCallback,
    ) -> Producer {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let thread = std::thread::spawn(move || {
            let mut sequence = 0u64;
            while flag.load(Ordering::Acquire) {
                // Deterministic pattern, only meant to exercise frame handling.
                let pixel_count = (format.width as usize) * (format.height as usize);
                let pixels = (0..pixel_count)
                    .map(|i| ((i as u64 ^ sequence) % 256) as u8)
                    .collect();
                callback(HardwareEvent::Frame(RawImage::new(
                    pixels,
                    format.width,
                    format.height,
                    PixelFormat::Gray8,
                )));
                sequence += 1;
                std::thread::sleep(interval);
            }
        });
        Producer { running, thread }
    }
}

impl HardwareSession for MockSession {
    fn configure(&mut self, format: &CaptureFormat) -> Result<(), BackendError> {
        if self.released {
            return Err(BackendError::Other("configure on released handle".into()));
        }
        self.format = Some(*format);
        Ok(())
    }

    fn start(&mut self, callback: FrameCallback) -> Result<(), BackendError> {
        let format = self
            .format
            .ok_or_else(|| BackendError::StartFailed("session not configured".into()))?;
        if self.released {
            return Err(BackendError::StartFailed("handle released".into()));
        }

        let callback = with_sensor_orientation(callback, self.orientation);
        *self.state.active_mut() = Some((self.handle, Arc::clone(&callback)));
        if let Some(interval) = self.state.synthetic_interval {
            self.producer = Some(Self::spawn_producer(format, interval, callback));
        }
        tracing::debug!(handle = self.handle, %format, "MockSession streaming");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        {
            let mut active = self.state.active_mut();
            if matches!(active.as_ref(), Some((handle, _)) if *handle == self.handle) {
                *active = None;
            }
        }
        if let Some(producer) = self.producer.take() {
            producer.running.store(false, Ordering::Release);
            producer
                .thread
                .join()
                .map_err(|_| BackendError::Other("synthetic producer panicked".into()))?;
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "MockSession stop failed during close");
        }
        self.released = true;
        self.state.open_handles.fetch_sub(1, Ordering::SeqCst);
        tracing::info!(handle = self.handle, "MockSession closed");
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.close();
    }
}
