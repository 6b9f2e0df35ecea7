//! Hardware abstraction for camera devices.
//!
//! Platform capture stacks (request builders, capture sessions, V4L2
//! streams) all reduce to one capability set: enumerate, open, configure,
//! start with a frame callback, stop and close. The session state machine is
//! written once against these traits.

use super::format::{CaptureFormat, Orientation};
use super::frame::RawImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a hardware backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("camera access denied: {0}")]
    AccessDenied(String),
    #[error("camera is busy: {0}")]
    Busy(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to start capture: {0}")]
    StartFailed(String),
    #[error("camera backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// True for failures that mean the device could not be acquired.
    ///
    /// Anything else is an unexpected backend state.
    pub fn is_access_failure(&self) -> bool {
        !matches!(self, BackendError::Other(_))
    }
}

/// Which way a camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    Front,
    Back,
    External,
}

/// A camera visible to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Backend-specific identifier passed back to `open`.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Lens direction.
    pub facing: LensFacing,
    /// Sensor mounting rotation, clockwise.
    pub orientation_degrees: u32,
}

/// Something the hardware reports on its callback thread.
#[derive(Debug, Clone)]
pub enum HardwareEvent {
    /// A captured buffer.
    Frame(RawImage),
    /// The callback fired but the buffer cannot be read.
    BufferNotReady(String),
    /// The device reported an asynchronous error.
    Fault(String),
}

/// Callback invoked from the hardware thread.
///
/// Implementations must return quickly and never block.
pub type FrameCallback = Arc<dyn Fn(HardwareEvent) + Send + Sync>;

/// Wraps `callback` so frames without orientation metadata carry the
/// sensor's mounting rotation.
pub fn with_sensor_orientation(
    callback: FrameCallback,
    orientation: Orientation,
) -> FrameCallback {
    Arc::new(move |event| match event {
        HardwareEvent::Frame(raw) if raw.orientation.is_none() => {
            callback(HardwareEvent::Frame(raw.with_orientation(orientation)))
        }
        other => callback(other),
    })
}

/// A camera backend able to enumerate and open devices.
pub trait CameraBackend: Send + Sync {
    /// Lists available devices.
    fn devices(&self) -> Result<Vec<DeviceInfo>, BackendError>;

    /// Lists the capture formats a device supports.
    fn formats(&self, device_id: &str) -> Result<Vec<CaptureFormat>, BackendError>;

    /// Acquires exclusive access to a device.
    ///
    /// May block for tens of milliseconds.
    fn open(&self, device_id: &str) -> Result<Box<dyn HardwareSession>, BackendError>;
}

/// An exclusively owned, opened device.
pub trait HardwareSession: Send {
    /// Applies the negotiated capture format before streaming.
    fn configure(&mut self, format: &CaptureFormat) -> Result<(), BackendError>;

    /// Starts streaming; `callback` is invoked once per hardware event.
    fn start(&mut self, callback: FrameCallback) -> Result<(), BackendError>;

    /// Stops streaming. No callbacks are issued after this returns.
    fn stop(&mut self) -> Result<(), BackendError>;

    /// Releases the device. Idempotent.
    fn close(&mut self);
}
