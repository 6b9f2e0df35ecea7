//! Camera input, capture formats and frame handling.
//!
//! This module defines the hardware boundary: the [`CameraBackend`] and
//! [`HardwareSession`] traits, the formats a device offers, the resolution
//! negotiator that picks one of them, and the [`Frame`] type the rest of the
//! engine passes around.

mod backend;
mod config;
mod format;
mod frame;
mod mock;
#[cfg(feature = "camera")]
mod native;
mod negotiate;

pub use backend::{
    BackendError, CameraBackend, DeviceInfo, FrameCallback, HardwareEvent, HardwareSession,
    LensFacing,
};
pub use config::{CaptureConfig, ConfigError, FileConfig, OutputConfig, ScanConfig};
pub use format::{
    CaptureFormat, Orientation, ParsePresetError, PixelFormat, Resolution, ResolutionPreset,
};
pub use frame::{Frame, FrameError, RawImage, SharedFrame};
pub use mock::{MockBackend, MockDevice};
#[cfg(feature = "camera")]
pub use native::NativeBackend;
pub use negotiate::{negotiate, negotiate_with_fps, NegotiationError};
