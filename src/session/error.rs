//! Control-path error taxonomy.

use crate::capture::{BackendError, NegotiationError};
use thiserror::Error;

/// Errors returned synchronously by session commands.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot access camera: {0}")]
    DeviceAccess(BackendError),
    #[error(transparent)]
    UnsupportedConfiguration(#[from] NegotiationError),
    #[error("QR scanning is already active")]
    AlreadyScanning,
    #[error("QR scanning is not active")]
    NotScanning,
    #[error("no camera session is open")]
    NotOpen,
    #[error("unexpected camera backend failure: {0}")]
    Backend(BackendError),
    #[error("failed to spawn QR decode worker: {0}")]
    Worker(#[from] std::io::Error),
}

impl SessionError {
    /// Classifies a backend failure as an access error or an unexpected fault.
    pub fn from_backend(error: BackendError) -> Self {
        if error.is_access_failure() {
            SessionError::DeviceAccess(error)
        } else {
            SessionError::Backend(error)
        }
    }

    /// Stable code reported to callers for known error kinds.
    ///
    /// `None` marks a fault that should be propagated, not reported.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            SessionError::DeviceAccess(_) => Some("CameraAccess"),
            SessionError::UnsupportedConfiguration(_) => Some("UnsupportedConfiguration"),
            SessionError::AlreadyScanning => Some("AlreadyScanning"),
            SessionError::NotScanning => Some("NotScanning"),
            SessionError::NotOpen => Some("CameraNotOpen"),
            SessionError::Backend(_) | SessionError::Worker(_) => None,
        }
    }
}
