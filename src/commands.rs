//! Method-call surface in front of [`CameraEngine`].
//!
//! Callers send a method name plus JSON arguments and get back a [`Reply`].
//! Known failures become `Reply::Error` with a stable code; anything the
//! engine does not classify is returned as a [`CommandError`] so the caller's
//! glue can surface it as a fault instead of a normal reply.

use crate::capture::ResolutionPreset;
use crate::session::{CameraEngine, SessionError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// An incoming request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodCall {
    /// Method name, e.g. `initialize`.
    pub method: String,
    /// Named arguments; `null` when the method takes none.
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    /// Builds a call with the given arguments.
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    fn str_arg(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).and_then(Value::as_str)
    }
}

/// Outcome of a handled call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Reply {
    /// The call succeeded; `result` is `null` for plain acknowledgements.
    Success { result: Value },
    /// A known failure with a stable code.
    Error { code: String, message: String },
    /// The method is not recognized.
    NotImplemented,
}

impl Reply {
    fn ack() -> Self {
        Reply::Success { result: Value::Null }
    }

    fn invalid_arguments(message: impl Into<String>) -> Self {
        Reply::Error {
            code: "InvalidArguments".to_string(),
            message: message.into(),
        }
    }
}

/// An unclassified engine failure.
#[derive(Debug, Error)]
#[error("{method} failed: {source}")]
pub struct CommandError {
    /// Method that failed.
    pub method: String,
    /// Underlying engine error.
    #[source]
    pub source: SessionError,
}

/// Routes method calls to the engine.
pub struct CommandHandler {
    engine: Arc<CameraEngine>,
}

impl CommandHandler {
    /// Creates a handler driving `engine`.
    pub fn new(engine: Arc<CameraEngine>) -> Self {
        Self { engine }
    }

    /// The engine behind this handler.
    pub fn engine(&self) -> &Arc<CameraEngine> {
        &self.engine
    }

    /// Handles one call. May block while a device is opened or released.
    pub fn handle(&self, call: &MethodCall) -> Result<Reply, CommandError> {
        debug!(method = %call.method, "Handling method call");
        let outcome = match call.method.as_str() {
            "availableCameras" => self.available_cameras(),
            "initialize" => self.initialize(call),
            "startScanningForQrCodes" => self.engine.start_scanning().map(|()| Reply::ack()),
            "stopScanningForQrCodes" => self.engine.stop_scanning().map(|()| Reply::ack()),
            "dispose" => Ok(self.dispose(call)),
            other => {
                debug!(method = other, "Unknown method");
                Ok(Reply::NotImplemented)
            }
        };

        outcome.or_else(|error| match error.code() {
            Some(code) => {
                debug!(method = %call.method, code, error = %error, "Method call rejected");
                Ok(Reply::Error {
                    code: code.to_string(),
                    message: error.to_string(),
                })
            }
            None => {
                warn!(method = %call.method, error = %error, "Method call fault");
                Err(CommandError {
                    method: call.method.clone(),
                    source: error,
                })
            }
        })
    }

    fn available_cameras(&self) -> Result<Reply, SessionError> {
        let devices = self.engine.list_devices()?;
        Ok(Reply::Success {
            result: json!(devices),
        })
    }

    fn initialize(&self, call: &MethodCall) -> Result<Reply, SessionError> {
        let Some(device_id) = call.str_arg("cameraName") else {
            return Ok(Reply::invalid_arguments("missing cameraName"));
        };
        let preset = match call.str_arg("resolutionPreset") {
            Some(name) => match name.parse::<ResolutionPreset>() {
                Ok(preset) => preset,
                Err(e) => return Ok(Reply::invalid_arguments(e.to_string())),
            },
            None => ResolutionPreset::default(),
        };

        let info = self.engine.open(device_id, preset)?;
        Ok(Reply::Success {
            result: json!(info),
        })
    }

    fn dispose(&self, call: &MethodCall) -> Reply {
        match call.arguments.get("sessionId").and_then(Value::as_u64) {
            Some(session_id) => self.engine.close(session_id),
            None => self.engine.close_active(),
        }
        Reply::ack()
    }
}
