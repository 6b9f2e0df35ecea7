//! QR code scanning as a consumer of the frame stream.
//!
//! Frames are converted to luma, rotated upright using their orientation
//! metadata, and handed to a [`QrDetector`]. Only the first code found in a
//! frame is reported.

mod detector;
mod luma;
mod orientation;
mod pipeline;

pub use detector::{QrDetector, RqrrDetector};
pub use luma::{to_luma, LumaError};
pub use orientation::upright;
pub use pipeline::{QrDecodePipeline, QrDecoder};

use serde::{Deserialize, Serialize};

/// Trade-off between decode accuracy and latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeAccuracy {
    /// Decode at full capture resolution.
    #[default]
    High,
    /// Downscale to `fast_max_dimension` before detection.
    Fast,
}
