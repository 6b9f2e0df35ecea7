//! Frame type representing a captured image with metadata.

use super::format::{Orientation, PixelFormat};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// A frame shared between the slot and its consumers.
///
/// The buffer is freed when the last holder drops its reference.
pub type SharedFrame = Arc<Frame>;

/// Reasons a hardware buffer is rejected before it becomes a [`Frame`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("buffer not ready: {0}")]
    NotReady(String),
    #[error("empty frame dimensions {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("empty compressed buffer")]
    EmptyBuffer,
}

/// An image buffer as delivered by a hardware backend.
#[derive(Debug, Clone)]
pub struct RawImage {
    /// Pixel bytes in `format` layout.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Orientation metadata, if the platform reports it.
    pub orientation: Option<Orientation>,
}

impl RawImage {
    /// Creates a raw image with no orientation metadata.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            pixels,
            width,
            height,
            format,
            orientation: None,
        }
    }

    /// Attaches orientation metadata.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }
}

/// A single captured frame.
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    orientation: Option<Orientation>,
    timestamp: Instant,
    sequence: u64,
}

impl Frame {
    /// Validates a raw buffer and wraps it as a frame.
    pub fn from_raw(raw: RawImage, sequence: u64) -> Result<Self, FrameError> {
        if raw.width == 0 || raw.height == 0 {
            return Err(FrameError::EmptyDimensions {
                width: raw.width,
                height: raw.height,
            });
        }
        match raw.format.expected_len(raw.width, raw.height) {
            Some(expected) if expected != raw.pixels.len() => {
                return Err(FrameError::SizeMismatch {
                    expected,
                    actual: raw.pixels.len(),
                });
            }
            None if raw.pixels.is_empty() => return Err(FrameError::EmptyBuffer),
            _ => {}
        }

        Ok(Self {
            pixels: raw.pixels,
            width: raw.width,
            height: raw.height,
            format: raw.format,
            orientation: raw.orientation,
            timestamp: Instant::now(),
            sequence,
        })
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the pixel layout.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Returns orientation metadata, if any was attached.
    #[inline]
    pub fn orientation(&self) -> Option<Orientation> {
        self.orientation
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the per-session sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("orientation", &self.orientation)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}
