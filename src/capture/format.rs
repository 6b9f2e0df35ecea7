//! Capture formats, quality presets and orientation metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pixel layout of a captured buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit luma.
    Gray8,
    /// Packed 8-bit RGB.
    Rgb24,
    /// Packed 8-bit RGBA.
    Rgba32,
    /// Packed 8-bit BGRA (Apple native layout).
    Bgra32,
    /// Y plane followed by interleaved UV at half resolution.
    Nv12,
    /// Packed 4:2:2 YUYV.
    Yuyv,
    /// Motion JPEG, one compressed image per buffer.
    Mjpeg,
}

impl PixelFormat {
    /// Expected buffer length for the given dimensions.
    ///
    /// Returns `None` for compressed formats, whose length is not
    /// determined by the dimensions.
    pub fn expected_len(self, width: u32, height: u32) -> Option<usize> {
        let pixels = (width as usize) * (height as usize);
        match self {
            PixelFormat::Gray8 => Some(pixels),
            PixelFormat::Rgb24 => Some(pixels * 3),
            PixelFormat::Rgba32 | PixelFormat::Bgra32 => Some(pixels * 4),
            PixelFormat::Nv12 => Some(pixels + pixels / 2),
            PixelFormat::Yuyv => Some(pixels * 2),
            PixelFormat::Mjpeg => None,
        }
    }

    /// Preference rank used to break ties between equally sized formats.
    /// Lower is preferred.
    pub(crate) fn preference(self) -> u8 {
        match self {
            PixelFormat::Nv12 => 0,
            PixelFormat::Bgra32 => 1,
            PixelFormat::Yuyv => 2,
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba32 => 4,
            PixelFormat::Gray8 => 5,
            PixelFormat::Mjpeg => 6,
        }
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Creates a resolution.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A concrete capture format supported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureFormat {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel layout delivered by the device.
    pub pixel_format: PixelFormat,
    /// Nominal frame rate.
    pub fps: u32,
}

impl CaptureFormat {
    /// Creates a capture format.
    pub const fn new(width: u32, height: u32, pixel_format: PixelFormat, fps: u32) -> Self {
        Self {
            width,
            height,
            pixel_format,
            fps,
        }
    }

    /// Returns the format's dimensions.
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {:?} @{}fps",
            self.width, self.height, self.pixel_format, self.fps
        )
    }
}

/// Caller-requested capture quality.
///
/// Variants are declared in ascending quality, so the derived ordering is
/// the quality ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionPreset {
    /// Device baseline, the smallest format offered.
    VeryLow,
    /// 352x288.
    Low,
    /// 640x480.
    Medium,
    /// 1280x720.
    High,
    /// 1920x1080.
    VeryHigh,
    /// 3840x2160.
    UltraHigh,
    /// The largest format the device offers.
    Max,
}

impl ResolutionPreset {
    /// All presets in ascending quality.
    pub const ALL: [ResolutionPreset; 7] = [
        ResolutionPreset::VeryLow,
        ResolutionPreset::Low,
        ResolutionPreset::Medium,
        ResolutionPreset::High,
        ResolutionPreset::VeryHigh,
        ResolutionPreset::UltraHigh,
        ResolutionPreset::Max,
    ];

    /// Fixed target size for the tier, if it has one.
    ///
    /// `Max` and `VeryLow` are relative to the device and have no fixed size.
    pub fn target(self) -> Option<Resolution> {
        match self {
            ResolutionPreset::UltraHigh => Some(Resolution::new(3840, 2160)),
            ResolutionPreset::VeryHigh => Some(Resolution::new(1920, 1080)),
            ResolutionPreset::High => Some(Resolution::new(1280, 720)),
            ResolutionPreset::Medium => Some(Resolution::new(640, 480)),
            ResolutionPreset::Low => Some(Resolution::new(352, 288)),
            ResolutionPreset::VeryLow | ResolutionPreset::Max => None,
        }
    }

    /// The next tier down, or `None` below `Low`.
    pub fn lower(self) -> Option<ResolutionPreset> {
        match self {
            ResolutionPreset::Max => Some(ResolutionPreset::UltraHigh),
            ResolutionPreset::UltraHigh => Some(ResolutionPreset::VeryHigh),
            ResolutionPreset::VeryHigh => Some(ResolutionPreset::High),
            ResolutionPreset::High => Some(ResolutionPreset::Medium),
            ResolutionPreset::Medium => Some(ResolutionPreset::Low),
            ResolutionPreset::Low | ResolutionPreset::VeryLow => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ResolutionPreset::VeryLow => "veryLow",
            ResolutionPreset::Low => "low",
            ResolutionPreset::Medium => "medium",
            ResolutionPreset::High => "high",
            ResolutionPreset::VeryHigh => "veryHigh",
            ResolutionPreset::UltraHigh => "ultraHigh",
            ResolutionPreset::Max => "max",
        }
    }
}

impl Default for ResolutionPreset {
    fn default() -> Self {
        ResolutionPreset::Medium
    }
}

impl fmt::Display for ResolutionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown preset name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resolution preset: {0}")]
pub struct ParsePresetError(String);

impl FromStr for ResolutionPreset {
    type Err = ParsePresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResolutionPreset::ALL
            .into_iter()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParsePresetError(s.to_string()))
    }
}

/// Rotation needed to bring an image upright, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Already upright.
    #[default]
    Up,
    /// Rotate 90 degrees clockwise.
    Right,
    /// Rotate 180 degrees.
    Down,
    /// Rotate 270 degrees clockwise.
    Left,
}

impl Orientation {
    /// Maps a sensor orientation in degrees to the nearest quarter turn.
    pub fn from_degrees(degrees: u32) -> Self {
        match ((degrees + 45) / 90) % 4 {
            0 => Orientation::Up,
            1 => Orientation::Right,
            2 => Orientation::Down,
            _ => Orientation::Left,
        }
    }

    /// Clockwise rotation in degrees.
    pub fn degrees(self) -> u32 {
        match self {
            Orientation::Up => 0,
            Orientation::Right => 90,
            Orientation::Down => 180,
            Orientation::Left => 270,
        }
    }
}
