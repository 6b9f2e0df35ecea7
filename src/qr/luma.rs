//! Conversion of captured frames to 8-bit luma.

use crate::capture::{Frame, PixelFormat};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use thiserror::Error;

/// Failures turning a frame into a luma image.
#[derive(Debug, Error)]
pub enum LumaError {
    #[error("pixel buffer does not match {width}x{height} {format:?}")]
    Layout {
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    #[error("failed to decode compressed frame: {0}")]
    Decode(#[from] image::ImageError),
}

/// Extracts the luma plane of `frame`.
pub fn to_luma(frame: &Frame) -> Result<GrayImage, LumaError> {
    let (width, height) = (frame.width(), frame.height());
    let pixels = frame.pixels();
    let plane = (width as usize) * (height as usize);
    let layout = || LumaError::Layout {
        width,
        height,
        format: frame.format(),
    };

    let image = match frame.format() {
        PixelFormat::Gray8 => GrayImage::from_raw(width, height, pixels.to_vec()),
        // Both carry a full-resolution Y plane we can read directly.
        PixelFormat::Nv12 => {
            GrayImage::from_raw(width, height, pixels.get(..plane).ok_or_else(layout)?.to_vec())
        }
        PixelFormat::Yuyv => {
            GrayImage::from_raw(width, height, pixels.iter().step_by(2).copied().collect())
        }
        PixelFormat::Rgb24 => RgbImage::from_raw(width, height, pixels.to_vec())
            .map(|rgb| DynamicImage::ImageRgb8(rgb).to_luma8()),
        PixelFormat::Rgba32 => RgbaImage::from_raw(width, height, pixels.to_vec())
            .map(|rgba| DynamicImage::ImageRgba8(rgba).to_luma8()),
        PixelFormat::Bgra32 => {
            let swizzled = pixels
                .chunks_exact(4)
                .flat_map(|p| [p[2], p[1], p[0], p[3]])
                .collect();
            RgbaImage::from_raw(width, height, swizzled)
                .map(|rgba| DynamicImage::ImageRgba8(rgba).to_luma8())
        }
        PixelFormat::Mjpeg => {
            Some(image::load_from_memory_with_format(pixels, ImageFormat::Jpeg)?.to_luma8())
        }
    };

    image.ok_or_else(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RawImage;

    fn frame(pixels: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Frame {
        Frame::from_raw(RawImage::new(pixels, width, height, format), 1).unwrap()
    }

    #[test]
    fn test_gray_passthrough() {
        let luma = to_luma(&frame(vec![1, 2, 3, 4], 2, 2, PixelFormat::Gray8)).unwrap();
        assert_eq!(luma.into_raw(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_nv12_uses_y_plane() {
        let mut pixels = vec![10, 20, 30, 40];
        pixels.extend([128, 128]);
        let luma = to_luma(&frame(pixels, 2, 2, PixelFormat::Nv12)).unwrap();
        assert_eq!(luma.into_raw(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_yuyv_uses_even_bytes() {
        let pixels = vec![10, 128, 20, 128, 30, 128, 40, 128];
        let luma = to_luma(&frame(pixels, 2, 2, PixelFormat::Yuyv)).unwrap();
        assert_eq!(luma.into_raw(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_rgb_and_bgra_agree() {
        let rgb = frame(vec![255, 0, 0, 0, 255, 0], 2, 1, PixelFormat::Rgb24);
        let bgra = frame(vec![0, 0, 255, 255, 0, 255, 0, 255], 2, 1, PixelFormat::Bgra32);
        assert_eq!(to_luma(&rgb).unwrap(), to_luma(&bgra).unwrap());
    }

    #[test]
    fn test_white_stays_white() {
        let luma = to_luma(&frame(vec![255; 12], 2, 2, PixelFormat::Rgb24)).unwrap();
        assert!(luma.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_corrupt_jpeg_is_an_error() {
        let corrupt = frame(vec![0xFF, 0xD8, 0x00], 2, 2, PixelFormat::Mjpeg);
        assert!(matches!(to_luma(&corrupt), Err(LumaError::Decode(_))));
    }
}
