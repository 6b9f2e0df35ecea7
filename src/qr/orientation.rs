//! Rotating decoded luma images upright before detection.

use crate::capture::Orientation;
use image::imageops;
use image::GrayImage;

/// Rotates `image` clockwise by `orientation`.
pub fn upright(image: GrayImage, orientation: Orientation) -> GrayImage {
    match orientation {
        Orientation::Up => image,
        Orientation::Right => imageops::rotate90(&image),
        Orientation::Down => imageops::rotate180(&image),
        Orientation::Left => imageops::rotate270(&image),
    }
}
