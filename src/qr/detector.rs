//! QR feature detection backends.

use image::GrayImage;
use tracing::{debug, trace};

/// Finds and decodes QR codes in an upright luma image.
pub trait QrDetector: Send + Sync {
    /// Returns the decoded payload of every QR code found, in detection order.
    fn detect(&self, image: &GrayImage) -> Vec<String>;
}

/// Detector backed by the `rqrr` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDetector;

impl RqrrDetector {
    /// Creates the detector.
    pub fn new() -> Self {
        Self
    }
}

impl QrDetector for RqrrDetector {
    fn detect(&self, image: &GrayImage) -> Vec<String> {
        let start = std::time::Instant::now();
        let (width, height) = image.dimensions();

        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                image.get_pixel(x as u32, y as u32).0[0]
            });
        let grids = prepared.detect_grids();
        trace!(
            grids = grids.len(),
            detection_ms = start.elapsed().as_millis(),
            "QR grid detection complete"
        );

        grids
            .into_iter()
            .filter_map(|grid| match grid.decode() {
                Ok((meta, content)) => {
                    debug!(meta = ?meta, "Decoded QR grid");
                    Some(content)
                }
                Err(e) => {
                    debug!(error = ?e, "Failed to decode QR grid");
                    None
                }
            })
            .collect()
    }
}
