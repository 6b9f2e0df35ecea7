//! Resolution negotiation.
//!
//! Maps a [`ResolutionPreset`] onto a concrete [`CaptureFormat`] the device
//! supports. The requested tier is tried first, then each lower tier in
//! strict order, and finally the device baseline (its smallest format).
//! Frame rate only breaks ties between formats of the same size.

use super::format::{CaptureFormat, ResolutionPreset};
use std::cmp::Reverse;
use thiserror::Error;

/// Negotiation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("unsupported configuration: device offers no capture format for preset {0}")]
    UnsupportedConfiguration(ResolutionPreset),
}

/// Picks the best format at or below `preset` from `supported`.
///
/// Deterministic for a given input: among formats of the same size the
/// preferred pixel format wins, then the higher frame rate.
pub fn negotiate(
    preset: ResolutionPreset,
    supported: &[CaptureFormat],
) -> Result<CaptureFormat, NegotiationError> {
    negotiate_with_fps(preset, supported, u32::MAX)
}

/// Like [`negotiate`], with frame rates above `max_fps` ranked last.
///
/// Among otherwise equal formats the highest rate within the cap wins. When
/// every candidate exceeds the cap, the slowest one is taken.
pub fn negotiate_with_fps(
    preset: ResolutionPreset,
    supported: &[CaptureFormat],
    max_fps: u32,
) -> Result<CaptureFormat, NegotiationError> {
    if supported.is_empty() {
        return Err(NegotiationError::UnsupportedConfiguration(preset));
    }

    if preset == ResolutionPreset::Max {
        if let Some(format) = largest(supported, max_fps) {
            tracing::debug!(%format, "Max preset resolved to largest format");
            return Ok(format);
        }
    }

    let mut tier = Some(preset);
    while let Some(current) = tier {
        if let Some(target) = current.target() {
            let exact = supported
                .iter()
                .filter(|f| f.resolution() == target)
                .copied()
                .min_by_key(|f| (f.pixel_format.preference(), fps_rank(f.fps, max_fps)));
            if let Some(format) = exact {
                if current != preset {
                    tracing::debug!(requested = %preset, chosen = %current, "Degraded preset");
                }
                return Ok(format);
            }
        }
        tier = current.lower();
    }

    let format = baseline(supported, max_fps).ok_or(NegotiationError::UnsupportedConfiguration(preset))?;
    tracing::debug!(requested = %preset, %format, "Falling back to device baseline");
    Ok(format)
}

// Rates within the cap sort first, fastest first; the rest slowest first.
fn fps_rank(fps: u32, max_fps: u32) -> (bool, Reverse<u32>, u32) {
    if fps <= max_fps {
        (false, Reverse(fps), 0)
    } else {
        (true, Reverse(0), fps)
    }
}

fn largest(supported: &[CaptureFormat], max_fps: u32) -> Option<CaptureFormat> {
    supported.iter().copied().min_by_key(|f| {
        (
            Reverse(f.resolution().area()),
            Reverse(f.width),
            f.pixel_format.preference(),
            fps_rank(f.fps, max_fps),
        )
    })
}

fn baseline(supported: &[CaptureFormat], max_fps: u32) -> Option<CaptureFormat> {
    supported.iter().copied().min_by_key(|f| {
        (
            f.resolution().area(),
            f.width,
            f.pixel_format.preference(),
            fps_rank(f.fps, max_fps),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::format::PixelFormat;
    use proptest::prelude::*;

    fn fmt(width: u32, height: u32) -> CaptureFormat {
        CaptureFormat::new(width, height, PixelFormat::Nv12, 30)
    }

    fn full_range() -> Vec<CaptureFormat> {
        vec![
            fmt(3840, 2160),
            fmt(1920, 1080),
            fmt(1280, 720),
            fmt(640, 480),
            fmt(352, 288),
            fmt(176, 144),
        ]
    }

    #[test]
    fn test_exact_tier() {
        let chosen = negotiate(ResolutionPreset::Low, &full_range()).unwrap();
        assert_eq!((chosen.width, chosen.height), (352, 288));
    }

    #[test]
    fn test_max_on_high_only_device_degrades() {
        let supported = vec![fmt(1280, 720), fmt(640, 480), fmt(352, 288)];
        let chosen = negotiate(ResolutionPreset::Max, &supported).unwrap();
        assert_eq!((chosen.width, chosen.height), (1280, 720));
    }

    #[test]
    fn test_degradation_is_monotonic_and_skips_no_tier() {
        // Each removal of the top remaining tier must yield exactly the next one.
        let mut supported = full_range();
        let expected = [
            (3840, 2160),
            (1920, 1080),
            (1280, 720),
            (640, 480),
            (352, 288),
            (176, 144),
        ];
        for (width, height) in expected {
            let chosen = negotiate(ResolutionPreset::UltraHigh, &supported).unwrap();
            assert_eq!((chosen.width, chosen.height), (width, height));
            supported.retain(|f| f.width != width);
        }
        assert!(supported.is_empty());
    }

    #[test]
    fn test_baseline_when_no_tier_matches() {
        let supported = vec![fmt(800, 600), fmt(320, 240)];
        let chosen = negotiate(ResolutionPreset::Medium, &supported).unwrap();
        assert_eq!((chosen.width, chosen.height), (320, 240));
    }

    #[test]
    fn test_very_low_is_baseline() {
        let chosen = negotiate(ResolutionPreset::VeryLow, &full_range()).unwrap();
        assert_eq!((chosen.width, chosen.height), (176, 144));
    }

    #[test]
    fn test_empty_capabilities_fail() {
        assert_eq!(
            negotiate(ResolutionPreset::High, &[]),
            Err(NegotiationError::UnsupportedConfiguration(ResolutionPreset::High))
        );
    }

    #[test]
    fn test_tie_break_prefers_pixel_format_then_fps() {
        let supported = vec![
            CaptureFormat::new(640, 480, PixelFormat::Mjpeg, 60),
            CaptureFormat::new(640, 480, PixelFormat::Yuyv, 15),
            CaptureFormat::new(640, 480, PixelFormat::Yuyv, 30),
        ];
        let chosen = negotiate(ResolutionPreset::Medium, &supported).unwrap();
        assert_eq!(chosen, CaptureFormat::new(640, 480, PixelFormat::Yuyv, 30));
    }

    #[test]
    fn test_fps_cap_prefers_fastest_rate_within_cap() {
        let supported = vec![
            CaptureFormat::new(640, 480, PixelFormat::Nv12, 60),
            CaptureFormat::new(640, 480, PixelFormat::Nv12, 30),
            CaptureFormat::new(640, 480, PixelFormat::Nv12, 15),
        ];
        let pick = |max_fps| {
            negotiate_with_fps(ResolutionPreset::Medium, &supported, max_fps)
                .unwrap()
                .fps
        };
        assert_eq!(pick(30), 30);
        assert_eq!(pick(45), 30);
        assert_eq!(pick(10), 15);
        assert_eq!(negotiate(ResolutionPreset::Medium, &supported).unwrap().fps, 60);
    }

    #[test]
    fn test_fps_cap_never_changes_resolution() {
        let supported = vec![
            CaptureFormat::new(1280, 720, PixelFormat::Nv12, 60),
            CaptureFormat::new(640, 480, PixelFormat::Nv12, 30),
        ];
        let chosen = negotiate_with_fps(ResolutionPreset::High, &supported, 30).unwrap();
        assert_eq!(chosen, CaptureFormat::new(1280, 720, PixelFormat::Nv12, 60));

        let baseline = negotiate_with_fps(ResolutionPreset::Max, &supported, 30).unwrap();
        assert_eq!((baseline.width, baseline.height), (1280, 720));
    }

    fn arb_format() -> impl Strategy<Value = CaptureFormat> {
        let sizes = prop::sample::select(vec![
            (3840, 2160),
            (1920, 1080),
            (1280, 720),
            (1024, 768),
            (640, 480),
            (352, 288),
            (320, 240),
            (176, 144),
        ]);
        let formats = prop::sample::select(vec![
            PixelFormat::Nv12,
            PixelFormat::Yuyv,
            PixelFormat::Mjpeg,
            PixelFormat::Bgra32,
        ]);
        (sizes, formats, 1u32..=60)
            .prop_map(|((w, h), pf, fps)| CaptureFormat::new(w, h, pf, fps))
    }

    fn arb_preset() -> impl Strategy<Value = ResolutionPreset> {
        prop::sample::select(ResolutionPreset::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_result_is_supported_and_not_above_preset(
            preset in arb_preset(),
            supported in prop::collection::vec(arb_format(), 1..8),
        ) {
            let chosen = negotiate(preset, &supported).unwrap();
            prop_assert!(supported.contains(&chosen));
            if let Some(target) = preset.target() {
                let smallest = supported.iter().map(|f| f.resolution().area()).min().unwrap();
                prop_assert!(
                    chosen.resolution().area() <= target.area()
                        || chosen.resolution().area() == smallest
                );
            }
        }

        #[test]
        fn prop_deterministic(
            preset in arb_preset(),
            supported in prop::collection::vec(arb_format(), 0..8),
        ) {
            prop_assert_eq!(negotiate(preset, &supported), negotiate(preset, &supported));
        }

        #[test]
        fn prop_fps_cap_keeps_uncapped_resolution(
            preset in arb_preset(),
            supported in prop::collection::vec(arb_format(), 1..8),
            max_fps in 1u32..=60,
        ) {
            let capped = negotiate_with_fps(preset, &supported, max_fps).unwrap();
            let uncapped = negotiate(preset, &supported).unwrap();
            prop_assert_eq!(capped.resolution(), uncapped.resolution());
            prop_assert!(supported.contains(&capped));
        }

        #[test]
        fn prop_fails_only_without_formats(
            preset in arb_preset(),
            supported in prop::collection::vec(arb_format(), 0..4),
        ) {
            prop_assert_eq!(negotiate(preset, &supported).is_err(), supported.is_empty());
        }
    }
}
