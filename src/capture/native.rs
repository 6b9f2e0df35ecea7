//! Desktop camera backend using nokhwa.
//!
//! `nokhwa::Camera` is not guaranteed to be `Send`, so each streaming
//! session constructs its camera on a dedicated capture thread and keeps it
//! there until `stop`.

use super::backend::{
    with_sensor_orientation, BackendError, CameraBackend, DeviceInfo, FrameCallback, HardwareEvent, HardwareSession,
    LensFacing,
};
use super::format::{CaptureFormat, Orientation, PixelFormat};
use super::frame::RawImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
};
use nokhwa::Camera as NokhwaCamera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Backend over the platform's native capture API.
#[derive(Debug, Default)]
pub struct NativeBackend;

impl NativeBackend {
    /// Creates the backend.
    pub fn new() -> Self {
        Self
    }
}

fn parse_index(device_id: &str) -> CameraIndex {
    device_id
        .parse::<u32>()
        .map(CameraIndex::Index)
        .unwrap_or_else(|_| CameraIndex::String(device_id.to_string()))
}

fn pixel_format(format: FrameFormat) -> PixelFormat {
    match format {
        FrameFormat::MJPEG => PixelFormat::Mjpeg,
        FrameFormat::YUYV => PixelFormat::Yuyv,
        FrameFormat::NV12 => PixelFormat::Nv12,
        FrameFormat::GRAY => PixelFormat::Gray8,
        _ => PixelFormat::Rgb24,
    }
}

fn frame_format(format: PixelFormat) -> FrameFormat {
    match format {
        PixelFormat::Mjpeg => FrameFormat::MJPEG,
        PixelFormat::Yuyv => FrameFormat::YUYV,
        PixelFormat::Nv12 => FrameFormat::NV12,
        PixelFormat::Gray8 => FrameFormat::GRAY,
        PixelFormat::Rgb24 | PixelFormat::Rgba32 | PixelFormat::Bgra32 => FrameFormat::RAWRGB,
    }
}

fn open_camera(device_id: &str, requested: RequestedFormatType) -> Result<NokhwaCamera, BackendError> {
    NokhwaCamera::new(
        parse_index(device_id),
        RequestedFormat::new::<RgbFormat>(requested),
    )
    .map_err(|e| BackendError::OpenFailed(e.to_string()))
}

impl CameraBackend for NativeBackend {
    fn devices(&self) -> Result<Vec<DeviceInfo>, BackendError> {
        let devices =
            nokhwa::query(ApiBackend::Auto).map_err(|e| BackendError::Other(e.to_string()))?;

        Ok(devices
            .into_iter()
            .map(|d| DeviceInfo {
                id: d.index().to_string(),
                name: d.human_name(),
                facing: LensFacing::External,
                orientation_degrees: 0,
            })
            .collect())
    }

    fn formats(&self, device_id: &str) -> Result<Vec<CaptureFormat>, BackendError> {
        let mut camera = open_camera(device_id, RequestedFormatType::AbsoluteHighestResolution)?;
        let formats = camera
            .compatible_camera_formats()
            .map_err(|e| BackendError::ConfigFailed(e.to_string()))?;

        Ok(formats
            .into_iter()
            .map(|f| {
                CaptureFormat::new(
                    f.resolution().width(),
                    f.resolution().height(),
                    pixel_format(f.format()),
                    f.frame_rate(),
                )
            })
            .collect())
    }

    fn open(&self, device_id: &str) -> Result<Box<dyn HardwareSession>, BackendError> {
        let info = self
            .devices()?
            .into_iter()
            .find(|d| d.id == device_id)
            .ok_or_else(|| BackendError::DeviceNotFound(device_id.to_string()))?;
        tracing::info!(device_id, "Native camera selected");

        Ok(Box::new(NativeSession {
            device_id: device_id.to_string(),
            orientation: Orientation::from_degrees(info.orientation_degrees),
            format: None,
            worker: None,
        }))
    }
}

struct Worker {
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

struct NativeSession {
    device_id: String,
    orientation: Orientation,
    format: Option<CaptureFormat>,
    worker: Option<Worker>,
}

impl HardwareSession for NativeSession {
    fn configure(&mut self, format: &CaptureFormat) -> Result<(), BackendError> {
        self.format = Some(*format);
        Ok(())
    }

    fn start(&mut self, callback: FrameCallback) -> Result<(), BackendError> {
        let format = self
            .format
            .ok_or_else(|| BackendError::StartFailed("session not configured".into()))?;
        if self.worker.is_some() {
            return Ok(());
        }

        let callback = with_sensor_orientation(callback, self.orientation);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let device_id = self.device_id.clone();
        let (ready_tx, ready_rx) = async_channel::bounded::<Result<(), BackendError>>(1);

        let thread = std::thread::spawn(move || {
            let requested = RequestedFormatType::Exact(CameraFormat::new_from(
                format.width,
                format.height,
                frame_format(format.pixel_format),
                format.fps,
            ));
            let opened = open_camera(&device_id, requested).and_then(|mut camera| {
                camera
                    .open_stream()
                    .map_err(|e| BackendError::StartFailed(e.to_string()))?;
                Ok(camera)
            });
            let mut camera = match opened {
                Ok(camera) => {
                    let _ = ready_tx.send_blocking(Ok(()));
                    camera
                }
                Err(e) => {
                    let _ = ready_tx.send_blocking(Err(e));
                    return;
                }
            };

            while flag.load(Ordering::Acquire) {
                let event = match camera.frame() {
                    Ok(buffer) => match buffer.decode_image::<RgbFormat>() {
                        Ok(image) => {
                            let (width, height) = (image.width(), image.height());
                            HardwareEvent::Frame(RawImage::new(
                                image.into_raw(),
                                width,
                                height,
                                PixelFormat::Rgb24,
                            ))
                        }
                        Err(e) => HardwareEvent::BufferNotReady(e.to_string()),
                    },
                    Err(e) => HardwareEvent::BufferNotReady(e.to_string()),
                };
                callback(event);
            }

            if let Err(e) = camera.stop_stream() {
                tracing::warn!(error = %e, "Failed to stop native stream");
            }
        });

        let ready = ready_rx
            .recv_blocking()
            .map_err(|_| BackendError::StartFailed("capture thread exited".into()))?;
        if let Err(e) = ready {
            let _ = thread.join();
            return Err(e);
        }

        self.worker = Some(Worker { running, thread });
        tracing::info!(device_id = %self.device_id, %format, "Native capture started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        if let Some(worker) = self.worker.take() {
            worker.running.store(false, Ordering::Release);
            worker
                .thread
                .join()
                .map_err(|_| BackendError::Other("capture thread panicked".into()))?;
            tracing::info!(device_id = %self.device_id, "Native capture stopped");
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "Native session stop failed during close");
        }
        self.format = None;
    }
}

impl Drop for NativeSession {
    fn drop(&mut self) {
        self.close();
    }
}
