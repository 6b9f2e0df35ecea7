//! End-to-end session behaviour against the mock backend.

use image::{GrayImage, Luma};
use qrcode::{Color, QrCode};
use qr_camera::capture::{BackendError, HardwareEvent, PixelFormat, RawImage, ScanConfig};
use qr_camera::events::ErrorCode;
use qr_camera::{
    CameraEngine, Event, MockBackend, MockDevice, QrDetector, ResolutionPreset, SessionError,
    SessionState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Reads a `QR:`-prefixed payload from the first pixel row.
struct PayloadRow;

impl QrDetector for PayloadRow {
    fn detect(&self, image: &GrayImage) -> Vec<String> {
        let row: Vec<u8> = (0..image.width())
            .map(|x| image.get_pixel(x, 0).0[0])
            .take_while(|&b| b != 0)
            .collect();
        String::from_utf8(row)
            .ok()
            .and_then(|s| s.strip_prefix("QR:").map(str::to_string))
            .into_iter()
            .collect()
    }
}

fn engine(devices: Vec<MockDevice>) -> (Arc<CameraEngine>, MockBackend) {
    let backend = MockBackend::new(devices);
    let engine = CameraEngine::with_detector(
        Arc::new(backend.clone()),
        Arc::new(PayloadRow),
        ScanConfig::default(),
    );
    (Arc::new(engine), backend)
}

fn payload(text: &str) -> RawImage {
    let width = 64u32;
    let mut pixels = vec![0u8; (width * 8) as usize];
    let encoded = format!("QR:{text}");
    pixels[..encoded.len()].copy_from_slice(encoded.as_bytes());
    RawImage::new(pixels, width, 8, PixelFormat::Gray8)
}

/// Payload written down the left column, bottom to top, as a sensor mounted a
/// quarter turn clockwise would deliver it.
fn turned_payload(text: &str) -> RawImage {
    let (width, height) = (8u32, 64u32);
    let mut pixels = vec![0u8; (width * height) as usize];
    let encoded = format!("QR:{text}");
    for (i, byte) in encoded.bytes().enumerate() {
        pixels[(height as usize - 1 - i) * width as usize] = byte;
    }
    RawImage::new(pixels, width, height, PixelFormat::Gray8)
}

fn qr_code(text: &str) -> RawImage {
    let code = QrCode::new(text.as_bytes()).unwrap();
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let (scale, quiet) = (6, 4);
    let side = (modules + 2 * quiet) * scale;
    let image = GrayImage::from_fn(side, side, |x, y| {
        let range = quiet..quiet + modules;
        let (mx, my) = (x / scale, y / scale);
        let dark = range.contains(&mx)
            && range.contains(&my)
            && colors[((my - quiet) * modules + (mx - quiet)) as usize] == Color::Dark;
        Luma([if dark { 0 } else { 255 }])
    });
    RawImage::new(image.into_raw(), side, side, PixelFormat::Gray8)
}

fn blank(value: u8) -> RawImage {
    RawImage::new(vec![value; 64], 8, 8, PixelFormat::Gray8)
}

#[tokio::test]
async fn test_scan_lifecycle_decodes_and_releases_hardware() {
    let (engine, backend) = engine(vec![MockDevice::standard("0", (1920, 1080))]);
    let scans = engine.scan_events();
    let session = engine.session_events();

    let info = engine.open("0", ResolutionPreset::Low).unwrap();
    assert_eq!((info.preview_width, info.preview_height), (352, 288));
    assert_eq!((info.capture_width, info.capture_height), (352, 288));

    engine.start_scanning().unwrap();
    assert!(backend.emit_frame(payload("hello")));

    let event = timeout(WAIT, scans.recv()).await.unwrap();
    assert_eq!(
        event,
        Some(Event::QrDecoded {
            text: "hello".to_string()
        })
    );
    assert_eq!(event.map(|e| e.to_wire()), Some(serde_json::json!("hello")));

    engine.stop_scanning().unwrap();
    engine.close(info.session_id);

    assert_eq!(backend.open_handles(), 0);
    assert_eq!(engine.state(), SessionState::Closed);
    assert_eq!(
        timeout(WAIT, session.recv()).await.unwrap(),
        Some(Event::SessionClosing)
    );
}

#[tokio::test]
async fn test_default_engine_decodes_real_qr_code() {
    let backend = MockBackend::new(vec![MockDevice::standard("0", (640, 480))]);
    let engine = CameraEngine::new(Arc::new(backend.clone()));
    let scans = engine.scan_events();

    engine.open("0", ResolutionPreset::Medium).unwrap();
    engine.start_scanning().unwrap();
    assert!(backend.emit_frame(qr_code("hello")));

    assert_eq!(
        timeout(WAIT, scans.recv()).await.unwrap(),
        Some(Event::QrDecoded {
            text: "hello".to_string()
        })
    );
    engine.close_active();
    assert_eq!(backend.open_handles(), 0);
}

#[tokio::test]
async fn test_sensor_orientation_rotates_frames_before_decode() {
    let (engine, backend) = engine(vec![
        MockDevice::standard("0", (640, 480)).with_orientation(90)
    ]);
    let scans = engine.scan_events();
    engine.open("0", ResolutionPreset::Medium).unwrap();
    engine.start_scanning().unwrap();

    backend.emit_frame(turned_payload("turned"));

    assert_eq!(
        timeout(WAIT, scans.recv()).await.unwrap(),
        Some(Event::QrDecoded {
            text: "turned".to_string()
        })
    );
}

#[test]
fn test_max_preset_on_high_only_device() {
    let (engine, _) = engine(vec![MockDevice::standard("0", (1280, 720))]);
    let info = engine.open("0", ResolutionPreset::Max).unwrap();
    assert_eq!((info.capture_width, info.capture_height), (1280, 720));
}

#[tokio::test]
async fn test_malformed_buffer_reports_error_and_keeps_slot() {
    let (engine, backend) = engine(vec![MockDevice::standard("0", (640, 480))]);
    let session = engine.session_events();
    engine.open("0", ResolutionPreset::Medium).unwrap();

    backend.emit_frame(blank(7));
    backend.emit_frame(RawImage::new(vec![0; 10], 8, 8, PixelFormat::Gray8));

    let event = timeout(WAIT, session.recv()).await.unwrap();
    assert!(matches!(
        event,
        Some(Event::Error {
            code: ErrorCode::MalformedFrame,
            ..
        })
    ));

    let frame = engine.copy_latest_frame().unwrap();
    assert_eq!(frame.sequence(), 1);
    assert_eq!(frame.pixels()[0], 7);
    assert_eq!(engine.state(), SessionState::Ready);

    // The pipeline keeps going after a bad buffer.
    backend.emit_frame(blank(8));
    assert_eq!(engine.copy_latest_frame().map(|f| f.pixels()[0]), Some(8));
}

#[tokio::test]
async fn test_decode_failure_does_not_stop_scanning() {
    let (engine, backend) = engine(vec![MockDevice::standard("0", (640, 480))]);
    let scans = engine.scan_events();
    engine.open("0", ResolutionPreset::Medium).unwrap();
    engine.start_scanning().unwrap();

    backend.emit_frame(blank(0));
    backend.emit(HardwareEvent::BufferNotReady("dropped".into()));
    backend.emit_frame(payload("after"));

    let event = timeout(WAIT, scans.recv()).await.unwrap();
    assert_eq!(
        event,
        Some(Event::QrDecoded {
            text: "after".to_string()
        })
    );
    assert_eq!(engine.state(), SessionState::ScanningQr);
}

#[test]
fn test_concurrent_opens_hold_one_device() {
    let (engine, backend) = engine(vec![
        MockDevice::standard("0", (1280, 720)),
        MockDevice::standard("1", (640, 480)),
    ]);

    let handles: Vec<_> = ["0", "1"]
        .into_iter()
        .map(|id| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.open(id, ResolutionPreset::High))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(backend.open_handles(), 1);
    assert_eq!(engine.state(), SessionState::Ready);
    assert_eq!(engine.session_id(), Some(2));

    engine.close_active();
    assert_eq!(backend.open_handles(), 0);
}

#[test]
fn test_scanning_misuse_leaves_state_unchanged() {
    let (engine, _) = engine(vec![MockDevice::standard("0", (640, 480))]);
    engine.open("0", ResolutionPreset::Medium).unwrap();

    assert!(matches!(
        engine.stop_scanning(),
        Err(SessionError::NotScanning)
    ));
    assert_eq!(engine.state(), SessionState::Ready);

    engine.start_scanning().unwrap();
    assert!(matches!(
        engine.start_scanning(),
        Err(SessionError::AlreadyScanning)
    ));
    assert_eq!(engine.state(), SessionState::ScanningQr);
}

#[test]
fn test_close_twice_is_a_no_op() {
    let (engine, backend) = engine(vec![MockDevice::standard("0", (640, 480))]);
    let info = engine.open("0", ResolutionPreset::Medium).unwrap();

    engine.close(info.session_id);
    engine.close(info.session_id);

    assert_eq!(engine.state(), SessionState::Closed);
    assert_eq!(backend.open_handles(), 0);
}

#[test]
fn test_open_failure_returns_device_access() {
    let (engine, backend) = engine(vec![MockDevice::standard("0", (640, 480)).failing_open()]);

    let result = engine.open("0", ResolutionPreset::High);
    assert!(matches!(
        result,
        Err(SessionError::DeviceAccess(BackendError::AccessDenied(_)))
    ));
    assert_eq!(engine.state(), SessionState::Closed);
    assert_eq!(backend.open_handles(), 0);
}

#[test]
fn test_no_dispatch_after_close() {
    let (engine, backend) = engine(vec![MockDevice::standard("0", (640, 480))]);
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    engine.set_frame_listener(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let info = engine.open("0", ResolutionPreset::Medium).unwrap();
    backend.emit_frame(blank(1));
    engine.close(info.session_id);

    assert!(!backend.emit_frame(blank(2)));
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert!(engine.copy_latest_frame().is_none());
}

#[tokio::test]
async fn test_synthetic_stream_notifies_display() {
    let backend = MockBackend::with_synthetic_stream(
        vec![MockDevice::standard("0", (352, 288))],
        Duration::from_millis(5),
    );
    let engine = CameraEngine::with_detector(
        Arc::new(backend.clone()),
        Arc::new(PayloadRow),
        ScanConfig::default(),
    );
    let (tx, rx) = async_channel::bounded::<()>(1);
    engine.set_frame_listener(move || {
        let _ = tx.try_send(());
    });

    let info = engine.open("0", ResolutionPreset::Low).unwrap();
    timeout(WAIT, rx.recv()).await.unwrap().unwrap();

    let frame = engine.copy_latest_frame().unwrap();
    assert_eq!((frame.width(), frame.height()), (352, 288));

    engine.close(info.session_id);
    assert_eq!(backend.open_handles(), 0);
    assert!(engine.stats().frames_published >= 1);
}
