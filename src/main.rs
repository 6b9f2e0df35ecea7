//! QR Camera CLI
//!
//! Lists cameras, or opens one and prints every QR code it sees.

use chrono::Utc;
use clap::{Parser, Subcommand};
use qr_camera::{
    capture::{CameraBackend, FileConfig},
    metrics::{MetricsRegistry, MetricsSnapshot},
    CameraEngine, Event, ResolutionPreset, RqrrDetector,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "qr-camera", version, about = "Camera capture with QR code scanning")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print available cameras as JSON
    Devices,
    /// Open a camera and print decoded QR codes
    Scan {
        /// Device identifier (defaults to the first camera)
        #[arg(long)]
        device: Option<String>,
        /// Resolution preset (veryLow, low, medium, high, veryHigh, ultraHigh, max)
        #[arg(long)]
        preset: Option<ResolutionPreset>,
        /// Stop after this many seconds (0 runs until interrupted)
        #[arg(long)]
        seconds: Option<u64>,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("QR Camera v{}", qr_camera::VERSION);

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Devices => list_devices(),
        Command::Scan {
            device,
            preset,
            seconds,
            config,
        } => scan(device, preset, seconds, config),
    };

    if let Err(message) = result {
        eprintln!("{}", message);
        std::process::exit(1);
    }
}

#[cfg(feature = "camera")]
fn backend() -> Arc<dyn CameraBackend> {
    Arc::new(qr_camera::capture::NativeBackend::new())
}

#[cfg(not(feature = "camera"))]
fn backend() -> Arc<dyn CameraBackend> {
    info!("Built without the `camera` feature, using a synthetic mock device");
    Arc::new(qr_camera::MockBackend::with_synthetic_stream(
        vec![qr_camera::MockDevice::standard("mock0", (1280, 720))],
        Duration::from_millis(33),
    ))
}

fn list_devices() -> Result<(), String> {
    let engine = CameraEngine::new(backend());
    let devices = engine
        .list_devices()
        .map_err(|e| format!("Failed to list cameras: {}", e))?;
    let json = serde_json::to_string_pretty(&devices)
        .map_err(|e| format!("Failed to encode device list: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn scan(
    device: Option<String>,
    preset: Option<ResolutionPreset>,
    seconds: Option<u64>,
    config_path: Option<PathBuf>,
) -> Result<(), String> {
    let config = match config_path {
        Some(path) => FileConfig::from_file(&path)
            .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?,
        None => FileConfig::default(),
    };

    let engine = CameraEngine::with_detector(
        backend(),
        Arc::new(RqrrDetector::new()),
        config.scan.clone(),
    )
    .with_max_fps(config.capture.fps);

    let device_id = match device.or(config.capture.device_id.clone()) {
        Some(id) => id,
        None => engine
            .list_devices()
            .map_err(|e| format!("Failed to list cameras: {}", e))?
            .into_iter()
            .next()
            .map(|d| d.id)
            .ok_or_else(|| "No cameras available".to_string())?,
    };
    let preset = preset.unwrap_or(config.capture.preset);
    let seconds = seconds.unwrap_or(config.output.scan_seconds);

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .map_err(|e| format!("Failed to install Ctrl-C handler: {}", e))?;

    let registry = MetricsRegistry::new().map_err(|e| format!("Metrics setup failed: {}", e))?;
    let metrics = start_metrics(registry, config.output.metrics_port);

    let session_events = engine.session_events();
    let scan_events = engine.scan_events();

    let info = engine
        .open(&device_id, preset)
        .map_err(|e| format!("Failed to open camera {}: {}", device_id, e))?;
    info!(
        session_id = info.session_id,
        width = info.capture_width,
        height = info.capture_height,
        "Camera open"
    );
    engine
        .start_scanning()
        .map_err(|e| format!("Failed to start scanning: {}", e))?;

    let deadline = (seconds > 0).then(|| Instant::now() + Duration::from_secs(seconds));
    while running.load(Ordering::SeqCst) && deadline.map_or(true, |d| Instant::now() < d) {
        while let Some(event) = scan_events.try_recv() {
            if let Event::QrDecoded { text } = event {
                println!("{} {}", Utc::now().to_rfc3339(), text);
            }
        }
        while let Some(event) = session_events.try_recv() {
            warn!(event = %event.to_wire(), "Session event");
        }
        metrics.update(&MetricsSnapshot::from_stats(engine.stats(), engine.state()));
        std::thread::sleep(Duration::from_millis(50));
    }

    engine.close(info.session_id);
    engine.cancel_scan_events();
    engine.cancel_session_events();

    let stats = engine.stats();
    info!(
        frames = stats.frames_published,
        malformed = stats.frames_malformed,
        decoded = stats.qr_decoded,
        "Done"
    );
    Ok(())
}

#[cfg(feature = "metrics")]
fn start_metrics(registry: MetricsRegistry, port: u16) -> MetricsSink {
    use qr_camera::metrics::{MetricsServer, MetricsServerConfig};

    if port == 0 {
        return MetricsSink::Local(registry);
    }

    let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
    let state = server.state();
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "Failed to start metrics runtime");
                return;
            }
        };
        if let Err(e) = runtime.block_on(server.run()) {
            warn!(error = %e, "Metrics server stopped");
        }
    });
    MetricsSink::Served(state)
}

#[cfg(not(feature = "metrics"))]
fn start_metrics(registry: MetricsRegistry, _port: u16) -> MetricsSink {
    MetricsSink::Local(registry)
}

enum MetricsSink {
    Local(MetricsRegistry),
    #[cfg(feature = "metrics")]
    Served(qr_camera::metrics::MetricsState),
}

impl MetricsSink {
    fn update(&self, snapshot: &MetricsSnapshot) {
        match self {
            MetricsSink::Local(registry) => registry.update(snapshot),
            #[cfg(feature = "metrics")]
            MetricsSink::Served(state) => state.update(snapshot),
        }
    }
}
