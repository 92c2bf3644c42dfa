use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use faceinator_core::bus::domain::bus_adapter::BusAdapter;
use faceinator_core::bus::domain::bus_transport::{BusPublisher, BusSubscriber};
use faceinator_core::capture::domain::face_image_store::FaceImageStore;
use faceinator_core::capture::domain::frame_source::CaptureError;
use faceinator_core::capture::infrastructure::ffmpeg_camera::FfmpegCamera;
use faceinator_core::capture::infrastructure::image_file_store::ImageFileStore;
use faceinator_core::detection::infrastructure::onnx_yolo_detector::{OnnxYoloDetector, YoloLayout};
use faceinator_core::pipeline::bridge_coordinator::BridgeCoordinator;
use faceinator_core::pipeline::capture_faces_use_case::{CaptureFacesUseCase, CaptureSettings};
use faceinator_core::pipeline::console_driver::ConsoleDriver;
use faceinator_core::pipeline::session_logger::LogSessionLogger;
use faceinator_core::quality::domain::quality_gate::CaptureQualityGate;
use faceinator_core::shared::config::{BusConfig, InstallationConfig};
use faceinator_core::shared::constants::EXIT_CAMERA_UNAVAILABLE;
use faceinator_core::store::infrastructure::file_state_store::FileStateStore;

/// Face capture and session coordination for the faceinator installation.
#[derive(Parser)]
#[command(name = "faceinator", version)]
struct Cli {
    /// JSON config file (default: <config dir>/faceinator/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the shared state cells.
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Store poll interval in milliseconds.
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the camera and capture one face per player.
    Detect {
        /// Camera device or any input ffmpeg can open.
        #[arg(long)]
        camera: Option<String>,

        /// ffmpeg input format, e.g. video4linux2, avfoundation, dshow.
        #[arg(long)]
        camera_format: Option<String>,

        /// YOLO face model (.onnx).
        #[arg(long)]
        model: Option<PathBuf>,

        /// Model output layout: pose or objectness.
        #[arg(long)]
        model_layout: Option<String>,

        /// Face detection confidence threshold (0.0-1.0).
        #[arg(long)]
        confidence: Option<f64>,

        /// Minimum Laplacian variance for a face to count as sharp.
        #[arg(long)]
        sharpness_threshold: Option<f64>,

        /// Directory the face crops are written to.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Relay between the control system bus and the shared store.
    Bridge {
        /// Sender name on the bus.
        #[arg(long)]
        identity: Option<String>,

        #[arg(long)]
        publish_endpoint: Option<String>,

        #[arg(long)]
        subscribe_endpoint: Option<String>,
    },
    /// Start games from the terminal instead of the bus.
    Console,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        if e.downcast_ref::<CaptureError>().is_some() {
            process::exit(EXIT_CAMERA_UNAVAILABLE);
        }
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = InstallationConfig::load(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli)?;
    config.validate()?;

    match cli.command {
        Command::Detect { .. } => run_detect(&config),
        Command::Bridge { .. } => run_bridge(&config),
        Command::Console => run_console(&config),
    }
}

fn run_detect(config: &InstallationConfig) -> Result<(), Box<dyn std::error::Error>> {
    let capture = &config.capture;
    let camera = FfmpegCamera::open(&capture.camera_device, capture.camera_format.as_deref())?;
    let detector = OnnxYoloDetector::new(
        &capture.model_path,
        capture.model_layout,
        capture.confidence,
        capture.nms_iou,
    )?;
    fs::create_dir_all(&capture.output_dir)?;

    let images: Arc<dyn FaceImageStore> = Arc::new(ImageFileStore::new());
    let gate = CaptureQualityGate::new(capture.sharpness_threshold, images.clone());
    let store = Arc::new(FileStateStore::new(config.store_dir.clone()));
    let shutdown = install_shutdown_handler()?;

    let mut use_case = CaptureFacesUseCase::new(
        Box::new(camera),
        Box::new(detector),
        images,
        gate,
        store,
        Box::new(LogSessionLogger::new()),
        CaptureSettings {
            output_dir: capture.output_dir.clone(),
            face_padding: capture.face_padding,
            poll_interval: config.poll_interval(),
        },
    );
    use_case.run(&shutdown)?;
    Ok(())
}

fn run_bridge(config: &InstallationConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(FileStateStore::new(config.store_dir.clone()));
    let (publisher, subscriber) = connect_bus(&config.bus)?;
    let adapter = BusAdapter::new(
        config.identity.clone(),
        config.version.clone(),
        config.bus.clone(),
        publisher,
    );
    let shutdown = install_shutdown_handler()?;

    BridgeCoordinator::new(store, adapter).run(subscriber, config.poll_interval(), shutdown)
}

fn run_console(config: &InstallationConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(FileStateStore::new(config.store_dir.clone()));
    ConsoleDriver::new(io::stdin().lock(), io::stdout(), store, config.poll_interval()).run()
}

#[cfg(feature = "zmq-transport")]
fn connect_bus(
    bus: &BusConfig,
) -> Result<(Box<dyn BusPublisher>, Box<dyn BusSubscriber>), Box<dyn std::error::Error>> {
    let (publisher, subscriber) = faceinator_core::bus::infrastructure::zmq_bus::connect(bus)?;
    Ok((Box::new(publisher), Box::new(subscriber)))
}

#[cfg(not(feature = "zmq-transport"))]
fn connect_bus(
    _bus: &BusConfig,
) -> Result<(Box<dyn BusPublisher>, Box<dyn BusSubscriber>), Box<dyn std::error::Error>> {
    use faceinator_core::bus::infrastructure::channel_bus::ChannelBroker;

    log::warn!("Built without zmq-transport, the bus only reaches this process");
    let broker = ChannelBroker::new();
    Ok((Box::new(broker.publisher()), Box::new(broker.subscriber())))
}

fn install_shutdown_handler() -> Result<Arc<AtomicBool>, Box<dyn std::error::Error>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("Shutdown signal received...");
        flag.store(true, Ordering::SeqCst);
    })?;
    Ok(shutdown)
}

fn apply_overrides(
    config: &mut InstallationConfig,
    cli: &Cli,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(dir) = &cli.store_dir {
        config.store_dir = dir.clone();
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.poll_interval_ms = ms;
    }

    match &cli.command {
        Command::Detect {
            camera,
            camera_format,
            model,
            model_layout,
            confidence,
            sharpness_threshold,
            output_dir,
        } => {
            let capture = &mut config.capture;
            if let Some(camera) = camera {
                capture.camera_device = camera.clone();
            }
            if let Some(format) = camera_format {
                capture.camera_format = Some(format.clone()).filter(|f| !f.is_empty());
            }
            if let Some(model) = model {
                capture.model_path = model.clone();
            }
            if let Some(layout) = model_layout {
                capture.model_layout = parse_layout(layout)?;
            }
            if let Some(confidence) = confidence {
                capture.confidence = *confidence;
            }
            if let Some(threshold) = sharpness_threshold {
                capture.sharpness_threshold = *threshold;
            }
            if let Some(dir) = output_dir {
                capture.output_dir = dir.clone();
            }
        }
        Command::Bridge {
            identity,
            publish_endpoint,
            subscribe_endpoint,
        } => {
            if let Some(identity) = identity {
                config.identity = identity.clone();
            }
            if let Some(endpoint) = publish_endpoint {
                config.bus.publish_endpoint = endpoint.clone();
            }
            if let Some(endpoint) = subscribe_endpoint {
                config.bus.subscribe_endpoint = endpoint.clone();
            }
        }
        Command::Console => {}
    }
    Ok(())
}

fn parse_layout(layout: &str) -> Result<YoloLayout, Box<dyn std::error::Error>> {
    match layout {
        "pose" => Ok(YoloLayout::Pose),
        "objectness" => Ok(YoloLayout::Objectness),
        other => Err(format!("Model layout must be 'pose' or 'objectness', got '{other}'").into()),
    }
}
