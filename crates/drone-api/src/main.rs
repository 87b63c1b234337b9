//! # Drone API Server
//!
//! Entry point for the Tello face-tracking controller. Connects to the
//! drone, wires the video pipeline into the drone manager and serves the
//! control panel, preview stream and metrics over HTTP.

mod config;
mod error;
mod handlers;
mod routes;
mod state;

use crate::config::ApiConfig;
use crate::routes::create_router;
use crate::state::AppState;

use drone_cv::{FfmpegPipeline, MjpegBroadcaster, OverlayRenderer, SnapshotWriter};
use drone_link::TelloLink;
use drone_telemetry::MetricsCollector;
use drone_tracker::{CommandIssuer, DetectorLoader, DroneManager, FrameOutput, VideoPipeline};

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ApiConfig::from_env();

    // Initialize logging
    init_logging(&config.log_file)?;

    info!("🚁 Starting GoTello controller v{}", env!("CARGO_PKG_VERSION"));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("Configuration loaded");
    info!("   Drone: {}", config.link.drone_addr);
    info!("   Face model: {}", config.cv.detector.model_path.display());
    info!("   Snapshots: {}", config.cv.snapshot_dir.display());

    let metrics = Arc::new(MetricsCollector::new()?);

    // Bind the drone link; failing here is fatal
    let (link, events) = TelloLink::connect(config.link.clone()).await?;
    info!(
        "Commands from {}, video on {}",
        link.command_addr()?,
        link.video_addr()
    );

    let issuer = CommandIssuer::new(link.clone()).with_metrics(metrics.clone());
    let manager = Arc::new(DroneManager::new(issuer, config.tracker.clone()));

    // Video pipeline
    let preview = Arc::new(MjpegBroadcaster::default());
    let detector_config = config.cv.detector.clone();
    let load_detector: DetectorLoader =
        Arc::new(move || drone_cv::load_face_detector(&detector_config));

    let pipeline = VideoPipeline {
        decoder: Arc::new(FfmpegPipeline::new(
            config.cv.decoder.clone(),
            config.cv.geometry,
        )),
        load_detector,
        output: FrameOutput {
            renderer: Arc::new(OverlayRenderer::new(&config.cv.rendering)?),
            snapshots: SnapshotWriter::new(&config.cv.snapshot_dir),
            preview: preview.clone(),
            jpeg_quality: config.cv.jpeg_quality,
        },
    };
    let bridge = manager.bind_link(events, pipeline);

    info!("Waiting for the drone to answer...");
    if manager.wait_connected(config.tracker.startup_wait).await {
        info!("✅ Drone connected");
    } else {
        warn!("Continuing without a drone connection");
    }

    // Create router
    let state = AppState::new(config.clone(), manager.clone(), preview, metrics);
    let app = create_router(state);
    info!("Routes configured");

    let addr = config.bind_addr();
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("🚀 Control panel on http://{}/controller/", addr);
    info!("Metrics available at http://{}/metrics", addr);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if manager.is_patrolling() {
        manager.stop_patrol().await;
    }
    bridge.abort();
    drop(link);

    info!("🛑 Server shutdown complete");
    Ok(())
}

/// Initialize logging to stdout and the log file
fn init_logging(log_file: &Path) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,drone_api=debug,drone_tracker=debug")
    });

    let file = OpenOptions::new().create(true).append(true).open(log_file)?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(filter)
        .init();

    Ok(())
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        }
    }
}
