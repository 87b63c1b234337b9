//! # Drone Telemetry - Metrics & Observability
//!
//! Prometheus metrics for the Tello controller.
//! Provides real-time metrics for:
//! - Flight commands sent and failed, by kind
//! - Video frames processed and faces detected
//! - Snapshot captures
//! - Patrol, tracking and link status

use drone_core::FlightCommand;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::{info, warn};

/// Metrics collector for the drone controller
pub struct MetricsCollector {
    registry: Registry,

    // Flight command metrics
    commands_total: IntCounterVec,
    command_failures_total: IntCounterVec,

    // Video metrics
    frames_processed: IntCounter,
    frame_errors: IntCounter,
    faces_detected: IntCounter,
    frame_processing_time: Histogram,

    // Snapshot metrics
    snapshots_written: IntCounter,
    snapshot_timeouts: IntCounter,

    // Status gauges
    patrol_active: IntGauge,
    tracking_enabled: IntGauge,
    link_connected: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        // Flight command metrics
        let commands_total = IntCounterVec::new(
            Opts::new("gotello_commands_total", "Flight commands sent to the drone"),
            &["command"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let command_failures_total = IntCounterVec::new(
            Opts::new("gotello_command_failures_total", "Flight commands that failed to send"),
            &["command"],
        )?;
        registry.register(Box::new(command_failures_total.clone()))?;

        // Video metrics
        let frames_processed = IntCounter::new(
            "gotello_frames_processed_total",
            "Video frames decoded, annotated and encoded",
        )?;
        registry.register(Box::new(frames_processed.clone()))?;

        let frame_errors = IntCounter::new(
            "gotello_frame_errors_total",
            "Video frames that could not be read or processed",
        )?;
        registry.register(Box::new(frame_errors.clone()))?;

        let faces_detected = IntCounter::new(
            "gotello_faces_detected_total",
            "Faces detected across all frames",
        )?;
        registry.register(Box::new(faces_detected.clone()))?;

        let frame_processing_time = Histogram::with_opts(
            HistogramOpts::new(
                "gotello_frame_processing_seconds",
                "Detection, annotation and encoding time per frame",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(frame_processing_time.clone()))?;

        // Snapshot metrics
        let snapshots_written = IntCounter::new(
            "gotello_snapshots_written_total",
            "Snapshots saved to disk",
        )?;
        registry.register(Box::new(snapshots_written.clone()))?;

        let snapshot_timeouts = IntCounter::new(
            "gotello_snapshot_timeouts_total",
            "Snapshot requests that expired before a frame was captured",
        )?;
        registry.register(Box::new(snapshot_timeouts.clone()))?;

        // Status gauges
        let patrol_active = IntGauge::new("gotello_patrol_active", "Whether patrol is running")?;
        registry.register(Box::new(patrol_active.clone()))?;

        let tracking_enabled = IntGauge::new(
            "gotello_tracking_enabled",
            "Whether face tracking is enabled",
        )?;
        registry.register(Box::new(tracking_enabled.clone()))?;

        let link_connected = IntGauge::new(
            "gotello_link_connected",
            "Whether the drone answered the connection handshake",
        )?;
        registry.register(Box::new(link_connected.clone()))?;

        info!("📊 Metrics collector initialized");

        Ok(Self {
            registry,
            commands_total,
            command_failures_total,
            frames_processed,
            frame_errors,
            faces_detected,
            frame_processing_time,
            snapshots_written,
            snapshot_timeouts,
            patrol_active,
            tracking_enabled,
            link_connected,
        })
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    // ========================================================================
    // FLIGHT COMMAND METRICS
    // ========================================================================

    /// Record a flight command handed to the link
    pub fn record_command(&self, command: &FlightCommand) {
        self.commands_total.with_label_values(&[command.kind()]).inc();
    }

    /// Record a flight command the link rejected
    pub fn record_command_failure(&self, command: &FlightCommand) {
        self.command_failures_total
            .with_label_values(&[command.kind()])
            .inc();
    }

    // ========================================================================
    // VIDEO METRICS
    // ========================================================================

    /// Record a processed frame
    pub fn record_frame(&self, processing_time_secs: f64, faces: u64) {
        self.frames_processed.inc();
        self.faces_detected.inc_by(faces);
        self.frame_processing_time.observe(processing_time_secs);
    }

    pub fn record_frame_error(&self) {
        self.frame_errors.inc();
    }

    // ========================================================================
    // SNAPSHOT METRICS
    // ========================================================================

    pub fn record_snapshot(&self) {
        self.snapshots_written.inc();
    }

    pub fn record_snapshot_timeout(&self) {
        self.snapshot_timeouts.inc();
    }

    // ========================================================================
    // STATUS
    // ========================================================================

    pub fn set_patrol_active(&self, active: bool) {
        self.patrol_active.set(active as i64);
    }

    pub fn set_tracking_enabled(&self, enabled: bool) {
        self.tracking_enabled.set(enabled as i64);
    }

    pub fn set_link_connected(&self, connected: bool) {
        self.link_connected.set(connected as i64);
    }
}

// ============================================================================
// TESTS
// ============================================================================
