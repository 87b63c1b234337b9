//! Application state management

use crate::config::ApiConfig;
use drone_cv::MjpegBroadcaster;
use drone_telemetry::MetricsCollector;
use drone_tracker::DroneManager;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: ApiConfig,
    /// Operator entry point to the drone
    pub manager: Arc<DroneManager>,
    /// Annotated frames for `/video/streaming`
    pub preview: Arc<MjpegBroadcaster>,
    /// Prometheus registry for `/metrics`
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        manager: Arc<DroneManager>,
        preview: Arc<MjpegBroadcaster>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            config,
            manager,
            preview,
            metrics,
        }
    }

    /// Browsers currently watching the preview
    pub fn viewer_count(&self) -> usize {
        self.preview.subscriber_count()
    }
}
