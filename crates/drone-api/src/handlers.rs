//! API request handlers

use crate::error::{ApiError, ApiResponse};
use crate::state::AppState;

use axum::{
    Form, Json,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse},
};
use chrono::Utc;
use drone_core::{OperatorCommand, clamp_speed};
use drone_cv::mjpeg;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const INDEX_PAGE: &str = include_str!("../assets/index.html");
const CONTROLLER_PAGE: &str = include_str!("../assets/controller.html");

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

/// Form posted by the controller page
#[derive(Debug, Deserialize)]
pub struct CommandForm {
    #[serde(default)]
    pub command: String,
    /// Speed for this move only; the current speed is used when absent
    #[serde(default)]
    pub speed: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub drone_connected: bool,
    pub viewers: usize,
}

// ============================================================================
// PAGES
// ============================================================================

pub async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

pub async fn controller() -> Html<&'static str> {
    Html(CONTROLLER_PAGE)
}

// ============================================================================
// DRONE CONTROL
// ============================================================================

/// Run one operator command
pub async fn api_command(
    State(state): State<AppState>,
    Form(form): Form<CommandForm>,
) -> Result<ApiResponse, ApiError> {
    let command: OperatorCommand = form.command.parse().map_err(|e| {
        debug!("Rejected command {:?}: {}", form.command, e);
        ApiError::not_found(form.command.clone())
    })?;

    let speed = form.speed.as_deref().and_then(parse_speed);
    info!("🎮 Command {} (speed {:?})", command, speed);

    state.manager.execute(command, speed).await;
    Ok(ApiResponse::ok())
}

/// Parse a form speed, clamped to 1-100; junk is ignored
fn parse_speed(raw: &str) -> Option<u8> {
    match raw.trim().parse::<u32>() {
        Ok(speed) => Some(clamp_speed(speed)),
        Err(_) => {
            debug!("Ignoring invalid speed {:?}", raw);
            None
        }
    }
}

/// Current controller flags
pub async fn drone_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.state())
}

/// Annotated camera feed as `multipart/x-mixed-replace`
pub async fn video_streaming(State(state): State<AppState>) -> impl IntoResponse {
    let viewer = state.preview.subscribe();
    debug!("Preview viewer attached ({} watching)", state.viewer_count());

    (
        [
            (header::CONTENT_TYPE, mjpeg::content_type()),
            (header::CACHE_CONTROL, "no-cache, private".to_string()),
            (header::PRAGMA, "no-cache".to_string()),
        ],
        Body::from_stream(viewer.into_stream()),
    )
}

// ============================================================================
// HEALTH & METRICS
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        timestamp: Utc::now().to_rfc3339(),
        drone_connected: state.manager.is_connected(),
        viewers: state.viewer_count(),
    })
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export(),
    )
}

// ============================================================================
// TESTS
// ============================================================================
