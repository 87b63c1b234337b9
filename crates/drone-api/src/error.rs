//! API error types and the `{result, code}` response envelope

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Response body shared by successes and failures
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub result: String,
    pub code: u16,
}

impl ApiResponse {
    pub fn new(result: impl Into<String>, status: StatusCode) -> Self {
        Self {
            result: result.into(),
            code: status.as_u16(),
        }
    }

    pub fn ok() -> Self {
        Self::new("OK", StatusCode::OK)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // The detail goes to the log, never into the envelope
        let body = match &self {
            ApiError::NotFound(_) => ApiResponse::new("Not found", StatusCode::NOT_FOUND),
        };
        body.into_response()
    }
}

