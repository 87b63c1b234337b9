//! API route definitions

use crate::handlers;
use crate::state::AppState;

use axum::{
    Router,
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{
    compression::{
        CompressionLayer,
        predicate::{DefaultPredicate, NotForContentType, Predicate},
    },
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Create the control surface router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = if state.config.cors_permissive {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(Duration::from_secs(3600))
    } else {
        CorsLayer::new()
    };

    // Compressing the preview would buffer it
    let compression = CompressionLayer::new().compress_when(
        DefaultPredicate::new().and(NotForContentType::const_new("multipart/x-mixed-replace")),
    );

    Router::new()
        // Pages
        .route("/", get(handlers::index))
        .route("/controller/", get(handlers::controller))

        // Drone control
        .route("/api/command/", post(handlers::api_command))
        .route("/api/state", get(handlers::drone_state))

        // Annotated camera preview
        .route("/video/streaming", get(handlers::video_streaming))

        // Health & metrics
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))

        // Static assets and snapshots
        .nest_service("/static", ServeDir::new(&state.config.static_dir))

        // Any other path gets the index page
        .fallback(handlers::index)

        // Apply middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(compression)
        .with_state(state)
}
