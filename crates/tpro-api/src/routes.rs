//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    dismiss_error, get_frame, get_preview, get_session, health, list_strokes, ready,
    reset_session, upload_video,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, redact_internal_errors, request_id, request_logging, security_headers,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let session_routes = Router::new()
        .route("/session", get(get_session))
        .route("/session/upload", post(upload_video))
        .route("/session/reset", post(reset_session))
        .route("/session/error", delete(dismiss_error))
        .route("/session/preview", get(get_preview))
        .route("/session/frames/:ordinal", get(get_frame));

    let api_routes = Router::new()
        .route("/strokes", get(list_strokes))
        .merge(session_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    let redact = middleware::from_fn_with_state(state.clone(), redact_internal_errors);

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(redact)
        // Uploads are bounded by the configured limit, not axum's 2 MB default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.body_limit()))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
