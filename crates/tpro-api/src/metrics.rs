//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "tpro_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "tpro_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "tpro_http_requests_in_flight";

    // Analysis metrics
    pub const UPLOADS_TOTAL: &str = "tpro_uploads_total";
    pub const ANALYSES_TOTAL: &str = "tpro_analyses_total";
    pub const ANALYSIS_DURATION_SECONDS: &str = "tpro_analysis_duration_seconds";
    pub const FRAME_EXTRACTION_DURATION_SECONDS: &str = "tpro_frame_extraction_duration_seconds";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an upload, accepted or not.
pub fn record_upload(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::UPLOADS_TOTAL, &labels).increment(1);
}

/// Record a finished analysis. `outcome` is `success` or an error kind.
pub fn record_analysis(stroke: &str, outcome: &str, duration_secs: f64) {
    let labels = [
        ("stroke", stroke.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::ANALYSES_TOTAL, &labels).increment(1);
    histogram!(names::ANALYSIS_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record how long frame sampling took.
pub fn record_frame_extraction(duration_secs: f64) {
    histogram!(names::FRAME_EXTRACTION_DURATION_SECONDS).record(duration_secs);
}

/// Sanitize path for metrics labels (numeric segments become `:id`).
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
