//! Axum HTTP API server.
//!
//! This crate provides:
//! - Swing upload with background analysis
//! - The single [`SessionState`] and its JSON snapshot
//! - Preview playback and captured frame access
//! - Health, readiness and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use session::{SessionBusy, SessionSnapshot, SessionState};
pub use state::{AppState, SharedAnalyzer};
