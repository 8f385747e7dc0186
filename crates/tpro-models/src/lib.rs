//! Shared data models for TennisPro swing analysis.
//!
//! This crate provides Serde-serializable types for:
//! - The enumerated stroke categories a user can declare
//! - Sampled frames and the request sent to the scoring service
//! - The structured analysis result returned by the service
//! - Capture defaults shared by the sampler and the orchestrator

pub mod analysis;
pub mod capture;
pub mod frame;
pub mod request;
pub mod stroke;

// Re-export common types
pub use analysis::{ActionableTip, AnalysisResult, ScoreDetail};
pub use capture::{DEFAULT_FRAME_COUNT, DEFAULT_JPEG_QUALITY, FRAME_MIME_TYPE};
pub use frame::SampledFrame;
pub use request::AnalysisRequest;
pub use stroke::{StrokeParseError, StrokeType};
