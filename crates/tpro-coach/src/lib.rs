//! Swing scoring via an external generative model.
//!
//! This crate provides:
//! - The [`AnalysisService`] seam and its Gemini implementation
//! - Prompt and response-schema construction
//! - The [`Analyzer`], which samples frames and submits them for scoring

pub mod error;
pub mod gemini;
pub mod orchestrator;
pub mod prompt;
pub mod service;

pub use error::{AnalysisError, ServiceContext};
pub use gemini::{GeminiClient, GeminiConfig};
pub use orchestrator::{AnalysisProgress, Analyzer};
pub use service::{AnalysisService, UnavailableService};
