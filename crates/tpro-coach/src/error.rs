//! Analysis error types.

use thiserror::Error;
use tpro_media::ExtractionError;

/// Errors that end an analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Frame sampling failed; no request was sent.
    #[error(transparent)]
    ExtractionFailed(#[from] ExtractionError),

    /// The scoring service failed or returned unusable data.
    ///
    /// Carries the underlying diagnostic text verbatim.
    #[error("{0}")]
    ServiceFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn service_failure(msg: impl Into<String>) -> Self {
        Self::ServiceFailure(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short outcome label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::ExtractionFailed(_) => "extraction_failed",
            AnalysisError::ServiceFailure(_) => "service_failure",
            AnalysisError::Config(_) => "config",
        }
    }

    /// Message shown to the user in the error banner.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::ExtractionFailed(e) => format!("Could not process the video. {}", e),
            AnalysisError::ServiceFailure(msg) => {
                format!("Analysis failed: {}. Try another video.", msg)
            }
            AnalysisError::Config(msg) => format!("Analysis is unavailable: {}", msg),
        }
    }
}

/// Attach service context to foreign errors.
pub trait ServiceContext<T> {
    /// Wrap any displayable error as a [`AnalysisError::ServiceFailure`].
    fn service_context(self, context: &str) -> Result<T, AnalysisError>;
}

impl<T, E: std::fmt::Display> ServiceContext<T> for Result<T, E> {
    fn service_context(self, context: &str) -> Result<T, AnalysisError> {
        self.map_err(|e| AnalysisError::service_failure(format!("{}: {}", context, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_failure_is_verbatim() {
        let err = AnalysisError::service_failure("Gemini API returned 429: quota exhausted");
        assert_eq!(err.to_string(), "Gemini API returned 429: quota exhausted");
        assert_eq!(err.kind(), "service_failure");
        assert!(err.user_message().contains("quota exhausted"));
    }

    #[test]
    fn test_extraction_error_wraps_unchanged() {
        let err: AnalysisError = ExtractionError::source_unreadable("moov atom not found").into();
        assert!(matches!(
            err,
            AnalysisError::ExtractionFailed(ExtractionError::SourceUnreadable(_))
        ));
        assert_eq!(err.to_string(), "Video could not be read: moov atom not found");
    }

    #[test]
    fn test_service_context() {
        let result: Result<(), String> = Err("connection reset".to_string());
        let err = result.service_context("Gemini API request failed").unwrap_err();
        assert_eq!(err.to_string(), "Gemini API request failed: connection reset");
    }
}
