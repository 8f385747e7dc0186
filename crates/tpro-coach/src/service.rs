//! Scoring service seam.

use async_trait::async_trait;
use tpro_models::{AnalysisRequest, AnalysisResult};

use crate::error::AnalysisError;

/// External capability: submit frames plus the declared stroke, receive
/// structured scoring or a failure.
///
/// Implementations make exactly one attempt per call.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;

    /// Whether the service has what it needs to accept requests.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Stand-in used when the real service could not be configured.
///
/// Every call fails with [`AnalysisError::Config`] carrying `reason`.
#[derive(Debug, Clone)]
pub struct UnavailableService {
    reason: String,
}

impl UnavailableService {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl AnalysisService for UnavailableService {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        Err(AnalysisError::config(self.reason.clone()))
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpro_models::StrokeType;

    #[tokio::test]
    async fn test_unavailable_service_always_fails() {
        let service = UnavailableService::new("GEMINI_API_KEY not set");
        assert!(!service.is_configured());

        let request = AnalysisRequest::new(vec![], StrokeType::Serve);
        let err = service.analyze(&request).await.unwrap_err();
        assert_eq!(err.kind(), "config");
        assert_eq!(err.to_string(), "Configuration error: GEMINI_API_KEY not set");
    }
}
