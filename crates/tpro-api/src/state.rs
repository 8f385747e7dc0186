//! Application state.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use tpro_coach::{AnalysisService, Analyzer, GeminiClient, UnavailableService};
use tpro_media::{FfmpegCapture, FrameCapture, FrameSampler, SamplerConfig};

use crate::config::ApiConfig;
use crate::session::SessionState;

/// Analyzer with type-erased capture and service backends.
pub type SharedAnalyzer = Analyzer<dyn FrameCapture, dyn AnalysisService>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub session: Arc<Mutex<SessionState>>,
    pub analyzer: Arc<SharedAnalyzer>,
}

impl AppState {
    /// Create application state from the environment.
    ///
    /// A missing Gemini key does not stop the server: analyses fail with a
    /// configuration error and `/ready` reports the service as down.
    pub fn from_env(config: ApiConfig) -> Self {
        let sampler_config = SamplerConfig::from_env();
        let capture: Arc<dyn FrameCapture> = Arc::new(FfmpegCapture::new(&sampler_config));

        let service: Arc<dyn AnalysisService> = match GeminiClient::from_env() {
            Ok(client) => Arc::new(client),
            Err(e) => {
                warn!("Gemini client unavailable: {}", e);
                Arc::new(UnavailableService::new(e.to_string()))
            }
        };

        Self::new(config, capture, service, &sampler_config)
    }

    /// Create application state over explicit backends.
    pub fn new(
        config: ApiConfig,
        capture: Arc<dyn FrameCapture>,
        service: Arc<dyn AnalysisService>,
        sampler_config: &SamplerConfig,
    ) -> Self {
        let sampler = FrameSampler::from_arc(capture, sampler_config.window);

        Self {
            config,
            session: Arc::new(Mutex::new(SessionState::new())),
            analyzer: Arc::new(Analyzer::new(sampler, service)),
        }
    }

    /// Lock the session, recovering from poisoning. Never hold the guard
    /// across an `.await`.
    pub fn session(&self) -> MutexGuard<'_, SessionState> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
