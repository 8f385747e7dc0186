//! Analysis pipeline: sample frames, then score them.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use tpro_media::{FrameCapture, FrameCount, FrameSampler, MediaSource};
use tpro_models::{AnalysisRequest, AnalysisResult, SampledFrame, StrokeType};

use crate::error::AnalysisError;
use crate::service::AnalysisService;

/// Milestones reported while an analysis runs.
#[derive(Debug, Clone)]
pub enum AnalysisProgress {
    /// Every frame was captured. Carries the frames in order.
    FramesExtracted(Vec<SampledFrame>),
    /// The request is on its way to the scoring service.
    Submitting { frames: usize },
}

/// Runs one upload through sampling and scoring.
///
/// The service is only called with a complete frame sequence. Service
/// failures pass through unchanged.
pub struct Analyzer<C: ?Sized, S: ?Sized> {
    sampler: FrameSampler<C>,
    service: Arc<S>,
    frame_count: FrameCount,
}

impl<C, S> Analyzer<C, S>
where
    C: FrameCapture + ?Sized + 'static,
    S: AnalysisService + ?Sized,
{
    pub fn new(sampler: FrameSampler<C>, service: Arc<S>) -> Self {
        Self {
            sampler,
            service,
            frame_count: FrameCount::DEFAULT,
        }
    }

    pub fn with_frame_count(mut self, frame_count: FrameCount) -> Self {
        self.frame_count = frame_count;
        self
    }

    pub fn frame_count(&self) -> FrameCount {
        self.frame_count
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Analyze an opened source.
    pub async fn analyze(
        &self,
        source: MediaSource,
        stroke: StrokeType,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_with_progress(source, stroke, |_| {}).await
    }

    /// Analyze an opened source, reporting milestones to `progress`.
    pub async fn analyze_with_progress<F>(
        &self,
        source: MediaSource,
        stroke: StrokeType,
        progress: F,
    ) -> Result<AnalysisResult, AnalysisError>
    where
        F: Fn(AnalysisProgress) + Send + Sync,
    {
        let started = Instant::now();

        let frames = self.sampler.extract(source, self.frame_count).await?;
        progress(AnalysisProgress::FramesExtracted(frames.clone()));

        let request = AnalysisRequest::new(frames, stroke);
        progress(AnalysisProgress::Submitting {
            frames: request.frame_count(),
        });

        let result = self.service.analyze(&request).await;

        match &result {
            Ok(analysis) => {
                if !analysis.matches_declared(stroke.label()) {
                    info!(
                        declared = stroke.label(),
                        detected = %analysis.stroke_type,
                        "Detected stroke differs from declared stroke"
                    );
                }
                info!(
                    stroke = %stroke,
                    score = analysis.overall_score,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Analysis complete"
                );
            }
            Err(e) => warn!(stroke = %stroke, kind = e.kind(), "Analysis failed: {}", e),
        }

        result
    }

    /// Open the clip at `path` and analyze it.
    pub async fn analyze_file<F>(
        &self,
        path: &Path,
        stroke: StrokeType,
        progress: F,
    ) -> Result<AnalysisResult, AnalysisError>
    where
        F: Fn(AnalysisProgress) + Send + Sync,
    {
        let source = self.sampler.open(path).await?;
        self.analyze_with_progress(source, stroke, progress).await
    }
}
