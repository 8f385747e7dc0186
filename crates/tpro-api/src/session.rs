//! The single upload/analysis session.
//!
//! [`SessionState`] is only changed through its transition methods. Each
//! upload starts a new generation; completion callbacks carry the
//! generation they were started with and are ignored once it is stale.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use tpro_media::PreviewHandle;
use tpro_models::{AnalysisResult, SampledFrame, StrokeType};

/// An analysis is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("an analysis is already in progress")]
pub struct SessionBusy;

/// Current upload and its analysis lifecycle.
#[derive(Debug, Default)]
pub struct SessionState {
    analyzing: bool,
    stroke: Option<StrokeType>,
    result: Option<AnalysisResult>,
    error: Option<String>,
    preview: Option<PreviewHandle>,
    frames: Vec<SampledFrame>,
    generation: u64,
}

/// Serializable view of the session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub analyzing: bool,
    pub stroke: Option<StrokeType>,
    pub stroke_label: Option<&'static str>,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
    pub preview_url: Option<String>,
    pub frames: Vec<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn frames(&self) -> &[SampledFrame] {
        &self.frames
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    /// Location and content type of the stored preview, if any.
    pub fn preview_file(&self) -> Option<(PathBuf, String)> {
        self.preview
            .as_ref()
            .map(|p| (p.path().to_path_buf(), p.content_type().to_string()))
    }

    /// JPEG bytes of the captured frame with a 1-based `ordinal`.
    pub fn frame_jpeg(&self, ordinal: usize) -> Option<Vec<u8>> {
        self.frames
            .iter()
            .find(|f| f.ordinal == ordinal)
            .map(|f| f.jpeg().to_vec())
    }

    /// Start analyzing a new upload.
    ///
    /// Clears the previous result, error and frames, and releases the
    /// previous preview. Returns the generation of the new analysis. While
    /// an analysis is running the upload is refused and `preview` is
    /// released.
    pub fn begin_upload(
        &mut self,
        stroke: StrokeType,
        preview: PreviewHandle,
    ) -> Result<u64, SessionBusy> {
        if self.analyzing {
            preview.release();
            return Err(SessionBusy);
        }

        self.release_preview();
        self.generation += 1;
        self.analyzing = true;
        self.stroke = Some(stroke);
        self.result = None;
        self.error = None;
        self.frames.clear();
        self.preview = Some(preview);

        info!(generation = self.generation, stroke = %stroke, "Upload accepted");
        Ok(self.generation)
    }

    /// Publish captured frames while the service call is in flight.
    pub fn frames_captured(&mut self, generation: u64, frames: Vec<SampledFrame>) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.frames = frames;
        true
    }

    /// Store a successful result and stop analyzing.
    pub fn complete(&mut self, generation: u64, result: AnalysisResult) -> bool {
        if !self.is_current(generation) {
            debug!(generation, current = self.generation, "Ignoring stale result");
            return false;
        }
        self.analyzing = false;
        self.result = Some(result);
        self.error = None;
        true
    }

    /// Record a failure and stop analyzing. Frames and preview stay.
    pub fn fail(&mut self, generation: u64, message: impl Into<String>) -> bool {
        if !self.is_current(generation) {
            debug!(generation, current = self.generation, "Ignoring stale failure");
            return false;
        }
        self.analyzing = false;
        self.result = None;
        self.error = Some(message.into());
        true
    }

    /// Clear the error banner.
    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Return to the initial empty state, releasing the preview.
    pub fn reset(&mut self) -> Result<(), SessionBusy> {
        if self.analyzing {
            return Err(SessionBusy);
        }

        self.release_preview();
        self.stroke = None;
        self.result = None;
        self.error = None;
        self.frames.clear();
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            analyzing: self.analyzing,
            stroke: self.stroke,
            stroke_label: self.stroke.map(|s| s.label()),
            result: self.result.clone(),
            error: self.error.clone(),
            preview_url: self
                .preview
                .as_ref()
                .map(|p| format!("/api/session/preview?v={}", p.id())),
            frames: self
                .frames
                .iter()
                .map(|f| format!("/api/session/frames/{}", f.ordinal))
                .collect(),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.analyzing && generation == self.generation
    }

    fn release_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            preview.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpro_models::{ActionableTip, ScoreDetail};

    async fn preview(dir: &tempfile::TempDir) -> PreviewHandle {
        PreviewHandle::create(dir.path(), b"clip", "video/mp4")
            .await
            .unwrap()
    }

    fn result() -> AnalysisResult {
        AnalysisResult {
            stroke_type: "Backhand".to_string(),
            detected_stroke_justification: "Two-handed lateral swing".to_string(),
            overall_score: 74.0,
            breakdown: vec![ScoreDetail {
                label: "Follow-through".to_string(),
                score: 70.0,
            }],
            summary: "Compact backhand".to_string(),
            improvement_areas: vec!["Footwork".to_string()],
            actionable_tips: vec![ActionableTip {
                title: "Split step".to_string(),
                description: "Time the split step".to_string(),
            }],
        }
    }

    fn frames(n: usize) -> Vec<SampledFrame> {
        (1..=n)
            .map(|i| SampledFrame::new(i, i as f64, vec![0xFF, 0xD8, i as u8]))
            .collect()
    }

    #[tokio::test]
    async fn test_upload_then_complete() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SessionState::new();

        let generation = session
            .begin_upload(StrokeType::Backhand, preview(&dir).await)
            .unwrap();
        assert!(session.is_analyzing());

        assert!(session.frames_captured(generation, frames(12)));
        assert_eq!(session.snapshot().frames.len(), 12);
        assert_eq!(session.snapshot().frames[0], "/api/session/frames/1");

        assert!(session.complete(generation, result()));
        let snapshot = session.snapshot();
        assert!(!snapshot.analyzing);
        assert_eq!(snapshot.result.unwrap().overall_score, 74.0);
        assert_eq!(snapshot.stroke_label, Some("Backhand"));
        assert!(snapshot.preview_url.is_some());
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_failure_keeps_session_usable() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SessionState::new();

        let generation = session
            .begin_upload(StrokeType::Serve, preview(&dir).await)
            .unwrap();
        assert!(session.fail(generation, "Gemini API request failed: connection refused"));

        assert!(!session.is_analyzing());
        assert!(session.result().is_none());
        assert_eq!(
            session.error(),
            Some("Gemini API request failed: connection refused")
        );

        session.dismiss_error();
        assert!(session.error().is_none());

        // A new upload is accepted after a failure
        assert!(session
            .begin_upload(StrokeType::Serve, preview(&dir).await)
            .is_ok());
    }

    #[tokio::test]
    async fn test_upload_while_analyzing_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SessionState::new();

        session
            .begin_upload(StrokeType::Volley, preview(&dir).await)
            .unwrap();
        let first = session.preview().unwrap().path().to_path_buf();

        let second = preview(&dir).await;
        let second_path = second.path().to_path_buf();
        assert_eq!(
            session.begin_upload(StrokeType::Smash, second),
            Err(SessionBusy)
        );

        // The rejected upload is released, the running one untouched
        assert!(!second_path.exists());
        assert!(first.exists());
        assert_eq!(session.generation(), 1);
        assert_eq!(session.reset(), Err(SessionBusy));
    }

    #[tokio::test]
    async fn test_reset_releases_preview_and_clears_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SessionState::new();

        let generation = session
            .begin_upload(StrokeType::Backhand, preview(&dir).await)
            .unwrap();
        session.frames_captured(generation, frames(12));
        session.complete(generation, result());
        let path = session.preview().unwrap().path().to_path_buf();

        session.reset().unwrap();

        assert!(!path.exists());
        let snapshot = session.snapshot();
        assert!(snapshot.result.is_none());
        assert!(snapshot.error.is_none());
        assert!(snapshot.preview_url.is_none());
        assert!(snapshot.frames.is_empty());
        assert!(snapshot.stroke.is_none());

        // Resetting an empty session is a no-op
        session.reset().unwrap();
    }

    #[tokio::test]
    async fn test_new_upload_replaces_previous_preview() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SessionState::new();

        let generation = session
            .begin_upload(StrokeType::Backhand, preview(&dir).await)
            .unwrap();
        session.fail(generation, "boom");
        let old = session.preview().unwrap().path().to_path_buf();

        session
            .begin_upload(StrokeType::Serve, preview(&dir).await)
            .unwrap();

        assert!(!old.exists());
        assert!(session.preview().unwrap().path().exists());
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn test_stale_generation_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SessionState::new();

        let first = session
            .begin_upload(StrokeType::Backhand, preview(&dir).await)
            .unwrap();
        session.fail(first, "boom");
        let second = session
            .begin_upload(StrokeType::Serve, preview(&dir).await)
            .unwrap();

        assert!(!session.complete(first, result()));
        assert!(!session.frames_captured(first, frames(3)));
        assert!(session.is_analyzing());
        assert!(session.frames().is_empty());

        assert!(session.complete(second, result()));
        // Late callbacks after completion are ignored too
        assert!(!session.fail(second, "late"));
        assert!(session.error().is_none());
    }

    #[test]
    fn test_frame_lookup() {
        let mut session = SessionState::new();
        session.analyzing = true;
        session.generation = 1;
        session.frames_captured(1, frames(3));

        assert_eq!(session.frame_jpeg(2), Some(vec![0xFF, 0xD8, 2]));
        assert!(session.frame_jpeg(0).is_none());
        assert!(session.frame_jpeg(4).is_none());
    }
}
