//! Swing upload and the background analysis it starts.

use std::path::PathBuf;
use std::time::Instant;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{error, info, warn};

use tpro_coach::AnalysisProgress;
use tpro_media::PreviewHandle;
use tpro_models::StrokeType;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::session::SessionSnapshot;
use crate::state::AppState;

/// A validated upload, read fully into memory.
struct UploadForm {
    stroke: StrokeType,
    content_type: String,
    video: Vec<u8>,
}

/// Accept a swing clip and start analyzing it.
///
/// Multipart fields: `stroke` (id or label, defaults to the forehand drive)
/// and `video` (a single `video/*` file). Responds 202 with the session
/// snapshot; the analysis continues in the background.
pub async fn upload_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SessionSnapshot>)> {
    // Refuse before reading the body
    if state.session().is_analyzing() {
        metrics::record_upload("busy");
        return Err(ApiError::SessionBusy);
    }

    let form = match read_form(multipart, state.config.max_upload_bytes).await {
        Ok(form) => form,
        Err(e) => {
            metrics::record_upload("rejected");
            return Err(e);
        }
    };

    let preview =
        PreviewHandle::create(&state.config.upload_dir, &form.video, form.content_type).await?;
    let video_path = preview.path().to_path_buf();

    let (generation, snapshot) = {
        let mut session = state.session();
        let generation = session.begin_upload(form.stroke, preview).inspect_err(|_| {
            metrics::record_upload("busy");
        })?;
        (generation, session.snapshot())
    };

    metrics::record_upload("accepted");
    info!(
        generation,
        stroke = %form.stroke,
        bytes = form.video.len(),
        "Starting analysis"
    );

    tokio::spawn(run_analysis(state, generation, form.stroke, video_path));

    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// Run one analysis and write its outcome into the session.
async fn run_analysis(state: AppState, generation: u64, stroke: StrokeType, video: PathBuf) {
    let started = Instant::now();

    let progress_state = state.clone();
    let progress = move |event: AnalysisProgress| match event {
        AnalysisProgress::FramesExtracted(frames) => {
            metrics::record_frame_extraction(started.elapsed().as_secs_f64());
            progress_state.session().frames_captured(generation, frames);
        }
        AnalysisProgress::Submitting { frames } => {
            info!(generation, frames, "Frames captured, awaiting analysis");
        }
    };

    let outcome = state.analyzer.analyze_file(&video, stroke, progress).await;
    let elapsed = started.elapsed().as_secs_f64();

    let mut session = state.session();
    match outcome {
        Ok(result) => {
            metrics::record_analysis(stroke.id(), "success", elapsed);
            if !session.complete(generation, result) {
                warn!(generation, "Analysis finished for a replaced session");
            }
        }
        Err(e) => {
            metrics::record_analysis(stroke.id(), e.kind(), elapsed);
            error!(generation, kind = e.kind(), "Analysis failed: {}", e);
            if !session.fail(generation, e.user_message()) {
                warn!(generation, "Analysis failed for a replaced session");
            }
        }
    }
}

async fn read_form(mut multipart: Multipart, max_bytes: usize) -> ApiResult<UploadForm> {
    let mut stroke = None;
    let mut video: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("stroke") => {
                let text = field.text().await.map_err(multipart_error)?;
                let parsed = text
                    .parse::<StrokeType>()
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                stroke = Some(parsed);
            }
            Some("video") => {
                if video.is_some() {
                    return Err(ApiError::bad_request("only one video may be uploaded"));
                }
                let content_type = field
                    .content_type()
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                if !content_type.starts_with("video/") {
                    return Err(ApiError::bad_request(format!(
                        "expected a video file, got '{}'",
                        content_type
                    )));
                }
                let bytes = read_limited(field, max_bytes).await?;
                video = Some((content_type, bytes));
            }
            _ => {}
        }
    }

    let (content_type, video) = video.ok_or_else(|| ApiError::bad_request("missing video file"))?;
    if video.is_empty() {
        return Err(ApiError::bad_request("video file is empty"));
    }

    Ok(UploadForm {
        stroke: stroke.unwrap_or_default(),
        content_type,
        video,
    })
}

async fn read_limited(mut field: Field<'_>, max_bytes: usize) -> ApiResult<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if bytes.len() + chunk.len() > max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "video exceeds {} bytes",
                max_bytes
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::bad_request(e.body_text())
    }
}
