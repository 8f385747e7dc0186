//! Preview playback and captured frames.

use std::io::SeekFrom;
use std::path::Path as FsPath;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use tpro_models::FRAME_MIME_TYPE;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Serve the uploaded clip for playback, honoring `Range: bytes=...`.
///
/// Mobile browsers only play and seek `<video>` sources that answer range
/// requests with 206.
pub async fn get_preview(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let (path, content_type) = state
        .session()
        .preview_file()
        .ok_or_else(|| ApiError::not_found("no preview available"))?;

    // The session may have released the file since the lock was dropped
    let file_size = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("no preview available"));
        }
        Err(e) => return Err(ApiError::internal(format!("failed to read preview: {}", e))),
    };

    let range = match headers.get(header::RANGE) {
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| ApiError::bad_request("invalid Range header"))?;
            parse_range_header(value)
        }
        None => None,
    };

    let Some(range) = range else {
        let bytes = read_span(&path, 0, file_size).await?;
        return Ok((
            [
                (header::CONTENT_TYPE, content_type),
                (header::ACCEPT_RANGES, "bytes".to_string()),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
            bytes,
        )
            .into_response());
    };

    let Some((start, end)) = resolve_range(range, file_size) else {
        return Ok((
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{file_size}"))],
            Body::empty(),
        )
            .into_response());
    };

    let bytes = read_span(&path, start, end - start + 1).await?;
    Ok((
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_TYPE, content_type),
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (
                header::CONTENT_RANGE,
                format!("bytes {start}-{end}/{file_size}"),
            ),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        bytes,
    )
        .into_response())
}

/// A requested byte range before it is checked against the file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteRange {
    /// `bytes=START-` or `bytes=START-END`
    From { start: u64, end: Option<u64> },
    /// `bytes=-LEN`: the last LEN bytes
    Suffix(u64),
}

/// Parse a single-range `Range: bytes=...` value. Anything else is ignored
/// and the whole file is served.
fn parse_range_header(value: &str) -> Option<ByteRange> {
    let spec = value.trim().strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        return end.parse().ok().map(ByteRange::Suffix);
    }

    let start = start.parse().ok()?;
    let end = if end.is_empty() {
        None
    } else {
        Some(end.parse().ok()?)
    };
    Some(ByteRange::From { start, end })
}

/// Clamp a range to the file, returning inclusive bounds, or `None` when
/// it cannot be satisfied.
fn resolve_range(range: ByteRange, file_size: u64) -> Option<(u64, u64)> {
    if file_size == 0 {
        return None;
    }
    let last = file_size - 1;
    match range {
        ByteRange::From { start, end } => {
            let end = end.map_or(last, |e| e.min(last));
            (start <= end).then_some((start, end))
        }
        ByteRange::Suffix(0) => None,
        ByteRange::Suffix(len) => Some((file_size.saturating_sub(len), last)),
    }
}

async fn read_span(path: &FsPath, start: u64, length: u64) -> ApiResult<Vec<u8>> {
    let read = async {
        let mut file = tokio::fs::File::open(path).await?;
        file.seek(SeekFrom::Start(start)).await?;
        let mut bytes = Vec::with_capacity(length as usize);
        file.take(length).read_to_end(&mut bytes).await?;
        Ok::<_, std::io::Error>(bytes)
    };

    match read.await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::not_found("no preview available"))
        }
        Err(e) => Err(ApiError::internal(format!("failed to read preview: {}", e))),
    }
}

/// Serve a captured frame by its 1-based ordinal.
pub async fn get_frame(
    State(state): State<AppState>,
    Path(ordinal): Path<usize>,
) -> ApiResult<Response> {
    let jpeg = state
        .session()
        .frame_jpeg(ordinal)
        .ok_or_else(|| ApiError::not_found(format!("frame {}", ordinal)))?;

    Ok((
        [
            (header::CONTENT_TYPE, FRAME_MIME_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        jpeg,
    )
        .into_response())
}
