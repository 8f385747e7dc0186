//! Opened media sources.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{ExtractionError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// A video resolved to a known duration and pixel size.
///
/// Owns a scratch directory that serves as the raster surface for frame
/// captures. The directory is removed when the source is released or
/// dropped, whichever comes first.
#[derive(Debug)]
pub struct MediaSource {
    path: PathBuf,
    info: VideoInfo,
    surface: TempDir,
}

impl MediaSource {
    /// Open `path` and wait up to `timeout` for its metadata.
    pub async fn open(path: impl AsRef<Path>, timeout: Duration) -> Result<Self, ExtractionError> {
        let path = path.as_ref();
        let probed = probe_video(path, timeout).await;
        Self::from_probe(path, probed)
    }

    /// Turn a probe outcome into a source; any probe failure, a timeout
    /// included, means the source is unreadable.
    fn from_probe(path: &Path, probed: MediaResult<VideoInfo>) -> Result<Self, ExtractionError> {
        let info = probed.map_err(|e| ExtractionError::source_unreadable(e.detail()))?;

        info!(
            path = %path.display(),
            duration = info.duration,
            width = info.width,
            height = info.height,
            "Opened media source"
        );

        Self::with_info(path, info)
            .map_err(|e| ExtractionError::source_unreadable(e.to_string()))
    }

    /// Wrap an already probed video.
    pub fn with_info(path: impl AsRef<Path>, info: VideoInfo) -> MediaResult<Self> {
        let surface = tempfile::Builder::new().prefix("tpro-frames-").tempdir()?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            info,
            surface,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.info.duration
    }

    /// Native (display) dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    /// Scratch location for the capture with the given ordinal.
    pub fn surface_path(&self, ordinal: usize) -> PathBuf {
        self.surface.path().join(format!("frame_{:02}.jpg", ordinal))
    }

    /// Release the source now rather than at drop.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for MediaSource {
    fn drop(&mut self) {
        debug!(
            path = %self.path.display(),
            surface = %self.surface.path().display(),
            "Releasing media source"
        );
    }
}
