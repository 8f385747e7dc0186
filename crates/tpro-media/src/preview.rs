//! Stored uploads served back for playback.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::MediaResult;

/// Handle to an uploaded clip kept on disk for preview playback.
///
/// The backing file is deleted exactly once: by [`PreviewHandle::release`]
/// or, if that is never called, when the handle is dropped.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    path: PathBuf,
    content_type: String,
    size: u64,
    released: bool,
}

impl PreviewHandle {
    /// Persist `bytes` under `dir` and return a handle to them.
    pub async fn create(
        dir: impl AsRef<Path>,
        bytes: &[u8],
        content_type: impl Into<String>,
    ) -> MediaResult<Self> {
        let dir = dir.as_ref();
        let content_type = content_type.into();
        let id = Uuid::new_v4();

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.{}", id, extension_for(&content_type)));
        tokio::fs::write(&path, bytes).await?;

        debug!(id = %id, path = %path.display(), size = bytes.len(), "Created preview");

        Ok(Self {
            id,
            path,
            content_type,
            size: bytes.len() as u64,
            released: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the backing file.
    pub fn release(mut self) {
        self.release_file();
    }

    fn release_file(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(id = %self.id, "Released preview"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(id = %self.id, "Failed to remove preview {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release_file();
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        "video/x-matroska" => "mkv",
        "video/3gpp" => "3gp",
        _ => "bin",
    }
}
