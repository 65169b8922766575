use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::ADVISORY_MAX_UPLOAD_BYTES;
use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    Unknown,
}

impl MediaKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp4" | "avi" | "mov" | "mkv" | "webm" => MediaKind::Video,
            "jpg" | "jpeg" | "png" => MediaKind::Image,
            _ => MediaKind::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(MediaKind::Unknown)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, MediaKind::Unknown)
    }
}

/// Content type for the multipart file part, by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// Owned preview artifact for one staged file: a stable copy under the
/// manager's preview directory that players can read independently of the
/// source. Releasing removes the copy; Drop is the backstop so a handle
/// can never outlive its staging.
#[derive(Debug)]
pub struct PreviewHandle {
    path: PathBuf,
    released: bool,
}

impl PreviewHandle {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(&mut self) -> std::io::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.release() {
                log::warn!("Failed to remove preview {}: {}", self.path.display(), e);
            }
        }
    }
}

/// What the HTTP layer needs to build a file part. Cloneable so it can be
/// carried across tasks without holding the staged set.
#[derive(Debug, Clone)]
pub struct VideoSource {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: &'static str,
    pub size_bytes: u64,
}

#[derive(Debug)]
pub struct StagedVideo {
    pub id: Uuid,
    pub source_path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub kind: MediaKind,
    preview: PreviewHandle,
}

impl StagedVideo {
    pub fn preview_path(&self) -> &Path {
        self.preview.path()
    }

    pub fn source(&self) -> VideoSource {
        VideoSource {
            path: self.source_path.clone(),
            file_name: self.file_name.clone(),
            content_type: content_type_for(&self.source_path),
            size_bytes: self.size_bytes,
        }
    }
}

/// Registers local files for submission. Validation is advisory only (the
/// server is the authority on size and format); a new selection supersedes
/// the previous one and revokes its previews.
#[derive(Debug)]
pub struct UploadManager {
    preview_dir: PathBuf,
    staged: Vec<StagedVideo>,
}

impl UploadManager {
    pub fn new(preview_dir: impl Into<PathBuf>) -> Result<Self> {
        let preview_dir = preview_dir.into();
        fs::create_dir_all(&preview_dir)?;
        Ok(Self {
            preview_dir,
            staged: Vec::new(),
        })
    }

    pub fn preview_dir(&self) -> &Path {
        &self.preview_dir
    }

    /// Stage a new selection, superseding any previous one. An empty list
    /// just clears the selection. On any staging error the whole new
    /// selection is discarded.
    pub fn stage(&mut self, paths: &[PathBuf]) -> Result<Vec<Uuid>> {
        self.clear();
        let mut fresh = Vec::with_capacity(paths.len());
        for path in paths {
            fresh.push(self.stage_one(path)?);
        }
        let ids = fresh.iter().map(|v| v.id).collect();
        log::info!("📤 Staged {} file(s) for analysis", fresh.len());
        self.staged = fresh;
        Ok(ids)
    }

    fn stage_one(&self, path: &Path) -> Result<StagedVideo> {
        let metadata = fs::metadata(path)
            .map_err(|_| ClientError::FileNotFound(path.display().to_string()))?;
        if !metadata.is_file() {
            return Err(ClientError::InvalidRequest(format!(
                "not a file: {}",
                path.display()
            )));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ClientError::InvalidRequest(format!("invalid file name: {}", path.display()))
            })?
            .to_string();

        let kind = MediaKind::from_path(path);
        if !kind.is_supported() {
            log::warn!(
                "File '{}' has an unrecognized extension; the server may reject it",
                file_name
            );
        }
        if metadata.len() > ADVISORY_MAX_UPLOAD_BYTES {
            log::warn!(
                "File '{}' is {} bytes, above the advisory limit of {} bytes",
                file_name,
                metadata.len(),
                ADVISORY_MAX_UPLOAD_BYTES
            );
        }

        let id = Uuid::new_v4();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_lowercase();
        let preview_path = self.preview_dir.join(format!("{}.{}", id, ext));

        // Hard link is enough for a stable snapshot; fall back to a copy
        // across filesystems.
        if fs::hard_link(path, &preview_path).is_err() {
            fs::copy(path, &preview_path)?;
        }
        log::debug!(
            "Staged '{}' ({} bytes) with preview {}",
            file_name,
            metadata.len(),
            preview_path.display()
        );

        Ok(StagedVideo {
            id,
            source_path: path.to_path_buf(),
            file_name,
            size_bytes: metadata.len(),
            kind,
            preview: PreviewHandle::new(preview_path),
        })
    }

    pub fn staged(&self) -> &[StagedVideo] {
        &self.staged
    }

    pub fn sources(&self) -> Vec<VideoSource> {
        self.staged.iter().map(StagedVideo::source).collect()
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn is_batch(&self) -> bool {
        self.staged.len() > 1
    }

    pub fn total_bytes(&self) -> u64 {
        self.staged.iter().map(|v| v.size_bytes).sum()
    }

    /// Drop the staged set and revoke every preview.
    pub fn clear(&mut self) {
        for mut video in self.staged.drain(..) {
            if let Err(e) = video.preview.release() {
                log::warn!(
                    "Failed to remove preview for '{}': {}",
                    video.file_name,
                    e
                );
            }
        }
    }
}

impl Drop for UploadManager {
    fn drop(&mut self) {
        self.clear();
    }
}
