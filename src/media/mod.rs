//! Media gateway: hands temporary uploads to a storage backend and hands back
//! hosted URLs. The temp file is always removed, whatever the backend does.

pub mod cloudinary;
pub mod local;
pub mod temp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use temp::TempUpload;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage rejected request: {0}")]
    Rejected(String),
    #[error("invalid public id: {0}")]
    InvalidPublicId(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// A file held by the storage backend.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    pub url: String,
    pub public_id: String,
    pub kind: MediaKind,
}

impl MediaAsset {
    pub fn image(url: String, public_id: String) -> Self {
        Self { url, public_id, kind: MediaKind::Image }
    }

    pub fn video(url: String, public_id: String) -> Self {
        Self { url, public_id, kind: MediaKind::Video }
    }
}

/// A hosted-media backend.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn upload(&self, path: &Path, kind: MediaKind) -> Result<MediaAsset, MediaError>;

    async fn destroy(&self, asset: &MediaAsset) -> Result<(), MediaError>;
}

/// Explicitly constructed gateway held in application state.
#[derive(Clone)]
pub struct MediaGateway {
    storage: Arc<dyn MediaStorage>,
    timeout: Duration,
}

impl MediaGateway {
    pub fn new(storage: Arc<dyn MediaStorage>, timeout: Duration) -> Self {
        Self { storage, timeout }
    }

    /// Uploads `file` and removes it locally exactly once. `None` means the
    /// upload failed or timed out; callers decide whether that is fatal.
    pub async fn upload(&self, file: TempUpload, kind: MediaKind) -> Option<MediaAsset> {
        let result = tokio::time::timeout(self.timeout, self.storage.upload(file.path(), kind)).await;
        let original_name = file.original_name().to_string();
        file.discard().await;

        match result {
            Ok(Ok(asset)) => {
                tracing::info!(
                    backend = self.storage.name(),
                    file = %original_name,
                    url = %asset.url,
                    "file uploaded"
                );
                Some(asset)
            }
            Ok(Err(e)) => {
                tracing::warn!(backend = self.storage.name(), file = %original_name, error = %e, "upload failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    backend = self.storage.name(),
                    file = %original_name,
                    timeout_secs = self.timeout.as_secs(),
                    "upload timed out"
                );
                None
            }
        }
    }

    /// Uploads an optional file; absence and failure both yield `None`.
    pub async fn upload_optional(&self, file: Option<TempUpload>, kind: MediaKind) -> Option<MediaAsset> {
        match file {
            Some(file) => self.upload(file, kind).await,
            None => None,
        }
    }

    /// Requests deletion of stored assets in the background. Failures are
    /// logged only.
    pub fn delete_later(&self, assets: Vec<MediaAsset>) {
        if assets.is_empty() {
            return;
        }

        let storage = self.storage.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            for asset in assets {
                match tokio::time::timeout(timeout, storage.destroy(&asset)).await {
                    Ok(Ok(())) => tracing::debug!(public_id = %asset.public_id, "media deleted"),
                    Ok(Err(e)) => tracing::warn!(public_id = %asset.public_id, error = %e, "media deletion failed"),
                    Err(_) => tracing::warn!(public_id = %asset.public_id, "media deletion timed out"),
                }
            }
        });
    }
}

/// Classifies a file by extension.
pub fn detect_kind(filename: &str) -> Option<MediaKind> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "mp4" | "avi" | "mov" | "wmv" | "flv" | "webm" | "mkv" | "m4v" => Some(MediaKind::Video),
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tiff" | "webp" | "avif" => Some(MediaKind::Image),
        _ => None,
    }
}

pub fn detect_mime_type(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tiff" => "image/tiff",
        "webp" => "image/webp",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}
