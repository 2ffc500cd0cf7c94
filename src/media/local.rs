// src/media/local.rs
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use super::{MediaAsset, MediaError, MediaKind, MediaStorage};

/// Disk-backed media storage, used when no Cloudinary account is configured.
/// Files live under `root` and are served at `{base_url}/media/...`.
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder(kind: MediaKind) -> &'static str {
        match kind {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }

    /// Resolves a public id to a path inside `root`, refusing anything that
    /// could escape it.
    fn resolve(&self, public_id: &str) -> Result<PathBuf, MediaError> {
        let relative = Path::new(public_id);
        let safe = !public_id.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(MediaError::InvalidPublicId(public_id.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn upload(&self, path: &Path, kind: MediaKind) -> Result<MediaAsset, MediaError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()))
            .unwrap_or_default();
        let public_id = format!("{}/{}{}", Self::folder(kind), Uuid::new_v4(), extension);
        let destination = self.resolve(&public_id)?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(path, &destination).await?;

        Ok(MediaAsset {
            url: format!("{}/media/{}", self.base_url, public_id),
            public_id,
            kind,
        })
    }

    async fn destroy(&self, asset: &MediaAsset) -> Result<(), MediaError> {
        let path = self.resolve(&asset.public_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
