use std::path::{Path, PathBuf};

/// A file written to the upload directory while a request is in flight.
///
/// The file is removed exactly once: either by [`TempUpload::discard`] after
/// the gateway has seen it, or on drop if the request bailed out earlier.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
    original_name: String,
    removed: bool,
}

impl TempUpload {
    pub fn new(path: PathBuf, original_name: String) -> Self {
        Self {
            path,
            original_name,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub async fn discard(mut self) {
        self.removed = true;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temp upload");
        }
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if !self.removed {
            self.removed = true;
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
