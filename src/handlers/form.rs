// src/handlers/form.rs
use axum::extract::multipart::{Field, Multipart};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::media::TempUpload;

/// A parsed multipart body. File parts are streamed into the upload
/// directory as [`TempUpload`]s; anything not taken by the handler is removed
/// when the form is dropped.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, TempUpload>,
}

impl MultipartForm {
    /// Reads every part. Only the names in `file_fields` may carry a file,
    /// at most one each. Parts with an empty filename count as absent.
    pub async fn read(multipart: &mut Multipart, upload_dir: &Path, file_fields: &[&str]) -> ApiResult<Self> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            let filename = field.file_name().map(str::to_string);
            match filename {
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
                Some(filename) if filename.trim().is_empty() => {
                    tracing::debug!(field = %name, "skipping empty file part");
                }
                Some(filename) => {
                    if !file_fields.contains(&name.as_str()) {
                        return Err(ApiError::bad_request(format!("Unexpected file field '{}'", name)));
                    }
                    if form.files.contains_key(&name) {
                        return Err(ApiError::bad_request(format!("Only one file is allowed for '{}'", name)));
                    }
                    let upload = save_field(field, upload_dir, &filename).await?;
                    form.files.insert(name, upload);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    pub fn file(&mut self, name: &str) -> Option<TempUpload> {
        self.files.remove(name)
    }
}

async fn save_field(mut field: Field<'_>, upload_dir: &Path, filename: &str) -> ApiResult<TempUpload> {
    fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create upload directory: {}", e)))?;

    let stored_name = format!("{}_{}", Uuid::new_v4(), sanitize_filename(filename));
    // Registered before the first write so a failed read still cleans up.
    let upload = TempUpload::new(upload_dir.join(stored_name), filename.to_string());

    let mut file = fs::File::create(upload.path())
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create temp file: {}", e)))?;

    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to write temp file: {}", e)))?;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to write temp file: {}", e)))?;

    tracing::debug!(file = %filename, path = %upload.path().display(), "multipart file staged");
    Ok(upload)
}

/// Keeps the extension and a readable stem; drops path separators and
/// anything else unsafe in a file name.
fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        // ASCII only at this point, so byte slicing is safe.
        cleaned[cleaned.len().saturating_sub(100)..].to_string()
    }
}
