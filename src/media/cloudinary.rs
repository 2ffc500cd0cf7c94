// src/media/cloudinary.rs
use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;

use super::{detect_mime_type, MediaAsset, MediaError, MediaKind, MediaStorage};
use crate::config::CloudinaryConfig;

const UPLOAD_FOLDER: &str = "vidtube";

/// Signed-upload client for the Cloudinary REST API. Signatures use SHA-256,
/// so the account must have SHA-256 signing enabled.
#[derive(Debug, Clone)]
pub struct CloudinaryClient {
    client: Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: Client::new(),
            cloud_name: config.cloud_name,
            api_key: config.api_key,
            api_secret: config.api_secret,
            base_url: "https://api.cloudinary.com/v1_1".to_string(),
        }
    }

    fn endpoint(&self, kind: MediaKind, action: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, self.cloud_name, kind.as_str(), action)
    }

    fn signature(&self, params: &[(&str, String)]) -> String {
        sign_params(params, &self.api_secret)
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => format!("{} ({})", body.error.message, status),
            Err(_) => format!("HTTP {}", status),
        }
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, the API secret appended, then hashed.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaStorage for CloudinaryClient {
    fn name(&self) -> &'static str {
        "cloudinary"
    }

    async fn upload(&self, path: &Path, kind: MediaKind) -> Result<MediaAsset, MediaError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        let bytes = tokio::fs::read(path).await?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signed = [("folder", UPLOAD_FOLDER.to_string()), ("timestamp", timestamp.clone())];
        let signature = self.signature(&signed);

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(detect_mime_type(&file_name))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("folder", UPLOAD_FOLDER)
            .text("timestamp", timestamp)
            .text("signature", signature);

        let response = self
            .client
            .post(self.endpoint(kind, "upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MediaError::Rejected(Self::error_message(response).await));
        }

        let body: UploadResponse = response.json().await?;
        Ok(MediaAsset {
            url: body.secure_url,
            public_id: body.public_id,
            kind,
        })
    }

    async fn destroy(&self, asset: &MediaAsset) -> Result<(), MediaError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signed = [("public_id", asset.public_id.clone()), ("timestamp", timestamp.clone())];
        let signature = self.signature(&signed);

        let params = [
            ("public_id", asset.public_id.clone()),
            ("timestamp", timestamp),
            ("api_key", self.api_key.clone()),
            ("signature", signature),
        ];

        let response = self
            .client
            .post(self.endpoint(asset.kind, "destroy"))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MediaError::Rejected(Self::error_message(response).await));
        }

        let body: DestroyResponse = response.json().await?;
        match body.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(MediaError::Rejected(other.to_string())),
        }
    }
}
