use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::{ExpenseSubmission, TokenSet, UploadResult};

fn default_upload_uri() -> String {
    "https://www.googleapis.com/upload/drive/v3/files".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

/// Config for the external storage target.
#[derive(Deserialize, Serialize, Debug, JsonSchema)]
pub struct UploadConfig {
    /// Id of the shared parent folder receipts are filed under. This is
    /// a deployment-time invariant: submissions fail while it is absent.
    pub folder_id: Option<String>,
    #[serde(default = "default_upload_uri")]
    pub upload_uri: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Performs the authorized upload of a receipt to the external storage
/// API, scoped under the authenticated identity's permissions.
///
/// No automatic retry: the upload call is not idempotent on the
/// provider side, so a blind retry risks duplicate files.
pub struct DriveUploader {
    folder_id: Option<String>,
    upload_uri: String,
    client: reqwest::Client,
}

impl DriveUploader {
    pub fn new(config: &UploadConfig) -> Self {
        if config.folder_id.is_none() {
            // Loudly, at startup: every submission will fail until the
            // folder id is configured.
            warn!("No upload folder_id configured; expense submissions will be rejected.");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            folder_id: config.folder_id.clone(),
            upload_uri: config.upload_uri.clone(),
            client,
        }
    }

    /// Descriptive target name: description, amount to two decimal
    /// places, current date.
    fn file_name(submission: &ExpenseSubmission) -> String {
        format!(
            "{} - R$ {:.2} - {}",
            submission.description,
            submission.amount,
            Utc::now().format("%Y-%m-%d")
        )
    }

    /// Uploads the receipt and returns the provider's durable reference.
    /// The blob is handed to the request body once; it is never written
    /// anywhere locally.
    pub async fn submit(
        &self,
        tokens: &TokenSet,
        submission: ExpenseSubmission,
    ) -> Result<UploadResult, AppError> {
        let folder_id = self
            .folder_id
            .as_deref()
            .ok_or_else(|| AppError::Misconfigured("upload.folder_id is not set".to_string()))?;

        if submission.receipt.is_empty() {
            return Err(AppError::MissingReceipt);
        }

        let name = Self::file_name(&submission);
        debug!("Uploading receipt as '{}'", name);

        let metadata = json!({
            "name": name,
            "parents": [folder_id],
            "mimeType": submission.mime_type,
        });

        let media = Part::stream(Body::from(submission.receipt))
            .file_name(submission.original_filename)
            .mime_str(&submission.mime_type)
            .map_err(|e| AppError::Validation(format!("Tipo de arquivo inválido: {}", e)))?;

        let form = Form::new()
            .part(
                "metadata",
                Part::text(metadata.to_string())
                    .mime_str("application/json")
                    .expect("static mime type"),
            )
            .part("media", media);

        let resp = self
            .client
            .post(&self.upload_uri)
            .query(&[("uploadType", "multipart"), ("fields", "id,webViewLink")])
            .bearer_auth(&tokens.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upload(format!("storage endpoint unreachable: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Upload(format!("status {}: {}", status, body)));
        }

        let body = resp
            .json::<Value>()
            .await
            .map_err(|e| AppError::Upload(format!("bad upload response: {}", e)))?;

        let file_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Upload("no file id in upload response".to_string()))?
            .to_string();

        let link = body
            .get("webViewLink")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        info!("Receipt uploaded, file id '{}'", file_id);
        Ok(UploadResult { file_id, link })
    }
}
