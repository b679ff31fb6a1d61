//! PredictionClient - inference service adapter
//!
//! ## Responsibilities
//!
//! - Route a payload to the image or video endpoint by MIME type
//! - Send it as multipart (`file` + `model`)
//! - Reduce the response to a [`PredictionResult`]
//!
//! No retries and no internal locking: the caller decides when to submit
//! and makes sure submissions do not overlap.

pub mod types;

use crate::error::{Error, Result};
use crate::models::{
    CaptureSource, ModelSelector, PredictionResult, SubmissionTarget, CAPTURED_FILE_NAME,
};
use async_trait::async_trait;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::Duration;
pub use types::{UploadResponse, DEFAULT_COMPLETION_TEXT, FOUND_OBJECT_MSG};
use types::non_empty;

/// Default request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Anything that turns a capture into a prediction
///
/// Failures are reported as [`PredictionResult::Failure`], never as `Err`.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn submit(&self, source: CaptureSource, model: ModelSelector) -> PredictionResult;
}

/// HTTP client for the inference service
pub struct PredictionClient {
    client: reqwest::Client,
    base_url: String,
    media_base_url: String,
    timeout: Duration,
}

impl PredictionClient {
    /// Create new client
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create new client with custom timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        let base_url = trim_base(base_url.into());
        Ok(Self {
            client,
            media_base_url: base_url.clone(),
            base_url,
            timeout,
        })
    }

    /// Serve processed videos from a different base
    pub fn with_media_base(mut self, media_base_url: impl Into<String>) -> Self {
        self.media_base_url = trim_base(media_base_url.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full upload URL for a target
    pub fn endpoint(&self, target: SubmissionTarget) -> String {
        format!("{}{}", self.base_url, target.path())
    }

    /// Playback URL of a processed video
    pub fn video_url(&self, video_filename: &str) -> String {
        format!("{}/video/{}", self.media_base_url, video_filename)
    }

    /// Send one submission
    pub async fn submit(&self, source: CaptureSource, model: ModelSelector) -> PredictionResult {
        match self.try_submit(source, model).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "Submission failed");
                PredictionResult::from_error(&e)
            }
        }
    }

    async fn try_submit(&self, source: CaptureSource, model: ModelSelector) -> Result<PredictionResult> {
        let target = source.target();
        let url = self.endpoint(target);
        let blob = source.into_blob();

        let file_name = if blob.file_name.trim().is_empty() {
            CAPTURED_FILE_NAME.to_string()
        } else {
            blob.file_name
        };
        let size = blob.data.len();

        let part = Part::bytes(blob.data)
            .file_name(file_name.clone())
            .mime_str(&blob.mime_type)
            .map_err(|e| Error::Validation(format!("invalid MIME type {}: {}", blob.mime_type, e)))?;

        let form = Form::new()
            .part("file", part)
            .text("model", model.as_str());

        tracing::debug!(
            url = %url,
            target = ?target,
            file_name = %file_name,
            size = size,
            model = model.as_str(),
            "Sending submission"
        );

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let result = self.interpret(status, &body)?;

        tracing::debug!(status = %status, result = %result.summary(), "Submission completed");
        Ok(result)
    }

    /// Reduce a response to a result; precedence is rejection, video,
    /// inline image, then plain message.
    pub fn interpret(&self, status: StatusCode, body: &str) -> Result<PredictionResult> {
        let parsed = serde_json::from_str::<UploadResponse>(body);

        if !status.is_success() {
            let detail = parsed
                .ok()
                .and_then(|r| r.rejection_detail())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .map(str::to_string)
                        .unwrap_or_else(|| status.as_str().to_string())
                });
            return Err(Error::Server(detail));
        }

        let response = parsed.map_err(|e| Error::Parse(e.to_string()))?;

        if let Some(error) = non_empty(&response.error) {
            return Err(Error::Server(error));
        }

        if let Some(video_filename) = non_empty(&response.video_filename) {
            return Ok(PredictionResult::VideoResult {
                video_url: self.video_url(&video_filename),
                summary: non_empty(&response.msg),
            });
        }

        if let Some(encoded) = non_empty(&response.predicted_image) {
            let image_data = base64::engine::general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| Error::Parse(format!("predicted_image is not valid base64: {}", e)))?;

            return Ok(PredictionResult::ObjectImage {
                image_data,
                found: response.msg.as_deref() == Some(FOUND_OBJECT_MSG),
            });
        }

        let text = non_empty(&response.prediction)
            .or_else(|| non_empty(&response.msg))
            .unwrap_or_else(|| DEFAULT_COMPLETION_TEXT.to_string());

        Ok(PredictionResult::Message { text })
    }
}

#[async_trait]
impl Predictor for PredictionClient {
    async fn submit(&self, source: CaptureSource, model: ModelSelector) -> PredictionResult {
        PredictionClient::submit(self, source, model).await
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
