//! Shared data model
//!
//! Payloads, capture sources, model selector and prediction results passed
//! between the sampler, the prediction client and the orchestrator.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// File name used for frames sampled from the live camera
pub const CAPTURED_FILE_NAME: &str = "captured_image.jpeg";

/// Binary payload with its content type and file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

impl MediaBlob {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    /// JPEG still taken from the live camera
    pub fn captured_jpeg(data: Vec<u8>) -> Self {
        Self::new(data, "image/jpeg", CAPTURED_FILE_NAME)
    }

    /// Read a file from disk, inferring the MIME type from its extension
    pub async fn from_path(path: &Path) -> crate::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Validation(format!("{} has no file name", path.display())))?;

        Ok(Self::new(data, mime_for_path(path), file_name))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// MIME type by file extension
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

/// Where a submission's payload came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// Frame sampled from the live camera, already encoded
    LiveFrame(MediaBlob),
    /// File picked by the user
    UploadedFile(MediaBlob),
}

impl CaptureSource {
    pub fn blob(&self) -> &MediaBlob {
        match self {
            CaptureSource::LiveFrame(blob) | CaptureSource::UploadedFile(blob) => blob,
        }
    }

    pub fn into_blob(self) -> MediaBlob {
        match self {
            CaptureSource::LiveFrame(blob) | CaptureSource::UploadedFile(blob) => blob,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.blob().mime_type
    }

    pub fn file_name(&self) -> &str {
        &self.blob().file_name
    }

    pub fn target(&self) -> SubmissionTarget {
        SubmissionTarget::from_mime(self.mime_type())
    }

    pub fn kind(&self) -> CaptureKind {
        match self {
            CaptureSource::LiveFrame(_) => CaptureKind::LiveFrame,
            CaptureSource::UploadedFile(_) => CaptureKind::UploadedFile,
        }
    }
}

/// Discriminant of [`CaptureSource`] for snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    LiveFrame,
    UploadedFile,
}

/// Endpoint family a payload is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionTarget {
    Image,
    Video,
}

impl SubmissionTarget {
    /// `video/*` goes to the video endpoint, everything else to the image one
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.trim().to_ascii_lowercase().starts_with("video/") {
            SubmissionTarget::Video
        } else {
            SubmissionTarget::Image
        }
    }

    /// Path of the upload endpoint relative to the service base
    pub fn path(&self) -> &'static str {
        match self {
            SubmissionTarget::Image => "/upload",
            SubmissionTarget::Video => "/upload_video",
        }
    }
}

/// Detection model selector, sent verbatim as the `model` form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelSelector {
    /// Augmented model
    #[default]
    #[serde(rename = "new")]
    Primary,
    /// No-augment model
    #[serde(rename = "old")]
    Alternate,
}

impl ModelSelector {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSelector::Primary => "new",
            ModelSelector::Alternate => "old",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelSelector::Primary => "Augmented",
            ModelSelector::Alternate => "No Augment",
        }
    }
}

impl std::fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" | "primary" | "augmented" => Ok(ModelSelector::Primary),
            "old" | "alternate" | "no-augment" => Ok(ModelSelector::Alternate),
            other => Err(Error::Validation(format!("unknown model: {}", other))),
        }
    }
}

/// Which error family a failed submission belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Server,
    Parse,
}

/// Outcome of one submission. Exactly one is displayed at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PredictionResult {
    /// Annotated still returned inline
    ObjectImage {
        #[serde(serialize_with = "serialize_base64")]
        image_data: Vec<u8>,
        found: bool,
    },
    /// Processed video available for playback
    VideoResult {
        video_url: String,
        summary: Option<String>,
    },
    /// Text only, no visual artifact
    Message { text: String },
    Failure { kind: FailureKind, reason: String },
}

impl PredictionResult {
    /// Build a failure from a submission error
    pub fn from_error(error: &Error) -> Self {
        let kind = match error {
            Error::Server(_) => FailureKind::Server,
            Error::Parse(_) => FailureKind::Parse,
            _ => FailureKind::Transport,
        };

        PredictionResult::Failure {
            kind,
            reason: error.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PredictionResult::Failure { .. })
    }

    pub fn has_artifact(&self) -> bool {
        matches!(
            self,
            PredictionResult::ObjectImage { .. } | PredictionResult::VideoResult { .. }
        )
    }

    /// Human-readable one-liner
    pub fn summary(&self) -> String {
        match self {
            PredictionResult::ObjectImage { found: true, .. } => "object found".to_string(),
            PredictionResult::ObjectImage { found: false, .. } => "no object found".to_string(),
            PredictionResult::VideoResult { summary, .. } => summary
                .clone()
                .unwrap_or_else(|| "video processed".to_string()),
            PredictionResult::Message { text } => text.clone(),
            PredictionResult::Failure { reason, .. } => reason.clone(),
        }
    }

    /// Drop the visual artifact, keeping whatever text described it
    pub fn without_artifact(self) -> Self {
        if self.has_artifact() {
            PredictionResult::Message {
                text: self.summary(),
            }
        } else {
            self
        }
    }
}

fn serialize_base64<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use base64::Engine;
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
}
