//! Inference service wire types

use serde::{Deserialize, Serialize};

/// `msg` value meaning the detector found the object
pub const FOUND_OBJECT_MSG: &str = "Found object";

/// Fallback text when the service says nothing useful
pub const DEFAULT_COMPLETION_TEXT: &str = "prediction complete";

/// Response body of `/upload` and `/upload_video`
///
/// Every field is optional; which ones are present decides the result
/// variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Base64 PNG with detections drawn
    #[serde(default)]
    pub predicted_image: Option<String>,

    /// Processed video, fetched from `/video/{name}`
    #[serde(default)]
    pub video_filename: Option<String>,

    #[serde(default)]
    pub msg: Option<String>,

    #[serde(default)]
    pub error: Option<String>,

    /// Plain-text verdict, e.g. "No object detected"
    #[serde(default)]
    pub prediction: Option<String>,

    /// Echo of the uploaded file name
    #[serde(default)]
    pub filename: Option<String>,
}

impl UploadResponse {
    /// Best server-provided explanation for a rejection
    pub fn rejection_detail(&self) -> Option<String> {
        non_empty(&self.error).or_else(|| non_empty(&self.msg))
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
