//! MediaDevice - camera capability consumed by the core
//!
//! The core never talks to hardware directly. A host provides a
//! [`MediaDevice`] that grants or denies live streams, and optionally a
//! [`PreviewSink`] that displays the bound stream.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Camera facing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    Environment,
    User,
    Left,
    Right,
}

impl FacingMode {
    /// Preference order used when opening the camera (first available wins)
    pub const PREFERENCE: [FacingMode; 4] = [
        FacingMode::Environment,
        FacingMode::User,
        FacingMode::Left,
        FacingMode::Right,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::Environment => "environment",
            FacingMode::User => "user",
            FacingMode::Left => "left",
            FacingMode::Right => "right",
        }
    }
}

/// Raw RGB8 frame at the source's native resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB8, row-major, `width * height * 3` bytes
    pub data: Vec<u8>,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, data }
    }

    /// Expected buffer length for the declared dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Why a device refused to open
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceFailure {
    /// The user or platform denied access
    #[error("permission denied: {0}")]
    Denied(String),
    /// No device with the requested facing mode
    #[error("no matching device: {0}")]
    NotFound(String),
}

/// A granted live stream
///
/// Dropping the box does not release the hardware; the owner must call
/// [`MediaStream::stop`].
pub trait MediaStream: Send {
    /// Device label for logging
    fn label(&self) -> String;

    /// Current frame, `None` until the stream produced one
    fn latest_frame(&self) -> Option<VideoFrame>;

    /// Stop every underlying track. Must be idempotent.
    fn stop(&mut self);
}

/// Camera capability
#[async_trait]
pub trait MediaDevice: Send + Sync {
    /// Request a video-only stream with the given facing mode
    async fn open(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>, DeviceFailure>;
}

/// Live preview output
pub trait PreviewSink: Send + Sync {
    /// Called when a session is bound
    fn attach(&self, label: &str);

    /// Called when the bound session is released
    fn detach(&self);
}

/// Device for headless hosts: never has a camera
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMediaDevice;

#[async_trait]
impl MediaDevice for NoMediaDevice {
    async fn open(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>, DeviceFailure> {
        Err(DeviceFailure::NotFound(format!(
            "no camera available for facing mode {}",
            facing.as_str()
        )))
    }
}

/// Preview that displays nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPreview;

impl PreviewSink for NoopPreview {
    fn attach(&self, _label: &str) {}

    fn detach(&self) {}
}
