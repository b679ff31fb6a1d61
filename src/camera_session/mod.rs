//! CameraSessionManager - camera stream ownership
//!
//! ## Responsibilities
//!
//! - Acquire a live stream using the facing-mode preference list
//! - Keep at most one session alive (a new one always replaces the old)
//! - Bind/unbind the session to the preview sink
//! - Release every track on stop or drop

use crate::error::{Error, Result};
use crate::media_device::{
    DeviceFailure, FacingMode, MediaDevice, MediaStream, PreviewSink, VideoFrame,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Live camera session - tracks are stopped on drop
pub struct CameraSession {
    id: Uuid,
    facing: FacingMode,
    started_at: DateTime<Utc>,
    stream: Box<dyn MediaStream>,
}

impl CameraSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn label(&self) -> String {
        self.stream.label()
    }

    /// Frame currently shown by the stream
    pub fn latest_frame(&self) -> Option<VideoFrame> {
        self.stream.latest_frame()
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stream.stop();
        tracing::debug!(session_id = %self.id, "Camera session released");
    }
}

/// Stream granted by the device, not yet installed as a session
pub struct AcquiredStream {
    pub facing: FacingMode,
    pub stream: Box<dyn MediaStream>,
}

impl AcquiredStream {
    /// Release a stream that will never be installed
    pub fn discard(mut self) {
        self.stream.stop();
    }
}

/// Try each facing mode in order until the device grants one.
///
/// A denial ends the search immediately; "not found" moves on to the next
/// preference.
pub async fn acquire(
    device: Arc<dyn MediaDevice>,
    preferences: Vec<FacingMode>,
) -> Result<AcquiredStream> {
    let mut last_miss = None;

    for facing in preferences {
        match device.open(facing).await {
            Ok(stream) => {
                tracing::debug!(facing = facing.as_str(), label = %stream.label(), "Camera granted");
                return Ok(AcquiredStream { facing, stream });
            }
            Err(DeviceFailure::Denied(msg)) => {
                tracing::warn!(facing = facing.as_str(), reason = %msg, "Camera access denied");
                return Err(Error::Device(DeviceFailure::Denied(msg).to_string()));
            }
            Err(DeviceFailure::NotFound(msg)) => {
                tracing::debug!(facing = facing.as_str(), reason = %msg, "No camera for facing mode");
                last_miss = Some(msg);
            }
        }
    }

    Err(Error::Device(match last_miss {
        Some(msg) => DeviceFailure::NotFound(msg).to_string(),
        None => "no facing mode requested".to_string(),
    }))
}

/// CameraSessionManager - sole owner of the camera stream
pub struct CameraSessionManager {
    device: Arc<dyn MediaDevice>,
    preview: Arc<dyn PreviewSink>,
    preferences: Vec<FacingMode>,
    session: Option<CameraSession>,
}

impl CameraSessionManager {
    pub fn new(
        device: Arc<dyn MediaDevice>,
        preview: Arc<dyn PreviewSink>,
        preferences: Vec<FacingMode>,
    ) -> Self {
        Self {
            device,
            preview,
            preferences,
            session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&CameraSession> {
        self.session.as_ref()
    }

    /// Acquisition future that does not borrow the manager, so it can run
    /// on its own task while the owner keeps handling events.
    pub fn acquisition(&self) -> impl Future<Output = Result<AcquiredStream>> + Send + 'static {
        acquire(self.device.clone(), self.preferences.clone())
    }

    /// Tear down any prior session, then acquire and install a new one.
    ///
    /// On failure no session exists afterwards.
    pub async fn start(&mut self) -> Result<&CameraSession> {
        self.stop();
        let acquired = self.acquisition().await?;
        Ok(self.install(acquired))
    }

    /// Install a granted stream as the live session, replacing any prior one
    pub fn install(&mut self, acquired: AcquiredStream) -> &CameraSession {
        self.stop();

        let session = CameraSession {
            id: Uuid::new_v4(),
            facing: acquired.facing,
            started_at: Utc::now(),
            stream: acquired.stream,
        };
        self.preview.attach(&session.label());

        tracing::info!(
            session_id = %session.id,
            facing = session.facing.as_str(),
            label = %session.label(),
            "Camera session started"
        );

        self.session.insert(session)
    }

    /// Release the session if any. Returns whether one was live.
    pub fn stop(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                self.preview.detach();
                let live_secs = (Utc::now() - session.started_at()).num_seconds();
                tracing::info!(session_id = %session.id, live_secs = live_secs, "Camera session stopped");
                true
            }
            None => false,
        }
    }
}

impl Drop for CameraSessionManager {
    fn drop(&mut self) {
        self.stop();
    }
}
