//! CaptureOrchestrator - capture-and-predict workflow
//!
//! ## Responsibilities
//!
//! - Hold the one pending capture (uploaded file or sampled frame)
//! - Drive the camera, auto-detect and submission transitions
//! - Allow at most one submission in flight
//! - Drop results that no longer match what the user is looking at
//! - Release the camera exactly once on shutdown
//!
//! ## Design
//!
//! A single task owns all state. [`CaptureOrchestrator`] is a cheap handle
//! that sends commands to it; every transition is published on a `watch`
//! channel before the command's reply is sent.

mod actor;
pub mod types;

use crate::camera_session::CameraSessionManager;
use crate::error::{Error, Result};
use crate::media_device::{MediaDevice, PreviewSink};
use crate::models::{MediaBlob, ModelSelector};
use crate::prediction_client::Predictor;
use actor::{Command, OrchestratorActor, Reply};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
pub use types::{Mode, OrchestratorConfig, OrchestratorState, PendingCapture};

const COMMAND_BUFFER: usize = 32;

/// Handle to a running orchestrator
///
/// Clones share the same orchestrator. When the last handle is dropped the
/// orchestrator tears down on its own.
#[derive(Clone)]
pub struct CaptureOrchestrator {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<OrchestratorState>,
}

impl CaptureOrchestrator {
    /// Spawn the orchestrator task on the current runtime
    pub fn spawn(
        config: OrchestratorConfig,
        device: Arc<dyn MediaDevice>,
        preview: Arc<dyn PreviewSink>,
        predictor: Arc<dyn Predictor>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(OrchestratorState::new(config.default_model));

        let camera = CameraSessionManager::new(device, preview, config.facing_modes.clone());
        let actor = OrchestratorActor::new(config, camera, predictor, commands_rx, state_tx);
        tokio::spawn(actor.run());

        tracing::info!("Capture orchestrator started");

        Self {
            commands: commands_tx,
            state: state_rx,
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> OrchestratorState {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every transition
    pub fn subscribe(&self) -> watch::Receiver<OrchestratorState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`
    pub async fn wait_for<F>(&self, predicate: F) -> Result<OrchestratorState>
    where
        F: FnMut(&OrchestratorState) -> bool,
    {
        let mut rx = self.state.clone();
        let state = rx.wait_for(predicate).await.map_err(|_| Error::Closed)?;
        Ok(state.clone())
    }

    /// Make `file` the pending capture. Stops the camera if it is live.
    pub async fn select_file(&self, file: MediaBlob) -> Result<()> {
        self.request(|reply| Command::SelectFile { file, reply }).await
    }

    /// Acquire the camera. Clears the pending capture and last result.
    pub async fn open_camera(&self) -> Result<()> {
        self.request(|reply| Command::OpenCamera { reply }).await
    }

    pub async fn close_camera(&self) -> Result<()> {
        self.request(|reply| Command::CloseCamera { reply }).await
    }

    /// Start auto-detect at the configured period
    pub async fn start_auto_detect(&self) -> Result<()> {
        self.request(|reply| Command::StartAutoDetect { period: None, reply })
            .await
    }

    pub async fn start_auto_detect_every(&self, period: Duration) -> Result<()> {
        self.request(|reply| Command::StartAutoDetect {
            period: Some(period),
            reply,
        })
        .await
    }

    /// Stop auto-detect; the camera stays open
    pub async fn stop_auto_detect(&self) -> Result<()> {
        self.request(|reply| Command::StopAutoDetect { reply }).await
    }

    /// Sample the live frame, close the camera and submit the photo
    pub async fn capture_manual(&self) -> Result<()> {
        self.request(|reply| Command::CaptureManual { reply }).await
    }

    /// Submit the pending capture
    pub async fn send_pending(&self) -> Result<()> {
        self.request(|reply| Command::SendPending { reply }).await
    }

    pub async fn select_model(&self, model: ModelSelector) -> Result<()> {
        self.request(|reply| Command::SelectModel { model, reply }).await
    }

    /// Stop everything and release the camera. Succeeds if already shut down.
    pub async fn shutdown(&self) -> Result<()> {
        match self.request(|reply| Command::Shutdown { reply }).await {
            Err(Error::Closed) => Ok(()),
            other => other,
        }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_device::{NoMediaDevice, NoopPreview};
    use crate::models::{CaptureSource, PredictionResult};
    use async_trait::async_trait;

    struct EchoPredictor;

    #[async_trait]
    impl Predictor for EchoPredictor {
        async fn submit(&self, source: CaptureSource, _model: ModelSelector) -> PredictionResult {
            PredictionResult::Message {
                text: source.file_name().to_string(),
            }
        }
    }

    fn orchestrator() -> CaptureOrchestrator {
        CaptureOrchestrator::spawn(
            OrchestratorConfig::default(),
            Arc::new(NoMediaDevice),
            Arc::new(NoopPreview),
            Arc::new(EchoPredictor),
        )
    }

    #[tokio::test]
    async fn test_initial_state() {
        let orch = orchestrator();
        let state = orch.state();
        assert_eq!(state.mode, Mode::Idle);
        assert!(!state.sending);
        assert!(state.pending_capture.is_none());
        assert_eq!(state.selected_model, ModelSelector::Primary);
    }

    #[tokio::test]
    async fn test_send_without_capture_rejected() {
        let orch = orchestrator();
        let err = orch.send_pending().await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let orch = orchestrator();
        orch.select_file(MediaBlob::new(b"jpeg".to_vec(), "image/jpeg", "cat.jpg"))
            .await
            .unwrap();
        assert_eq!(orch.state().pending_capture.unwrap().file_name, "cat.jpg");

        orch.send_pending().await.unwrap();
        let state = orch.wait_for(|s| !s.sending).await.unwrap();
        assert_eq!(
            state.last_result,
            Some(PredictionResult::Message {
                text: "cat.jpg".to_string()
            })
        );
        // The pending capture stays available for a resend
        assert!(state.pending_capture.is_some());
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let orch = orchestrator();
        let err = orch
            .select_file(MediaBlob::new(Vec::new(), "image/png", "empty.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert!(orch.state().pending_capture.is_none());
    }

    #[tokio::test]
    async fn test_no_camera_device() {
        let orch = orchestrator();
        let err = orch.open_camera().await.unwrap_err();
        assert!(matches!(err, Error::Device(_)));
        let state = orch.state();
        assert_eq!(state.mode, Mode::Idle);
        assert!(!state.camera_active);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let orch = orchestrator();
        orch.shutdown().await.unwrap();
        orch.shutdown().await.unwrap();
        assert!(matches!(orch.close_camera().await, Err(Error::Closed)));
    }
}
