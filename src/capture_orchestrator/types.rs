//! CaptureOrchestrator types

use crate::auto_detect::{AutoDetectStats, DEFAULT_PERIOD_MS};
use crate::frame_sampler::DEFAULT_JPEG_QUALITY;
use crate::media_device::FacingMode;
use crate::models::{CaptureKind, CaptureSource, ModelSelector, PredictionResult, SubmissionTarget};
use serde::Serialize;
use std::time::Duration;

/// Operating mode. "Sending" is the separate [`OrchestratorState::sending`] flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Idle,
    CameraPreview,
    AutoDetecting,
}

/// Summary of the capture waiting to be sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingCapture {
    pub kind: CaptureKind,
    pub file_name: String,
    pub mime_type: String,
    pub size: usize,
    pub target: SubmissionTarget,
}

impl From<&CaptureSource> for PendingCapture {
    fn from(source: &CaptureSource) -> Self {
        Self {
            kind: source.kind(),
            file_name: source.file_name().to_string(),
            mime_type: source.mime_type().to_string(),
            size: source.blob().len(),
            target: source.target(),
        }
    }
}

/// Observable orchestrator state, published after every transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorState {
    pub mode: Mode,
    /// A submission is outstanding
    pub sending: bool,
    pub camera_active: bool,
    pub selected_model: ModelSelector,
    pub last_result: Option<PredictionResult>,
    pub pending_capture: Option<PendingCapture>,
    pub status_text: String,
    pub auto_detect: AutoDetectStats,
}

impl OrchestratorState {
    pub fn new(model: ModelSelector) -> Self {
        Self {
            mode: Mode::Idle,
            sending: false,
            camera_active: false,
            selected_model: model,
            last_result: None,
            pending_capture: None,
            status_text: "ready".to_string(),
            auto_detect: AutoDetectStats::default(),
        }
    }

    pub fn is_auto_detecting(&self) -> bool {
        self.mode == Mode::AutoDetecting
    }
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub auto_detect_period: Duration,
    pub jpeg_quality: u8,
    pub facing_modes: Vec<FacingMode>,
    pub default_model: ModelSelector,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            auto_detect_period: Duration::from_millis(DEFAULT_PERIOD_MS),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            facing_modes: FacingMode::PREFERENCE.to_vec(),
            default_model: ModelSelector::default(),
        }
    }
}

/// Where a submission came from, and what makes its result still relevant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmissionOrigin {
    /// Auto-detect tick of the given run
    Auto { run: u64 },
    /// User action on the given pending capture
    Manual { capture: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SubmissionTicket {
    pub id: u64,
    pub origin: SubmissionOrigin,
}
