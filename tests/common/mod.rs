//! Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use capture_predict::capture_orchestrator::{CaptureOrchestrator, OrchestratorConfig};
use capture_predict::media_device::{
    DeviceFailure, FacingMode, MediaDevice, MediaStream, NoopPreview, VideoFrame,
};
use capture_predict::models::{CaptureSource, ModelSelector, PredictionResult, SubmissionTarget};
use capture_predict::prediction_client::Predictor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn test_frame() -> VideoFrame {
    VideoFrame::new(4, 4, vec![128; 4 * 4 * 3])
}

// ----------------------------------------------------------------------------
// Camera
// ----------------------------------------------------------------------------

struct FakeStream {
    live: Arc<AtomicUsize>,
    stopped: bool,
}

impl MediaStream for FakeStream {
    fn label(&self) -> String {
        "fake camera".to_string()
    }

    fn latest_frame(&self) -> Option<VideoFrame> {
        Some(test_frame())
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Camera that counts streams it has handed out and not seen stopped
pub struct FakeDevice {
    pub deny: bool,
    pub open_delay: Duration,
    live: Arc<AtomicUsize>,
    opened: AtomicUsize,
}

impl FakeDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    pub fn denying() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    pub fn slow(open_delay: Duration) -> Arc<Self> {
        let mut device = Self::build(false);
        device.open_delay = open_delay;
        Arc::new(device)
    }

    fn build(deny: bool) -> Self {
        Self {
            deny,
            open_delay: Duration::ZERO,
            live: Arc::new(AtomicUsize::new(0)),
            opened: AtomicUsize::new(0),
        }
    }

    /// Streams currently holding the camera
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDevice for FakeDevice {
    async fn open(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>, DeviceFailure> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if self.deny {
            return Err(DeviceFailure::Denied(format!("{} blocked", facing.as_str())));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            live: self.live.clone(),
            stopped: false,
        }))
    }
}

// ----------------------------------------------------------------------------
// Predictor
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub target: SubmissionTarget,
    pub file_name: String,
    pub mime_type: String,
    pub model: ModelSelector,
}

/// Predictor with fixed latency that records every call
pub struct FakePredictor {
    latency: Duration,
    result: Mutex<PredictionResult>,
    calls: Mutex<Vec<RecordedCall>>,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl FakePredictor {
    pub fn new(latency: Duration, result: PredictionResult) -> Arc<Self> {
        Arc::new(Self {
            latency,
            result: Mutex::new(result),
            calls: Mutex::new(Vec::new()),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        })
    }

    pub fn found(latency: Duration) -> Arc<Self> {
        Self::new(
            latency,
            PredictionResult::ObjectImage {
                image_data: vec![0x89, b'P', b'N', b'G'],
                found: true,
            },
        )
    }

    pub fn set_result(&self, result: PredictionResult) {
        *self.result.lock().unwrap() = result;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Predictor for FakePredictor {
    async fn submit(&self, source: CaptureSource, model: ModelSelector) -> PredictionResult {
        self.calls.lock().unwrap().push(RecordedCall {
            target: source.target(),
            file_name: source.file_name().to_string(),
            mime_type: source.mime_type().to_string(),
            model,
        });

        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;

        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        self.result.lock().unwrap().clone()
    }
}

pub fn spawn(
    device: Arc<FakeDevice>,
    predictor: Arc<FakePredictor>,
) -> CaptureOrchestrator {
    CaptureOrchestrator::spawn(
        OrchestratorConfig::default(),
        device,
        Arc::new(NoopPreview),
        predictor,
    )
}

/// Let spawned tasks run without advancing the paused clock much
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
