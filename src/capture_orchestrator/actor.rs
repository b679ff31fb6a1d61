//! Orchestrator task
//!
//! Owns every piece of mutable state. User commands, timer ticks, camera
//! grants and submission completions all arrive as messages and are applied
//! one at a time.

use super::types::*;
use crate::auto_detect::{AutoDetectScheduler, TickDecision};
use crate::camera_session::{AcquiredStream, CameraSessionManager};
use crate::error::{Error, Result};
use crate::frame_sampler::FrameSampler;
use crate::models::{CaptureSource, MediaBlob, ModelSelector, PredictionResult};
use crate::prediction_client::Predictor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};

const EVENT_BUFFER: usize = 64;

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// Requests from handles
pub(crate) enum Command {
    SelectFile { file: MediaBlob, reply: Reply<()> },
    OpenCamera { reply: Reply<()> },
    CloseCamera { reply: Reply<()> },
    StartAutoDetect { period: Option<Duration>, reply: Reply<()> },
    StopAutoDetect { reply: Reply<()> },
    CaptureManual { reply: Reply<()> },
    SendPending { reply: Reply<()> },
    SelectModel { model: ModelSelector, reply: Reply<()> },
    Shutdown { reply: Reply<()> },
}

/// Internal events
pub(crate) enum Event {
    Tick { run: u64 },
    CameraAcquired { attempt: u64, outcome: Result<AcquiredStream> },
    SubmissionDone { ticket: SubmissionTicket, result: PredictionResult },
}

struct CameraRequest {
    attempt: u64,
    reply: Reply<()>,
}

pub(crate) struct OrchestratorActor {
    config: OrchestratorConfig,
    state: OrchestratorState,
    camera: CameraSessionManager,
    scheduler: AutoDetectScheduler,
    sampler: FrameSampler,
    predictor: Arc<dyn Predictor>,
    pending: Option<CaptureSource>,
    /// Bumped whenever the pending capture is replaced or cleared
    capture_epoch: u64,
    in_flight: Option<u64>,
    next_ticket: u64,
    camera_request: Option<CameraRequest>,
    camera_attempts: u64,
    torn_down: bool,
    commands: mpsc::Receiver<Command>,
    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
    state_tx: watch::Sender<OrchestratorState>,
}

impl OrchestratorActor {
    pub(crate) fn new(
        config: OrchestratorConfig,
        camera: CameraSessionManager,
        predictor: Arc<dyn Predictor>,
        commands: mpsc::Receiver<Command>,
        state_tx: watch::Sender<OrchestratorState>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        Self {
            state: OrchestratorState::new(config.default_model),
            sampler: FrameSampler::new(config.jpeg_quality),
            config,
            camera,
            scheduler: AutoDetectScheduler::new(),
            predictor,
            pending: None,
            capture_epoch: 0,
            in_flight: None,
            next_ticket: 0,
            camera_request: None,
            camera_attempts: 0,
            torn_down: false,
            commands,
            events_tx,
            events_rx,
            state_tx,
        }
    }

    /// Run until shutdown or until every handle is dropped, then tear down
    pub(crate) async fn run(mut self) {
        let mut shutdown_reply = None;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Some(reply) = self.handle_command(command) {
                            shutdown_reply = Some(reply);
                            break;
                        }
                    }
                    None => {
                        tracing::debug!("All orchestrator handles dropped");
                        break;
                    }
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
        }

        self.teardown();
        self.publish();
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(Ok(()));
        }
    }

    /// Apply one command. Returns the reply channel on shutdown.
    fn handle_command(&mut self, command: Command) -> Option<Reply<()>> {
        match command {
            Command::SelectFile { file, reply } => {
                let outcome = self.select_file(file);
                self.respond(reply, outcome);
            }
            Command::OpenCamera { reply } => self.open_camera(reply),
            Command::CloseCamera { reply } => {
                self.close_camera();
                self.respond(reply, Ok(()));
            }
            Command::StartAutoDetect { period, reply } => {
                let outcome = self.start_auto_detect(period.unwrap_or(self.config.auto_detect_period));
                self.respond(reply, outcome);
            }
            Command::StopAutoDetect { reply } => {
                self.stop_auto_detect();
                self.respond(reply, Ok(()));
            }
            Command::CaptureManual { reply } => {
                let outcome = self.capture_manual();
                self.respond(reply, outcome);
            }
            Command::SendPending { reply } => {
                let outcome = self.send_pending();
                self.respond(reply, outcome);
            }
            Command::SelectModel { model, reply } => {
                let outcome = self.select_model(model);
                self.respond(reply, outcome);
            }
            Command::Shutdown { reply } => return Some(reply),
        }
        None
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Tick { run } => self.on_tick(run),
            Event::CameraAcquired { attempt, outcome } => self.on_camera_acquired(attempt, outcome),
            Event::SubmissionDone { ticket, result } => self.on_submission_done(ticket, result),
        }
        self.publish();
    }

    /// Publish first so a caller woken by the reply sees the new state
    fn respond<T>(&mut self, reply: Reply<T>, outcome: Result<T>) {
        if let Err(e) = &outcome {
            tracing::debug!(error = %e, "Command rejected");
        }
        self.publish();
        let _ = reply.send(outcome);
    }

    fn publish(&mut self) {
        self.state.sending = self.in_flight.is_some();
        self.state.camera_active = self.camera.is_active();
        self.state.auto_detect = self.scheduler.stats();
        self.state.pending_capture = self.pending.as_ref().map(PendingCapture::from);

        debug_assert!(
            !self.scheduler.is_active() || self.camera.is_active(),
            "auto-detect outlived its camera"
        );

        self.state_tx.send_replace(self.state.clone());
    }

    fn set_status(&mut self, text: impl Into<String>) {
        self.state.status_text = text.into();
    }

    // ----------------------------------------------------------------------
    // Transitions
    // ----------------------------------------------------------------------

    fn select_file(&mut self, file: MediaBlob) -> Result<()> {
        if file.is_empty() {
            return Err(Error::Precondition(format!("{} is empty", file.file_name)));
        }

        self.release_camera();

        let name = file.file_name.clone();
        self.replace_pending(Some(CaptureSource::UploadedFile(file)));
        self.state.last_result = None;
        self.state.mode = Mode::Idle;
        self.set_status(format!("file ready to send: {}", name));

        tracing::info!(file_name = %name, "File selected");
        Ok(())
    }

    fn open_camera(&mut self, reply: Reply<()>) {
        self.release_camera();
        self.replace_pending(None);
        self.state.last_result = None;

        self.camera_attempts += 1;
        let attempt = self.camera_attempts;
        self.camera_request = Some(CameraRequest { attempt, reply });
        self.set_status("opening camera...");

        let acquisition = self.camera.acquisition();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = acquisition.await;
            if let Err(mpsc::error::SendError(Event::CameraAcquired { outcome: Ok(stream), .. })) =
                events.send(Event::CameraAcquired { attempt, outcome }).await
            {
                stream.discard();
            }
        });

        self.publish();
    }

    fn on_camera_acquired(&mut self, attempt: u64, outcome: Result<AcquiredStream>) {
        let request = match self.camera_request.take() {
            Some(request) if request.attempt == attempt => request,
            other => {
                self.camera_request = other;
                if let Ok(stream) = outcome {
                    tracing::debug!(attempt = attempt, "Discarding camera grant for cancelled request");
                    stream.discard();
                }
                return;
            }
        };

        let outcome = match outcome {
            Ok(stream) => {
                self.camera.install(stream);
                self.state.mode = Mode::CameraPreview;
                self.set_status("camera open");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Camera open failed");
                self.set_status(e.to_string());
                Err(e)
            }
        };

        self.respond(request.reply, outcome);
    }

    fn close_camera(&mut self) {
        let was_active = self.camera.is_active();
        self.release_camera();
        if was_active {
            self.set_status("camera closed");
        }
    }

    /// Stop auto-detect, cancel a pending open and release the session
    fn release_camera(&mut self) {
        self.halt_auto_detect();

        if let Some(request) = self.camera_request.take() {
            let _ = request
                .reply
                .send(Err(Error::Precondition("camera request cancelled".to_string())));
        }

        self.camera.stop();
        self.state.mode = Mode::Idle;
    }

    fn start_auto_detect(&mut self, period: Duration) -> Result<()> {
        if !self.camera.is_active() {
            return self.reject("open the camera before starting auto-detect");
        }
        if period.is_zero() {
            return self.reject("auto-detect period must be greater than zero");
        }

        self.halt_auto_detect();

        let events = self.events_tx.clone();
        self.scheduler.start(period, true, move |run| {
            match events.try_send(Event::Tick { run }) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Closed(_)) => false,
            }
        })?;

        self.state.mode = Mode::AutoDetecting;
        let fps = 1000.0 / self.scheduler.period().as_millis().max(1) as f64;
        self.set_status(format!("auto-detect running ({:.1} FPS)", fps));
        Ok(())
    }

    fn stop_auto_detect(&mut self) {
        self.halt_auto_detect();
    }

    /// Idempotent. Clears the overlay and reverts the mode.
    fn halt_auto_detect(&mut self) {
        if !self.scheduler.stop() {
            return;
        }

        self.state.last_result = self.state.last_result.take().map(PredictionResult::without_artifact);
        if self.camera.is_active() {
            self.state.mode = Mode::CameraPreview;
            self.set_status("auto-detect stopped");
        } else {
            self.state.mode = Mode::Idle;
        }
    }

    /// Rejections leave auto-detect and the camera as they were
    fn capture_manual(&mut self) -> Result<()> {
        if !self.camera.is_active() {
            return self.reject("camera is not active");
        }
        if self.in_flight.is_some() {
            return self.reject("a submission is already in flight");
        }

        let blob = match self.sampler.capture(self.camera.session()) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(error = %e, "Manual capture failed");
                self.set_status(e.to_string());
                return Err(e);
            }
        };

        self.halt_auto_detect();

        let source = CaptureSource::LiveFrame(blob);
        self.replace_pending(Some(source.clone()));
        self.release_camera();
        self.state.last_result = None;
        self.set_status("photo captured, sending...");

        self.dispatch(source, SubmissionOrigin::Manual { capture: self.capture_epoch });
        Ok(())
    }

    fn send_pending(&mut self) -> Result<()> {
        if self.in_flight.is_some() {
            return self.reject("a submission is already in flight");
        }
        let source = self
            .pending
            .clone()
            .ok_or_else(|| Error::Precondition("nothing to send".to_string()))?;

        self.state.last_result = None;
        self.set_status(format!("sending {}...", source.file_name()));

        self.dispatch(source, SubmissionOrigin::Manual { capture: self.capture_epoch });
        Ok(())
    }

    /// Refuse a command without touching anything but the status line
    fn reject(&mut self, reason: &str) -> Result<()> {
        let err = Error::Precondition(reason.to_string());
        self.set_status(err.to_string());
        Err(err)
    }

    fn select_model(&mut self, model: ModelSelector) -> Result<()> {
        if self.in_flight.is_some() || self.scheduler.is_active() {
            return Err(Error::Precondition(
                "model cannot change while sending or auto-detecting".to_string(),
            ));
        }

        self.state.selected_model = model;
        tracing::info!(model = model.as_str(), "Model selected");
        Ok(())
    }

    fn replace_pending(&mut self, source: Option<CaptureSource>) {
        self.pending = source;
        self.capture_epoch += 1;
    }

    // ----------------------------------------------------------------------
    // Submissions
    // ----------------------------------------------------------------------

    fn on_tick(&mut self, run: u64) {
        match self.scheduler.on_tick(run, self.in_flight.is_some()) {
            TickDecision::Stale | TickDecision::Dropped => return,
            TickDecision::Fire => {}
        }

        let blob = match self.sampler.capture(self.camera.session()) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(run = run, error = %e, "Auto-detect sampling failed");
                return;
            }
        };

        self.scheduler.record_submitted();
        self.dispatch(CaptureSource::LiveFrame(blob), SubmissionOrigin::Auto { run });
    }

    fn dispatch(&mut self, source: CaptureSource, origin: SubmissionOrigin) {
        self.next_ticket += 1;
        let ticket = SubmissionTicket {
            id: self.next_ticket,
            origin,
        };
        self.in_flight = Some(ticket.id);

        tracing::debug!(
            ticket = ticket.id,
            origin = ?origin,
            target = ?source.target(),
            file_name = %source.file_name(),
            "Submission dispatched"
        );

        let predictor = self.predictor.clone();
        let model = self.state.selected_model;
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = predictor.submit(source, model).await;
            let _ = events.send(Event::SubmissionDone { ticket, result }).await;
        });
    }

    fn on_submission_done(&mut self, ticket: SubmissionTicket, result: PredictionResult) {
        if self.in_flight == Some(ticket.id) {
            self.in_flight = None;
        }

        let relevant = match ticket.origin {
            SubmissionOrigin::Auto { run } => self.scheduler.is_current(run),
            SubmissionOrigin::Manual { capture } => capture == self.capture_epoch,
        };
        if !relevant {
            tracing::debug!(
                ticket = ticket.id,
                origin = ?ticket.origin,
                current_run = self.scheduler.run(),
                "Stale result dropped"
            );
            return;
        }

        let time = chrono::Local::now().format("%H:%M:%S");
        match ticket.origin {
            SubmissionOrigin::Auto { .. } => {
                if let PredictionResult::Failure { reason, .. } = &result {
                    self.scheduler.record_failure();
                    self.set_status(format!("auto-detect submission failed: {} ({})", reason, time));
                } else {
                    self.set_status(format!("auto-detecting... ({})", time));
                }
            }
            SubmissionOrigin::Manual { .. } => {
                if let PredictionResult::Failure { reason, .. } = &result {
                    self.set_status(reason.clone());
                } else {
                    self.set_status("prediction complete");
                }
            }
        }

        tracing::info!(ticket = ticket.id, result = %result.summary(), "Result applied");
        self.state.last_result = Some(result);
    }

    // ----------------------------------------------------------------------
    // Teardown
    // ----------------------------------------------------------------------

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.release_camera();

        // Late camera grants must not outlive the orchestrator
        self.events_rx.close();
        while let Ok(event) = self.events_rx.try_recv() {
            if let Event::CameraAcquired { outcome: Ok(stream), .. } = event {
                stream.discard();
            }
        }

        // An outstanding result has nowhere to land anymore
        let abandoned = self.in_flight.take();
        self.set_status("session closed");

        tracing::info!(abandoned_ticket = ?abandoned, "Orchestrator torn down");
    }
}
