//! Capture-Predict Library
//!
//! Camera/file capture orchestration against a remote object-detection
//! service.
//!
//! ## Architecture (5 Components)
//!
//! 1. CameraSessionManager - Camera stream ownership
//! 2. FrameSampler - Live frame to JPEG still
//! 3. AutoDetectScheduler - Periodic sample-and-submit timer
//! 4. PredictionClient - Inference service adapter
//! 5. CaptureOrchestrator - Workflow state machine
//!
//! ## Design Principles
//!
//! - One owner: the orchestrator task holds all mutable state
//! - At most one submission in flight, one camera session alive
//! - Results that no longer match the user's view are dropped

pub mod auto_detect;
pub mod camera_session;
pub mod capture_orchestrator;
pub mod error;
pub mod frame_sampler;
pub mod media_device;
pub mod models;
pub mod prediction_client;
pub mod state;

pub use error::{Error, Result};
