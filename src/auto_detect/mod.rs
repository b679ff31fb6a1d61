//! AutoDetectScheduler - periodic sample-and-submit timer
//!
//! ## Responsibilities
//!
//! - Recurring timer at a fixed period while the camera is live
//! - Tag every tick with the run it belongs to, so ticks from a cancelled
//!   run are recognisable
//! - Drop (never queue) ticks that arrive while a submission is outstanding
//!
//! The scheduler does not sample or submit itself. Ticks are handed to a
//! callback; the owner decides with [`AutoDetectScheduler::on_tick`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Default period (2 FPS)
pub const DEFAULT_PERIOD_MS: u64 = 500;

/// Counters for the current scheduler lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoDetectStats {
    /// Ticks delivered for the active run
    pub ticks: u64,
    /// Ticks skipped because a submission was outstanding
    pub dropped: u64,
    /// Submissions dispatched from ticks
    pub submitted: u64,
    /// Submissions that came back as failures
    pub failures: u64,
}

/// What the owner should do with a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Tick from a cancelled run
    Stale,
    /// Submission outstanding, tick discarded
    Dropped,
    /// Sample and submit now
    Fire,
}

/// AutoDetectScheduler instance
pub struct AutoDetectScheduler {
    timer: Option<JoinHandle<()>>,
    run: u64,
    period: Duration,
    stats: AutoDetectStats,
}

impl AutoDetectScheduler {
    pub fn new() -> Self {
        Self {
            timer: None,
            run: 0,
            period: Duration::from_millis(DEFAULT_PERIOD_MS),
            stats: AutoDetectStats::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_some()
    }

    /// Identifier of the latest run
    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stats(&self) -> AutoDetectStats {
        self.stats
    }

    /// Whether `run` is the live run
    pub fn is_current(&self, run: u64) -> bool {
        self.is_active() && run == self.run
    }

    /// Arm a new recurring timer, cancelling any previous one.
    ///
    /// `on_tick` receives the run id on every tick and returns `false` when
    /// nobody is listening anymore, which ends the timer task. The first tick
    /// fires one full period after start. Ticks follow the wall-clock
    /// schedule; missed ticks are skipped, not bunched.
    pub fn start<F>(&mut self, period: Duration, camera_active: bool, on_tick: F) -> Result<u64>
    where
        F: Fn(u64) -> bool + Send + 'static,
    {
        if !camera_active {
            return Err(Error::Precondition(
                "open the camera before starting auto-detect".to_string(),
            ));
        }
        if period.is_zero() {
            return Err(Error::Precondition(
                "auto-detect period must be greater than zero".to_string(),
            ));
        }

        self.cancel_timer();
        self.run += 1;
        self.period = period;
        self.stats = AutoDetectStats::default();

        let run = self.run;
        self.timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if !on_tick(run) {
                    break;
                }
            }
        }));

        tracing::info!(run = run, period_ms = period.as_millis() as u64, "Auto-detect started");
        Ok(run)
    }

    /// Cancel the timer. Returns whether one was running.
    pub fn stop(&mut self) -> bool {
        let was_active = self.cancel_timer();
        if was_active {
            tracing::info!(
                run = self.run,
                ticks = self.stats.ticks,
                dropped = self.stats.dropped,
                submitted = self.stats.submitted,
                "Auto-detect stopped"
            );
        }
        was_active
    }

    /// Classify a delivered tick; `busy` means a submission is outstanding
    pub fn on_tick(&mut self, run: u64, busy: bool) -> TickDecision {
        if !self.is_current(run) {
            return TickDecision::Stale;
        }

        self.stats.ticks += 1;
        if busy {
            self.stats.dropped += 1;
            tracing::debug!(run = run, dropped = self.stats.dropped, "Tick dropped - submission in flight");
            return TickDecision::Dropped;
        }

        TickDecision::Fire
    }

    pub fn record_submitted(&mut self) {
        self.stats.submitted += 1;
    }

    pub fn record_failure(&mut self) {
        self.stats.failures += 1;
    }

    fn cancel_timer(&mut self) -> bool {
        match self.timer.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Default for AutoDetectScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AutoDetectScheduler {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
