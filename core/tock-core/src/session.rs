//! The foreground timer session behind `tock start`.
//!
//! ## Lifecycle
//!
//! 1. Claim `TIMER_RUNNING`. Losing the race returns `AlreadyRunning` with
//!    nothing touched.
//! 2. Arm the [`SessionGuard`], then clear stale transient signals.
//! 3. Start, resume or adopt the label's timer and enter its diary window.
//! 4. Poll once per tick, each poll a separate open/close of the record so
//!    `inc`, `clear` and `status` from other processes interleave freely.
//! 5. Finalize locally: pause (counting an interruption) if still running,
//!    exit the diary window, clear every signal. The guard's `Drop` runs the
//!    same path on panics and early returns.
//! 6. Only then, for completed sessions, post credit to the worksheet.

use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::TockConfig;
use crate::credit::{focus_units, interruption_credit};
use crate::diary::DiaryWindow;
use crate::error::{validate_label, Result, TockError};
use crate::signals::{SignalBus, DISPLAY_UPDATE, TIMER_RUNNING};
use crate::storage::StorageConfig;
use crate::timer::{TimerDb, TimerSnapshot};
use crate::worksheet::{post_credit, CreditPosting, Worksheet};

/// Knobs for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick: Duration,
    pub focus_unit_secs: u64,
    pub penalty: f64,
    /// Post credit to the worksheet on completion.
    pub track: bool,
    /// Start fresh even if a paused record exists.
    pub force: bool,
}

impl SessionConfig {
    pub fn from_config(config: &TockConfig) -> Self {
        Self {
            tick: config.tick(),
            focus_unit_secs: config.focus_unit_secs,
            penalty: config.interruption_penalty,
            track: config.sheet_path.is_some(),
            force: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_config(&TockConfig::default())
    }
}

/// How the timer came to be running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStart {
    Started,
    Resumed,
    /// A record left running by a session that died without cleanup.
    Adopted,
}

/// Progress callbacks. All methods default to doing nothing.
pub trait SessionObserver {
    fn on_started(&mut self, _label: &str, _start: SessionStart, _remaining: i64) {}

    fn on_display_update(&mut self, _snapshot: &TimerSnapshot) {}

    fn on_paused(&mut self, _label: &str, _remaining: Option<i64>) {}

    /// Called after local state is finalized and before any tracking.
    fn on_complete(&mut self, _label: &str) {}
}

pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackingOutcome {
    /// Tracking disabled or no worksheet available.
    Skipped,
    Posted(CreditPosting),
    /// The worksheet call failed; local state was already clean.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionReport {
    AlreadyRunning,
    Interrupted {
        label: String,
        remaining: Option<i64>,
        interruptions: u32,
    },
    /// The record disappeared under the session.
    Cleared { label: String },
    Completed {
        label: String,
        interruptions: u32,
        credit: f64,
        tracking: TrackingOutcome,
    },
}

enum LoopEnd {
    Interrupted,
    Cleared,
    Completed { interruptions: u32, duration: i64 },
}

pub struct TimerSession {
    storage: StorageConfig,
    config: SessionConfig,
}

impl TimerSession {
    pub fn new(storage: StorageConfig, config: SessionConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Runs a session for `label` until completion, interruption or clear.
    ///
    /// `duration` applies only when a new countdown is started; `None` means
    /// one focus unit.
    pub fn run(
        &self,
        label: &str,
        duration: Option<i64>,
        interrupt: &AtomicBool,
        observer: &mut dyn SessionObserver,
        sheet: Option<&dyn Worksheet>,
    ) -> Result<SessionReport> {
        validate_label(label)?;
        if duration.is_some_and(|d| d <= 0) {
            return Err(TockError::InvalidTransition {
                label: label.to_string(),
                operation: "start",
                reason: "duration must be positive",
            });
        }

        let timers = self.storage.timers();
        let signals = self.storage.signals();

        if !signals.set(TIMER_RUNNING)? {
            tracing::info!(label, "A timer is already running");
            return Ok(SessionReport::AlreadyRunning);
        }

        let mut guard = SessionGuard::new(timers.clone(), signals.clone(), label);
        signals.clear(&[TIMER_RUNNING])?;

        let (start, remaining) = self.open_timer(&timers, label, duration)?;
        tracing::info!(label, ?start, remaining, "Session started");
        observer.on_started(label, start, remaining);

        guard.window = Some(self.storage.diary().window(label)?);

        let end = self.poll(&timers, &signals, label, interrupt, observer)?;
        let paused = guard.finalize()?;

        match end {
            LoopEnd::Interrupted => {
                let (remaining, interruptions) = match paused {
                    Some(state) => (Some(state.remaining), state.interruptions),
                    None => (None, 0),
                };
                tracing::info!(label, ?remaining, interruptions, "Session interrupted");
                observer.on_paused(label, remaining);
                Ok(SessionReport::Interrupted {
                    label: label.to_string(),
                    remaining,
                    interruptions,
                })
            }
            LoopEnd::Cleared => {
                tracing::info!(label, "Timer record removed during session");
                Ok(SessionReport::Cleared {
                    label: label.to_string(),
                })
            }
            LoopEnd::Completed {
                interruptions,
                duration,
            } => {
                observer.on_complete(label);
                let units = focus_units(duration, self.config.focus_unit_secs);
                let credit = interruption_credit(units, interruptions, self.config.penalty);
                tracing::info!(label, interruptions, credit, "Session complete");
                let tracking = self.track(label, credit, sheet);
                Ok(SessionReport::Completed {
                    label: label.to_string(),
                    interruptions,
                    credit,
                    tracking,
                })
            }
        }
    }

    fn open_timer(
        &self,
        timers: &TimerDb,
        label: &str,
        duration: Option<i64>,
    ) -> Result<(SessionStart, i64)> {
        let mut timer = timers.open(label)?;
        let start = if timer.is_running() {
            tracing::warn!(label, "Adopting a timer left running by a previous session");
            SessionStart::Adopted
        } else if !self.config.force && timer.record().remaining.is_some() {
            timer.resume()?;
            SessionStart::Resumed
        } else {
            let secs = duration.unwrap_or(self.config.focus_unit_secs as i64);
            timer.start_for(secs)?;
            SessionStart::Started
        };
        let remaining = timer.remaining().unwrap_or(0);
        timer.close()?;
        Ok((start, remaining))
    }

    fn poll(
        &self,
        timers: &TimerDb,
        signals: &SignalBus,
        label: &str,
        interrupt: &AtomicBool,
        observer: &mut dyn SessionObserver,
    ) -> Result<LoopEnd> {
        loop {
            let Some(mut timer) = timers.open_existing(label)? else {
                return Ok(LoopEnd::Cleared);
            };

            if timer.is_complete() {
                let interruptions = timer.interruptions();
                let duration = timer.record().duration;
                timer.clear();
                timer.close()?;
                return Ok(LoopEnd::Completed {
                    interruptions,
                    duration,
                });
            }

            // A timer that ran out wins over a late interrupt.
            if interrupt.load(Ordering::SeqCst) {
                timer.close()?;
                return Ok(LoopEnd::Interrupted);
            }

            if !timer.is_running() {
                timer.close()?;
                tracing::warn!(label, "Timer paused by another process");
                return Ok(LoopEnd::Interrupted);
            }

            let snapshot = timer.snapshot();
            timer.close()?;

            if signals.unset(DISPLAY_UPDATE)? {
                observer.on_display_update(&snapshot);
            }

            std::thread::sleep(self.config.tick);
        }
    }

    fn track(&self, label: &str, credit: f64, sheet: Option<&dyn Worksheet>) -> TrackingOutcome {
        if !self.config.track {
            return TrackingOutcome::Skipped;
        }
        let Some(sheet) = sheet else {
            tracing::info!(label, "No worksheet configured; skipping tracking");
            return TrackingOutcome::Skipped;
        };
        match post_credit(sheet, label, credit, Local::now().date_naive()) {
            Ok(posting) => TrackingOutcome::Posted(posting),
            Err(err) => {
                tracing::error!(error = %err, label, "Failed to post credit");
                TrackingOutcome::Failed(err.to_string())
            }
        }
    }
}

struct PausedState {
    remaining: i64,
    interruptions: u32,
}

/// Guaranteed local cleanup for a claimed session.
struct SessionGuard {
    timers: TimerDb,
    signals: SignalBus,
    label: String,
    window: Option<DiaryWindow>,
    finalized: bool,
}

impl SessionGuard {
    fn new(timers: TimerDb, signals: SignalBus, label: &str) -> Self {
        Self {
            timers,
            signals,
            label: label.to_string(),
            window: None,
            finalized: false,
        }
    }

    /// Pauses the timer if running, exits the diary window and clears all
    /// signals. Every step runs even if an earlier one fails; the first error
    /// is returned.
    fn finalize(&mut self) -> Result<Option<PausedState>> {
        if self.finalized {
            return Ok(None);
        }
        self.finalized = true;

        let paused = self.pause_timer();

        let exited = match self.window.take() {
            Some(window) => window.close().map(|_| ()),
            None => Ok(()),
        };

        let cleared = self.signals.clear(&[]).map(|_| ());

        let paused = paused?;
        exited?;
        cleared?;
        Ok(paused)
    }

    fn pause_timer(&self) -> Result<Option<PausedState>> {
        let Some(mut timer) = self.timers.open_existing(&self.label)? else {
            return Ok(None);
        };
        let paused = timer.interrupt().map(|remaining| PausedState {
            remaining,
            interruptions: timer.interruptions(),
        });
        timer.close()?;
        Ok(paused)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        if let Err(err) = self.finalize() {
            tracing::error!(error = %err, label = %self.label, "Session cleanup failed");
        }
    }
}
