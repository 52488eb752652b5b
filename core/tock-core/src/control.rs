//! One-shot commands that act on timers owned by another process.
//!
//! Each function is a short sequence of single-record transactions. None of
//! them hold a lock across another record, and none wait for the session loop;
//! the loop observes their effects on its next tick.

use serde::Serialize;

use crate::error::Result;
use crate::signals::{DISPLAY_UPDATE, TIMER_RUNNING};
use crate::storage::StorageConfig;
use crate::timer::TimerSnapshot;

/// Everything `status` reports.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub timers: Vec<TimerSnapshot>,
    /// Signals set at the time of the scan.
    pub signals: Vec<String>,
    /// Whether a display refresh was requested from a running session.
    pub display_requested: bool,
}

impl StatusReport {
    pub fn session_running(&self) -> bool {
        self.signals.iter().any(|s| s == TIMER_RUNNING)
    }
}

/// Lists every timer and asks a running session to print its state.
pub fn status(storage: &StorageConfig) -> Result<StatusReport> {
    let timers = storage.timers().snapshots()?;
    let bus = storage.signals();
    let signals = bus.list()?;

    let display_requested = if signals.iter().any(|s| s == TIMER_RUNNING) {
        bus.set(DISPLAY_UPDATE)?;
        true
    } else {
        false
    };

    Ok(StatusReport {
        timers,
        signals,
        display_requested,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    NotFound,
    /// Refused; the record is untouched.
    Running,
    Cleared,
}

/// Deletes a paused timer.
pub fn clear(storage: &StorageConfig, label: &str) -> Result<ClearOutcome> {
    let Some(mut timer) = storage.timers().open_existing(label)? else {
        return Ok(ClearOutcome::NotFound);
    };
    if timer.is_running() {
        timer.close()?;
        return Ok(ClearOutcome::Running);
    }
    timer.clear();
    timer.close()?;
    tracing::info!(label, "Timer cleared");
    Ok(ClearOutcome::Cleared)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdjustOutcome {
    NoRunningTimer,
    Adjusted {
        label: String,
        remaining: i64,
        /// Whether a diary entry for the label absorbed the adjustment.
        diary_adjusted: bool,
    },
}

/// Adds `delta` seconds to the running timer (negative to take time away).
///
/// Granted time is subtracted from the label's diary so it is not counted
/// twice when the session later exits its diary interval.
pub fn adjust(storage: &StorageConfig, delta: i64) -> Result<AdjustOutcome> {
    let timers = storage.timers();
    let Some(label) = timers.running_timer()? else {
        return Ok(AdjustOutcome::NoRunningTimer);
    };

    // The timer may have been paused or cleared since the scan.
    let Some(mut timer) = timers.open_existing(&label)? else {
        return Ok(AdjustOutcome::NoRunningTimer);
    };
    if !timer.is_running() {
        timer.close()?;
        return Ok(AdjustOutcome::NoRunningTimer);
    }
    timer.inc(delta)?;
    let remaining = timer.remaining().unwrap_or(0);
    timer.close()?;

    let diary_adjusted = storage.diary().increment_effective(&label, -(delta as f64))?;
    storage.signals().set(DISPLAY_UPDATE)?;

    tracing::info!(label = %label, delta, remaining, "Timer adjusted");
    Ok(AdjustOutcome::Adjusted {
        label,
        remaining,
        diary_adjusted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn storage() -> (tempfile::TempDir, StorageConfig) {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        storage.ensure_dirs().unwrap();
        (temp, storage)
    }

    fn start(storage: &StorageConfig, label: &str, secs: i64) {
        let mut timer = storage.timers().open(label).unwrap();
        timer.start_for(secs).unwrap();
        timer.close().unwrap();
    }

    #[test]
    fn test_status_without_session_does_not_raise_display() {
        let (_temp, storage) = storage();
        start(&storage, "code", 600);

        let report = status(&storage).unwrap();
        assert_eq!(report.timers.len(), 1);
        assert!(!report.session_running());
        assert!(!report.display_requested);
        assert!(!storage.signals().is_set(DISPLAY_UPDATE).unwrap());
    }

    #[test]
    fn test_status_with_session_raises_display() {
        let (_temp, storage) = storage();
        storage.signals().set(TIMER_RUNNING).unwrap();

        let report = status(&storage).unwrap();
        assert!(report.session_running());
        assert!(report.display_requested);
        assert!(storage.signals().is_set(DISPLAY_UPDATE).unwrap());
    }

    #[test]
    fn test_clear_outcomes() {
        let (_temp, storage) = storage();
        assert_eq!(clear(&storage, "code").unwrap(), ClearOutcome::NotFound);

        start(&storage, "code", 600);
        assert_eq!(clear(&storage, "code").unwrap(), ClearOutcome::Running);
        assert!(storage.timers().exists("code").unwrap());

        let mut timer = storage.timers().open("code").unwrap();
        timer.pause();
        timer.close().unwrap();
        assert_eq!(clear(&storage, "code").unwrap(), ClearOutcome::Cleared);
        assert!(status(&storage).unwrap().timers.is_empty());
    }

    #[test]
    fn test_adjust_without_running_timer() {
        let (_temp, storage) = storage();
        assert_eq!(adjust(&storage, 60).unwrap(), AdjustOutcome::NoRunningTimer);
        assert!(!storage.signals().is_set(DISPLAY_UPDATE).unwrap());
    }

    #[test]
    fn test_adjust_shifts_timer_and_diary() {
        let (_temp, storage) = storage();
        storage.diary().create("code").unwrap();
        start(&storage, "code", 600);

        let AdjustOutcome::Adjusted {
            label,
            remaining,
            diary_adjusted,
        } = adjust(&storage, 120).unwrap()
        else {
            panic!("expected an adjustment");
        };
        assert_eq!(label, "code");
        assert!((719..=720).contains(&remaining));
        assert!(diary_adjusted);
        assert!(storage.signals().is_set(DISPLAY_UPDATE).unwrap());

        let entry = storage.diary().entries().unwrap().remove(0);
        assert!((entry.effective + 120.0).abs() < 1e-9);

        adjust(&storage, -300).unwrap();
        let entry = storage.diary().entries().unwrap().remove(0);
        assert!((entry.effective - 180.0).abs() < 1e-9);
    }
}
