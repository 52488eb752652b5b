//! Countdown timer records and their state machine.
//!
//! One record per label at `<timer_dir>/<label>-timer`. The file's existence
//! is the only "this timer exists" flag: it appears on the first `start` and
//! disappears on `clear` or natural completion.
//!
//! ## State Machine
//!
//! ```text
//! Absent ──start──▶ Running ──pause──▶ Paused ──resume──▶ Running
//!                      │                  │
//!                      ▼                  ▼
//!                  Complete            clear
//!                 (remaining ≤ 0)         │
//!                      │                  ▼
//!                      └───delete────▶ Absent
//! ```
//!
//! `endtime == 0` means "not running"; `remaining` is only meaningful then.
//! Pure transitions take an explicit `now` so they can be tested without a
//! clock; [`TimerProxy`] feeds them the wall clock.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{validate_label, Result, TockError};
use crate::record::{OpenRecord, Record, RecordFile};

pub const TIMER_FILE_SUFFIX: &str = "-timer";

// endtime is a float timestamp; anything this close to zero is "stopped".
const RUNNING_TOLERANCE: f64 = 1e-3;

/// Seconds since the Unix epoch.
pub fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Total seconds of an `h:m:s` duration. `None` on overflow.
pub fn duration_secs(seconds: i64, minutes: i64, hours: i64) -> Option<i64> {
    minutes
        .checked_mul(60)?
        .checked_add(hours.checked_mul(3600)?)?
        .checked_add(seconds)
}

/// On-disk timer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub label: String,
    /// Epoch seconds at which the timer fires; 0 while not running.
    pub endtime: f64,
    /// Seconds left while paused. `None` until the timer has run once.
    pub remaining: Option<i64>,
    /// Pause events during this timer's lifetime.
    pub interruptions: u32,
    /// Full duration requested by the last `start`, in seconds.
    #[serde(default)]
    pub duration: i64,
}

impl Record for TimerRecord {
    fn fresh(label: &str) -> Self {
        TimerRecord {
            label: label.to_string(),
            endtime: 0.0,
            remaining: None,
            interruptions: 0,
            duration: 0,
        }
    }
}

impl TimerRecord {
    pub fn is_running(&self) -> bool {
        self.endtime.abs() > RUNNING_TOLERANCE
    }

    /// Seconds left: computed live while running, stored while paused.
    pub fn remaining_at(&self, now: f64) -> Option<i64> {
        if self.is_running() {
            Some((self.endtime - now).round() as i64)
        } else {
            self.remaining
        }
    }

    /// A record that never ran is not complete.
    pub fn is_complete_at(&self, now: f64) -> bool {
        self.remaining_at(now).is_some_and(|r| r <= 0)
    }

    pub fn start_at(&mut self, duration_secs: i64, now: f64) -> Result<()> {
        if self.is_running() {
            return Err(self.invalid("start", "timer is already running"));
        }
        if duration_secs <= 0 {
            return Err(self.invalid("start", "duration must be positive"));
        }
        self.endtime = now + duration_secs as f64;
        self.remaining = None;
        self.interruptions = 0;
        self.duration = duration_secs;
        Ok(())
    }

    /// Returns the remaining seconds the timer resumed with.
    pub fn resume_at(&mut self, now: f64) -> Result<i64> {
        if self.is_running() {
            return Err(self.invalid("resume", "timer is already running"));
        }
        let Some(remaining) = self.remaining else {
            return Err(self.invalid("resume", "timer was never started"));
        };
        self.endtime = now + remaining as f64;
        Ok(remaining)
    }

    /// Stops the countdown, capturing what is left. A no-op when already paused.
    pub fn pause_at(&mut self, now: f64) -> Option<i64> {
        if self.is_running() {
            self.remaining = Some((self.endtime - now).round() as i64);
            self.endtime = 0.0;
        }
        self.remaining
    }

    /// Pauses a running timer and counts it as one interruption.
    /// Returns `None` (and counts nothing) if the timer was not running.
    pub fn interrupt_at(&mut self, now: f64) -> Option<i64> {
        if !self.is_running() {
            return None;
        }
        let remaining = self.pause_at(now);
        self.interruptions = self.interruptions.saturating_add(1);
        remaining
    }

    /// Shifts the end time of a running timer. Negative deltas take time away.
    pub fn inc(&mut self, delta_secs: i64) -> Result<()> {
        if !self.is_running() {
            return Err(self.invalid("adjust", "timer is not running"));
        }
        self.endtime += delta_secs as f64;
        Ok(())
    }

    fn invalid(&self, operation: &'static str, reason: &'static str) -> TockError {
        TockError::InvalidTransition {
            label: self.label.clone(),
            operation,
            reason,
        }
    }
}

/// An open timer record driven by the wall clock.
pub struct TimerProxy {
    inner: OpenRecord<TimerRecord>,
}

impl TimerProxy {
    pub fn label(&self) -> &str {
        self.inner.label()
    }

    pub fn record(&self) -> &TimerRecord {
        self.inner.record()
    }

    pub fn was_created(&self) -> bool {
        self.inner.was_created()
    }

    pub fn is_running(&self) -> bool {
        self.record().is_running()
    }

    pub fn remaining(&self) -> Option<i64> {
        self.record().remaining_at(epoch_now())
    }

    pub fn is_complete(&self) -> bool {
        self.record().is_complete_at(epoch_now())
    }

    pub fn interruptions(&self) -> u32 {
        self.record().interruptions
    }

    pub fn start(&mut self, seconds: i64, minutes: i64, hours: i64) -> Result<()> {
        let Some(total) = duration_secs(seconds, minutes, hours) else {
            return Err(self.record().invalid("start", "duration is out of range"));
        };
        self.start_for(total)
    }

    pub fn start_for(&mut self, duration_secs: i64) -> Result<()> {
        self.inner.record_mut().start_at(duration_secs, epoch_now())
    }

    pub fn resume(&mut self) -> Result<i64> {
        self.inner.record_mut().resume_at(epoch_now())
    }

    pub fn pause(&mut self) -> Option<i64> {
        self.inner.record_mut().pause_at(epoch_now())
    }

    pub fn interrupt(&mut self) -> Option<i64> {
        self.inner.record_mut().interrupt_at(epoch_now())
    }

    pub fn inc(&mut self, delta_secs: i64) -> Result<()> {
        self.inner.record_mut().inc(delta_secs)
    }

    /// Pauses if running, then deletes the record on close.
    pub fn clear(&mut self) {
        self.pause();
        self.inner.mark_deleted();
    }

    pub fn is_cleared(&self) -> bool {
        self.inner.is_marked_deleted()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::from_record(self.record(), epoch_now())
    }

    pub fn close(self) -> Result<()> {
        self.inner.close()
    }
}

/// Read-only view of a timer for status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerSnapshot {
    pub label: String,
    pub running: bool,
    pub remaining: Option<i64>,
    pub interruptions: u32,
}

impl TimerSnapshot {
    pub fn from_record(record: &TimerRecord, now: f64) -> Self {
        TimerSnapshot {
            label: record.label.clone(),
            running: record.is_running(),
            remaining: record.remaining_at(now).map(|r| r.max(0)),
            interruptions: record.interruptions,
        }
    }
}

/// The directory of timer records.
#[derive(Debug, Clone)]
pub struct TimerDb {
    dir: PathBuf,
}

impl TimerDb {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file(&self, label: &str) -> Result<RecordFile<TimerRecord>> {
        validate_label(label)?;
        let path = self.dir.join(format!("{}{}", label, TIMER_FILE_SUFFIX));
        Ok(RecordFile::new(path, label))
    }

    pub fn exists(&self, label: &str) -> Result<bool> {
        Ok(self.file(label)?.exists())
    }

    /// Opens the timer, creating a fresh never-started record if absent.
    pub fn open(&self, label: &str) -> Result<TimerProxy> {
        let inner = self.file(label)?.open()?;
        Ok(TimerProxy { inner })
    }

    pub fn open_existing(&self, label: &str) -> Result<Option<TimerProxy>> {
        Ok(self
            .file(label)?
            .open_existing()?
            .map(|inner| TimerProxy { inner }))
    }

    /// Labels of every existing timer, sorted.
    pub fn labels(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TockError::io("Failed to list timers", e)),
        };

        let mut labels: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| name.strip_suffix(TIMER_FILE_SUFFIX).map(str::to_string))
            .filter(|label| validate_label(label).is_ok())
            .collect();
        labels.sort();
        Ok(labels)
    }

    /// Snapshot of every existing timer. Timers deleted mid-scan are skipped.
    pub fn snapshots(&self) -> Result<Vec<TimerSnapshot>> {
        let mut snapshots = Vec::new();
        for label in self.labels()? {
            if let Some(timer) = self.open_existing(&label)? {
                snapshots.push(timer.snapshot());
                timer.close()?;
            }
        }
        Ok(snapshots)
    }

    /// Label of the running timer, if any.
    pub fn running_timer(&self) -> Result<Option<String>> {
        let mut running: Option<String> = None;
        for label in self.labels()? {
            let Some(timer) = self.open_existing(&label)? else {
                continue;
            };
            let is_running = timer.is_running();
            timer.close()?;

            if !is_running {
                continue;
            }
            match &running {
                None => running = Some(label),
                Some(first) => {
                    tracing::warn!(
                        first = %first,
                        other = %label,
                        "More than one timer record is running"
                    );
                }
            }
        }
        Ok(running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const NOW: f64 = 1_700_000_000.25;

    fn fresh() -> TimerRecord {
        TimerRecord::fresh("code")
    }

    #[test]
    fn test_fresh_record_is_paused_and_not_complete() {
        let record = fresh();
        assert!(!record.is_running());
        assert_eq!(record.remaining_at(NOW), None);
        assert!(!record.is_complete_at(NOW));
    }

    #[test]
    fn test_start_sets_endtime() {
        let mut record = fresh();
        record.start_at(1500, NOW).unwrap();
        assert!(record.is_running());
        assert_eq!(record.remaining_at(NOW), Some(1500));
        assert_eq!(record.remaining_at(NOW + 1499.0), Some(1));
        assert!(record.is_complete_at(NOW + 1500.0));
        assert_eq!(record.duration, 1500);
    }

    #[test]
    fn test_start_while_running_is_rejected() {
        let mut record = fresh();
        record.start_at(60, NOW).unwrap();
        let before = record.clone();

        let err = record.start_at(60, NOW + 5.0).unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(record, before);
    }

    #[test]
    fn test_pause_captures_remaining() {
        let mut record = fresh();
        record.start_at(600, NOW).unwrap();
        assert_eq!(record.pause_at(NOW + 100.0), Some(500));
        assert!(!record.is_running());
        assert_eq!(record.remaining_at(NOW + 1000.0), Some(500));
    }

    #[test]
    fn test_pause_is_idempotent() {
        let mut record = fresh();
        record.start_at(600, NOW).unwrap();
        record.pause_at(NOW + 100.0);
        let paused = record.clone();
        assert_eq!(record.pause_at(NOW + 300.0), Some(500));
        assert_eq!(record, paused);
    }

    #[test]
    fn test_zero_duration_pause_resume_keeps_remaining() {
        let mut record = fresh();
        record.start_at(600, NOW).unwrap();
        record.pause_at(NOW + 10.5);
        let remaining = record.remaining;

        record.resume_at(NOW + 20.5).unwrap();
        record.pause_at(NOW + 20.5);
        assert_eq!(record.remaining, remaining);
    }

    #[test]
    fn test_resume_keeps_interruptions() {
        let mut record = fresh();
        record.start_at(600, NOW).unwrap();
        assert_eq!(record.interrupt_at(NOW + 60.0), Some(540));
        assert_eq!(record.interruptions, 1);

        assert_eq!(record.resume_at(NOW + 100.0).unwrap(), 540);
        assert!(record.is_running());
        assert_eq!(record.interruptions, 1);
        assert_eq!(record.remaining_at(NOW + 100.0), Some(540));
    }

    #[test]
    fn test_interrupt_when_paused_counts_nothing() {
        let mut record = fresh();
        record.start_at(600, NOW).unwrap();
        record.interrupt_at(NOW + 1.0);
        assert_eq!(record.interrupt_at(NOW + 2.0), None);
        assert_eq!(record.interruptions, 1);
    }

    #[test]
    fn test_resume_requires_paused_started_timer() {
        let mut record = fresh();
        assert!(record.resume_at(NOW).is_err());

        record.start_at(60, NOW).unwrap();
        assert!(record.resume_at(NOW).is_err());
    }

    #[test]
    fn test_inc_shifts_only_endtime() {
        let mut record = fresh();
        record.start_at(600, NOW).unwrap();
        record.interrupt_at(NOW);
        record.resume_at(NOW).unwrap();

        record.inc(120).unwrap();
        assert_eq!(record.remaining_at(NOW), Some(720));
        record.inc(-300).unwrap();
        assert_eq!(record.remaining_at(NOW), Some(420));
        assert_eq!(record.interruptions, 1);
    }

    #[test]
    fn test_inc_on_paused_timer_is_rejected() {
        let mut record = fresh();
        record.start_at(600, NOW).unwrap();
        record.pause_at(NOW);
        let before = record.clone();

        assert!(record.inc(60).unwrap_err().is_contract_violation());
        assert_eq!(record, before);
    }

    #[test]
    fn test_start_after_pause_resets_counters() {
        let mut record = fresh();
        record.start_at(600, NOW).unwrap();
        record.interrupt_at(NOW + 10.0);

        record.start_at(300, NOW + 20.0).unwrap();
        assert_eq!(record.interruptions, 0);
        assert_eq!(record.remaining, None);
        assert_eq!(record.duration, 300);
    }

    #[test]
    fn test_db_open_start_and_list() {
        let temp = tempdir().unwrap();
        let db = TimerDb::new(temp.path().to_path_buf());
        assert!(!db.exists("code").unwrap());

        let mut timer = db.open("code").unwrap();
        assert!(timer.was_created());
        timer.start(0, 25, 0).unwrap();
        timer.close().unwrap();

        assert!(db.exists("code").unwrap());
        assert!(temp.path().join("code-timer").is_file());
        assert_eq!(db.labels().unwrap(), vec!["code".to_string()]);
        assert_eq!(db.running_timer().unwrap(), Some("code".to_string()));

        let timer = db.open_existing("code").unwrap().unwrap();
        assert!(timer.is_running());
        let remaining = timer.remaining().unwrap();
        assert!((1499..=1500).contains(&remaining));
    }

    #[test]
    fn test_db_clear_deletes_record() {
        let temp = tempdir().unwrap();
        let db = TimerDb::new(temp.path().to_path_buf());

        let mut timer = db.open("code").unwrap();
        timer.start_for(60).unwrap();
        timer.clear();
        assert!(timer.is_cleared());
        assert!(!timer.is_running());
        timer.close().unwrap();

        assert!(!db.exists("code").unwrap());
        assert!(db.snapshots().unwrap().is_empty());
    }

    #[test]
    fn test_db_running_timer_ignores_paused() {
        let temp = tempdir().unwrap();
        let db = TimerDb::new(temp.path().to_path_buf());

        let mut paused = db.open("reading").unwrap();
        paused.start_for(60).unwrap();
        paused.pause();
        paused.close().unwrap();

        assert_eq!(db.running_timer().unwrap(), None);
        let snapshots = db.snapshots().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert!(!snapshots[0].running);
        assert_eq!(snapshots[0].remaining, Some(60));
    }

    #[test]
    fn test_duration_secs_overflow() {
        assert_eq!(duration_secs(5, 25, 1), Some(5105));
        assert_eq!(duration_secs(0, 0, 3_000_000_000_000_000), None);
        assert_eq!(duration_secs(i64::MAX, 1, 0), None);
    }

    #[test]
    fn test_proxy_start_rejects_overflowing_duration() {
        let temp = tempdir().unwrap();
        let db = TimerDb::new(temp.path().to_path_buf());

        let mut timer = db.open("code").unwrap();
        let err = timer.start(0, 0, 3_000_000_000_000_000).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(!timer.is_running());
        assert_eq!(timer.record().duration, 0);
    }

    #[test]
    fn test_db_rejects_bad_labels() {
        let temp = tempdir().unwrap();
        let db = TimerDb::new(temp.path().to_path_buf());
        assert!(db.open("../x").is_err());
    }

    #[test]
    fn test_record_json_shape() {
        let mut record = fresh();
        record.start_at(60, NOW).unwrap();
        let json = crate::record::to_stable_json(&record).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for key in ["label", "endtime", "remaining", "interruptions"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
    }
}
