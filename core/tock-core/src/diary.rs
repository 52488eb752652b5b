//! Diary entries: effective-time accounting for a tracked task.
//!
//! A diary entry spans `new` → `done`. Independently, a running timer session
//! brackets its active window with `enter` → `exit` for the same label. The
//! two pairs come from different processes and can interleave in any order:
//!
//! ```text
//! no interaction      1. new, done, enter, exit
//!                     2. enter, exit, new, done
//!                     3. enter, new, done, exit
//! timer-tracked       4. new, enter, exit, done
//! split               5. new, enter, done, exit   (done captures since enter)
//!                     6. enter, new, exit, done   (exit captures since new)
//! ```
//!
//! `enter` re-bases `interval_start_time`, discarding idle time before the
//! timer began. `exit` adds `now - interval_start_time` to `effective`. Both
//! are no-ops when no entry exists, so an `exit` after `done` never recreates
//! the file. `done` treats the whole span as effective when the timer never
//! touched the entry, and otherwise closes the still-open interval if the
//! label's timer is running.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{validate_label, Result, TockError};
use crate::record::{Record, RecordFile};
use crate::timer::{epoch_now, TimerDb};

// Timestamps closer than this are considered equal.
const TIME_EPSILON: f64 = 1.0;

// Accumulated time is compared exactly; any real interval counts.
const EFFECTIVE_EPSILON: f64 = 1e-9;

/// On-disk diary state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub label: String,
    /// Creation time.
    pub epoch: f64,
    /// Last time the tracked interval (re)started.
    pub interval_start_time: f64,
    /// Accumulated uninterrupted seconds.
    pub effective: f64,
}

impl Record for DiaryEntry {
    fn fresh(label: &str) -> Self {
        let now = epoch_now();
        DiaryEntry {
            label: label.to_string(),
            epoch: now,
            interval_start_time: now,
            effective: 0.0,
        }
    }
}

/// Result of finalizing an entry with `done`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiarySummary {
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub span: f64,
    pub effective: f64,
    /// Fraction of the span that was not effective.
    pub overhead: f64,
}

impl DiarySummary {
    fn new(entry: &DiaryEntry, effective: f64, end: f64) -> Self {
        let span = end - entry.epoch;
        let overhead = if span <= 0.0 || (span - effective).abs() < TIME_EPSILON {
            0.0
        } else {
            (span - effective) / span
        };
        DiarySummary {
            label: entry.label.clone(),
            start: entry.epoch,
            end,
            span,
            effective,
            overhead,
        }
    }
}

/// The directory of diary entries.
#[derive(Debug, Clone)]
pub struct Diary {
    dir: PathBuf,
}

impl Diary {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file(&self, label: &str) -> Result<RecordFile<DiaryEntry>> {
        validate_label(label)?;
        Ok(RecordFile::new(self.dir.join(label), label))
    }

    pub fn exists(&self, label: &str) -> Result<bool> {
        Ok(self.file(label)?.exists())
    }

    /// Starts a diary entry. Returns `false` if one already exists.
    pub fn create(&self, label: &str) -> Result<bool> {
        self.create_at(label, epoch_now())
    }

    pub fn create_at(&self, label: &str, now: f64) -> Result<bool> {
        let mut open = self.file(label)?.open()?;
        let created = open.was_created();
        if created {
            let entry = open.record_mut();
            entry.epoch = now;
            entry.interval_start_time = now;
        }
        open.close()?;
        if created {
            tracing::info!(label, "Diary entry created");
        }
        Ok(created)
    }

    pub fn enter(&self, label: &str) -> Result<bool> {
        self.enter_at(label, epoch_now())
    }

    /// Re-bases the tracked interval to `now`. No-op without an entry.
    pub fn enter_at(&self, label: &str, now: f64) -> Result<bool> {
        let Some(mut open) = self.file(label)?.open_existing()? else {
            return Ok(false);
        };
        open.record_mut().interval_start_time = now;
        open.close()?;
        tracing::debug!(label, "Diary interval entered");
        Ok(true)
    }

    pub fn exit(&self, label: &str) -> Result<bool> {
        self.exit_at(label, epoch_now())
    }

    /// Closes the tracked interval into `effective`. No-op without an entry.
    pub fn exit_at(&self, label: &str, now: f64) -> Result<bool> {
        let Some(mut open) = self.file(label)?.open_existing()? else {
            return Ok(false);
        };
        let entry = open.record_mut();
        entry.effective += now - entry.interval_start_time;
        let effective = entry.effective;
        open.close()?;
        tracing::debug!(label, effective, "Diary interval exited");
        Ok(true)
    }

    /// Adds `delta` seconds (possibly negative) to `effective`.
    pub fn increment_effective(&self, label: &str, delta: f64) -> Result<bool> {
        let Some(mut open) = self.file(label)?.open_existing()? else {
            return Ok(false);
        };
        // Can validly go negative until the next exit.
        open.record_mut().effective += delta;
        open.close()?;
        Ok(true)
    }

    /// Finalizes and deletes the entry. `None` if it does not exist.
    pub fn done(&self, label: &str, timers: &TimerDb) -> Result<Option<DiarySummary>> {
        let timer_running = timers.running_timer()?.as_deref() == Some(label);
        self.done_at(label, timer_running, epoch_now())
    }

    pub fn done_at(
        &self,
        label: &str,
        timer_running: bool,
        now: f64,
    ) -> Result<Option<DiarySummary>> {
        let Some(mut open) = self.file(label)?.open_existing()? else {
            return Ok(None);
        };

        let entry = open.record().clone();
        let untouched = (entry.epoch - entry.interval_start_time).abs() < TIME_EPSILON
            && entry.effective.abs() < EFFECTIVE_EPSILON;

        let effective = if untouched {
            now - entry.epoch
        } else if timer_running {
            entry.effective + (now - entry.interval_start_time)
        } else {
            entry.effective
        };

        open.mark_deleted();
        open.close()?;

        let summary = DiarySummary::new(&entry, effective, now);
        tracing::info!(
            label,
            span = summary.span,
            effective = summary.effective,
            "Diary entry done"
        );
        Ok(Some(summary))
    }

    /// Deletes the entry without a summary. Returns `false` if absent.
    pub fn remove(&self, label: &str) -> Result<bool> {
        let Some(mut open) = self.file(label)?.open_existing()? else {
            return Ok(false);
        };
        open.mark_deleted();
        open.close()?;
        Ok(true)
    }

    /// All open entries, sorted by label.
    pub fn entries(&self) -> Result<Vec<DiaryEntry>> {
        let dir_entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TockError::io("Failed to list diary entries", e)),
        };

        let mut labels: Vec<String> = dir_entries
            .flatten()
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|label| validate_label(label).is_ok())
            .collect();
        labels.sort();

        let mut entries = Vec::new();
        for label in labels {
            if let Some(open) = self.file(&label)?.open_existing()? {
                entries.push(open.record().clone());
                open.close()?;
            }
        }
        Ok(entries)
    }

    /// Enters the label's interval now; the returned window exits it on close or drop.
    pub fn window(&self, label: &str) -> Result<DiaryWindow> {
        self.enter(label)?;
        Ok(DiaryWindow {
            diary: self.clone(),
            label: label.to_string(),
            open: true,
        })
    }
}

/// An entered diary interval. Exits exactly once.
pub struct DiaryWindow {
    diary: Diary,
    label: String,
    open: bool,
}

impl DiaryWindow {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Exits the interval. Returns `false` if the entry no longer exists.
    pub fn close(mut self) -> Result<bool> {
        self.open = false;
        self.diary.exit(&self.label)
    }
}

impl Drop for DiaryWindow {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(err) = self.diary.exit(&self.label) {
            tracing::warn!(error = %err, label = %self.label, "Failed to exit diary interval");
        }
    }
}
