//! # tock-core
//!
//! Countdown timer sessions coordinated between independent, short-lived
//! processes through the filesystem alone: no daemon, no sockets.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. The session loop is a blocking poll.
//! - **One lock at a time**: Every mutation is a single open-modify-close of
//!   one record under an advisory lock. Nothing spans two records.
//! - **Outcomes, not errors**: A held running-signal or a missing record is a
//!   normal result. Errors mean I/O trouble or a forbidden transition.
//! - **Local first**: A session's local state is finalized before any
//!   worksheet call is attempted.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::atomic::AtomicBool;
//! use tock_core::{NoopObserver, SessionConfig, StorageConfig, TimerSession};
//!
//! let storage = StorageConfig::discover()?;
//! let session = TimerSession::new(storage, SessionConfig::default());
//! let report = session.run("code", Some(1500), &AtomicBool::new(false), &mut NoopObserver, None)?;
//! ```

pub mod config;
pub mod control;
pub mod credit;
pub mod diary;
pub mod error;
pub mod record;
pub mod session;
pub mod signals;
pub mod storage;
pub mod timer;
pub mod worksheet;

pub use config::TockConfig;
pub use control::{AdjustOutcome, ClearOutcome, StatusReport};
pub use credit::{focus_units, interruption_credit, interruption_penalty};
pub use diary::{Diary, DiaryEntry, DiarySummary, DiaryWindow};
pub use error::{Result, TockError};
pub use record::{OpenRecord, Record, RecordFile};
pub use session::{
    NoopObserver, SessionConfig, SessionObserver, SessionReport, SessionStart, TimerSession,
    TrackingOutcome,
};
pub use signals::{SignalBus, DISPLAY_UPDATE, TIMER_RUNNING};
pub use storage::StorageConfig;
pub use timer::{duration_secs, epoch_now, TimerDb, TimerProxy, TimerRecord, TimerSnapshot};
pub use worksheet::{post_credit, CellUpdate, CreditPosting, FileWorksheet, Worksheet};
