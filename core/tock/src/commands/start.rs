//! `tock start`: run a timer session in the foreground.

use std::thread::JoinHandle;

use tock_core::{
    FileWorksheet, Result, SessionConfig, SessionObserver, SessionReport, SessionStart,
    TimerSession, TimerSnapshot, TrackingOutcome, Worksheet,
};

use super::Context;
use crate::output::{clock, say};
use crate::{interrupt, notify};

pub struct StartArgs {
    pub label: String,
    /// Total of -s/-m/-h; `None` when all are zero.
    pub duration: Option<i64>,
    pub force: bool,
    /// Explicit --track/--no-track; `None` follows the config.
    pub track: Option<bool>,
}

struct TerminalObserver {
    notify_command: Option<Vec<String>>,
    notifier: Option<JoinHandle<()>>,
}

impl SessionObserver for TerminalObserver {
    fn on_started(&mut self, _label: &str, start: SessionStart, remaining: i64) {
        match start {
            SessionStart::Started => say(format!("Starting at {} seconds.", remaining)),
            SessionStart::Resumed => say(format!("Resuming at {} seconds.", remaining)),
            SessionStart::Adopted => say(format!(
                "Picking up a timer left running at {} seconds.",
                remaining
            )),
        }
    }

    fn on_display_update(&mut self, snapshot: &TimerSnapshot) {
        say(format!(
            "{}: {} left, {} interruption(s).",
            snapshot.label,
            clock(snapshot.remaining.unwrap_or(0)),
            snapshot.interruptions
        ));
    }

    fn on_paused(&mut self, _label: &str, remaining: Option<i64>) {
        match remaining {
            Some(secs) => say(format!("Pausing timer at {} seconds.", secs)),
            None => say("Timer stopped."),
        }
    }

    fn on_complete(&mut self, label: &str) {
        self.notifier = Some(notify::spawn(label, self.notify_command.take()));
    }
}

pub fn run(ctx: &Context, args: StartArgs) -> Result<()> {
    let interrupted = interrupt::install();

    let mut config = SessionConfig::from_config(&ctx.config);
    config.force = args.force;
    if let Some(track) = args.track {
        config.track = track;
    }

    let sheet = match ctx.sheet_path() {
        Some(path) if config.track => Some(FileWorksheet::new(path)),
        _ => None,
    };
    if config.track && sheet.is_none() {
        say("Tracking requested but no sheet_path is configured.");
    }

    let mut observer = TerminalObserver {
        notify_command: ctx.config.notify_command.clone(),
        notifier: None,
    };
    let session = TimerSession::new(ctx.storage.clone(), config);
    let result = session.run(
        &args.label,
        args.duration,
        interrupted,
        &mut observer,
        sheet.as_ref().map(|s| s as &dyn Worksheet),
    );

    let outcome = result.map(report);
    if let Some(handle) = observer.notifier.take() {
        let _ = handle.join();
    }
    outcome
}

fn report(report: SessionReport) {
    match report {
        SessionReport::AlreadyRunning => say("A timer is already running."),
        SessionReport::Interrupted { .. } => {}
        SessionReport::Cleared { label } => say(format!("Timer '{}' was cleared.", label)),
        SessionReport::Completed {
            label,
            interruptions,
            credit,
            tracking,
        } => {
            say(format!(
                "{} complete: {} interruption(s), credit {:.2}.",
                label, interruptions, credit
            ));
            match tracking {
                TrackingOutcome::Skipped => {}
                TrackingOutcome::Posted(posting) => {
                    if let Some(date) = posting.stale_date {
                        say(format!(
                            "Warning: the latest row in the sheet is {}, not today.",
                            date
                        ));
                    }
                    say(format!("{} total: {:.2}", label, posting.total));
                }
                TrackingOutcome::Failed(err) => say(format!("Tracking failed: {}", err)),
            }
        }
    }
}
