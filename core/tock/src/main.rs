//! tock: countdown timer sessions shared between terminal processes.
//!
//! `start` runs in the foreground until the timer completes or is interrupted
//! (Ctrl-C pauses it; the next `start` resumes). The other subcommands are
//! one-shot and act on the running session through the filesystem.
//!
//! ## Subcommands
//!
//! - `start`: run a session (`-s/-m/-h` set the duration)
//! - `status`: list timers, refresh a running session's display
//! - `clear`: delete a paused timer
//! - `inc` / `dec`: add or take time from the running timer
//! - `diary`: open, finish and inspect diary entries

mod commands;
mod interrupt;
mod logging;
mod notify;
mod output;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use commands::start::StartArgs;
use commands::Context;
use output::say;
use tock_core::TockError;

#[derive(Parser)]
#[command(name = "tock")]
#[command(about = "Countdown timer sessions tracked across processes")]
#[command(version)]
struct Cli {
    /// Base directory (default: $TOCK_HOME, then ~/.tock)
    #[arg(long, global = true, value_name = "DIR")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start or resume a timer and run it in the foreground
    #[command(disable_help_flag = true)]
    Start {
        /// Label identifying the timer
        label: String,

        /// Seconds
        #[arg(short = 's', long, default_value_t = 0)]
        seconds: i64,

        /// Minutes
        #[arg(short = 'm', long, default_value_t = 0)]
        minutes: i64,

        /// Hours
        #[arg(short = 'h', long, default_value_t = 0)]
        hours: i64,

        /// Start fresh even if a paused timer exists
        #[arg(long)]
        force: bool,

        /// Post credit to the worksheet on completion
        #[arg(long, overrides_with = "no_track")]
        track: bool,

        /// Do not post credit
        #[arg(long = "no-track", overrides_with = "track")]
        no_track: bool,

        /// Print help
        #[arg(long, action = ArgAction::Help)]
        help: Option<bool>,
    },

    /// Show timers and refresh the running session's display
    Status,

    /// Delete a paused timer
    Clear {
        /// Label of the timer to delete
        label: String,
    },

    /// Add seconds to the running timer
    Inc {
        #[arg(value_name = "SECONDS", value_parser = adjust_range())]
        delta: i64,
    },

    /// Take seconds from the running timer
    Dec {
        #[arg(value_name = "SECONDS", value_parser = adjust_range())]
        delta: i64,
    },

    /// Effective-time diary entries
    Diary {
        #[command(subcommand)]
        command: DiaryCommands,
    },
}

#[derive(Subcommand)]
enum DiaryCommands {
    /// Open an entry
    New { label: String },

    /// Finish an entry and print its summary
    Done { label: String },

    /// Discard an entry
    Remove { label: String },

    /// List open entries
    Status,
}

fn main() {
    let cli = Cli::parse();

    let ctx = match Context::load(cli.home) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("tock: {}", e);
            std::process::exit(1);
        }
    };
    let logging_guard = logging::init(&ctx.storage.logs_dir());

    let code = match dispatch(&ctx, cli.command) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "tock command failed");
            say(format!("Error: {}", e));
            1
        }
    };

    drop(logging_guard);
    std::process::exit(code);
}

fn dispatch(ctx: &Context, command: Commands) -> tock_core::Result<()> {
    match command {
        Commands::Start {
            label,
            seconds,
            minutes,
            hours,
            force,
            track,
            no_track,
            help: _,
        } => {
            let duration = duration(&label, seconds, minutes, hours)?;
            let args = StartArgs {
                label,
                duration,
                force,
                track: track_override(track, no_track),
            };
            commands::start::run(ctx, args)
        }
        Commands::Status => commands::status::run(ctx),
        Commands::Clear { label } => commands::clear::run(ctx, &label),
        Commands::Inc { delta } => commands::adjust::run(ctx, delta),
        Commands::Dec { delta } => commands::adjust::run(ctx, -delta),
        Commands::Diary { command } => match command {
            DiaryCommands::New { label } => commands::diary::new(ctx, &label),
            DiaryCommands::Done { label } => commands::diary::done(ctx, &label),
            DiaryCommands::Remove { label } => commands::diary::remove(ctx, &label),
            DiaryCommands::Status => commands::diary::status(ctx),
        },
    }
}

// One year either way; keeps `-delta` and the end-time shift in range.
const MAX_ADJUST_SECS: i64 = 365 * 24 * 3600;

fn adjust_range() -> clap::builder::RangedI64ValueParser<i64> {
    clap::value_parser!(i64).range(-MAX_ADJUST_SECS..=MAX_ADJUST_SECS)
}

/// `None` when no component was given, so the session uses one focus unit.
fn duration(
    label: &str,
    seconds: i64,
    minutes: i64,
    hours: i64,
) -> tock_core::Result<Option<i64>> {
    if seconds == 0 && minutes == 0 && hours == 0 {
        return Ok(None);
    }
    match tock_core::duration_secs(seconds, minutes, hours) {
        Some(total) => Ok(Some(total)),
        None => Err(TockError::InvalidTransition {
            label: label.to_string(),
            operation: "start",
            reason: "duration is out of range",
        }),
    }
}

fn track_override(track: bool, no_track: bool) -> Option<bool> {
    match (track, no_track) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
