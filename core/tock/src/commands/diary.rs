//! `tock diary ...`: open, finish and inspect diary entries.

use tock_core::{epoch_now, Result};

use super::Context;
use crate::output::{clock, say};

pub fn new(ctx: &Context, label: &str) -> Result<()> {
    if ctx.storage.diary().create(label)? {
        say(format!("Diary entry '{}' started.", label));
    } else {
        say(format!("Diary entry '{}' already exists.", label));
    }
    Ok(())
}

pub fn done(ctx: &Context, label: &str) -> Result<()> {
    let diary = ctx.storage.diary();
    let Some(summary) = diary.done(label, &ctx.storage.timers())? else {
        say(format!("No diary entry '{}'.", label));
        return Ok(());
    };
    say(format!(
        "{}: span {}, effective {}, overhead {:.0}%.",
        summary.label,
        clock(summary.span.round() as i64),
        clock(summary.effective.round() as i64),
        summary.overhead * 100.0
    ));
    Ok(())
}

pub fn remove(ctx: &Context, label: &str) -> Result<()> {
    if ctx.storage.diary().remove(label)? {
        say(format!("Diary entry '{}' removed.", label));
    } else {
        say(format!("No diary entry '{}'.", label));
    }
    Ok(())
}

pub fn status(ctx: &Context) -> Result<()> {
    let entries = ctx.storage.diary().entries()?;
    if entries.is_empty() {
        say("No diary entries.");
        return Ok(());
    }
    let now = epoch_now();
    for entry in entries {
        println!(
            "  {}: open {}, effective {}",
            entry.label,
            clock((now - entry.epoch).round() as i64),
            clock(entry.effective.round() as i64)
        );
    }
    Ok(())
}
