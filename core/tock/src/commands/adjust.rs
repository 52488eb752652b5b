//! `tock inc|dec <delta>`: shift the running timer's end time.

use tock_core::control::{self, AdjustOutcome};
use tock_core::Result;

use super::Context;
use crate::output::{clock, say};

pub fn run(ctx: &Context, delta: i64) -> Result<()> {
    match control::adjust(&ctx.storage, delta)? {
        AdjustOutcome::NoRunningTimer => say("No timer is running."),
        AdjustOutcome::Adjusted {
            label, remaining, ..
        } => say(format!("{}: {} left.", label, clock(remaining))),
    }
    Ok(())
}
