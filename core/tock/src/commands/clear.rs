//! `tock clear <label>`: delete a paused timer.

use tock_core::control::{self, ClearOutcome};
use tock_core::Result;

use super::Context;
use crate::output::say;

pub fn run(ctx: &Context, label: &str) -> Result<()> {
    match control::clear(&ctx.storage, label)? {
        ClearOutcome::NotFound => say(format!("No timer with label '{}' exists.", label)),
        ClearOutcome::Running => say(format!(
            "Timer '{}' is currently running; stop it before clearing.",
            label
        )),
        ClearOutcome::Cleared => say(format!("Cleared '{}'.", label)),
    }
    Ok(())
}
