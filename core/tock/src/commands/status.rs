//! `tock status`: list timers and ask a running session to print its state.

use tock_core::control;
use tock_core::Result;

use super::Context;
use crate::output::{clock, say};

pub fn run(ctx: &Context) -> Result<()> {
    let report = control::status(&ctx.storage)?;

    if report.timers.is_empty() {
        say("No timers.");
    }
    for timer in &report.timers {
        let state = if timer.running { "running" } else { "paused" };
        let remaining = timer
            .remaining
            .map(clock)
            .unwrap_or_else(|| "--:--".to_string());
        println!(
            "  {}: {} {} ({} interruption(s))",
            timer.label, state, remaining, timer.interruptions
        );
    }

    let transient: Vec<&str> = report
        .signals
        .iter()
        .map(String::as_str)
        .filter(|s| *s != tock_core::TIMER_RUNNING)
        .collect();
    if !transient.is_empty() {
        println!("  signals: {}", transient.join(", "));
    }
    Ok(())
}
