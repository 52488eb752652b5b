//! Interruption-penalized session credit.
//!
//! A completed session is worth the number of focus units it covered, minus
//! an exponentially growing penalty per interruption:
//!
//! ```text
//! credit = max(0, units - Σ_{i=0}^{k-1} penalty · 2^i)
//! ```
//!
//! Credit is computed once, at natural completion, from the interruption count
//! read off the record at that moment. Cleared sessions earn nothing.

/// Default base penalty per interruption.
pub const DEFAULT_PENALTY: f64 = 0.04;

/// Total penalty for `interruptions` pauses: `penalty · (2^k - 1)`.
pub fn interruption_penalty(interruptions: u32, penalty: f64) -> f64 {
    (0..interruptions).fold(0.0, |total, i| total + penalty * 2f64.powi(i as i32))
}

/// Credit for `units` focus units after `interruptions` pauses, floored at zero.
pub fn interruption_credit(units: f64, interruptions: u32, penalty: f64) -> f64 {
    (units - interruption_penalty(interruptions, penalty)).max(0.0)
}

/// Focus units covered by a session of `duration_secs`.
pub fn focus_units(duration_secs: i64, focus_unit_secs: u64) -> f64 {
    if duration_secs <= 0 || focus_unit_secs == 0 {
        return 0.0;
    }
    duration_secs as f64 / focus_unit_secs as f64
}
