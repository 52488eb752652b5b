//! File logging for the CLI.
//!
//! Logs go to `<base>/logs/tock.log.<date>` so the terminal only shows the
//! user-facing `HH:MM:` lines. `TOCK_DEBUG_LOG=1` forces debug level;
//! otherwise `TOCK_LOG` is an `EnvFilter` directive defaulting to `info`.

use std::env;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TOCK_LOG";
const DEBUG_LOG_ENV: &str = "TOCK_DEBUG_LOG";

/// Installs the global subscriber. Keep the guard alive until exit so
/// buffered lines are flushed.
pub fn init(logs_dir: &Path) -> Option<WorkerGuard> {
    if let Err(err) = fs_err::create_dir_all(logs_dir) {
        eprintln!("tock: logging disabled: {}", err);
        return None;
    }

    let appender = tracing_appender::rolling::daily(logs_dir, "tock.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    if result.is_err() {
        return None;
    }
    Some(guard)
}

fn filter() -> EnvFilter {
    if debug_enabled(env::var(DEBUG_LOG_ENV).ok().as_deref()) {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn debug_enabled(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes" | "YES"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_enabled_values() {
        assert!(debug_enabled(Some("1")));
        assert!(debug_enabled(Some("yes")));
        assert!(!debug_enabled(Some("0")));
        assert!(!debug_enabled(None));
    }
}
