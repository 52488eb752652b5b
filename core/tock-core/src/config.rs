//! Configuration loading.
//!
//! Reads `<base>/config.json`. A missing file yields defaults; missing fields
//! fall back to their serde defaults. A file that exists but does not parse is
//! an error, so a typo never silently resets the penalty or the focus unit.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TockError};

/// User configuration for timers, diary and credit tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TockConfig {
    /// Subdirectory of the base directory holding timer records and signals.
    #[serde(default = "default_timer_subdir")]
    pub timer_subdir: String,

    /// Subdirectory of the base directory holding diary entries.
    #[serde(default = "default_diary_subdir")]
    pub diary_subdir: String,

    /// Length of one focus unit in seconds. Also the default `start` duration.
    #[serde(default = "default_focus_unit_secs")]
    pub focus_unit_secs: u64,

    /// Base penalty per interruption, doubled for each further interruption.
    #[serde(default = "default_interruption_penalty")]
    pub interruption_penalty: f64,

    /// Poll interval of the session loop in milliseconds.
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,

    /// Local worksheet receiving session credit. Tracking is skipped when unset.
    #[serde(default)]
    pub sheet_path: Option<PathBuf>,

    /// Command spawned when a session completes, e.g. `["afplay", "Blow.aiff"]`.
    #[serde(default)]
    pub notify_command: Option<Vec<String>>,
}

fn default_timer_subdir() -> String {
    "timer".to_string()
}
fn default_diary_subdir() -> String {
    "diary".to_string()
}
fn default_focus_unit_secs() -> u64 {
    1800
}
fn default_interruption_penalty() -> f64 {
    0.04
}
fn default_tick_millis() -> u64 {
    1000
}

impl Default for TockConfig {
    fn default() -> Self {
        Self {
            timer_subdir: default_timer_subdir(),
            diary_subdir: default_diary_subdir(),
            focus_unit_secs: default_focus_unit_secs(),
            interruption_penalty: default_interruption_penalty(),
            tick_millis: default_tick_millis(),
            sheet_path: None,
            notify_command: None,
        }
    }
}

impl TockConfig {
    /// Loads the configuration, returning defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(TockError::io("Failed to read config", err)),
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: TockConfig =
            serde_json::from_str(&content).map_err(|e| TockError::ConfigMalformed {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let malformed = |details: &str| TockError::ConfigMalformed {
            path: path.to_path_buf(),
            details: details.to_string(),
        };
        if self.focus_unit_secs == 0 {
            return Err(malformed("focus_unit_secs must be positive"));
        }
        if self.tick_millis == 0 {
            return Err(malformed("tick_millis must be positive"));
        }
        if !self.interruption_penalty.is_finite() || self.interruption_penalty < 0.0 {
            return Err(malformed("interruption_penalty must be non-negative"));
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}
