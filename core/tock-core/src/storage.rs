//! Storage configuration and path management for tock.
//!
//! Every path the engine touches is derived here, so tests can point the
//! whole system at a temp directory with [`StorageConfig::with_root`].
//!
//! ```text
//! <root>/
//! ├── config.json
//! ├── logs/
//! ├── timer/
//! │   ├── <label>-timer
//! │   └── .signals/<name>
//! └── diary/
//!     └── <label>
//! ```

use std::path::{Path, PathBuf};

use crate::config::TockConfig;
use crate::diary::Diary;
use crate::error::{Result, TockError};
use crate::signals::SignalBus;
use crate::timer::TimerDb;

/// Environment variable overriding the base directory.
pub const HOME_ENV: &str = "TOCK_HOME";

const DEFAULT_DIR_NAME: &str = ".tock";
const SIGNALS_DIR_NAME: &str = ".signals";

/// Central configuration for all tock storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
    timer_subdir: String,
    diary_subdir: String,
}

impl StorageConfig {
    /// Resolves the base directory from `TOCK_HOME`, falling back to `~/.tock`.
    pub fn discover() -> Result<Self> {
        if let Some(root) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::with_root(PathBuf::from(root)));
        }
        let home = dirs::home_dir().ok_or(TockError::HomeDirNotFound)?;
        Ok(Self::with_root(home.join(DEFAULT_DIR_NAME)))
    }

    /// Creates a StorageConfig with a custom root directory and default subdirectories.
    pub fn with_root(root: PathBuf) -> Self {
        let defaults = TockConfig::default();
        Self {
            root,
            timer_subdir: defaults.timer_subdir,
            diary_subdir: defaults.diary_subdir,
        }
    }

    /// Applies the subdirectory names from a loaded configuration.
    pub fn with_config(mut self, config: &TockConfig) -> Self {
        self.timer_subdir = config.timer_subdir.clone();
        self.diary_subdir = config.diary_subdir.clone();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn timer_dir(&self) -> PathBuf {
        self.root.join(&self.timer_subdir)
    }

    pub fn signals_dir(&self) -> PathBuf {
        self.timer_dir().join(SIGNALS_DIR_NAME)
    }

    pub fn diary_dir(&self) -> PathBuf {
        self.root.join(&self.diary_subdir)
    }

    pub fn timers(&self) -> TimerDb {
        TimerDb::new(self.timer_dir())
    }

    pub fn signals(&self) -> SignalBus {
        SignalBus::new(self.signals_dir())
    }

    pub fn diary(&self) -> Diary {
        Diary::new(self.diary_dir())
    }

    /// Creates the timer, signal and diary directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.timer_dir(), self.signals_dir(), self.diary_dir()] {
            fs_err::create_dir_all(&dir)
                .map_err(|e| TockError::io("Failed to create storage directory", e))?;
        }
        Ok(())
    }
}
