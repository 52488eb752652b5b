//! Subcommand handlers. Each returns `Err` only for failures that should exit 1;
//! outcomes like "no such timer" are printed and return `Ok`.

pub mod adjust;
pub mod clear;
pub mod diary;
pub mod start;
pub mod status;

use std::path::PathBuf;

use tock_core::{Result, StorageConfig, TockConfig};

/// Resolved storage and configuration shared by every command.
pub struct Context {
    pub storage: StorageConfig,
    pub config: TockConfig,
}

impl Context {
    /// `home` overrides `TOCK_HOME` and `~/.tock`.
    pub fn load(home: Option<PathBuf>) -> Result<Self> {
        let storage = match home {
            Some(root) => StorageConfig::with_root(root),
            None => StorageConfig::discover()?,
        };
        let config = TockConfig::load(&storage.config_file())?;
        let storage = storage.with_config(&config);
        storage.ensure_dirs()?;
        Ok(Self { storage, config })
    }

    /// Worksheet path from the config, relative paths resolved against the base dir.
    pub fn sheet_path(&self) -> Option<PathBuf> {
        self.config
            .sheet_path
            .as_ref()
            .map(|path| self.storage.root().join(path))
    }
}
