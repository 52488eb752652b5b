//! Cross-process signals backed by sentinel files.
//!
//! A signal is a zero-length file in the signals directory; its name is the
//! entire payload. Signals are level-triggered booleans: setting an already-set
//! signal is not queued. Each operation is a single filesystem call, so there
//! is no grouping: "set A and unset B" can be observed half done.
//!
//! `set` uses create-new semantics, which makes it a mutual-exclusion
//! primitive. Claiming the right to run a session is exactly
//! `set(TIMER_RUNNING)`.

use fs_err as fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, TockError};

/// Held by the one process running a timer session.
pub const TIMER_RUNNING: &str = "timer_running";

/// Asks the running session to print its current state on the next tick.
pub const DISPLAY_UPDATE: &str = "display_update";

/// Sentinel-file signals in one directory.
#[derive(Debug, Clone)]
pub struct SignalBus {
    dir: PathBuf,
}

impl SignalBus {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the sentinel. Returns `false` if it already existed.
    pub fn set(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir)
            .map_err(|e| TockError::io("Failed to create signals directory", e))?;

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => {
                tracing::debug!(signal = name, "Signal set");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(TockError::io(format!("Failed to set signal {}", name), e)),
        }
    }

    /// Removes the sentinel. Returns `true` if it was present (consumed).
    pub fn unset(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(signal = name, "Signal unset");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(TockError::io(format!("Failed to unset signal {}", name), e)),
        }
    }

    pub fn is_set(&self, name: &str) -> Result<bool> {
        Ok(self.path_for(name)?.is_file())
    }

    /// Names of all currently set signals, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TockError::io("Failed to list signals", e)),
        };

        let mut names: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Removes every signal not named in `exclude`. Returns the removed names.
    pub fn clear(&self, exclude: &[&str]) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for name in self.list()? {
            if exclude.contains(&name.as_str()) {
                continue;
            }
            if self.unset(&name)? {
                removed.push(name);
            }
        }
        if !removed.is_empty() {
            tracing::debug!(removed = ?removed, "Signals cleared");
        }
        Ok(removed)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let bad = name.is_empty()
            || name.starts_with('.')
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0');
        if bad {
            return Err(TockError::InvalidSignalName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn bus() -> (tempfile::TempDir, SignalBus) {
        let temp = tempdir().unwrap();
        let bus = SignalBus::new(temp.path().join(".signals"));
        (temp, bus)
    }

    #[test]
    fn test_set_twice_fails_second_time() {
        let (_temp, bus) = bus();
        assert!(bus.set(TIMER_RUNNING).unwrap());
        assert!(!bus.set(TIMER_RUNNING).unwrap());
        assert!(bus.is_set(TIMER_RUNNING).unwrap());
    }

    #[test]
    fn test_unset_reports_consumption() {
        let (_temp, bus) = bus();
        assert!(!bus.unset(DISPLAY_UPDATE).unwrap());
        bus.set(DISPLAY_UPDATE).unwrap();
        assert!(bus.unset(DISPLAY_UPDATE).unwrap());
        assert!(!bus.is_set(DISPLAY_UPDATE).unwrap());
    }

    #[test]
    fn test_signal_file_is_empty() {
        let (_temp, bus) = bus();
        bus.set(TIMER_RUNNING).unwrap();
        let len = std::fs::metadata(bus.dir().join(TIMER_RUNNING)).unwrap().len();
        assert_eq!(len, 0);
    }

    #[test]
    fn test_clear_respects_exclude() {
        let (_temp, bus) = bus();
        bus.set(TIMER_RUNNING).unwrap();
        bus.set(DISPLAY_UPDATE).unwrap();
        bus.set("custom").unwrap();

        let removed = bus.clear(&[TIMER_RUNNING]).unwrap();
        assert_eq!(removed, vec!["custom".to_string(), DISPLAY_UPDATE.to_string()]);
        assert_eq!(bus.list().unwrap(), vec![TIMER_RUNNING.to_string()]);

        bus.clear(&[]).unwrap();
        assert!(bus.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_on_missing_dir_is_empty() {
        let (_temp, bus) = bus();
        assert!(bus.list().unwrap().is_empty());
        assert!(bus.clear(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let (_temp, bus) = bus();
        assert!(bus.set("../escape").is_err());
        assert!(bus.set("").is_err());
        assert!(bus.is_set(".hidden").is_err());
    }
}
