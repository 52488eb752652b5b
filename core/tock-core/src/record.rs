//! File-backed records with advisory locking.
//!
//! A record is one JSON document in one file. Access follows a type-state
//! pattern: a [`RecordFile`] is the closed handle and only offers `open`; an
//! [`OpenRecord`] is the open capability and carries every accessor. Holding an
//! `OpenRecord` means holding an exclusive `flock` on the backing file, so a
//! read-modify-write through it is indivisible with respect to every other
//! process that opens the same record.
//!
//! # Write-back
//!
//! `close()` rewrites the whole file with the in-memory record (pretty JSON,
//! sorted keys) and releases the lock. If the holder called `mark_deleted()`
//! the file is removed instead and nothing is written. Dropping an unclosed
//! `OpenRecord` runs the same path, so early returns and panics still release
//! the lock with the record persisted.
//!
//! # Deleted While Waiting
//!
//! A waiter blocked in `lock_exclusive` holds a descriptor to the inode it
//! opened. If the current holder deletes the record, the waiter wakes up on an
//! unlinked inode. After locking we therefore compare the descriptor's inode
//! with whatever the path names now, and retry (or report absence) on mismatch.

use fs2::FileExt;
use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::error::{Result, TockError};

const MAX_OPEN_ATTEMPTS: usize = 32;

/// A JSON document stored one-per-file.
pub trait Record: Serialize + DeserializeOwned {
    /// Value used when `open` has to create the backing file.
    fn fresh(label: &str) -> Self;
}

/// Closed handle on a record file.
#[derive(Debug, Clone)]
pub struct RecordFile<R> {
    path: PathBuf,
    label: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> RecordFile<R> {
    pub fn new(path: PathBuf, label: impl Into<String>) -> Self {
        Self {
            path,
            label: label.into(),
            _record: PhantomData,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the record currently exists. Only a hint: another process may
    /// create or delete it right after this returns.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Opens the record under an exclusive lock, creating it with
    /// [`Record::fresh`] if absent. Blocks while another holder has it open.
    pub fn open(&self) -> Result<OpenRecord<R>> {
        match self.open_inner(true)? {
            Some(record) => Ok(record),
            None => Err(TockError::io(
                format!("Failed to open record {}", self.path.display()),
                std::io::Error::other("record vanished while opening"),
            )),
        }
    }

    /// Opens the record only if it exists. Never creates the file.
    pub fn open_existing(&self) -> Result<Option<OpenRecord<R>>> {
        self.open_inner(false)
    }

    fn open_inner(&self, create: bool) -> Result<Option<OpenRecord<R>>> {
        if create {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| TockError::io("Failed to create record directory", e))?;
            }
        }

        for attempt in 0..MAX_OPEN_ATTEMPTS {
            let file = match fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(create)
                .open(&self.path)
            {
                Ok(file) => file,
                Err(e) if !create && e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(TockError::io("Failed to open record", e)),
            };

            file.file()
                .lock_exclusive()
                .map_err(|e| TockError::io(format!("Failed to lock {}", self.path.display()), e))?;

            if !names_same_inode(file.file(), &self.path)
                .map_err(|e| TockError::io("Failed to stat record", e))?
            {
                let _ = file.file().unlock();
                if !create && !self.path.exists() {
                    return Ok(None);
                }
                tracing::debug!(
                    path = %self.path.display(),
                    attempt,
                    "Record replaced while waiting for lock; retrying"
                );
                continue;
            }

            return self.load(file).map(Some);
        }

        Err(TockError::io(
            format!("Failed to open record {}", self.path.display()),
            std::io::Error::other("record kept changing while acquiring lock"),
        ))
    }

    fn load(&self, mut file: fs::File) -> Result<OpenRecord<R>> {
        let mut content = String::new();
        if let Err(e) = file.read_to_string(&mut content) {
            let _ = file.file().unlock();
            return Err(TockError::io("Failed to read record", e));
        }

        let (record, created) = if content.trim().is_empty() {
            (R::fresh(&self.label), true)
        } else {
            match serde_json::from_str(&content) {
                Ok(record) => (record, false),
                Err(e) => {
                    let _ = file.file().unlock();
                    return Err(TockError::json(
                        format!("Malformed record {}", self.path.display()),
                        e,
                    ));
                }
            }
        };

        Ok(OpenRecord {
            file: Some(file),
            path: self.path.clone(),
            label: self.label.clone(),
            record,
            created,
            delete: false,
        })
    }
}

#[cfg(unix)]
fn names_same_inode(file: &std::fs::File, path: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match std::fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn names_same_inode(_file: &std::fs::File, path: &Path) -> std::io::Result<bool> {
    Ok(path.exists())
}

/// An open record: the lock is held until `close()` or drop.
pub struct OpenRecord<R: Record> {
    file: Option<fs::File>,
    path: PathBuf,
    label: String,
    record: R,
    created: bool,
    delete: bool,
}

impl<R: Record> OpenRecord<R> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &R {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut R {
        &mut self.record
    }

    /// True if this open created the backing file.
    pub fn was_created(&self) -> bool {
        self.created
    }

    /// Remove the file on close instead of writing it back.
    pub fn mark_deleted(&mut self) {
        self.delete = true;
    }

    pub fn is_marked_deleted(&self) -> bool {
        self.delete
    }

    /// Writes back (or deletes) and releases the lock.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };

        let result = if self.delete {
            match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(TockError::io("Failed to delete record", e)),
            }
        } else {
            write_record(&mut file, &self.record)
        };

        let _ = file.file().unlock();
        result
    }
}

impl<R: Record> Drop for OpenRecord<R> {
    fn drop(&mut self) {
        if self.file.is_none() {
            return;
        }
        if let Err(err) = self.finish() {
            tracing::warn!(
                error = %err,
                path = %self.path.display(),
                "Failed to write back record on drop"
            );
        }
    }
}

/// Renders a record as pretty JSON with sorted keys.
pub fn to_stable_json<R: Serialize>(record: &R) -> Result<String> {
    // serde_json's Map is ordered by key, so routing through Value sorts fields.
    let value =
        serde_json::to_value(record).map_err(|e| TockError::json("Failed to serialize record", e))?;
    serde_json::to_string_pretty(&value)
        .map_err(|e| TockError::json("Failed to serialize record", e))
}

fn write_record<R: Serialize>(file: &mut fs::File, record: &R) -> Result<()> {
    let mut content = to_stable_json(record)?;
    content.push('\n');

    file.set_len(0)
        .map_err(|e| TockError::io("Failed to truncate record", e))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| TockError::io("Failed to rewind record", e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| TockError::io("Failed to write record", e))?;
    file.flush()
        .map_err(|e| TockError::io("Failed to flush record", e))
}
