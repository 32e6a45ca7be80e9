//! Append Log
//!
//! One persistence cycle appends every not-yet-persisted entry to a plain
//! text log, one record per line:
//!
//! ```text
//! key: <key> value: <value> ttl: <absolute expiry in ns since epoch | -1>
//! ```
//!
//! The log is write-only. Nothing here reads it back, and there is no fsync:
//! a record that reached the OS is considered written.
//!
//! ## Exactly Once
//!
//! A cycle renders the records for all entries with `persisted == false`
//! under the store's exclusive scan, writes them in one `write_all`, and only
//! then flips their flags. Entries that are already persisted are skipped
//! and the scan carries on, so iteration order never matters. If the write
//! fails no flag is flipped and the same entries are retried next cycle.
//!
//! Exactly once only holds for writes that succeed. A `write_all` that fails
//! partway can leave part of the batch in the log, and the retry appends
//! those records again.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::storage::{Entries, Entry, Store};

/// Errors that can occur while writing the log or a dump.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The destination could not be opened or created
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Records could not be written to an open destination
    #[error("cannot write to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The background task running a cycle panicked or was cancelled
    #[error("persister task failed: {0}")]
    Task(#[from] JoinError),
}

/// Result type for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// A single log line for one entry.
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    key: &'a str,
    entry: &'a Entry,
}

impl<'a> LogRecord<'a> {
    pub fn new(key: &'a str, entry: &'a Entry) -> Self {
        Self { key, entry }
    }
}

impl fmt::Display for LogRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key: {} value: {} ttl: {}",
            self.key,
            self.entry.value(),
            self.entry.expiry()
        )
    }
}

/// Opens `path` for appending, creating it if absent.
///
/// If the append open fails the file is created fresh instead.
pub fn open_log(path: &Path) -> PersistResult<File> {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Ok(file),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Append open failed, creating log fresh"
            );
            File::create(path).map_err(|source| PersistError::Open {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

/// Renders one line per entry into a single buffer.
pub(crate) fn render<'a>(records: impl Iterator<Item = (&'a String, &'a Entry)>) -> String {
    let mut out = String::new();
    for (key, entry) in records {
        out.push_str(&LogRecord::new(key, entry).to_string());
        out.push('\n');
    }
    out
}

/// Runs one persistence cycle against `store`, appending to the log at `path`.
///
/// The file is opened before the store lock is taken. The render, write, and
/// flag updates all happen inside one exclusive scan.
///
/// # Returns
///
/// Returns the number of records appended.
pub fn persist_pending(store: &Store, path: &Path) -> PersistResult<usize> {
    let mut file = open_log(path)?;

    store.with_exclusive_scan(|entries| append_pending(entries, &mut file, path))
}

fn append_pending(entries: &mut Entries, file: &mut File, path: &Path) -> PersistResult<usize> {
    let pending = entries.values().filter(|e| !e.is_persisted()).count();
    if pending == 0 {
        return Ok(0);
    }

    let batch = render(entries.iter().filter(|(_, e)| !e.is_persisted()));
    file.write_all(batch.as_bytes())
        .map_err(|source| PersistError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    // Nothing else can touch the map while the scan holds the lock, so this
    // is the same set of entries that was just written.
    for entry in entries.values_mut().filter(|e| !e.is_persisted()) {
        entry.mark_persisted();
    }

    debug!(records = pending, path = %path.display(), "Appended pending entries");
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Value, NEVER_EXPIRES};
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::tempdir;

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn key_counts(lines: &[String]) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for line in lines {
            let key = line
                .strip_prefix("key: ")
                .and_then(|rest| rest.split(" value: ").next())
                .unwrap()
                .to_string();
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_record_format() {
        let store = Store::new();
        let entry = store.insert("dictkey", vec![1i64, 2], NEVER_EXPIRES).unwrap();
        assert_eq!(
            LogRecord::new("dictkey", &entry).to_string(),
            "key: dictkey value: [1 2] ttl: -1"
        );

        let entry = store
            .insert("s", Value::text("v"), Duration::from_secs(5))
            .unwrap();
        let line = LogRecord::new("s", &entry).to_string();
        let ttl: u128 = line.rsplit("ttl: ").next().unwrap().parse().unwrap();
        assert!(ttl > 0);
    }

    #[test]
    fn test_two_cycles_write_each_entry_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("current.log");
        let store = Store::new();

        for i in 0..20 {
            store.insert(format!("key{}", i), "value", NEVER_EXPIRES).unwrap();
        }

        assert_eq!(persist_pending(&store, &path).unwrap(), 20);
        assert_eq!(persist_pending(&store, &path).unwrap(), 0);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 20);
        assert!(key_counts(&lines).values().all(|&n| n == 1));
        assert!(store.snapshot().iter().all(|(_, e)| e.is_persisted()));
    }

    #[test]
    fn test_persisted_entries_are_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("current.log");
        let store = Store::new();

        for i in 0..10 {
            store.insert(format!("old{}", i), "v", NEVER_EXPIRES).unwrap();
        }
        persist_pending(&store, &path).unwrap();

        // New entries are interleaved with persisted ones in map order
        for i in 0..10 {
            store.insert(format!("new{}", i), "v", NEVER_EXPIRES).unwrap();
        }
        assert_eq!(persist_pending(&store, &path).unwrap(), 10);

        let counts = key_counts(&read_lines(&path));
        assert_eq!(counts.len(), 20);
        assert!(counts.values().all(|&n| n == 1));
    }

    #[test]
    fn test_replace_is_persisted_again() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("current.log");
        let store = Store::new();

        store.insert("stringkey", "stringvalue", NEVER_EXPIRES).unwrap();
        persist_pending(&store, &path).unwrap();

        store.replace("stringkey", "newvalue", NEVER_EXPIRES).unwrap();
        assert_eq!(persist_pending(&store, &path).unwrap(), 1);

        let lines = read_lines(&path);
        assert_eq!(
            lines,
            vec![
                "key: stringkey value: stringvalue ttl: -1".to_string(),
                "key: stringkey value: newvalue ttl: -1".to_string(),
            ]
        );
    }

    #[test]
    fn test_appends_to_existing_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("current.log");
        std::fs::write(&path, "key: earlier value: x ttl: -1\n").unwrap();

        let store = Store::new();
        store.insert("k", "v", NEVER_EXPIRES).unwrap();
        persist_pending(&store, &path).unwrap();

        assert_eq!(read_lines(&path).len(), 2);
    }

    #[test]
    fn test_open_failure_keeps_entries_pending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("current.log");

        let store = Store::new();
        store.insert("k", "v", NEVER_EXPIRES).unwrap();

        let err = persist_pending(&store, &path).unwrap_err();
        assert!(matches!(err, PersistError::Open { .. }));
        assert!(!store.fetch("k").unwrap().is_persisted());
    }

    #[test]
    fn test_empty_store_creates_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("current.log");

        assert_eq!(persist_pending(&Store::new(), &path).unwrap(), 0);
        assert!(path.exists());
    }
}
