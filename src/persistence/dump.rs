//! Debug snapshot of the whole store.
//!
//! Writes every current entry to a fresh, timestamped file, whether or not it
//! has been persisted. Persisted flags are not touched, so a dump has no
//! effect on the append log.

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::persistence::log::{render, PersistError, PersistResult};
use crate::storage::Store;

/// Timestamp layout embedded in dump file names.
pub const DUMP_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Returns the dump file name for a snapshot taken at `at`.
pub fn dump_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("dump_{}.log", at.format(DUMP_TIMESTAMP_FORMAT))
}

/// Writes every entry in `store` to a new file in `dir`.
///
/// Entries are copied out under the shared lock and written after it is
/// released. A second dump within the same second overwrites the first.
///
/// # Returns
///
/// Returns the path of the file written.
pub fn dump(store: &Store, dir: impl AsRef<Path>) -> PersistResult<PathBuf> {
    let path = dir.as_ref().join(dump_file_name(&Local::now()));
    let snapshot = store.snapshot();

    let mut file = File::create(&path).map_err(|source| PersistError::Open {
        path: path.clone(),
        source,
    })?;

    let contents = render(snapshot.iter().map(|(k, e)| (k, e)));
    file.write_all(contents.as_bytes())
        .map_err(|source| PersistError::Write {
            path: path.clone(),
            source,
        })?;

    info!(entries = snapshot.len(), path = %path.display(), "Store dumped");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::persist_pending;
    use crate::storage::NEVER_EXPIRES;
    use chrono::{NaiveDate, Utc};
    use tempfile::tempdir;

    #[test]
    fn test_dump_file_name() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
            .and_utc();
        assert_eq!(dump_file_name(&at), "dump_2024-01-02T03:04:05.log");

        let now = Utc::now();
        assert!(dump_file_name(&now).starts_with("dump_"));
    }

    #[test]
    fn test_dump_ignores_persisted_flag() {
        let dir = tempdir().unwrap();
        let store = Store::new();
        store.insert("a", "1", NEVER_EXPIRES).unwrap();
        persist_pending(&store, &dir.path().join("current.log")).unwrap();
        store.insert("b", "2", NEVER_EXPIRES).unwrap();

        let path = dump(&store, dir.path()).unwrap();
        let mut lines: Vec<String> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        lines.sort();

        assert_eq!(
            lines,
            vec![
                "key: a value: 1 ttl: -1".to_string(),
                "key: b value: 2 ttl: -1".to_string(),
            ]
        );

        // The dump does not mark anything
        assert!(!store.fetch("b").unwrap().is_persisted());
    }

    #[test]
    fn test_dump_into_missing_dir_fails() {
        let dir = tempdir().unwrap();
        let err = dump(&Store::new(), dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, PersistError::Open { .. }));
    }
}
