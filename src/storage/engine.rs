//! Concurrent Store with Expiry Support
//!
//! This module implements the core store for ttlkv: a `HashMap` from text
//! keys to [`Entry`] values, guarded by a single reader-writer lock.
//!
//! ## Design Decisions
//!
//! 1. **One Coarse Lock**: The whole map sits behind one `RwLock`. Lookups share
//!    it; every mutation, sweep, and persistence scan takes it exclusively.
//! 2. **Absolute Expiry**: A TTL is converted to a wall-clock instant when the
//!    entry is created or replaced, and never changes afterwards.
//! 3. **Wholesale Replacement**: `replace` installs a brand-new entry, so the
//!    persisted flag of the new value always starts out `false`.
//! 4. **Scoped Scans**: Bulk access goes through [`Store::with_exclusive_scan`].
//!    The lock guard lives for exactly the duration of the callback, so the
//!    lock is released on every exit path.
//!
//! ## Concurrency Model
//!
//! ```text
//!   foreground callers        Sweeper task          Persister task
//!   insert/fetch/replace     sweep_expired(now)    with_exclusive_scan
//!            │                      │                      │
//!            ▼                      ▼                      ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Store                             │
//! │        RwLock<HashMap<String, Entry>>  (single lock)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::storage::value::{Selector, Shape, Value};

/// The full entry set, as handed to [`Store::with_exclusive_scan`] callbacks.
pub type Entries = HashMap<String, Entry>;

/// Errors returned by store operations.
///
/// All of them are recoverable and none of them change the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Insert attempted on a key that is already present
    #[error("entry for key={0} already exists")]
    AlreadyExists(String),

    /// Fetch, replace, or remove attempted on an absent key
    #[error("entry for key={0} does not exist")]
    NotFound(String),

    /// A projection asked for a shape the value does not have
    #[error("cannot convert {found} to {expected}")]
    ConversionError { expected: Shape, found: Shape },

    /// A sequence projection went past the end of the sequence
    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A mapping projection named a key the mapping does not have
    #[error("mapping has no field {0}")]
    MissingField(String),
}

/// Time-to-live requested on insert or replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The immortal sentinel: the entry never expires.
    Never,
    /// Expire this long after the call.
    For(Duration),
}

/// The immortal TTL sentinel.
pub const NEVER_EXPIRES: Ttl = Ttl::Never;

impl Ttl {
    /// Interprets a millisecond count, treating any negative value as
    /// [`Ttl::Never`].
    pub fn from_millis(ms: i64) -> Self {
        if ms < 0 {
            Ttl::Never
        } else {
            Ttl::For(Duration::from_millis(ms as u64))
        }
    }

    /// Converts this TTL into an absolute expiry relative to `now`.
    ///
    /// Insert and replace both go through here, so the sentinel is handled
    /// the same way by both. A TTL that reaches past the latest instant the
    /// clock can represent never expires.
    pub fn expiry_from(self, now: SystemTime) -> Expiry {
        match self {
            Ttl::Never => Expiry::Never,
            Ttl::For(ttl) => now.checked_add(ttl).map_or(Expiry::Never, Expiry::At),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        Ttl::For(ttl)
    }
}

/// Absolute expiry of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Never expires.
    Never,
    /// Expires at this wall-clock instant.
    At(SystemTime),
}

impl Expiry {
    /// Returns true if this expiry is finite and not after `now`.
    #[inline]
    pub fn has_passed(&self, now: SystemTime) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(at) => *at <= now,
        }
    }

    /// Returns the expiry instant, or `None` for immortal entries.
    pub fn instant(&self) -> Option<SystemTime> {
        match self {
            Expiry::Never => None,
            Expiry::At(at) => Some(*at),
        }
    }
}

/// Formats as signed nanoseconds since the Unix epoch, or `-1` for
/// [`Expiry::Never`].
impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiry::Never => f.write_str("-1"),
            Expiry::At(at) => match at.duration_since(UNIX_EPOCH) {
                Ok(since) => write!(f, "{}", since.as_nanos()),
                Err(e) => write!(f, "-{}", e.duration().as_nanos()),
            },
        }
    }
}

/// Represents a stored value with its expiry and persistence state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    value: Value,
    expiry: Expiry,
    persisted: bool,
    created_at: SystemTime,
}

impl Entry {
    /// Creates a not yet persisted entry whose expiry is `ttl` after `now`.
    pub fn with_ttl(value: Value, ttl: Ttl, now: SystemTime) -> Self {
        Self {
            value,
            expiry: ttl.expiry_from(now),
            persisted: false,
            created_at: now,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    /// Returns true once this entry's value has been appended to the log.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Records that this entry's value has been appended to the log.
    ///
    /// There is no way back: a changed value means a new entry.
    pub fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Checks if this entry has expired as of `now`.
    #[inline]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expiry.has_passed(now)
    }

    /// Views the value through `selector`. See [`Value::project`].
    pub fn project(&self, selector: &Selector) -> Result<i64, StoreError> {
        self.value.project(selector)
    }
}

/// The main store.
///
/// This struct is designed to be wrapped in an `Arc` and shared between the
/// foreground callers, the [`Sweeper`](crate::storage::Sweeper) and the
/// [`Persister`](crate::persistence::Persister). All operations are thread-safe.
///
/// # Example
///
/// ```
/// use ttlkv::storage::{Store, Ttl, Value, NEVER_EXPIRES};
/// use std::time::Duration;
///
/// let store = Store::new();
///
/// store.insert("name", Value::text("Ariz"), Ttl::For(Duration::from_secs(60))).unwrap();
/// store.insert("config", Value::text("v1"), NEVER_EXPIRES).unwrap();
///
/// let entry = store.fetch("name").unwrap();
/// assert_eq!(entry.value(), &Value::text("Ariz"));
/// assert!(!entry.is_persisted());
/// ```
pub struct Store {
    entries: RwLock<Entries>,

    /// Statistics: successful inserts
    insert_count: AtomicU64,

    /// Statistics: fetch calls
    fetch_count: AtomicU64,

    /// Statistics: successful replaces
    replace_count: AtomicU64,

    /// Statistics: successful removes
    remove_count: AtomicU64,

    /// Statistics: entries evicted by sweeps
    expired_count: AtomicU64,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("keys", &self.len())
            .field("insert_count", &self.insert_count.load(Ordering::Relaxed))
            .field("fetch_count", &self.fetch_count.load(Ordering::Relaxed))
            .field("expired_count", &self.expired_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            insert_count: AtomicU64::new(0),
            fetch_count: AtomicU64::new(0),
            replace_count: AtomicU64::new(0),
            remove_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Inserts a new entry.
    ///
    /// The existence check and the insert happen under one exclusive lock, so
    /// two concurrent inserts of the same key cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the key is present. The
    /// existing entry is left untouched.
    pub fn insert(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
        ttl: impl Into<Ttl>,
    ) -> Result<Entry, StoreError> {
        let key = key.into();
        let mut entries = self.entries.write();

        if entries.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }

        let entry = Entry::with_ttl(value.into(), ttl.into(), SystemTime::now());
        entries.insert(key, entry.clone());
        self.insert_count.fetch_add(1, Ordering::Relaxed);

        Ok(entry)
    }

    /// Returns a copy of the current entry for `key`.
    ///
    /// Takes the lock in shared mode only. Expired entries that the sweeper
    /// has not yet evicted are still returned.
    pub fn fetch(&self, key: &str) -> Result<Entry, StoreError> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        let entries = self.entries.read();
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Replaces the entry for an existing key with a brand-new one.
    ///
    /// The expiry is recomputed from `ttl` and the persisted flag starts over
    /// at `false`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the key is absent.
    pub fn replace(
        &self,
        key: &str,
        value: impl Into<Value>,
        ttl: impl Into<Ttl>,
    ) -> Result<Entry, StoreError> {
        let mut entries = self.entries.write();

        match entries.get_mut(key) {
            Some(slot) => {
                let entry = Entry::with_ttl(value.into(), ttl.into(), SystemTime::now());
                *slot = entry.clone();
                self.replace_count.fetch_add(1, Ordering::Relaxed);
                Ok(entry)
            }
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    /// Removes the entry for `key` and returns it.
    pub fn remove(&self, key: &str) -> Result<Entry, StoreError> {
        let mut entries = self.entries.write();

        match entries.remove(key) {
            Some(entry) => {
                self.remove_count.fetch_add(1, Ordering::Relaxed);
                Ok(entry)
            }
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    /// Removes every entry whose finite expiry is at or before `now`.
    ///
    /// This is called by the background [`Sweeper`](crate::storage::Sweeper).
    /// A second call with the same `now` removes nothing.
    ///
    /// # Returns
    ///
    /// Returns the number of entries that were removed.
    pub fn sweep_expired(&self, now: SystemTime) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();

        entries.retain(|_, entry| !entry.is_expired_at(now));

        let removed = before - entries.len();
        if removed > 0 {
            self.expired_count
                .fetch_add(removed as u64, Ordering::Relaxed);
        }

        removed
    }

    /// Runs `scan` with exclusive access to the whole entry set.
    ///
    /// The write lock is held for the duration of the call and released when
    /// it returns, whether `scan` returns normally, returns an error value, or
    /// unwinds. This is the only way to iterate and mutate entries together.
    ///
    /// `scan` must not call back into this store.
    ///
    /// # Example
    ///
    /// ```
    /// use ttlkv::storage::{Store, Value, NEVER_EXPIRES};
    ///
    /// let store = Store::new();
    /// store.insert("a", Value::text("1"), NEVER_EXPIRES).unwrap();
    ///
    /// let pending = store.with_exclusive_scan(|entries| {
    ///     entries.values().filter(|e| !e.is_persisted()).count()
    /// });
    /// assert_eq!(pending, 1);
    /// ```
    pub fn with_exclusive_scan<R>(&self, scan: impl FnOnce(&mut Entries) -> R) -> R {
        let mut entries = self.entries.write();
        scan(&mut entries)
    }

    /// Returns true if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Returns all keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns a copy of every key and entry, taken under the shared lock.
    pub fn snapshot(&self) -> Vec<(String, Entry)> {
        self.entries
            .read()
            .iter()
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len() as u64,
            inserts: self.insert_count.load(Ordering::Relaxed),
            fetches: self.fetch_count.load(Ordering::Relaxed),
            replaces: self.replace_count.load(Ordering::Relaxed),
            removes: self.remove_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of entries currently stored
    pub keys: u64,
    /// Successful inserts
    pub inserts: u64,
    /// Fetch calls, hit or miss
    pub fetches: u64,
    /// Successful replaces
    pub replaces: u64,
    /// Successful removes
    pub removes: u64,
    /// Entries evicted by sweeps
    pub expired: u64,
}
