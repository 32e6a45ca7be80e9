//! Storage Module
//!
//! This module provides the core storage functionality for ttlkv: a
//! thread-safe key-value store with TTL support and a background expiry
//! sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │             one RwLock over HashMap<String, Entry>          │
//! │        Entry = Value + Expiry + persisted flag              │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ sweep_expired(now)
//!              ┌─────────────┴─────────────┐
//!              │         Sweeper           │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use ttlkv::storage::{Selector, Store, Value, NEVER_EXPIRES};
//! use std::collections::BTreeMap;
//! use std::time::Duration;
//!
//! let store = Store::new();
//!
//! store.insert("session", Value::text("token123"), Duration::from_secs(3600)).unwrap();
//!
//! let mut counts: BTreeMap<String, i64> = BTreeMap::new();
//! counts.insert("test".to_string(), 11);
//! store.insert("counts", counts, NEVER_EXPIRES).unwrap();
//!
//! let entry = store.fetch("counts").unwrap();
//! assert_eq!(entry.project(&Selector::from("test")), Ok(11));
//! ```

pub mod engine;
pub mod expiry;
pub mod value;

// Re-export commonly used types
pub use engine::{Entries, Entry, Expiry, StorageStats, Store, StoreError, Ttl, NEVER_EXPIRES};
pub use expiry::{
    SweepStats, Sweeper, SweeperConfig, DEFAULT_SWEEP_INTERVAL, MIN_SWEEP_INTERVAL,
};
pub use value::{Selector, Shape, Value};
