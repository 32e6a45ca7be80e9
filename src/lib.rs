//! # ttlkv - A Concurrent TTL Key-Value Store with an Append Log
//!
//! ttlkv is an in-process key-value store. Entries carry an optional expiry
//! and are written asynchronously to an append-only log.
//!
//! ## Features
//!
//! - **Typed Values**: Text, integer sequences, text-to-integer mappings, or raw bytes
//! - **TTL Support**: Entries can expire at an absolute instant, or never
//! - **Active Expiry**: A background task evicts timed-out entries
//! - **Incremental Persistence**: A background task appends each entry to a log once
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               ttlkv                                     │
//! │                                                                         │
//! │   foreground callers                                                    │
//! │   insert / fetch / replace / remove                                     │
//! │            │                                                            │
//! │            ▼                                                            │
//! │  ┌──────────────────────────────────────────────┐                       │
//! │  │                   Store                      │                       │
//! │  │     RwLock<HashMap<String, Entry>>           │                       │
//! │  └──────────────────────────────────────────────┘                       │
//! │            ▲                               ▲                            │
//! │            │ sweep_expired                 │ with_exclusive_scan        │
//! │  ┌─────────┴─────────┐           ┌─────────┴─────────┐                  │
//! │  │     Sweeper       │           │    Persister      │──> current.log   │
//! │  │ (Background Task) │           │ (Background Task) │                  │
//! │  └───────────────────┘           └───────────────────┘                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use ttlkv::{Persister, PersisterConfig, Store, Sweeper, SweeperConfig, Value};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(Store::new());
//!     store.insert("name", Value::text("Ariz"), Duration::from_secs(60))?;
//!
//!     let sweeper = Sweeper::start(Arc::clone(&store), SweeperConfig::default());
//!     let persister = Persister::start(Arc::clone(&store), PersisterConfig::default());
//!
//!     // ... use the store ...
//!
//!     // Stop both before the store goes away
//!     sweeper.stop().await?;
//!     persister.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: The store, entry and value types, and the expiry sweeper
//! - [`persistence`]: The append log, the persister task, and the debug dump
//!
//! ## Shutdown
//!
//! Nothing is flushed implicitly. Entries that were not persisted before
//! the persister is stopped never reach the log.

pub mod persistence;
pub mod storage;

// Re-export commonly used types for convenience
pub use persistence::{dump, persist_pending, PersistError, Persister, PersisterConfig};
pub use storage::{
    Entry, Expiry, Selector, Shape, Store, StoreError, Sweeper, SweeperConfig, Ttl, Value,
    NEVER_EXPIRES,
};

/// Version of ttlkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
