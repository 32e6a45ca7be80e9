//! Persistence Module
//!
//! Writes store entries out to disk. Two paths exist:
//!
//! - The **append log**: a [`Persister`] task periodically appends every
//!   entry that has not been written yet, then marks it persisted. Each
//!   entry value reaches the log once.
//! - The **debug dump**: [`dump`] writes the whole store to a timestamped
//!   file on demand. It is for inspection only and ignores persisted flags.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐   with_exclusive_scan   ┌───────────────┐
//! │      Persister       │ ───────────────────────>│     Store     │
//! │ (Background Tokio    │                         └───────────────┘
//! │  Task, blocking pool)│  append records
//! └──────────┬───────────┘
//!            ▼
//!     data/current.log
//! ```
//!
//! There is no replay path: nothing in this crate reads the log back.

pub mod dump;
pub mod log;
pub mod persister;

pub use dump::{dump, dump_file_name};
pub use log::{open_log, persist_pending, LogRecord, PersistError, PersistResult};
pub use persister::{
    PersistStats, Persister, PersisterConfig, DEFAULT_LOG_PATH, DEFAULT_PERSIST_INTERVAL,
    MIN_PERSIST_INTERVAL,
};
