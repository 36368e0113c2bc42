//! timerdeck - categorized countdown timers
//!
//! This library provides the timer store, the per-timer runtime, bulk
//! category control, the completion log and persistence to a key-value store.

pub mod bulk;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod persistence;
pub mod runtime;
pub mod shell;
pub mod timer;

pub use bulk::{BulkAction, BulkController, BulkOutcome};
pub use error::{Result, TimerError};
pub use history::{CompletionEntry, CompletionLog};
pub use persistence::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, PersistenceBridge};
pub use runtime::{RuntimeOptions, TimerEvent, TimerRuntime};
pub use timer::{CategoryGroup, Timer, TimerId, TimerPatch, TimerStatus, TimerStore};
