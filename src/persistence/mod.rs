//! Persistence bridge to an external key-value store
//!
//! The store is a plain `get`/`set` of byte blobs. Two records live in it:
//! the flat timer list and the completion log. Every write replaces the whole
//! record; there are no partial or delta writes.

mod file;
mod memory;

pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{Result, TimerError};
use crate::history::CompletionEntry;
use crate::timer::{StoredTimer, Timer};

/// Key of the serialized timer list
pub const TIMERS_KEY: &str = "timers";

/// Key of the serialized completion log
pub const COMPLETION_LOG_KEY: &str = "completedTimersLog";

/// External key-value store
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`, `None` if it was never written
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the value under `key`
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Serializes timers and the completion log to a [`KeyValueStore`]
#[derive(Clone)]
pub struct PersistenceBridge {
    kv: Arc<dyn KeyValueStore>,
}

impl PersistenceBridge {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Bridge backed by a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()))
    }

    /// Load the timer list; a missing record is an empty list
    ///
    /// Entries that break a timer invariant are skipped with a warning so one
    /// bad record never hides the rest.
    pub fn load_timers(&self) -> Result<Vec<Timer>> {
        let stored: Vec<StoredTimer> = self.load_list(TIMERS_KEY)?;
        let timers = stored
            .into_iter()
            .filter_map(|stored| match Timer::try_from(stored) {
                Ok(timer) => Some(timer),
                Err(e) => {
                    warn!("Skipping stored timer: {}", e);
                    None
                }
            })
            .collect();
        Ok(timers)
    }

    /// Overwrite the timer list
    pub fn save_timers(&self, timers: &[Timer]) -> Result<()> {
        self.save_list(TIMERS_KEY, timers)
    }

    /// Load the completion log; a missing record is an empty log
    pub fn load_log(&self) -> Result<Vec<CompletionEntry>> {
        self.load_list(COMPLETION_LOG_KEY)
    }

    /// Overwrite the completion log
    pub fn save_log(&self, entries: &[CompletionEntry]) -> Result<()> {
        self.save_list(COMPLETION_LOG_KEY, entries)
    }

    fn load_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let Some(bytes) = self.kv.get(key)? else {
            return Ok(Vec::new());
        };

        // an explicit JSON null reads the same as a missing record
        let parsed: Option<Vec<T>> = serde_json::from_slice(&bytes)
            .map_err(|e| TimerError::Persistence(format!("failed to parse '{}': {}", key, e)))?;
        Ok(parsed.unwrap_or_default())
    }

    fn save_list<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
        let bytes = serde_json::to_vec(items)?;
        self.kv.set(key, &bytes)
    }
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge").finish_non_exhaustive()
    }
}
