//! In-memory key-value store
//!
//! Used by tests and by sessions that should not touch disk. Failures can be
//! injected to exercise the warning paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use super::KeyValueStore;
use crate::error::{Result, TimerError};

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set` fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TimerError::Persistence(format!("read of '{}' failed", key)));
        }
        let entries = self
            .entries
            .read()
            .map_err(|_| TimerError::Persistence("memory store poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TimerError::Persistence(format!("write of '{}' failed", key)));
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| TimerError::Persistence("memory store poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.get("timers").unwrap(), None);

        store.set("timers", b"[]").unwrap();
        assert_eq!(store.get("timers").unwrap(), Some(b"[]".to_vec()));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_injected_failures() {
        let store = MemoryKeyValueStore::new();
        store.set("timers", b"[]").unwrap();

        store.fail_writes(true);
        assert!(store.set("timers", b"[1]").is_err());
        assert_eq!(store.write_count(), 1);

        store.fail_reads(true);
        assert!(store.get("timers").is_err());

        store.fail_reads(false);
        store.fail_writes(false);
        assert_eq!(store.get("timers").unwrap(), Some(b"[]".to_vec()));
    }
}
