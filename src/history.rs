//! Completion history
//!
//! Append-only record of every countdown that reached zero. Entries are never
//! edited or reordered; each append rewrites the whole persisted log.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::persistence::PersistenceBridge;

/// Locale-style timestamp, e.g. `10/16/2026, 3:04:05 PM`
const COMPLETION_TIME_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// One finished timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEntry {
    /// Name of the timer at completion
    pub name: String,
    /// Local, human-readable completion time
    pub completion_time: String,
}

impl CompletionEntry {
    /// Entry stamped with the current local time
    pub fn now(name: impl Into<String>) -> Self {
        Self::at(name, Local::now())
    }

    pub fn at<Tz: TimeZone>(name: impl Into<String>, when: DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            name: name.into(),
            completion_time: when.format(COMPLETION_TIME_FORMAT).to_string(),
        }
    }
}

/// In-memory completion log mirrored to the persistence bridge
#[derive(Debug)]
pub struct CompletionLog {
    entries: Vec<CompletionEntry>,
    bridge: PersistenceBridge,
    /// False until the persisted log has been read; no write happens before
    loaded: bool,
}

impl CompletionLog {
    /// Load the persisted log once
    ///
    /// An unreadable log starts the session empty; the persisted entries are
    /// merged back in front of the session's entries before the first write.
    pub fn load(bridge: PersistenceBridge) -> Self {
        let (entries, loaded) = match bridge.load_log() {
            Ok(entries) => (entries, true),
            Err(e) => {
                warn!("Failed to load completion log, starting empty: {}", e);
                (Vec::new(), false)
            }
        };
        debug!(count = entries.len(), loaded, "Loaded completion log");
        Self {
            entries,
            bridge,
            loaded,
        }
    }

    /// Append an entry and persist the full log
    ///
    /// A failed write is logged; the in-memory log keeps the entry and the
    /// next append retries the full snapshot. While the persisted log is
    /// still unreadable it is never overwritten.
    pub fn append(&mut self, entry: CompletionEntry) {
        self.entries.push(entry);

        if !self.loaded {
            match self.bridge.load_log() {
                Ok(mut persisted) => {
                    debug!(count = persisted.len(), "Recovered persisted completion log");
                    persisted.append(&mut self.entries);
                    self.entries = persisted;
                    self.loaded = true;
                }
                Err(e) => {
                    warn!(
                        pending = self.entries.len(),
                        "Completion log still unreadable, not overwriting it: {}", e
                    );
                    return;
                }
            }
        }

        if let Err(e) = self.bridge.save_log(&self.entries) {
            warn!("Failed to persist completion log: {}", e);
        }
    }

    /// All entries, oldest first
    pub fn all(&self) -> &[CompletionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
