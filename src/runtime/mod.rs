//! Timer runtime
//!
//! Owns the timer store, the completion log and the registry of active
//! tickers behind a single mutex. Commands (`start`, `pause`, `reset`,
//! `delete`, ...) are synchronous state transitions; the per-timer tickers are
//! the only autonomous source of change.
//!
//! Cancelling a ticker happens under the same lock the ticker must take before
//! it mutates anything, so when a command returns no residual tick for that
//! timer can land.

mod ticker;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::error::{Result, TimerError};
use crate::history::{CompletionEntry, CompletionLog};
use crate::persistence::PersistenceBridge;
use crate::timer::{CategoryGroup, Timer, TimerId, TimerPatch, TimerStatus, TimerStore};

use ticker::Ticker;

/// Notification emitted by the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimerEvent {
    /// A running timer lost one second
    Ticked { id: TimerId, remaining_time: u64 },
    /// A timer with halfway alerts enabled reached its midpoint
    Halfway {
        id: TimerId,
        name: String,
        remaining_time: u64,
    },
    /// A timer reached zero and was logged
    Completed { id: TimerId, entry: CompletionEntry },
}

/// Runtime tuning
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Period between ticks of one timer
    pub tick_interval: Duration,
    /// Buffered events per subscriber before the slowest one starts lagging
    pub event_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            event_capacity: 256,
        }
    }
}

impl From<&Config> for RuntimeOptions {
    fn from(config: &Config) -> Self {
        Self {
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
            event_capacity: config.event_channel_capacity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Continue,
    Stop,
}

/// State shared between commands and tickers
#[derive(Debug)]
struct Shared {
    store: TimerStore,
    log: CompletionLog,
    tickers: HashMap<TimerId, Ticker>,
    bridge: PersistenceBridge,
    /// False while the persisted timer list has never been read
    timers_loaded: bool,
    /// Timers deleted since the last successful write
    deleted: HashSet<TimerId>,
}

impl Shared {
    /// Advance one timer by a single tick
    fn tick(&mut self, id: &TimerId, events: &broadcast::Sender<TimerEvent>) -> TickOutcome {
        let Some(timer) = self.store.get(id).cloned() else {
            self.tickers.remove(id);
            return TickOutcome::Stop;
        };
        if !timer.is_running() {
            self.tickers.remove(id);
            return TickOutcome::Stop;
        }

        let remaining = timer.remaining_time.saturating_sub(1);

        if remaining == 0 {
            self.tickers.remove(id);
            self.set_state(id, TimerStatus::Completed, 0);

            let entry = CompletionEntry::now(&timer.name);
            self.log.append(entry.clone());
            self.persist_timers();

            info!(timer_id = %id, name = %timer.name, "Timer completed");
            let _ = events.send(TimerEvent::Completed {
                id: id.clone(),
                entry,
            });
            return TickOutcome::Stop;
        }

        self.set_state(id, TimerStatus::Running, remaining);
        trace!(timer_id = %id, remaining, "Tick");
        let _ = events.send(TimerEvent::Ticked {
            id: id.clone(),
            remaining_time: remaining,
        });

        if timer.halfway_alert_enabled && remaining == timer.halfway_mark() {
            info!(timer_id = %id, name = %timer.name, "Timer reached halfway");
            let _ = events.send(TimerEvent::Halfway {
                id: id.clone(),
                name: timer.name,
                remaining_time: remaining,
            });
        }

        TickOutcome::Continue
    }

    fn set_state(&mut self, id: &TimerId, status: TimerStatus, remaining: u64) {
        let patch = TimerPatch::status(status).with_remaining(remaining);
        if let Err(e) = self.store.update(id, &patch) {
            warn!(timer_id = %id, "Failed to update timer state: {}", e);
        }
    }

    /// Cancel the ticker for `id`, returning whether one existed
    fn stop_ticker(&mut self, id: &TimerId) -> bool {
        match self.tickers.remove(id) {
            Some(ticker) => {
                ticker.cancel();
                true
            }
            None => false,
        }
    }

    fn require(&self, id: &TimerId) -> Result<&Timer> {
        self.store
            .get(id)
            .ok_or_else(|| TimerError::NotFound(id.clone()))
    }

    /// Write the full timer list; failures only warn
    ///
    /// A list that could not be read at startup is merged in first; while it
    /// stays unreadable nothing is written over it.
    fn persist_timers(&mut self) {
        if !self.timers_loaded {
            match self.bridge.load_timers() {
                Ok(persisted) => {
                    self.merge_persisted(persisted);
                    self.timers_loaded = true;
                }
                Err(e) => {
                    warn!("Timer list still unreadable, not overwriting it: {}", e);
                    return;
                }
            }
        }

        match self.bridge.save_timers(self.store.all()) {
            Ok(()) => self.deleted.clear(),
            Err(e) => warn!("Failed to persist timers: {}", e),
        }
    }

    /// Fold a persisted timer list into the session
    ///
    /// In-memory timers win over their persisted copies and timers only the
    /// session knows are kept. Timers deleted this session stay deleted.
    /// Returns the number of timers taken from `persisted`.
    fn merge_persisted(&mut self, persisted: Vec<Timer>) -> usize {
        let mut merged = Vec::with_capacity(persisted.len() + self.store.len());
        let mut added = 0;
        for timer in persisted {
            if self.deleted.contains(&timer.id) {
                continue;
            }
            match self.store.get(&timer.id) {
                Some(live) => merged.push(live.clone()),
                None => {
                    merged.push(timer);
                    added += 1;
                }
            }
        }
        for live in self.store.all() {
            if !merged.iter().any(|t| t.id == live.id) {
                merged.push(live.clone());
            }
        }

        self.store = TimerStore::from_timers(merged);
        added
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // every mutation leaves the state consistent, so a poisoned lock is usable
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the timer runtime; clones share the same state
#[derive(Clone)]
pub struct TimerRuntime {
    shared: Arc<Mutex<Shared>>,
    events: broadcast::Sender<TimerEvent>,
    handle: Handle,
    tick_interval: Duration,
}

impl TimerRuntime {
    /// Load timers and the completion log through `bridge`
    ///
    /// Unreadable records are logged and the session starts empty.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn load(bridge: PersistenceBridge, options: RuntimeOptions) -> Self {
        let (timers, timers_loaded) = match bridge.load_timers() {
            Ok(timers) => (timers, true),
            Err(e) => {
                warn!("Failed to load timers, starting empty: {}", e);
                (Vec::new(), false)
            }
        };
        info!(count = timers.len(), "Loaded timers");

        let shared = Shared {
            store: TimerStore::from_timers(timers),
            log: CompletionLog::load(bridge.clone()),
            tickers: HashMap::new(),
            bridge,
            timers_loaded,
            deleted: HashSet::new(),
        };
        let (events, _) = broadcast::channel(options.event_capacity.max(1));

        Self {
            shared: Arc::new(Mutex::new(shared)),
            events,
            handle: Handle::current(),
            tick_interval: options.tick_interval,
        }
    }

    /// Receive future timer events
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    /// Create a paused timer and persist the timer list
    pub fn create(&self, name: &str, category: &str, duration: u64) -> Result<Timer> {
        let mut state = lock(&self.shared);
        let timer = state.store.create(name, category, duration)?;
        state.persist_timers();
        info!(timer_id = %timer.id, name = %timer.name, category = %timer.category, duration, "Created timer");
        Ok(timer)
    }

    /// Stop any ticker for `id`, then remove the timer and persist
    pub fn delete(&self, id: &TimerId) -> Result<Timer> {
        let mut state = lock(&self.shared);
        state.require(id)?;
        state.stop_ticker(id);
        let removed = state.store.remove(id)?;
        state.deleted.insert(id.clone());
        state.persist_timers();
        info!(timer_id = %id, name = %removed.name, "Deleted timer");
        Ok(removed)
    }

    /// Merge user-editable fields into a timer
    ///
    /// Status and remaining time are driven only by start/pause/reset and the
    /// ticker; a patch touching them is rejected.
    pub fn update(&self, id: &TimerId, patch: &TimerPatch) -> Result<Timer> {
        if patch.status.is_some() || patch.remaining_time.is_some() {
            return Err(TimerError::Validation(
                "status and remaining time change only through start, pause and reset"
                    .to_string(),
            ));
        }

        let mut state = lock(&self.shared);
        let timer = state.store.update(id, patch)?;
        state.persist_timers();
        debug!(timer_id = %id, "Updated timer");
        Ok(timer)
    }

    /// Flip the halfway alert flag, returning the new value
    pub fn toggle_halfway_alert(&self, id: &TimerId) -> Result<bool> {
        let enabled = !self
            .get(id)
            .ok_or_else(|| TimerError::NotFound(id.clone()))?
            .halfway_alert_enabled;
        self.update(id, &TimerPatch::halfway_alert(enabled))?;
        Ok(enabled)
    }

    /// Start ticking `id`
    ///
    /// Returns `false` without changing anything when the timer is already
    /// running or completed.
    pub fn start(&self, id: &TimerId) -> Result<bool> {
        let mut state = lock(&self.shared);
        let timer = state.require(id)?;
        if timer.status != TimerStatus::Paused || state.tickers.contains_key(id) {
            return Ok(false);
        }

        let remaining = timer.remaining_time;
        state.set_state(id, TimerStatus::Running, remaining);
        let ticker = Ticker::spawn(
            &self.handle,
            id.clone(),
            self.tick_interval,
            Arc::downgrade(&self.shared),
            self.events.clone(),
        );
        state.tickers.insert(id.clone(), ticker);
        debug!(timer_id = %id, remaining, "Started timer");
        Ok(true)
    }

    /// Stop ticking `id`, keeping its remaining time
    ///
    /// Returns `false` when no ticker was active.
    pub fn pause(&self, id: &TimerId) -> Result<bool> {
        let mut state = lock(&self.shared);
        let remaining = state.require(id)?.remaining_time;
        if !state.stop_ticker(id) {
            return Ok(false);
        }
        state.set_state(id, TimerStatus::Paused, remaining);
        debug!(timer_id = %id, remaining, "Paused timer");
        Ok(true)
    }

    /// Stop any ticker and restore the full duration, from any state
    pub fn reset(&self, id: &TimerId) -> Result<Timer> {
        let mut state = lock(&self.shared);
        let duration = state.require(id)?.duration;
        state.stop_ticker(id);
        state.set_state(id, TimerStatus::Paused, duration);
        debug!(timer_id = %id, "Reset timer");
        state.require(id).cloned()
    }

    /// Cancel every ticker; running timers become paused
    ///
    /// Returns the number of tickers stopped.
    pub fn stop_all(&self) -> usize {
        let mut state = lock(&self.shared);
        let ids: Vec<TimerId> = state.tickers.keys().cloned().collect();
        for id in &ids {
            state.stop_ticker(id);
            if let Some(remaining) = state.store.get(id).map(|t| t.remaining_time) {
                state.set_state(id, TimerStatus::Paused, remaining);
            }
        }
        if !ids.is_empty() {
            info!(count = ids.len(), "Stopped all tickers");
        }
        ids.len()
    }

    /// Stop all tickers and write a final timer snapshot
    pub fn shutdown(&self) {
        self.stop_all();
        lock(&self.shared).persist_timers();
        info!("Timer runtime shut down");
    }

    /// Re-read the persisted timer list
    ///
    /// Every timer already in memory keeps its session state; only timers
    /// that are new in the store are added. Returns the number of timers.
    pub fn reload(&self) -> Result<usize> {
        let mut state = lock(&self.shared);
        let persisted = state.bridge.load_timers()?;
        let added = state.merge_persisted(persisted);
        state.timers_loaded = true;

        let count = state.store.len();
        debug!(count, added, "Reloaded timers");
        Ok(count)
    }

    /// Current copy of a timer
    pub fn get(&self, id: &TimerId) -> Option<Timer> {
        lock(&self.shared).store.get(id).cloned()
    }

    /// Timers grouped by category
    pub fn list_by_category(&self) -> Vec<CategoryGroup> {
        lock(&self.shared).store.list_by_category()
    }

    /// Copies of the timers in `category`, in insertion order
    pub fn timers_in_category(&self, category: &str) -> Vec<Timer> {
        lock(&self.shared)
            .store
            .timers_in_category(category)
            .into_iter()
            .cloned()
            .collect()
    }

    /// IDs starting with `prefix`
    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<TimerId> {
        lock(&self.shared).store.ids_with_prefix(prefix)
    }

    /// Completed-timer history, oldest first
    pub fn completion_log(&self) -> Vec<CompletionEntry> {
        lock(&self.shared).log.all().to_vec()
    }

    /// Whether a ticker is active for `id`
    pub fn is_ticking(&self, id: &TimerId) -> bool {
        lock(&self.shared).tickers.contains_key(id)
    }

    /// Number of active tickers
    pub fn active_tickers(&self) -> usize {
        lock(&self.shared).tickers.len()
    }
}

impl std::fmt::Debug for TimerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerRuntime")
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{KeyValueStore, MemoryKeyValueStore, TIMERS_KEY};
    use tokio::time::sleep;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn runtime_with(kv: Arc<MemoryKeyValueStore>) -> TimerRuntime {
        TimerRuntime::load(PersistenceBridge::new(kv), RuntimeOptions::default())
    }

    fn runtime() -> TimerRuntime {
        runtime_with(Arc::new(MemoryKeyValueStore::new()))
    }

    /// Every timer satisfies the store invariants and ticker bookkeeping
    fn assert_invariants(rt: &TimerRuntime) {
        for group in rt.list_by_category() {
            for timer in group.timers {
                assert!(timer.remaining_time <= timer.duration);
                if timer.is_completed() {
                    assert_eq!(timer.remaining_time, 0);
                }
                assert_eq!(timer.is_running(), rt.is_ticking(&timer.id));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_to_completion() {
        let rt = runtime();
        let timer = rt.create("Workout", "Fitness", 5).unwrap();

        assert!(rt.start(&timer.id).unwrap());
        sleep(secs(4.5)).await;
        assert_eq!(rt.get(&timer.id).unwrap().remaining_time, 1);
        assert_invariants(&rt);

        sleep(secs(1.0)).await;
        let done = rt.get(&timer.id).unwrap();
        assert_eq!(done.status, TimerStatus::Completed);
        assert_eq!(done.remaining_time, 0);
        assert!(!rt.is_ticking(&timer.id));

        let log = rt.completion_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].name, "Workout");
        assert_invariants(&rt);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_noop_when_running_or_completed() {
        let rt = runtime();
        let timer = rt.create("Tea", "Kitchen", 2).unwrap();

        assert!(rt.start(&timer.id).unwrap());
        assert!(!rt.start(&timer.id).unwrap());
        assert_eq!(rt.active_tickers(), 1);

        // a second ticker would double-decrement
        sleep(secs(1.5)).await;
        assert_eq!(rt.get(&timer.id).unwrap().remaining_time, 1);

        sleep(secs(1.0)).await;
        assert!(rt.get(&timer.id).unwrap().is_completed());
        assert!(!rt.start(&timer.id).unwrap());
        assert_eq!(rt.active_tickers(), 0);
        assert_eq!(rt.get(&timer.id).unwrap().status, TimerStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_then_start_resumes() {
        let rt = runtime();
        let timer = rt.create("Read", "Study", 10).unwrap();

        rt.start(&timer.id).unwrap();
        sleep(secs(3.5)).await;
        assert!(rt.pause(&timer.id).unwrap());

        let paused = rt.get(&timer.id).unwrap();
        assert_eq!(paused.status, TimerStatus::Paused);
        assert_eq!(paused.remaining_time, 7);

        sleep(secs(5.0)).await;
        assert_eq!(rt.get(&timer.id).unwrap().remaining_time, 7);

        rt.start(&timer.id).unwrap();
        sleep(secs(1.5)).await;
        assert_eq!(rt.get(&timer.id).unwrap().remaining_time, 6);
        assert_invariants(&rt);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_without_ticker_is_noop() {
        let rt = runtime();
        let timer = rt.create("Read", "Study", 10).unwrap();
        assert!(!rt.pause(&timer.id).unwrap());
        assert_eq!(rt.get(&timer.id).unwrap(), timer);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_then_pause_leaves_no_tick() {
        let rt = runtime();
        let timer = rt.create("Read", "Study", 10).unwrap();

        rt.start(&timer.id).unwrap();
        rt.pause(&timer.id).unwrap();
        sleep(secs(3.0)).await;

        assert_eq!(rt.get(&timer.id).unwrap().remaining_time, 10);
        assert_eq!(rt.active_tickers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_from_every_state() {
        let rt = runtime();
        let timer = rt.create("Plank", "Fitness", 3).unwrap();

        let reset = rt.reset(&timer.id).unwrap();
        assert_eq!((reset.status, reset.remaining_time), (TimerStatus::Paused, 3));

        rt.start(&timer.id).unwrap();
        sleep(secs(1.5)).await;
        let reset = rt.reset(&timer.id).unwrap();
        assert_eq!((reset.status, reset.remaining_time), (TimerStatus::Paused, 3));
        assert!(!rt.is_ticking(&timer.id));

        rt.start(&timer.id).unwrap();
        sleep(secs(3.5)).await;
        assert!(rt.get(&timer.id).unwrap().is_completed());
        let reset = rt.reset(&timer.id).unwrap();
        assert_eq!((reset.status, reset.remaining_time), (TimerStatus::Paused, 3));

        // no leftover tick after reset
        sleep(secs(2.0)).await;
        assert_eq!(rt.get(&timer.id).unwrap().remaining_time, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_halfway_fires_once() {
        let rt = runtime();
        let timer = rt.create("Focus", "Work", 10).unwrap();
        assert!(rt.toggle_halfway_alert(&timer.id).unwrap());

        let mut events = rt.subscribe();
        rt.start(&timer.id).unwrap();
        sleep(secs(10.5)).await;

        let mut halfway = Vec::new();
        let mut completed = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                TimerEvent::Halfway { remaining_time, .. } => halfway.push(remaining_time),
                TimerEvent::Completed { .. } => completed += 1,
                TimerEvent::Ticked { .. } => {}
            }
        }
        assert_eq!(halfway, vec![5]);
        assert_eq!(completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_halfway_disabled_is_silent() {
        let rt = runtime();
        let timer = rt.create("Focus", "Work", 4).unwrap();
        let mut events = rt.subscribe();

        rt.start(&timer.id).unwrap();
        sleep(secs(4.5)).await;

        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, TimerEvent::Halfway { .. }));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_running_timer_stops_ticker() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let rt = runtime_with(kv.clone());
        let timer = rt.create("Run", "Fitness", 10).unwrap();

        let mut events = rt.subscribe();
        rt.start(&timer.id).unwrap();
        sleep(secs(2.5)).await;
        assert_eq!(rt.get(&timer.id).unwrap().remaining_time, 8);

        rt.delete(&timer.id).unwrap();
        while events.try_recv().is_ok() {}

        sleep(secs(5.0)).await;
        assert!(events.try_recv().is_err());
        assert!(rt.get(&timer.id).is_none());
        assert!(rt.list_by_category().is_empty());
        assert_eq!(rt.active_tickers(), 0);

        let persisted = PersistenceBridge::new(kv).load_timers().unwrap();
        assert!(persisted.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_id_is_not_found() {
        let rt = runtime();
        let missing = TimerId::from("missing");

        assert!(matches!(rt.start(&missing), Err(TimerError::NotFound(_))));
        assert!(matches!(rt.pause(&missing), Err(TimerError::NotFound(_))));
        assert!(matches!(rt.reset(&missing), Err(TimerError::NotFound(_))));
        assert!(matches!(rt.delete(&missing), Err(TimerError::NotFound(_))));
        assert_eq!(rt.active_tickers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_tick_independently() {
        let rt = runtime();
        let a = rt.create("A", "Work", 10).unwrap();
        let b = rt.create("B", "Work", 10).unwrap();

        rt.start(&a.id).unwrap();
        sleep(secs(2.0)).await;
        rt.start(&b.id).unwrap();
        sleep(secs(1.5)).await;
        rt.pause(&a.id).unwrap();
        sleep(secs(2.0)).await;

        assert_eq!(rt.get(&a.id).unwrap().remaining_time, 7);
        assert_eq!(rt.get(&b.id).unwrap().remaining_time, 7);
        assert!(rt.get(&b.id).unwrap().is_running());
        assert_invariants(&rt);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_pauses_everything() {
        let rt = runtime();
        let a = rt.create("A", "Work", 10).unwrap();
        let b = rt.create("B", "Home", 10).unwrap();
        rt.start(&a.id).unwrap();
        rt.start(&b.id).unwrap();
        sleep(secs(1.5)).await;

        assert_eq!(rt.stop_all(), 2);
        sleep(secs(3.0)).await;

        for id in [&a.id, &b.id] {
            let timer = rt.get(id).unwrap();
            assert_eq!(timer.status, TimerStatus::Paused);
            assert_eq!(timer.remaining_time, 9);
        }
        assert_eq!(rt.stop_all(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_persists_remaining_time() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let rt = runtime_with(kv.clone());
        let timer = rt.create("Bake", "Kitchen", 60).unwrap();
        rt.start(&timer.id).unwrap();
        sleep(secs(10.5)).await;
        rt.shutdown();

        let restored = runtime_with(kv);
        let timer = restored.get(&timer.id).unwrap();
        assert_eq!(timer.status, TimerStatus::Paused);
        assert_eq!(timer.remaining_time, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_persists_timers_and_log() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let rt = runtime_with(kv.clone());
        let timer = rt.create("Egg", "Kitchen", 2).unwrap();
        rt.start(&timer.id).unwrap();
        sleep(secs(2.5)).await;

        let bridge = PersistenceBridge::new(kv);
        assert_eq!(bridge.load_log().unwrap().len(), 1);
        let persisted = bridge.load_timers().unwrap();
        assert_eq!(persisted[0].status, TimerStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_keeps_session_state() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let rt = runtime_with(kv.clone());
        kv.fail_writes(true);

        let timer = rt.create("Egg", "Kitchen", 1).unwrap();
        rt.start(&timer.id).unwrap();
        sleep(secs(1.5)).await;

        assert!(rt.get(&timer.id).unwrap().is_completed());
        assert_eq!(rt.completion_log().len(), 1);
        assert_eq!(kv.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_rejects_runtime_fields() {
        let rt = runtime();
        let timer = rt.create("Egg", "Kitchen", 5).unwrap();

        let result = rt.update(&timer.id, &TimerPatch::status(TimerStatus::Running));
        assert!(matches!(result, Err(TimerError::Validation(_))));
        assert!(!rt.is_ticking(&timer.id));

        let renamed = rt
            .update(
                &timer.id,
                &TimerPatch {
                    name: Some("Soft egg".to_string()),
                    ..TimerPatch::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.name, "Soft egg");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_keeps_live_timers() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let rt = runtime_with(kv.clone());
        let running = rt.create("Run", "Fitness", 10).unwrap();
        let idle = rt.create("Stretch", "Fitness", 30).unwrap();
        rt.start(&running.id).unwrap();
        sleep(secs(2.5)).await;

        // another writer adds a timer to the store
        let mut on_disk = PersistenceBridge::new(kv.clone()).load_timers().unwrap();
        on_disk.push(Timer::new("Swim", "Fitness", 90).unwrap());
        let bytes = serde_json::to_vec(&on_disk).unwrap();
        kv.set(TIMERS_KEY, &bytes).unwrap();

        assert_eq!(rt.reload().unwrap(), 3);
        assert_eq!(rt.get(&running.id).unwrap().remaining_time, 8);
        assert!(rt.is_ticking(&running.id));
        assert!(rt.get(&idle.id).is_some());
        assert_eq!(rt.timers_in_category("Fitness").len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failure_starts_empty() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.fail_reads(true);
        let rt = runtime_with(kv.clone());
        assert!(rt.list_by_category().is_empty());

        assert!(matches!(rt.reload(), Err(TimerError::Persistence(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_keeps_session_state() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let rt = runtime_with(kv.clone());
        let run = rt.create("Run", "Fitness", 10).unwrap();
        let old = rt.create("Old", "Fitness", 30).unwrap();

        rt.start(&run.id).unwrap();
        sleep(secs(3.5)).await;
        rt.pause(&run.id).unwrap();

        kv.fail_writes(true);
        rt.delete(&old.id).unwrap();
        let tea = rt.create("Tea", "Kitchen", 180).unwrap();

        assert_eq!(rt.reload().unwrap(), 2);
        let paused = rt.get(&run.id).unwrap();
        assert_eq!(paused.status, TimerStatus::Paused);
        assert_eq!(paused.remaining_time, 7);
        assert!(rt.get(&tea.id).is_some());
        assert!(rt.get(&old.id).is_none());

        rt.start(&run.id).unwrap();
        sleep(secs(1.5)).await;
        assert_eq!(rt.get(&run.id).unwrap().remaining_time, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_store_is_merged_before_first_write() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let bridge = PersistenceBridge::new(kv.clone());
        let saved = Timer::new("Stretch", "Fitness", 30).unwrap();
        bridge.save_timers(std::slice::from_ref(&saved)).unwrap();
        bridge
            .save_log(&[CompletionEntry::now("A"), CompletionEntry::now("B")])
            .unwrap();

        kv.fail_reads(true);
        let rt = runtime_with(kv.clone());
        assert!(rt.list_by_category().is_empty());

        // nothing is written over a record that cannot be read
        rt.create("Tea", "Kitchen", 180).unwrap();
        kv.fail_reads(false);
        assert_eq!(bridge.load_timers().unwrap(), vec![saved.clone()]);

        let egg = rt.create("Egg", "Kitchen", 1).unwrap();
        rt.start(&egg.id).unwrap();
        sleep(secs(1.5)).await;

        let names: Vec<String> = bridge
            .load_log()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["A", "B", "Egg"]);
        assert_eq!(rt.completion_log().len(), 3);

        let persisted = bridge.load_timers().unwrap();
        let persisted_names: Vec<&str> = persisted.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(persisted_names, ["Stretch", "Tea", "Egg"]);
        assert!(persisted[2].is_completed());
        assert!(rt.get(&saved.id).is_some());
    }
}
