//! Bulk operations over a category
//!
//! Applies start, pause or reset to every timer in a category. Each timer is
//! handled independently with the same eligibility rules as the single-timer
//! command; one failure never stops the rest.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{Result, TimerError};
use crate::runtime::TimerRuntime;
use crate::timer::{TimerId, TimerStatus};

/// Action applied across a category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Start,
    Pause,
    Reset,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Start => "start",
            BulkAction::Pause => "pause",
            BulkAction::Reset => "reset",
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BulkAction {
    type Err = TimerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(BulkAction::Start),
            "pause" => Ok(BulkAction::Pause),
            "reset" => Ok(BulkAction::Reset),
            other => Err(TimerError::Validation(format!(
                "unknown bulk action '{}'",
                other
            ))),
        }
    }
}

/// Per-timer results of one bulk action
#[derive(Debug, Default)]
pub struct BulkOutcome {
    /// Timers whose state changed
    pub applied: Vec<TimerId>,
    /// Timers the action did not apply to
    pub skipped: Vec<TimerId>,
    /// Timers whose operation failed
    pub failed: Vec<(TimerId, TimerError)>,
}

impl BulkOutcome {
    /// Whether nothing changed
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Category-wide start/pause/reset on top of a [`TimerRuntime`]
#[derive(Debug, Clone)]
pub struct BulkController {
    runtime: TimerRuntime,
}

impl BulkController {
    pub fn new(runtime: TimerRuntime) -> Self {
        Self { runtime }
    }

    /// Apply `action` to every timer currently in `category`
    ///
    /// The category is resolved once up front; timers added during the sweep
    /// are not included.
    pub fn apply_to_category(&self, category: &str, action: BulkAction) -> Result<BulkOutcome> {
        let timers = self.runtime.timers_in_category(category);
        if timers.is_empty() {
            return Err(TimerError::CategoryNotFound(category.to_string()));
        }

        let mut outcome = BulkOutcome::default();
        for timer in timers {
            let eligible = match action {
                BulkAction::Start => timer.status == TimerStatus::Paused,
                BulkAction::Pause => timer.status == TimerStatus::Running,
                BulkAction::Reset => true,
            };
            if !eligible {
                outcome.skipped.push(timer.id);
                continue;
            }

            let result = match action {
                BulkAction::Start => self.runtime.start(&timer.id),
                BulkAction::Pause => self.runtime.pause(&timer.id),
                BulkAction::Reset => self.runtime.reset(&timer.id).map(|_| true),
            };
            match result {
                Ok(true) => outcome.applied.push(timer.id),
                Ok(false) => outcome.skipped.push(timer.id),
                Err(e) => {
                    warn!(timer_id = %timer.id, %action, "Bulk action failed: {}", e);
                    outcome.failed.push((timer.id, e));
                }
            }
        }

        debug!(
            category,
            %action,
            applied = outcome.applied.len(),
            skipped = outcome.skipped.len(),
            failed = outcome.failed.len(),
            "Applied bulk action"
        );
        Ok(outcome)
    }

    /// Whether any timer in `category` is running
    pub fn category_has_running(&self, category: &str) -> bool {
        self.runtime
            .timers_in_category(category)
            .iter()
            .any(|t| t.is_running())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::PersistenceBridge;
    use crate::runtime::RuntimeOptions;
    use std::time::Duration;
    use tokio::time::sleep;

    fn controller() -> (TimerRuntime, BulkController) {
        let runtime = TimerRuntime::load(PersistenceBridge::in_memory(), RuntimeOptions::default());
        let bulk = BulkController::new(runtime.clone());
        (runtime, bulk)
    }

    #[test]
    fn test_parse_action() {
        assert_eq!("start".parse::<BulkAction>().unwrap(), BulkAction::Start);
        assert_eq!("Pause".parse::<BulkAction>().unwrap(), BulkAction::Pause);
        assert_eq!("RESET".parse::<BulkAction>().unwrap(), BulkAction::Reset);
        assert!("stop".parse::<BulkAction>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_start_and_pause() {
        let (rt, bulk) = controller();
        let a = rt.create("Squats", "Fitness", 10).unwrap();
        let b = rt.create("Plank", "Fitness", 20).unwrap();
        let other = rt.create("Tea", "Kitchen", 30).unwrap();

        let outcome = bulk.apply_to_category("Fitness", BulkAction::Start).unwrap();
        assert_eq!(outcome.applied, vec![a.id.clone(), b.id.clone()]);
        assert!(bulk.category_has_running("Fitness"));
        assert!(!bulk.category_has_running("Kitchen"));
        assert!(!rt.is_ticking(&other.id));

        sleep(Duration::from_millis(3500)).await;
        let outcome = bulk.apply_to_category("Fitness", BulkAction::Pause).unwrap();
        assert_eq!(outcome.applied.len(), 2);

        assert_eq!(rt.get(&a.id).unwrap().remaining_time, 7);
        assert_eq!(rt.get(&b.id).unwrap().remaining_time, 17);
        assert!(!bulk.category_has_running("Fitness"));
        assert_eq!(rt.active_tickers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_start_skips_running_and_completed() {
        let (rt, bulk) = controller();
        let quick = rt.create("Quick", "Fitness", 1).unwrap();
        let running = rt.create("Long", "Fitness", 60).unwrap();
        let idle = rt.create("Idle", "Fitness", 60).unwrap();

        rt.start(&quick.id).unwrap();
        sleep(Duration::from_millis(1500)).await;
        rt.start(&running.id).unwrap();

        let outcome = bulk.apply_to_category("Fitness", BulkAction::Start).unwrap();
        assert_eq!(outcome.applied, vec![idle.id]);
        assert_eq!(outcome.skipped, vec![quick.id.clone(), running.id]);
        assert!(rt.get(&quick.id).unwrap().is_completed());
        assert_eq!(rt.active_tickers(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_pause_with_nothing_running_is_noop() {
        let (rt, bulk) = controller();
        let a = rt.create("A", "Fitness", 10).unwrap();
        let b = rt.create("B", "Fitness", 10).unwrap();
        let before = rt.list_by_category();

        let outcome = bulk.apply_to_category("Fitness", BulkAction::Pause).unwrap();
        assert!(outcome.is_noop());
        assert_eq!(outcome.skipped, vec![a.id, b.id]);
        assert_eq!(rt.list_by_category(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_reset_applies_to_all() {
        let (rt, bulk) = controller();
        let a = rt.create("A", "Fitness", 2).unwrap();
        let b = rt.create("B", "Fitness", 10).unwrap();
        let c = rt.create("C", "Fitness", 10).unwrap();

        rt.start(&a.id).unwrap();
        rt.start(&b.id).unwrap();
        sleep(Duration::from_millis(2500)).await;
        assert!(rt.get(&a.id).unwrap().is_completed());

        let outcome = bulk.apply_to_category("Fitness", BulkAction::Reset).unwrap();
        assert_eq!(outcome.applied.len(), 3);
        for (id, duration) in [(&a.id, 2), (&b.id, 10), (&c.id, 10)] {
            let timer = rt.get(id).unwrap();
            assert_eq!(timer.status, TimerStatus::Paused);
            assert_eq!(timer.remaining_time, duration);
        }
        assert_eq!(rt.active_tickers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_category() {
        let (_rt, bulk) = controller();
        let result = bulk.apply_to_category("Nowhere", BulkAction::Start);
        assert!(matches!(result, Err(TimerError::CategoryNotFound(_))));
        assert!(!bulk.category_has_running("Nowhere"));
    }
}
