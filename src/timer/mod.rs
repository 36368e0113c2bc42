//! Timer entities
//!
//! This module defines the countdown timer record, its status machine values,
//! the merge-patch used to update it, and the grouped read view.

pub mod store;

pub use store::TimerStore;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TimerError};

/// Opaque unique identifier for a timer
///
/// Freshly created timers get a UUID; persisted ids are kept verbatim so
/// records written by older clients (millisecond timestamps) still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(String);

impl TimerId {
    /// Generate a new random id
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TimerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TimerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a countdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerStatus {
    /// Not ticking; `remaining_time` is retained
    #[default]
    #[serde(alias = "Pending")]
    Paused,
    /// A ticker is active for this timer
    Running,
    /// Reached zero; terminal until reset
    Completed,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Paused => "Paused",
            TimerStatus::Running => "Running",
            TimerStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, categorized countdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredTimer")]
pub struct Timer {
    /// Unique identifier, immutable
    pub id: TimerId,
    /// Display name
    pub name: String,
    /// Total length in seconds
    pub duration: u64,
    /// Grouping key
    pub category: String,
    /// Current state
    pub status: TimerStatus,
    /// Seconds left, always within `0..=duration`
    pub remaining_time: u64,
    /// Whether to notify when the countdown passes its midpoint
    pub halfway_alert_enabled: bool,
}

impl Timer {
    /// Create a paused timer with the full duration remaining
    pub fn new(name: &str, category: &str, duration: u64) -> Result<Self> {
        validate_fields(name, category, duration)?;

        Ok(Self {
            id: TimerId::new(),
            name: name.to_string(),
            duration,
            category: category.to_string(),
            status: TimerStatus::Paused,
            remaining_time: duration,
            halfway_alert_enabled: false,
        })
    }

    /// The remaining time at which a halfway alert fires
    pub fn halfway_mark(&self) -> u64 {
        self.duration / 2
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn is_completed(&self) -> bool {
        self.status == TimerStatus::Completed
    }

    /// Percentage of the countdown already elapsed, clamped to 0..=100
    pub fn progress_percent(&self) -> f64 {
        if self.duration == 0 {
            return 0.0;
        }
        let left = self.remaining_time as f64 / self.duration as f64 * 100.0;
        (100.0 - left).clamp(0.0, 100.0)
    }

    /// Format as `remaining / duration`, e.g. `1:05 / 2:00`
    pub fn format_progress(&self) -> String {
        format!(
            "{} / {}",
            format_time(self.remaining_time),
            format_time(self.duration)
        )
    }

    /// Restore the invariants after loading possibly stale or partial data
    fn normalize(&mut self) {
        if self.status == TimerStatus::Running {
            // no ticker survives a restart
            self.status = TimerStatus::Paused;
        }
        if self.status == TimerStatus::Completed {
            self.remaining_time = 0;
        } else if self.remaining_time == 0 || self.remaining_time > self.duration {
            self.remaining_time = self.duration;
        }
    }
}

/// On-disk shape of a timer; older records may omit fields
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredTimer {
    id: TimerId,
    name: String,
    duration: u64,
    category: String,
    #[serde(default)]
    status: TimerStatus,
    #[serde(default)]
    remaining_time: Option<u64>,
    #[serde(default, alias = "halfwayAlert")]
    halfway_alert_enabled: bool,
}

impl TryFrom<StoredTimer> for Timer {
    type Error = TimerError;

    /// Records that break an entity invariant are rejected, not repaired
    fn try_from(stored: StoredTimer) -> Result<Self> {
        if let Err(TimerError::Validation(reason)) =
            validate_fields(&stored.name, &stored.category, stored.duration)
        {
            return Err(TimerError::Validation(format!(
                "stored timer {}: {}",
                stored.id, reason
            )));
        }

        let mut timer = Timer {
            remaining_time: stored.remaining_time.unwrap_or(stored.duration),
            id: stored.id,
            name: stored.name,
            duration: stored.duration,
            category: stored.category,
            status: stored.status,
            halfway_alert_enabled: stored.halfway_alert_enabled,
        };
        timer.normalize();
        Ok(timer)
    }
}

/// Merge-patch for [`Timer`]; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub status: Option<TimerStatus>,
    pub remaining_time: Option<u64>,
    pub halfway_alert_enabled: Option<bool>,
}

impl TimerPatch {
    pub fn status(status: TimerStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_remaining(mut self, remaining_time: u64) -> Self {
        self.remaining_time = Some(remaining_time);
        self
    }

    pub fn halfway_alert(enabled: bool) -> Self {
        Self {
            halfway_alert_enabled: Some(enabled),
            ..Self::default()
        }
    }

    /// Apply onto a copy of `timer`, rejecting results that break an invariant
    pub fn apply_to(&self, timer: &Timer) -> Result<Timer> {
        let mut patched = timer.clone();

        if let Some(name) = &self.name {
            validate_label("name", name)?;
            patched.name = name.clone();
        }
        if let Some(category) = &self.category {
            validate_label("category", category)?;
            patched.category = category.clone();
        }
        if let Some(status) = self.status {
            patched.status = status;
        }
        if let Some(remaining) = self.remaining_time {
            if remaining > patched.duration {
                return Err(TimerError::Validation(format!(
                    "remaining time {} exceeds duration {}",
                    remaining, patched.duration
                )));
            }
            patched.remaining_time = remaining;
        }
        if let Some(enabled) = self.halfway_alert_enabled {
            patched.halfway_alert_enabled = enabled;
        }

        if patched.status == TimerStatus::Completed && patched.remaining_time != 0 {
            return Err(TimerError::Validation(
                "a completed timer must have no time remaining".to_string(),
            ));
        }

        Ok(patched)
    }
}

/// One section of the grouped view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub timers: Vec<Timer>,
}

impl CategoryGroup {
    /// Whether any timer in this group is ticking
    pub fn has_running(&self) -> bool {
        self.timers.iter().any(Timer::is_running)
    }
}

/// Parse user input as a duration in whole seconds
pub fn parse_duration(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    match trimmed.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(TimerError::Validation(format!(
            "duration '{}' must be a positive whole number of seconds",
            trimmed
        ))),
    }
}

/// Format seconds as `M:SS`
pub fn format_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn validate_fields(name: &str, category: &str, duration: u64) -> Result<()> {
    validate_label("name", name)?;
    validate_label("category", category)?;
    if duration == 0 {
        return Err(TimerError::Validation(
            "duration must be a positive whole number of seconds".to_string(),
        ));
    }
    Ok(())
}

fn validate_label(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TimerError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}
