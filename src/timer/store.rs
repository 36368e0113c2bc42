//! In-memory timer store
//!
//! Holds every timer as a flat list in insertion order. The by-category
//! grouping is recomputed from that list on demand and never cached.

use super::{CategoryGroup, Timer, TimerId, TimerPatch};
use crate::error::{Result, TimerError};

/// Owner of all timer entities
#[derive(Debug, Clone, Default)]
pub struct TimerStore {
    timers: Vec<Timer>,
}

impl TimerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted timers, keeping their order
    pub fn from_timers(timers: Vec<Timer>) -> Self {
        Self { timers }
    }

    /// Validate and add a new paused timer
    pub fn create(&mut self, name: &str, category: &str, duration: u64) -> Result<Timer> {
        let timer = Timer::new(name, category, duration)?;
        self.timers.push(timer.clone());
        Ok(timer)
    }

    /// Get a timer by ID
    pub fn get(&self, id: &TimerId) -> Option<&Timer> {
        self.timers.iter().find(|t| &t.id == id)
    }

    /// Merge `patch` into the timer, returning the updated copy
    ///
    /// The stored timer is left untouched when the patch is rejected.
    pub fn update(&mut self, id: &TimerId, patch: &TimerPatch) -> Result<Timer> {
        let slot = self
            .timers
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| TimerError::NotFound(id.clone()))?;

        let patched = patch.apply_to(slot)?;
        *slot = patched.clone();
        Ok(patched)
    }

    /// Remove a timer; its category disappears with its last timer
    pub fn remove(&mut self, id: &TimerId) -> Result<Timer> {
        let index = self
            .timers
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| TimerError::NotFound(id.clone()))?;
        Ok(self.timers.remove(index))
    }

    /// All timers in insertion order
    pub fn all(&self) -> &[Timer] {
        &self.timers
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Group timers by category
    ///
    /// Categories appear in the order their first timer was added; timers keep
    /// insertion order within a category.
    pub fn list_by_category(&self) -> Vec<CategoryGroup> {
        let mut groups: Vec<CategoryGroup> = Vec::new();
        for timer in &self.timers {
            match groups.iter_mut().find(|g| g.category == timer.category) {
                Some(group) => group.timers.push(timer.clone()),
                None => groups.push(CategoryGroup {
                    category: timer.category.clone(),
                    timers: vec![timer.clone()],
                }),
            }
        }
        groups
    }

    /// Timers currently in `category`, in insertion order
    pub fn timers_in_category(&self, category: &str) -> Vec<&Timer> {
        self.timers
            .iter()
            .filter(|t| t.category == category)
            .collect()
    }

    /// A category exists iff at least one timer references it
    pub fn has_category(&self, category: &str) -> bool {
        self.timers.iter().any(|t| t.category == category)
    }

    /// IDs starting with `prefix`
    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<TimerId> {
        self.timers
            .iter()
            .filter(|t| t.id.as_str().starts_with(prefix))
            .map(|t| t.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TimerStatus;

    fn seeded() -> (TimerStore, Timer, Timer, Timer) {
        let mut store = TimerStore::new();
        let workout = store.create("Workout", "Fitness", 5).unwrap();
        let tea = store.create("Tea", "Kitchen", 180).unwrap();
        let stretch = store.create("Stretch", "Fitness", 60).unwrap();
        (store, workout, tea, stretch)
    }

    #[test]
    fn test_create_rejects_invalid_input_without_mutation() {
        let mut store = TimerStore::new();
        assert!(store.create("", "Fitness", 5).is_err());
        assert!(store.create("Workout", "", 5).is_err());
        assert!(store.create("Workout", "Fitness", 0).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_by_category_preserves_order() {
        let (store, workout, tea, stretch) = seeded();
        let groups = store.list_by_category();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].category, "Fitness");
        assert_eq!(groups[0].timers[0].id, workout.id);
        assert_eq!(groups[0].timers[1].id, stretch.id);
        assert_eq!(groups[1].category, "Kitchen");
        assert_eq!(groups[1].timers[0].id, tea.id);
    }

    #[test]
    fn test_remove_last_timer_drops_category() {
        let (mut store, _, tea, _) = seeded();
        assert!(store.has_category("Kitchen"));

        let removed = store.remove(&tea.id).unwrap();
        assert_eq!(removed.name, "Tea");
        assert!(!store.has_category("Kitchen"));
        assert!(store
            .list_by_category()
            .iter()
            .all(|g| g.category != "Kitchen"));
    }

    #[test]
    fn test_remove_unknown_is_not_found() {
        let (mut store, ..) = seeded();
        let err = store.remove(&TimerId::from("missing")).unwrap_err();
        assert_eq!(err, TimerError::NotFound(TimerId::from("missing")));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_update_merges_patch() {
        let (mut store, workout, ..) = seeded();
        let updated = store
            .update(
                &workout.id,
                &TimerPatch::status(TimerStatus::Running).with_remaining(3),
            )
            .unwrap();

        assert_eq!(updated.status, TimerStatus::Running);
        assert_eq!(updated.remaining_time, 3);
        assert_eq!(store.get(&workout.id), Some(&updated));
    }

    #[test]
    fn test_update_rejected_patch_leaves_timer() {
        let (mut store, workout, ..) = seeded();
        assert!(store
            .update(&workout.id, &TimerPatch::default().with_remaining(99))
            .is_err());
        assert_eq!(store.get(&workout.id), Some(&workout));
    }

    #[test]
    fn test_update_unknown_is_not_found() {
        let (mut store, ..) = seeded();
        let result = store.update(&TimerId::from("nope"), &TimerPatch::halfway_alert(true));
        assert!(matches!(result, Err(TimerError::NotFound(_))));
    }

    #[test]
    fn test_moving_category_regroups() {
        let (mut store, workout, ..) = seeded();
        let patch = TimerPatch {
            category: Some("Kitchen".to_string()),
            ..TimerPatch::default()
        };
        store.update(&workout.id, &patch).unwrap();

        assert_eq!(store.timers_in_category("Fitness").len(), 1);
        assert_eq!(store.timers_in_category("Kitchen").len(), 2);
    }

    #[test]
    fn test_ids_with_prefix() {
        let mut a = Timer::new("a", "c", 1).unwrap();
        a.id = TimerId::from("abc-1");
        let mut b = Timer::new("b", "c", 1).unwrap();
        b.id = TimerId::from("abd-2");
        let store = TimerStore::from_timers(vec![a, b]);

        assert_eq!(store.ids_with_prefix("ab").len(), 2);
        assert_eq!(store.ids_with_prefix("abc"), vec![TimerId::from("abc-1")]);
        assert!(store.ids_with_prefix("x").is_empty());
    }
}
