use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::calendar::Calendar;
use crate::error::{CalendarError, Result};

/// The scheduler's named-calendar storage, as seen by the editor.
///
/// Implementations own atomicity: `add_calendar` with `replace` must swap
/// the whole chain in one step.
#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// Names of every stored calendar.
    async fn calendar_names(&self) -> Result<Vec<String>>;

    /// The chain stored under `name`, if any.
    async fn get_calendar(&self, name: &str) -> Result<Option<Calendar>>;

    /// Store `calendar` under `name`.
    ///
    /// With `update_triggers`, every trigger bound to `name` has its next
    /// fire time recomputed against the new chain.
    async fn add_calendar(
        &self,
        name: &str,
        calendar: Calendar,
        replace: bool,
        update_triggers: bool,
    ) -> Result<()>;

    /// Remove `name`. Returns `false` when nothing was stored under it.
    async fn delete_calendar(&self, name: &str) -> Result<bool>;
}

#[derive(Default)]
struct MemoryState {
    calendars: BTreeMap<String, Calendar>,
    /// trigger name -> calendar name
    bindings: BTreeMap<String, String>,
    recomputed: Vec<String>,
    writes: usize,
}

/// In-process [`CalendarStore`] backed by a `Mutex`.
///
/// Trigger bindings are tracked by name only; "recomputing" a trigger
/// records its name so callers can observe which triggers were touched.
#[derive(Default)]
pub struct MemoryCalendarStore {
    state: Mutex<MemoryState>,
}

impl MemoryCalendarStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| CalendarError::Store("calendar store lock poisoned".to_string()))
    }

    /// Seed a calendar without counting it as a write.
    pub fn insert(&self, name: &str, calendar: Calendar) -> Result<()> {
        self.lock()?.calendars.insert(name.to_string(), calendar);
        Ok(())
    }

    /// Record that `trigger` uses the calendar named `calendar`.
    pub fn bind_trigger(&self, trigger: &str, calendar: &str) -> Result<()> {
        self.lock()?
            .bindings
            .insert(trigger.to_string(), calendar.to_string());
        Ok(())
    }

    /// Triggers whose next fire time was recomputed, oldest first.
    pub fn recomputed_triggers(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.recomputed.clone())
    }

    /// Number of successful `add_calendar` calls.
    pub fn write_count(&self) -> Result<usize> {
        Ok(self.lock()?.writes)
    }
}

#[async_trait]
impl CalendarStore for MemoryCalendarStore {
    async fn calendar_names(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.calendars.keys().cloned().collect())
    }

    async fn get_calendar(&self, name: &str) -> Result<Option<Calendar>> {
        Ok(self.lock()?.calendars.get(name).cloned())
    }

    async fn add_calendar(
        &self,
        name: &str,
        calendar: Calendar,
        replace: bool,
        update_triggers: bool,
    ) -> Result<()> {
        let mut state = self.lock()?;
        if !replace && state.calendars.contains_key(name) {
            return Err(CalendarError::AlreadyExists {
                name: name.to_string(),
            });
        }

        let depth = calendar.depth();
        state.calendars.insert(name.to_string(), calendar);
        state.writes += 1;
        info!(calendar = %name, depth, "calendar stored");

        if update_triggers {
            let bound: Vec<String> = state
                .bindings
                .iter()
                .filter(|(_, cal)| cal.as_str() == name)
                .map(|(trigger, _)| trigger.clone())
                .collect();
            for trigger in &bound {
                debug!(calendar = %name, %trigger, "next fire time recomputed");
            }
            state.recomputed.extend(bound);
        }
        Ok(())
    }

    async fn delete_calendar(&self, name: &str) -> Result<bool> {
        let mut state = self.lock()?;
        let triggers: Vec<String> = state
            .bindings
            .iter()
            .filter(|(_, cal)| cal.as_str() == name)
            .map(|(trigger, _)| trigger.clone())
            .collect();
        if !triggers.is_empty() {
            return Err(CalendarError::InUse {
                name: name.to_string(),
                triggers,
            });
        }

        let removed = state.calendars.remove(name).is_some();
        if removed {
            info!(calendar = %name, "calendar deleted");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalendarKind, WeeklyCalendar};

    fn sundays() -> Calendar {
        let mut excluded = [false; 7];
        excluded[6] = true;
        Calendar::new(CalendarKind::Weekly(WeeklyCalendar { excluded }))
    }

    #[tokio::test]
    async fn add_without_replace_rejects_existing_name() {
        let store = MemoryCalendarStore::new();
        store.add_calendar("a", sundays(), false, false).await.unwrap();
        let err = store.add_calendar("a", sundays(), false, false).await.unwrap_err();
        assert!(matches!(err, CalendarError::AlreadyExists { .. }));
        assert_eq!(store.write_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn replace_recomputes_only_bound_triggers() {
        let store = MemoryCalendarStore::new();
        store.bind_trigger("nightly", "a").unwrap();
        store.bind_trigger("hourly", "b").unwrap();

        store.add_calendar("a", sundays(), true, true).await.unwrap();
        assert_eq!(store.recomputed_triggers().unwrap(), vec!["nightly"]);

        store.add_calendar("a", sundays(), true, false).await.unwrap();
        assert_eq!(store.recomputed_triggers().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_missing_and_referenced() {
        let store = MemoryCalendarStore::new();
        assert!(!store.delete_calendar("ghost").await.unwrap());

        store.insert("a", sundays()).unwrap();
        store.bind_trigger("nightly", "a").unwrap();
        let err = store.delete_calendar("a").await.unwrap_err();
        assert!(err.to_string().contains("nightly"));

        store.insert("b", sundays()).unwrap();
        assert!(store.delete_calendar("b").await.unwrap());
        assert_eq!(store.calendar_names().await.unwrap(), vec!["a"]);
    }
}
