use crate::checklist::read_list;
use crate::errors::StoreError;
use crate::ledger::{self, CompletionLedger};
use crate::models::{HabitRecord, MonthKey, Period, Transition};
use crate::storage::{KeyValueStore, LEGACY_HABITS_KEY};
use crate::streak::{CompletionReward, StreakEngine};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

/// Source of habit checklists. `None` means the list does not exist at all.
pub trait HabitListProvider {
    fn period_list(&self, period: Period) -> Result<Option<Vec<HabitRecord>>, StoreError>;
    fn legacy_list(&self) -> Result<Option<Vec<HabitRecord>>, StoreError>;
}

/// Habit lists read straight from a key-value store.
pub struct StoredHabits<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> StoredHabits<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

impl<S: KeyValueStore + ?Sized> HabitListProvider for StoredHabits<'_, S> {
    fn period_list(&self, period: Period) -> Result<Option<Vec<HabitRecord>>, StoreError> {
        read_list(self.store, period.storage_key())
    }

    fn legacy_list(&self) -> Result<Option<Vec<HabitRecord>>, StoreError> {
        read_list(self.store, LEGACY_HABITS_KEY)
    }
}

/// True when at least one list (period or legacy) has entries and every entry
/// of every non-empty list is done.
pub fn all_habits_done_for_today<P: HabitListProvider + ?Sized>(
    provider: &P,
) -> Result<bool, StoreError> {
    let mut lists = Vec::with_capacity(Period::ALL.len() + 1);
    for period in Period::ALL {
        lists.extend(provider.period_list(period)?);
    }
    lists.extend(provider.legacy_list()?);

    let mut any_found = false;
    for list in lists.iter().filter(|list| !list.is_empty()) {
        if list.iter().any(|habit| !habit.done) {
            return Ok(false);
        }
        any_found = true;
    }
    Ok(any_found)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reconciliation {
    HabitsPending,
    AlreadyCompleted,
    Completed(CompletionReward),
}

/// Marks `today` completed once every stored habit is done. Safe to call on
/// every load and every checkbox change.
pub fn reconcile_today<S: KeyValueStore + ?Sized>(
    store: &mut S,
    engine: &StreakEngine,
    today: NaiveDate,
) -> Result<Reconciliation, StoreError> {
    let all_done = all_habits_done_for_today(&StoredHabits::new(&*store))?;
    complete_if_done(store, all_done, engine, today)
}

/// Same as [`reconcile_today`], with habit lists coming from `habits`.
pub fn reconcile_with<S, P>(
    store: &mut S,
    habits: &P,
    engine: &StreakEngine,
    today: NaiveDate,
) -> Result<Reconciliation, StoreError>
where
    S: KeyValueStore + ?Sized,
    P: HabitListProvider + ?Sized,
{
    let all_done = all_habits_done_for_today(habits)?;
    complete_if_done(store, all_done, engine, today)
}

fn complete_if_done<S: KeyValueStore + ?Sized>(
    store: &mut S,
    all_done: bool,
    engine: &StreakEngine,
    today: NaiveDate,
) -> Result<Reconciliation, StoreError> {
    if !all_done {
        return Ok(Reconciliation::HabitsPending);
    }
    if CompletionLedger::load(store)?.contains_date(today) {
        debug!("{today} already completed");
        return Ok(Reconciliation::AlreadyCompleted);
    }

    let key = MonthKey::of(today);
    match ledger::toggle_day(store, key.year, key.month, today.day())? {
        Transition::Completed => Ok(Reconciliation::Completed(
            engine.on_completion_event(store, today)?,
        )),
        Transition::Uncompleted => {
            // Only reachable if another writer completed the day in between.
            warn!("{today} was completed concurrently, restoring");
            ledger::toggle_day(store, key.year, key.month, today.day())?;
            Ok(Reconciliation::AlreadyCompleted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::{ensure_initialized, read_period, save_period};
    use crate::storage::{FailingStore, MemoryStore};
    use crate::streak::BadgeSet;
    use chrono::Duration;

    struct FixedLists {
        periods: Vec<(Period, Vec<HabitRecord>)>,
        legacy: Option<Vec<HabitRecord>>,
    }

    impl HabitListProvider for FixedLists {
        fn period_list(&self, period: Period) -> Result<Option<Vec<HabitRecord>>, StoreError> {
            Ok(self
                .periods
                .iter()
                .find(|(owner, _)| *owner == period)
                .map(|(_, habits)| habits.clone()))
        }

        fn legacy_list(&self) -> Result<Option<Vec<HabitRecord>>, StoreError> {
            Ok(self.legacy.clone())
        }
    }

    fn habit(id: &str, done: bool) -> HabitRecord {
        HabitRecord {
            id: id.to_string(),
            name: id.to_string(),
            done,
            ..HabitRecord::default()
        }
    }

    fn all_periods(done: bool) -> Vec<(Period, Vec<HabitRecord>)> {
        Period::ALL
            .iter()
            .map(|period| (*period, vec![habit(period.as_str(), done)]))
            .collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 20).unwrap()
    }

    #[test]
    fn no_lists_means_not_done() {
        let lists = FixedLists { periods: vec![], legacy: None };
        assert!(!all_habits_done_for_today(&lists).unwrap());

        let empty = FixedLists {
            periods: vec![(Period::Morning, vec![])],
            legacy: Some(vec![]),
        };
        assert!(!all_habits_done_for_today(&empty).unwrap());
    }

    #[test]
    fn every_entry_must_be_done() {
        let done = FixedLists { periods: all_periods(true), legacy: None };
        assert!(all_habits_done_for_today(&done).unwrap());

        let mut periods = all_periods(true);
        periods[2].1.push(habit("late", false));
        let pending = FixedLists { periods, legacy: None };
        assert!(!all_habits_done_for_today(&pending).unwrap());
    }

    #[test]
    fn empty_period_lists_are_skipped() {
        let lists = FixedLists {
            periods: vec![(Period::Morning, vec![habit("a", true)]), (Period::Night, vec![])],
            legacy: None,
        };
        assert!(all_habits_done_for_today(&lists).unwrap());
    }

    #[test]
    fn legacy_list_alone_is_authoritative() {
        let done = FixedLists { periods: vec![], legacy: Some(vec![habit("x", true)]) };
        assert!(all_habits_done_for_today(&done).unwrap());

        let mixed = FixedLists {
            periods: all_periods(true),
            legacy: Some(vec![habit("x", false)]),
        };
        assert!(!all_habits_done_for_today(&mixed).unwrap());
    }

    #[test]
    fn reconcile_waits_for_all_habits() {
        let mut store = MemoryStore::new();
        let engine = StreakEngine::default();
        save_period(&mut store, Period::Morning, &[habit("a", true), habit("b", false)]).unwrap();

        assert_eq!(
            reconcile_today(&mut store, &engine, today()).unwrap(),
            Reconciliation::HabitsPending
        );
        assert!(!CompletionLedger::load(&store).unwrap().contains_date(today()));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut store = MemoryStore::new();
        let engine = StreakEngine::default();
        for (period, habits) in all_periods(true) {
            save_period(&mut store, period, &habits).unwrap();
        }

        let first = reconcile_today(&mut store, &engine, today()).unwrap();
        assert_eq!(
            first,
            Reconciliation::Completed(CompletionReward {
                date: today(),
                streak: 1,
                newly_unlocked: vec![],
            })
        );
        assert_eq!(
            reconcile_today(&mut store, &engine, today()).unwrap(),
            Reconciliation::AlreadyCompleted
        );
        assert!(CompletionLedger::load(&store).unwrap().contains_date(today()));
    }

    #[test]
    fn reconcile_unlocks_first_badge_on_seventh_day() {
        let mut store = MemoryStore::new();
        let engine = StreakEngine::default();
        for offset in 1..=6 {
            let day = today() - Duration::days(offset);
            ledger::toggle_day(&mut store, day.year(), day.month(), day.day()).unwrap();
        }

        let lists = FixedLists { periods: all_periods(true), legacy: None };
        let outcome = reconcile_with(&mut store, &lists, &engine, today()).unwrap();
        let Reconciliation::Completed(reward) = outcome else {
            panic!("expected a completion, got {outcome:?}");
        };
        assert_eq!(reward.streak, 7);
        assert_eq!(reward.newly_unlocked, vec![7]);

        assert_eq!(
            reconcile_with(&mut store, &lists, &engine, today()).unwrap(),
            Reconciliation::AlreadyCompleted
        );
        assert_eq!(BadgeSet::load(&store).unwrap().to_vec(), vec![7]);
    }

    #[test]
    fn loosely_typed_entries_still_count_as_done() {
        let mut store = MemoryStore::new();
        store
            .set(
                "habits_morning",
                r#"[{"id":"d-m-1","habit":"Walk","done":true,"isDefault":null}]"#.to_string(),
            )
            .unwrap();
        store
            .set("habits_afternoon", r#"[{"id":"a","name":"Lunch","done":1}]"#.to_string())
            .unwrap();
        store
            .set("habits_night", r#"[{"id":"n","title":"Sleep","done":"yes"}]"#.to_string())
            .unwrap();
        assert!(all_habits_done_for_today(&StoredHabits::new(&store)).unwrap());

        ensure_initialized(&mut store).unwrap();
        let morning = read_period(&store, Period::Morning).unwrap();
        assert_eq!(morning[0].name, "Walk");
        assert!(morning[0].done);
        assert!(all_habits_done_for_today(&StoredHabits::new(&store)).unwrap());
    }

    #[test]
    fn reconcile_propagates_read_failures() {
        let mut store = FailingStore::unreadable();
        let err = reconcile_today(&mut store, &StreakEngine::default(), today()).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
