use crate::checklist::{percent, read_list};
use crate::errors::StoreError;
use crate::ledger::CompletionLedger;
use crate::models::{MonthKey, Period};
use crate::storage::{KeyValueStore, LEGACY_HABITS_KEY};
use crate::streak::consecutive_streak_ending_at;
use chrono::{Duration, NaiveDate};
use serde::Serialize;

pub const MAX_TREND_DAYS: u32 = 366;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    pub completed_count: usize,
    pub days_in_month: u32,
    pub percent: u32,
    pub longest_streak: u32,
    pub consistency: u32,
    pub current_streak: u32,
    pub top_habit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub completed: bool,
}

pub fn monthly_summary<S: KeyValueStore + ?Sized>(
    store: &S,
    month: MonthKey,
    today: NaiveDate,
) -> Result<MonthlySummary, StoreError> {
    let ledger = CompletionLedger::load(store)?;
    Ok(build_summary(&ledger, month, today, top_habit(store)?))
}

pub fn build_summary(
    ledger: &CompletionLedger,
    month: MonthKey,
    today: NaiveDate,
    top_habit: Option<String>,
) -> MonthlySummary {
    let days_in_month = month.days_in_month().unwrap_or(0);
    let completed_count = ledger.days(month).map_or(0, |days| days.len());

    let mut longest = 0u32;
    let mut run = 0u32;
    for day in 1..=days_in_month {
        if ledger.contains(month, day) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }

    MonthlySummary {
        completed_count,
        days_in_month,
        percent: percent(completed_count, days_in_month as usize),
        longest_streak: longest,
        consistency: consistency(ledger),
        current_streak: consecutive_streak_ending_at(ledger, today),
        top_habit,
    }
}

/// Completed days over the length of every recorded month.
fn consistency(ledger: &CompletionLedger) -> u32 {
    let mut completed = 0usize;
    let mut recorded_days = 0usize;
    for (key, days) in ledger.months() {
        let Some(length) = MonthKey::parse(key).and_then(MonthKey::days_in_month) else {
            continue;
        };
        completed += days.len();
        recorded_days += length as usize;
    }
    percent(completed, recorded_days.max(1))
}

/// Name with the most done entries across every habit list. Ties go to the
/// name seen first.
pub fn top_habit<S: KeyValueStore + ?Sized>(store: &S) -> Result<Option<String>, StoreError> {
    let keys = Period::ALL
        .iter()
        .map(|period| period.storage_key())
        .chain([LEGACY_HABITS_KEY]);

    let mut counts: Vec<(String, usize)> = Vec::new();
    for key in keys {
        let Some(habits) = read_list(store, key)? else {
            continue;
        };
        for habit in habits {
            let name = if habit.name.is_empty() {
                "Unnamed".to_string()
            } else {
                habit.name
            };
            let index = match counts.iter().position(|(seen, _)| *seen == name) {
                Some(index) => index,
                None => {
                    counts.push((name, 0));
                    counts.len() - 1
                }
            };
            if habit.done {
                counts[index].1 += 1;
            }
        }
    }

    let mut best: Option<(String, usize)> = None;
    for (name, count) in counts {
        if best.as_ref().is_none_or(|(_, top)| count > *top) {
            best = Some((name, count));
        }
    }
    Ok(best.map(|(name, _)| name))
}

/// One point per day, oldest first, for the `days` days ending at `today`.
pub fn build_trend_at(ledger: &CompletionLedger, today: NaiveDate, days: u32) -> Vec<TrendPoint> {
    let days = days.clamp(1, MAX_TREND_DAYS);
    let mut points = Vec::with_capacity(days as usize);
    for offset in (0..days).rev() {
        let date = today - Duration::days(i64::from(offset));
        points.push(TrendPoint {
            date,
            completed: ledger.contains_date(date),
        });
    }
    points
}

pub fn trend<S: KeyValueStore + ?Sized>(
    store: &S,
    today: NaiveDate,
    days: u32,
) -> Result<Vec<TrendPoint>, StoreError> {
    Ok(build_trend_at(&CompletionLedger::load(store)?, today, days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::save_period;
    use crate::ledger::toggle_day;
    use crate::models::HabitRecord;
    use crate::storage::MemoryStore;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn habit(name: &str, done: bool) -> HabitRecord {
        HabitRecord {
            id: name.to_string(),
            name: name.to_string(),
            done,
            ..HabitRecord::default()
        }
    }

    #[test]
    fn summary_counts_month_and_longest_run() {
        let mut store = MemoryStore::new();
        for day in [1, 2, 3, 10, 11, 30] {
            toggle_day(&mut store, 2024, 4, day).unwrap();
        }
        toggle_day(&mut store, 2024, 5, 1).unwrap();

        let summary = monthly_summary(&store, MonthKey::new(2024, 4), date(2024, 5, 1)).unwrap();
        assert_eq!(summary.completed_count, 6);
        assert_eq!(summary.days_in_month, 30);
        assert_eq!(summary.percent, 20);
        assert_eq!(summary.longest_streak, 3);
        assert_eq!(summary.current_streak, 2);
        // 7 completed days over 30 + 31 recorded days
        assert_eq!(summary.consistency, 11);
        assert_eq!(summary.top_habit, None);
    }

    #[test]
    fn summary_of_empty_ledger_is_zero() {
        let store = MemoryStore::new();
        let summary = monthly_summary(&store, MonthKey::new(2024, 2), date(2024, 2, 10)).unwrap();
        assert_eq!(summary.completed_count, 0);
        assert_eq!(summary.days_in_month, 29);
        assert_eq!(summary.percent, 0);
        assert_eq!(summary.consistency, 0);
        assert_eq!(summary.current_streak, 0);
    }

    #[test]
    fn top_habit_prefers_most_done_then_first_seen() {
        let mut store = MemoryStore::new();
        save_period(&mut store, Period::Morning, &[habit("Water", true), habit("Walk", true)]).unwrap();
        save_period(&mut store, Period::Night, &[habit("Walk", true), habit("Read", false)]).unwrap();
        assert_eq!(top_habit(&store).unwrap().as_deref(), Some("Walk"));

        let mut tied = MemoryStore::new();
        save_period(&mut tied, Period::Morning, &[habit("Water", false), habit("Walk", false)]).unwrap();
        assert_eq!(top_habit(&tied).unwrap().as_deref(), Some("Water"));
    }

    #[test]
    fn trend_is_oldest_first_and_clamped() {
        let mut store = MemoryStore::new();
        toggle_day(&mut store, 2024, 2, 29).unwrap();
        let today = date(2024, 3, 1);

        let points = trend(&store, today, 7).unwrap();
        assert_eq!(points.len(), 7);
        assert_eq!(points[0].date, date(2024, 2, 24));
        assert_eq!(points[6].date, today);
        assert!(points[5].completed);
        assert!(!points[6].completed);

        assert_eq!(trend(&store, today, 0).unwrap().len(), 1);
        assert_eq!(trend(&store, today, 10_000).unwrap().len(), MAX_TREND_DAYS as usize);
    }
}
