use crate::errors::StoreError;
use crate::models::{MonthKey, Transition};
use crate::storage::{COMPLETED_KEY, KeyValueStore, read_json, write_json};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Month key to completed day numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CompletionLedger {
    months: BTreeMap<String, BTreeSet<i64>>,
}

impl CompletionLedger {
    /// Keeps only array-valued months, each reduced to its unique integral
    /// day numbers in ascending order. Anything else in `raw` is discarded.
    pub fn normalize(raw: &Value) -> Self {
        let Some(object) = raw.as_object() else {
            if !raw.is_null() {
                debug!("completion ledger is not an object, starting empty");
            }
            return Self::default();
        };

        let mut months = BTreeMap::new();
        for (key, value) in object {
            let Some(items) = value.as_array() else {
                debug!("dropping non-array ledger entry '{key}'");
                continue;
            };
            months.insert(key.clone(), items.iter().filter_map(coerce_day).collect());
        }
        Self { months }
    }

    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        Ok(read_json(store, COMPLETED_KEY)?
            .map(|raw| Self::normalize(&raw))
            .unwrap_or_default())
    }

    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<(), StoreError> {
        write_json(store, COMPLETED_KEY, self)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.months
                .iter()
                .map(|(key, days)| (key.clone(), days.iter().copied().collect()))
                .collect(),
        )
    }

    pub fn days(&self, key: MonthKey) -> Option<&BTreeSet<i64>> {
        self.months.get(&key.to_string())
    }

    pub fn contains(&self, key: MonthKey, day: u32) -> bool {
        self.days(key)
            .is_some_and(|days| days.contains(&i64::from(day)))
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.contains(MonthKey::of(date), date.day())
    }

    /// Raw month entries, including keys that do not parse as a [`MonthKey`].
    pub fn months(&self) -> impl Iterator<Item = (&str, &BTreeSet<i64>)> {
        self.months.iter().map(|(key, days)| (key.as_str(), days))
    }

    pub fn toggle(&mut self, key: MonthKey, day: u32) -> Transition {
        let days = self.months.entry(key.to_string()).or_default();
        if days.remove(&i64::from(day)) {
            Transition::Uncompleted
        } else {
            days.insert(i64::from(day));
            Transition::Completed
        }
    }
}

fn coerce_day(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (number.is_finite() && number.fract() == 0.0).then_some(number as i64)
}

pub fn is_completed<S: KeyValueStore + ?Sized>(
    store: &S,
    year: i32,
    month: u32,
    day: u32,
) -> Result<bool, StoreError> {
    Ok(CompletionLedger::load(store)?.contains(MonthKey::new(year, month), day))
}

/// Flips `day` and writes the whole ledger back. Callers should only run
/// streak and badge bookkeeping on [`Transition::Completed`].
pub fn toggle_day<S: KeyValueStore + ?Sized>(
    store: &mut S,
    year: i32,
    month: u32,
    day: u32,
) -> Result<Transition, StoreError> {
    let key = MonthKey::new(year, month);
    let mut ledger = CompletionLedger::load(store)?;
    let transition = ledger.toggle(key, day);
    ledger.save(store)?;
    info!("day {day} of {key} marked {transition:?}");
    Ok(transition)
}
