use crate::errors::StoreError;
use crate::models::{HabitRecord, Period, is_truthy};
use crate::storage::{KeyValueStore, NOTIFIED_PREFIX, read_json, write_json};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

const DEFAULT_HABITS: [(Period, &str, &str, &str); 12] = [
    (Period::Morning, "d-m-1", "Drink Water", "07:00"),
    (Period::Morning, "d-m-2", "Stretch / Yoga", "07:15"),
    (Period::Morning, "d-m-3", "Plan Today", "07:30"),
    (Period::Morning, "d-m-4", "Read 10 Pages", "08:00"),
    (Period::Afternoon, "d-a-1", "Eat Healthy Lunch", "13:00"),
    (Period::Afternoon, "d-a-2", "Short Walk", "14:00"),
    (Period::Afternoon, "d-a-3", "Drink Water Again", "15:00"),
    (Period::Afternoon, "d-a-4", "Avoid Distractions", "16:00"),
    (Period::Night, "d-n-1", "Reflect on the Day", "21:00"),
    (Period::Night, "d-n-2", "Journal / Gratitude", "21:15"),
    (Period::Night, "d-n-3", "Prep for Tomorrow", "21:30"),
    (Period::Night, "d-n-4", "Sleep Early", "22:00"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
    pub percent: u32,
}

pub fn default_habits(period: Period) -> Vec<HabitRecord> {
    DEFAULT_HABITS
        .iter()
        .filter(|(owner, ..)| *owner == period)
        .map(|(_, id, name, time)| HabitRecord {
            id: id.to_string(),
            name: name.to_string(),
            time: Some(time.to_string()),
            done: false,
            is_default: true,
        })
        .collect()
}

/// `None` unless `value` is an array. Every entry becomes a record, so
/// entries that are not habit objects still count against "all done".
pub fn parse_habit_list(value: Value) -> Option<Vec<HabitRecord>> {
    let Value::Array(items) = value else {
        return None;
    };
    Some(items.iter().map(HabitRecord::from_value).collect())
}

pub fn read_list<S: KeyValueStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<Option<Vec<HabitRecord>>, StoreError> {
    Ok(read_json(store, key)?.and_then(parse_habit_list))
}

pub fn read_period<S: KeyValueStore + ?Sized>(
    store: &S,
    period: Period,
) -> Result<Vec<HabitRecord>, StoreError> {
    Ok(read_list(store, period.storage_key())?.unwrap_or_default())
}

pub fn save_period<S: KeyValueStore + ?Sized>(
    store: &mut S,
    period: Period,
    habits: &[HabitRecord],
) -> Result<(), StoreError> {
    write_json(store, period.storage_key(), habits)
}

// Mutations work on the stored JSON entries so fields this crate does not
// model, and entries it cannot read, are written back untouched.
fn read_entries<S: KeyValueStore + ?Sized>(
    store: &S,
    period: Period,
) -> Result<Option<Vec<Value>>, StoreError> {
    match read_json(store, period.storage_key())? {
        Some(Value::Array(entries)) => Ok(Some(entries)),
        _ => Ok(None),
    }
}

fn save_entries<S: KeyValueStore + ?Sized>(
    store: &mut S,
    period: Period,
    entries: &[Value],
) -> Result<(), StoreError> {
    write_json(store, period.storage_key(), entries)
}

fn has_id(entry: &Value, id: &str) -> bool {
    entry.is_object() && HabitRecord::from_value(entry).id == id
}

pub fn new_habit_id() -> String {
    format!("h{}", uuid::Uuid::new_v4().simple())
}

/// Seeds missing period lists with the defaults. Stored entries only get a
/// fresh id when theirs is falsy and `done: false` when the flag is absent.
pub fn ensure_initialized<S: KeyValueStore + ?Sized>(store: &mut S) -> Result<(), StoreError> {
    for period in Period::ALL {
        if store.get(period.storage_key())?.is_none() {
            save_period(store, period, &default_habits(period))?;
            info!("seeded default {period} habits");
            continue;
        }

        let Some(mut entries) = read_entries(store, period)? else {
            continue;
        };
        let mut changed = false;
        for fields in entries.iter_mut().filter_map(Value::as_object_mut) {
            if !fields.get("id").is_some_and(is_truthy) {
                fields.insert("id".into(), Value::String(new_habit_id()));
                changed = true;
            }
            if !fields.contains_key("done") {
                fields.insert("done".into(), Value::Bool(false));
                changed = true;
            }
        }
        if changed {
            debug!("patched stored {period} habits");
            save_entries(store, period, &entries)?;
        }
    }
    Ok(())
}

/// Returns whether a habit with `id` exists in `period`.
pub fn set_done<S: KeyValueStore + ?Sized>(
    store: &mut S,
    period: Period,
    id: &str,
    done: bool,
) -> Result<bool, StoreError> {
    let Some(mut entries) = read_entries(store, period)? else {
        return Ok(false);
    };
    let Some(fields) = entries
        .iter_mut()
        .find(|entry| has_id(entry, id))
        .and_then(Value::as_object_mut)
    else {
        return Ok(false);
    };
    fields.insert("done".into(), Value::Bool(done));
    save_entries(store, period, &entries)?;
    Ok(true)
}

/// Accepts `HH:MM` (24h, one-digit hours allowed) or `h:mm AM/PM` and returns
/// the 24h time. Anything else is rejected.
pub fn parse_habit_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%I:%M %p"))
        .ok()
}

pub fn normalize_time(raw: &str) -> Option<String> {
    parse_habit_time(raw).map(|time| time.format("%H:%M").to_string())
}

pub fn add_habit<S: KeyValueStore + ?Sized>(
    store: &mut S,
    period: Period,
    name: &str,
    time: NaiveTime,
) -> Result<HabitRecord, StoreError> {
    let habit = HabitRecord {
        id: new_habit_id(),
        name: name.trim().to_string(),
        time: Some(time.format("%H:%M").to_string()),
        done: false,
        is_default: false,
    };
    let entry = serde_json::to_value(&habit).map_err(|source| StoreError::Encode {
        key: period.storage_key().to_string(),
        source,
    })?;
    let mut entries = read_entries(store, period)?.unwrap_or_default();
    entries.push(entry);
    save_entries(store, period, &entries)?;
    info!("added {period} habit '{}'", habit.name);
    Ok(habit)
}

pub fn remove_habit<S: KeyValueStore + ?Sized>(
    store: &mut S,
    period: Period,
    id: &str,
) -> Result<bool, StoreError> {
    let Some(mut entries) = read_entries(store, period)? else {
        return Ok(false);
    };
    let before = entries.len();
    entries.retain(|entry| !has_id(entry, id));
    if entries.len() == before {
        return Ok(false);
    }
    save_entries(store, period, &entries)?;
    Ok(true)
}

/// Unchecks every habit and forgets that today's reminder was sent. Lists
/// that do not exist stay absent.
pub fn reset_today<S: KeyValueStore + ?Sized>(
    store: &mut S,
    today: NaiveDate,
) -> Result<(), StoreError> {
    for period in Period::ALL {
        let Some(mut entries) = read_entries(store, period)? else {
            continue;
        };
        for fields in entries.iter_mut().filter_map(Value::as_object_mut) {
            fields.insert("done".into(), Value::Bool(false));
        }
        save_entries(store, period, &entries)?;
    }
    store.remove(&format!("{NOTIFIED_PREFIX}{}", today.format("%Y-%m-%d")))?;
    info!("reset habits for {today}");
    Ok(())
}

pub fn progress<S: KeyValueStore + ?Sized>(store: &S) -> Result<Progress, StoreError> {
    let mut done = 0;
    let mut total = 0;
    for period in Period::ALL {
        let habits = read_period(store, period)?;
        total += habits.len();
        done += habits.iter().filter(|habit| habit.done).count();
    }
    Ok(Progress {
        done,
        total,
        percent: percent(done, total),
    })
}

pub(crate) fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}
