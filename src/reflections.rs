use crate::errors::StoreError;
use crate::storage::{KeyValueStore, REFLECTION_PREFIX};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reflection {
    pub date: NaiveDate,
    pub text: String,
}

pub fn reflection_key(date: NaiveDate) -> String {
    format!("{REFLECTION_PREFIX}{}", date.format("%Y-%m-%d"))
}

/// Stores the trimmed note for `date`, replacing any earlier one.
pub fn save_reflection<S: KeyValueStore + ?Sized>(
    store: &mut S,
    date: NaiveDate,
    text: &str,
) -> Result<Reflection, StoreError> {
    let text = text.trim().to_string();
    store.set(&reflection_key(date), text.clone())?;
    Ok(Reflection { date, text })
}

pub fn load_reflection<S: KeyValueStore + ?Sized>(
    store: &S,
    date: NaiveDate,
) -> Result<Option<Reflection>, StoreError> {
    Ok(store
        .get(&reflection_key(date))?
        .map(|text| Reflection { date, text }))
}

pub fn clear_reflection<S: KeyValueStore + ?Sized>(
    store: &mut S,
    date: NaiveDate,
) -> Result<(), StoreError> {
    store.remove(&reflection_key(date))
}

/// Every stored reflection, newest first. Keys whose suffix is not a date are
/// skipped.
pub fn past_reflections<S: KeyValueStore + ?Sized>(
    store: &S,
) -> Result<Vec<Reflection>, StoreError> {
    let mut reflections = Vec::new();
    for key in store.keys()? {
        let Some(date) = key
            .strip_prefix(REFLECTION_PREFIX)
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        else {
            continue;
        };
        if let Some(text) = store.get(&key)? {
            reflections.push(Reflection { date, text });
        }
    }
    reflections.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(reflections)
}
