use crate::checklist::Progress;
use crate::habits::Reconciliation;
use crate::stats::{MonthlySummary, TrendPoint};
use crate::streak::CompletionReward;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Index into the completion ledger: a year and a 1-based month, stored as
/// `"<year>-<month>"` without zero padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (year, month) = raw.rsplit_once('-')?;
        let year = year.trim().parse().ok()?;
        let month = month.trim().parse().ok()?;
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn days_in_month(self) -> Option<u32> {
        let first = self.first_day()?;
        let next = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)?
        };
        u32::try_from((next - first).num_days()).ok()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.month)
    }
}

/// Which way a toggle flipped a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Completed,
    Uncompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Morning,
    Afternoon,
    Night,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Morning, Period::Afternoon, Period::Night];

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Morning => "morning",
            Period::Afternoon => "afternoon",
            Period::Night => "night",
        }
    }

    pub fn storage_key(self) -> &'static str {
        match self {
            Period::Morning => "habits_morning",
            Period::Afternoon => "habits_afternoon",
            Period::Night => "habits_night",
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(Period::Morning),
            "afternoon" => Ok(Period::Afternoon),
            "night" => Ok(Period::Night),
            other => Err(format!("unknown period '{other}'")),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HabitRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "habit", alias = "title")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default, rename = "isDefault")]
    pub is_default: bool,
}

impl HabitRecord {
    /// Reads a stored entry field by field. Fields of the wrong type fall back
    /// to their defaults and flags follow JavaScript truthiness, so one odd
    /// field never blanks the whole record.
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(fields) = value else {
            return Self::default();
        };
        Self {
            id: fields.get("id").map(id_text).unwrap_or_default(),
            name: ["name", "habit", "title"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string(),
            time: fields.get("time").and_then(Value::as_str).map(str::to_string),
            done: fields.get("done").is_some_and(is_truthy),
            is_default: fields.get("isDefault").is_some_and(is_truthy),
        }
    }
}

fn id_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub transition: Transition,
    pub completed: bool,
    pub badge_unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<CompletionReward>,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub year: i32,
    pub month: u32,
    pub completed_days: Vec<i64>,
    pub summary: MonthlySummary,
}

#[derive(Debug, Serialize)]
pub struct DayStatusResponse {
    pub date: NaiveDate,
    pub completed: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct StreakResponse {
    pub date: NaiveDate,
    pub streak: u32,
}

#[derive(Debug, Serialize)]
pub struct BadgesResponse {
    pub unlocked: Vec<u32>,
    pub thresholds: Vec<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ReconcileRequest {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct TrendResponse {
    pub days: u32,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Serialize)]
pub struct HabitsResponse {
    pub morning: Vec<HabitRecord>,
    pub afternoon: Vec<HabitRecord>,
    pub night: Vec<HabitRecord>,
    pub progress: Progress,
}

#[derive(Debug, Deserialize)]
pub struct AddHabitRequest {
    pub name: String,
    pub time: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SetDoneRequest {
    pub done: bool,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceHabitsRequest {
    pub habits: Vec<HabitRecord>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct ChecklistUpdateResponse {
    pub progress: Progress,
    pub reconciliation: Reconciliation,
}

#[derive(Debug, Deserialize)]
pub struct ReflectionRequest {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn month_key_uses_unpadded_one_based_month() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(MonthKey::of(date).to_string(), "2024-3");
        assert_eq!(MonthKey::parse("2024-3"), Some(MonthKey::new(2024, 3)));
        assert_eq!(MonthKey::parse("2024-13"), None);
        assert_eq!(MonthKey::parse("garbage"), None);
    }

    #[test]
    fn days_in_month_handles_leap_years_and_december() {
        assert_eq!(MonthKey::new(2023, 2).days_in_month(), Some(28));
        assert_eq!(MonthKey::new(2024, 2).days_in_month(), Some(29));
        assert_eq!(MonthKey::new(2024, 12).days_in_month(), Some(31));
        assert_eq!(MonthKey::new(2024, 0).days_in_month(), None);
    }

    #[test]
    fn habit_record_accepts_legacy_field_names() {
        let record: HabitRecord =
            serde_json::from_str(r#"{"id":"d-m-1","habit":"Drink Water","done":true}"#).unwrap();
        assert_eq!(record.name, "Drink Water");
        assert!(record.done);

        let bare: HabitRecord = serde_json::from_str(r#"{"title":"Walk"}"#).unwrap();
        assert_eq!(bare.name, "Walk");
        assert!(!bare.done);
    }

    #[test]
    fn stored_entries_decode_field_by_field() {
        let record = HabitRecord::from_value(&json!({
            "id": "d-m-1", "habit": "Walk", "done": true, "isDefault": null, "streak": 3
        }));
        assert_eq!(record.id, "d-m-1");
        assert_eq!(record.name, "Walk");
        assert!(record.done);
        assert!(!record.is_default);

        let loose = HabitRecord::from_value(&json!({
            "id": 17, "name": 5, "title": "Read", "done": "no", "time": 9
        }));
        assert_eq!(loose.id, "17");
        assert_eq!(loose.name, "Read");
        assert!(loose.done);
        assert_eq!(loose.time, None);

        assert_eq!(HabitRecord::from_value(&json!(42)), HabitRecord::default());
    }

    #[test]
    fn truthiness_matches_javascript() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(-1), json!("0"), json!([]), json!({})] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }

    #[test]
    fn period_parses_case_insensitively() {
        assert_eq!("Night".parse::<Period>(), Ok(Period::Night));
        assert!("evening".parse::<Period>().is_err());
    }
}
