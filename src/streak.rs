use crate::errors::StoreError;
use crate::ledger::CompletionLedger;
use crate::storage::{BADGES_KEY, KeyValueStore, read_json, write_json};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::info;

pub const DEFAULT_BADGE_THRESHOLDS: [u32; 3] = [7, 14, 30];

/// Counts completed days walking backward from `date`, stopping at the first
/// gap. Zero when `date` itself is not completed.
pub fn consecutive_streak_ending_at(ledger: &CompletionLedger, date: NaiveDate) -> u32 {
    let mut count = 0;
    let mut cursor = Some(date);
    while let Some(day) = cursor {
        if !ledger.contains_date(day) {
            break;
        }
        count += 1;
        cursor = day.pred_opt();
    }
    count
}

pub fn streak_ending_at<S: KeyValueStore + ?Sized>(
    store: &S,
    date: NaiveDate,
) -> Result<u32, StoreError> {
    Ok(consecutive_streak_ending_at(&CompletionLedger::load(store)?, date))
}

/// Unlocked badge thresholds. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BadgeSet(BTreeSet<u32>);

impl BadgeSet {
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let Some(Value::Array(items)) = read_json(store, BADGES_KEY)? else {
            return Ok(Self::default());
        };
        Ok(Self(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Number(number) => number.as_u64(),
                    Value::String(text) => text.trim().parse().ok(),
                    _ => None,
                })
                .filter_map(|value| u32::try_from(value).ok())
                .collect(),
        ))
    }

    fn save<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<(), StoreError> {
        write_json(store, BADGES_KEY, self)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.0.iter().copied().collect()
    }
}

/// What a fresh completion earned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReward {
    pub date: NaiveDate,
    pub streak: u32,
    pub newly_unlocked: Vec<u32>,
}

impl CompletionReward {
    pub fn is_badge_worthy(&self) -> bool {
        !self.newly_unlocked.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakEngine {
    thresholds: Vec<u32>,
}

impl Default for StreakEngine {
    fn default() -> Self {
        Self::new(DEFAULT_BADGE_THRESHOLDS)
    }
}

impl StreakEngine {
    /// Zero thresholds are ignored; the rest are kept sorted and unique.
    pub fn new(thresholds: impl IntoIterator<Item = u32>) -> Self {
        let thresholds: BTreeSet<u32> = thresholds.into_iter().filter(|t| *t > 0).collect();
        Self {
            thresholds: thresholds.into_iter().collect(),
        }
    }

    pub fn thresholds(&self) -> &[u32] {
        &self.thresholds
    }

    /// Recomputes the streak ending at `date` from the stored ledger and
    /// unlocks every threshold it reaches that was not unlocked before.
    /// Only call this for a fresh `Completed` transition.
    pub fn on_completion_event<S: KeyValueStore + ?Sized>(
        &self,
        store: &mut S,
        date: NaiveDate,
    ) -> Result<CompletionReward, StoreError> {
        let streak = streak_ending_at(store, date)?;
        let mut badges = BadgeSet::load(store)?;

        let mut newly_unlocked = Vec::new();
        for &threshold in &self.thresholds {
            if streak >= threshold && badges.0.insert(threshold) {
                newly_unlocked.push(threshold);
            }
        }

        let reward = CompletionReward {
            date,
            streak,
            newly_unlocked,
        };
        if reward.is_badge_worthy() {
            badges.save(store)?;
            info!("streak of {streak} on {date} unlocked badges {:?}", reward.newly_unlocked);
        }
        Ok(reward)
    }
}
