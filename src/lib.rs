pub mod app;
pub mod checklist;
pub mod config;
pub mod errors;
pub mod habits;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod reflections;
pub mod stats;
pub mod storage;
pub mod streak;
pub mod state;

pub use app::router;
pub use config::Config;
pub use habits::{all_habits_done_for_today, reconcile_today, Reconciliation};
pub use ledger::{is_completed, toggle_day, CompletionLedger};
pub use state::AppState;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use streak::{streak_ending_at, BadgeSet, CompletionReward, StreakEngine};
