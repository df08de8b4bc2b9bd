use crate::checklist;
use crate::errors::AppError;
use crate::habits::{reconcile_today, Reconciliation};
use crate::ledger::{self, CompletionLedger};
use crate::models::{
    AddHabitRequest, BadgesResponse, CalendarResponse, ChecklistUpdateResponse, DateQuery,
    DayStatusResponse, HabitRecord, HabitsResponse, MonthKey, Period, ReconcileRequest,
    ReflectionRequest, ReplaceHabitsRequest, ResetRequest, SetDoneRequest, StreakResponse,
    ToggleRequest, ToggleResponse, TrendQuery, TrendResponse, Transition,
};
use crate::reflections::{self, Reflection};
use crate::state::{AppState, SharedStore};
use crate::stats::{build_summary, top_habit, trend, MAX_TREND_DAYS};
use crate::streak::{streak_ending_at, BadgeSet};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Local, NaiveDate};
use tracing::info;

const DEFAULT_TREND_DAYS: u32 = 7;

pub async fn get_calendar(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<CalendarResponse>, AppError> {
    let key = month_key(year, month)?;
    let store = state.store.lock().await;
    let ledger = CompletionLedger::load(&**store)?;
    let summary = build_summary(&ledger, key, today(), top_habit(&**store)?);
    let completed_days = ledger
        .days(key)
        .map(|days| days.iter().copied().collect())
        .unwrap_or_default();

    Ok(Json(CalendarResponse {
        year,
        month,
        completed_days,
        summary,
    }))
}

pub async fn get_day(
    State(state): State<AppState>,
    Path((year, month, day)): Path<(i32, u32, u32)>,
) -> Result<Json<DayStatusResponse>, AppError> {
    let date = calendar_date(year, month, day)?;
    let store = state.store.lock().await;
    let completed = ledger::is_completed(&**store, year, month, day)?;
    Ok(Json(DayStatusResponse { date, completed }))
}

pub async fn toggle_day(
    State(state): State<AppState>,
    Json(payload): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let date = calendar_date(payload.year, payload.month, payload.day)?;
    let mut store = state.store.lock().await;
    let transition = ledger::toggle_day(&mut **store, payload.year, payload.month, payload.day)?;
    let reward = match transition {
        Transition::Completed => Some(state.engine.on_completion_event(&mut **store, date)?),
        Transition::Uncompleted => None,
    };

    Ok(Json(ToggleResponse {
        transition,
        completed: transition == Transition::Completed,
        badge_unlocked: reward.as_ref().is_some_and(|reward| reward.is_badge_worthy()),
        reward,
    }))
}

pub async fn get_streak(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<StreakResponse>, AppError> {
    let date = query.date.unwrap_or_else(today);
    let store = state.store.lock().await;
    let streak = streak_ending_at(&**store, date)?;
    Ok(Json(StreakResponse { date, streak }))
}

pub async fn get_badges(State(state): State<AppState>) -> Result<Json<BadgesResponse>, AppError> {
    let store = state.store.lock().await;
    let unlocked = BadgeSet::load(&**store)?.to_vec();
    Ok(Json(BadgesResponse {
        unlocked,
        thresholds: state.engine.thresholds().to_vec(),
    }))
}

pub async fn reconcile(
    State(state): State<AppState>,
    Json(payload): Json<ReconcileRequest>,
) -> Result<Json<Reconciliation>, AppError> {
    let date = payload.date.unwrap_or_else(today);
    let mut store = state.store.lock().await;
    Ok(Json(reconcile_today(&mut **store, &state.engine, date)?))
}

pub async fn get_trend(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<TrendResponse>, AppError> {
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS);
    if days == 0 || days > MAX_TREND_DAYS {
        return Err(AppError::bad_request(format!(
            "days must be between 1 and {MAX_TREND_DAYS}"
        )));
    }
    let store = state.store.lock().await;
    let points = trend(&**store, today(), days)?;
    Ok(Json(TrendResponse { days, points }))
}

pub async fn get_habits(State(state): State<AppState>) -> Result<Json<HabitsResponse>, AppError> {
    let store = state.store.lock().await;
    Ok(Json(habits_response(&store)?))
}

pub async fn replace_habits(
    State(state): State<AppState>,
    Path(period): Path<String>,
    Json(payload): Json<ReplaceHabitsRequest>,
) -> Result<Json<ChecklistUpdateResponse>, AppError> {
    let period = parse_period(&period)?;
    let mut habits = payload.habits;
    for habit in habits.iter_mut().filter(|habit| habit.id.is_empty()) {
        habit.id = checklist::new_habit_id();
    }

    let mut store = state.store.lock().await;
    checklist::save_period(&mut **store, period, &habits)?;
    info!("replaced {period} checklist with {} habits", habits.len());
    checklist_update(&state, &mut store, payload.date)
}

pub async fn add_habit(
    State(state): State<AppState>,
    Path(period): Path<String>,
    Json(payload): Json<AddHabitRequest>,
) -> Result<(StatusCode, Json<HabitRecord>), AppError> {
    let period = parse_period(&period)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("habit name must not be empty"));
    }
    let time = checklist::parse_habit_time(&payload.time).ok_or_else(|| {
        AppError::bad_request(format!(
            "invalid time '{}', expected HH:MM or h:mm AM/PM",
            payload.time
        ))
    })?;

    let mut store = state.store.lock().await;
    let habit = checklist::add_habit(&mut **store, period, &payload.name, time)?;
    Ok((StatusCode::CREATED, Json(habit)))
}

pub async fn set_habit_done(
    State(state): State<AppState>,
    Path((period, id)): Path<(String, String)>,
    Json(payload): Json<SetDoneRequest>,
) -> Result<Json<ChecklistUpdateResponse>, AppError> {
    let period = parse_period(&period)?;
    let mut store = state.store.lock().await;
    if !checklist::set_done(&mut **store, period, &id, payload.done)? {
        return Err(AppError::not_found(format!("no {period} habit with id '{id}'")));
    }
    checklist_update(&state, &mut store, payload.date)
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Path((period, id)): Path<(String, String)>,
) -> Result<Json<ChecklistUpdateResponse>, AppError> {
    let period = parse_period(&period)?;
    let mut store = state.store.lock().await;
    if !checklist::remove_habit(&mut **store, period, &id)? {
        return Err(AppError::not_found(format!("no {period} habit with id '{id}'")));
    }
    checklist_update(&state, &mut store, None)
}

pub async fn reset_habits(
    State(state): State<AppState>,
    payload: Option<Json<ResetRequest>>,
) -> Result<Json<HabitsResponse>, AppError> {
    let date = payload.and_then(|Json(request)| request.date).unwrap_or_else(today);
    let mut store = state.store.lock().await;
    checklist::reset_today(&mut **store, date)?;
    Ok(Json(habits_response(&store)?))
}

pub async fn list_reflections(
    State(state): State<AppState>,
) -> Result<Json<Vec<Reflection>>, AppError> {
    let store = state.store.lock().await;
    Ok(Json(reflections::past_reflections(&**store)?))
}

pub async fn get_reflection(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<Reflection>, AppError> {
    let store = state.store.lock().await;
    reflections::load_reflection(&**store, date)?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("no reflection for {date}")))
}

pub async fn save_reflection(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
    Json(payload): Json<ReflectionRequest>,
) -> Result<Json<Reflection>, AppError> {
    let mut store = state.store.lock().await;
    Ok(Json(reflections::save_reflection(&mut **store, date, &payload.text)?))
}

pub async fn clear_reflection(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<StatusCode, AppError> {
    let mut store = state.store.lock().await;
    reflections::clear_reflection(&mut **store, date)?;
    Ok(StatusCode::NO_CONTENT)
}

fn checklist_update(
    state: &AppState,
    store: &mut SharedStore,
    date: Option<NaiveDate>,
) -> Result<Json<ChecklistUpdateResponse>, AppError> {
    let reconciliation = reconcile_today(&mut **store, &state.engine, date.unwrap_or_else(today))?;
    Ok(Json(ChecklistUpdateResponse {
        progress: checklist::progress(&**store)?,
        reconciliation,
    }))
}

fn habits_response(store: &SharedStore) -> Result<HabitsResponse, AppError> {
    Ok(HabitsResponse {
        morning: checklist::read_period(&**store, Period::Morning)?,
        afternoon: checklist::read_period(&**store, Period::Afternoon)?,
        night: checklist::read_period(&**store, Period::Night)?,
        progress: checklist::progress(&**store)?,
    })
}

fn parse_period(raw: &str) -> Result<Period, AppError> {
    raw.parse().map_err(AppError::bad_request)
}

fn month_key(year: i32, month: u32) -> Result<MonthKey, AppError> {
    let key = MonthKey::new(year, month);
    key.days_in_month()
        .map(|_| key)
        .ok_or_else(|| AppError::bad_request("month must be between 1 and 12"))
}

fn calendar_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, AppError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| AppError::bad_request(format!("{year}-{month}-{day} is not a calendar date")))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
