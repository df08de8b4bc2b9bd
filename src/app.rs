use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post, put}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/calendar/toggle", post(handlers::toggle_day))
        .route("/api/calendar/:year/:month", get(handlers::get_calendar))
        .route("/api/calendar/:year/:month/:day", get(handlers::get_day))
        .route("/api/streak", get(handlers::get_streak))
        .route("/api/badges", get(handlers::get_badges))
        .route("/api/reconcile", post(handlers::reconcile))
        .route("/api/trend", get(handlers::get_trend))
        .route("/api/habits", get(handlers::get_habits))
        .route("/api/habits/reset", post(handlers::reset_habits))
        .route(
            "/api/habits/:period",
            put(handlers::replace_habits).post(handlers::add_habit),
        )
        .route(
            "/api/habits/:period/:id",
            post(handlers::set_habit_done).delete(handlers::delete_habit),
        )
        .route("/api/reflections", get(handlers::list_reflections))
        .route(
            "/api/reflections/:date",
            get(handlers::get_reflection)
                .put(handlers::save_reflection)
                .delete(handlers::clear_reflection),
        )
        .with_state(state)
}
