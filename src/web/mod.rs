//! # Web Surface
//!
//! Thin HTTP layer over the orchestration core: trigger a run, poll task
//! progress, read allocation statistics, probe solver connectivity, and
//! preview the snapshot. Handlers do no domain work of their own.

pub mod errors;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;

pub use errors::ApiError;
pub use state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/timetabling/optimize", post(handlers::timetabling::optimize))
        .route("/timetabling/statistics", get(handlers::timetabling::statistics))
        .route(
            "/timetabling/test-connection",
            get(handlers::timetabling::test_connection),
        )
        .route("/timetabling/data", get(handlers::timetabling::timetable_data))
        .route("/assignments", get(handlers::timetabling::assignments))
        .route(
            "/tasks",
            get(handlers::tasks::list).post(handlers::tasks::create),
        )
        .route("/tasks/latest", get(handlers::tasks::latest))
        .route(
            "/tasks/:id",
            get(handlers::tasks::get_by_id).patch(handlers::tasks::update),
        )
        .with_state(state)
}
