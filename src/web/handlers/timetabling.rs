//! # Timetabling Handlers
//!
//! The optimization control surface: trigger a run, read statistics, probe
//! the solver, preview the snapshot, and list assignments with the
//! availability flag.

use axum::extract::State;
use axum::Json;

use crate::messaging::messages::{ConnectionStatus, TimetableInputData};
use crate::models::assignment::{AllocationStatistics, Assignment, AssignmentWithAvailability};
use crate::orchestration::OptimizationStarted;
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

/// `POST /timetabling/optimize`
///
/// Creates the optimization task and returns `{taskId, correlationId}`
/// immediately; the run proceeds in the background and is observed through
/// the task endpoints.
pub async fn optimize(State(state): State<AppState>) -> ApiResult<Json<OptimizationStarted>> {
    Ok(Json(state.orchestrator.optimize_timetable().await?))
}

/// `GET /timetabling/statistics`
pub async fn statistics(State(state): State<AppState>) -> ApiResult<Json<AllocationStatistics>> {
    Ok(Json(state.orchestrator.get_statistics().await?))
}

/// `GET /timetabling/test-connection`
pub async fn test_connection(State(state): State<AppState>) -> ApiResult<Json<ConnectionStatus>> {
    Ok(Json(state.orchestrator.test_connection().await?))
}

/// `GET /timetabling/data` - snapshot preview for debugging.
pub async fn timetable_data(State(state): State<AppState>) -> ApiResult<Json<TimetableInputData>> {
    Ok(Json(state.orchestrator.collect_timetable_data().await?))
}

/// `GET /assignments` - assignments enriched with the recomputed
/// availability-violation flag.
pub async fn assignments(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<AssignmentWithAvailability>>> {
    Ok(Json(Assignment::list_with_availability(&state.pool).await?))
}
