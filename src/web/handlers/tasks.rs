//! # Task Handlers
//!
//! Task lifecycle surface: polling endpoints plus manual create and
//! partial-update operations. The optimization flow writes its own task
//! through the model directly; these endpoints serve external callers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::error::TimetablerError;
use crate::models::task::{Task, TaskStatus, TaskType, TaskUpdate};
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

/// Body of `POST /tasks`. Status is optional and defaults to `PROCESSING`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub correlation_id: String,
    pub task_type: TaskType,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

/// `POST /tasks` - create a task record.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateTaskRequest>,
) -> ApiResult<Json<Task>> {
    let status = body.status.unwrap_or(TaskStatus::Processing);
    let task = Task::create(&state.pool, &body.correlation_id, body.task_type, status).await?;
    Ok(Json(task))
}

/// `GET /tasks` - all tasks, newest first.
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(Task::list_all(&state.pool).await?))
}

/// `GET /tasks/:id` - 404 when the id does not resolve.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Task>> {
    Ok(Json(Task::find_by_id(&state.pool, id).await?))
}

/// `PATCH /tasks/:id` - partial update of status, progress and error
/// message; omitted fields are left untouched.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<TaskUpdate>,
) -> ApiResult<Json<Task>> {
    Ok(Json(Task::update_status(&state.pool, id, body).await?))
}

/// `GET /tasks/latest` - the most recently created task.
pub async fn latest(State(state): State<AppState>) -> ApiResult<Json<Task>> {
    let task = Task::find_most_recent(&state.pool)
        .await?
        .ok_or_else(|| TimetablerError::NotFound("no tasks recorded yet".into()))?;
    Ok(Json(task))
}
