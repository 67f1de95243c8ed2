//! # Task Model
//!
//! Durable record of one asynchronous optimization run's lifecycle.
//!
//! ## Overview
//!
//! A `Task` is created in `PROCESSING` with progress 0, mutated by the
//! orchestrator run that owns it (or by an operator through the update
//! endpoint), and finishes in `COMPLETED` or `FAILED`. Terminal states are
//! final; callers wanting another attempt start a new run, which gets a new
//! task and correlation id. Status polling only ever reads. Tasks are never
//! deleted by this subsystem.
//!
//! ## Database Schema
//!
//! Maps to the `tasks` table:
//! ```sql
//! CREATE TABLE tasks (
//!   id BIGSERIAL PRIMARY KEY,
//!   correlation_id VARCHAR NOT NULL UNIQUE,
//!   task_type VARCHAR NOT NULL,
//!   status VARCHAR NOT NULL DEFAULT 'PROCESSING',
//!   progress INTEGER NOT NULL DEFAULT 0,
//!   error_message TEXT,
//!   created_at TIMESTAMP NOT NULL DEFAULT NOW(),
//!   updated_at TIMESTAMP NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! Invariants: `FAILED` rows always carry an `error_message`; `COMPLETED`
//! rows always show progress 100. All mutations are single-row,
//! last-write-wins; exactly one orchestrator run owns a task for its
//! lifetime, so no optimistic locking is needed.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::{error, info};

use crate::error::{Result, TimetablerError};

/// Lifecycle states of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }
}

/// Kinds of tracked background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    TimetableOptimization,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::TimetableOptimization => "TIMETABLE_OPTIMIZATION",
        }
    }
}

/// One durable optimization-run record.
///
/// `status` and `task_type` are stored as text; [`Task::status`] and
/// [`Task::task_type`] expose the typed views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i64,
    /// Caller- or system-supplied token tying this task to its external job
    pub correlation_id: String,
    pub task_type: String,
    pub status: String,
    /// 0-100, monotonically non-decreasing within a run
    pub progress: i32,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Partial mutation applied by [`Task::update_status`]; unset fields keep
/// their stored values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub progress: Option<i32>,
    #[serde(default)]
    pub error_message: Option<String>,
}

const TASK_COLUMNS: &str =
    "id, correlation_id, task_type, status, progress, error_message, created_at, updated_at";

impl Task {
    /// Typed view of the stored status. Unknown strings read as `Failed`
    /// rather than panicking on a corrupted row.
    pub fn status(&self) -> TaskStatus {
        match self.status.as_str() {
            "PROCESSING" => TaskStatus::Processing,
            "COMPLETED" => TaskStatus::Completed,
            _ => TaskStatus::Failed,
        }
    }

    /// Create a task. New tasks start at progress 0.
    pub async fn create(
        pool: &PgPool,
        correlation_id: &str,
        task_type: TaskType,
        status: TaskStatus,
    ) -> Result<Task> {
        info!(correlation_id, "creating task");

        let task = sqlx::query_as::<_, Task>(
            "INSERT INTO tasks (correlation_id, task_type, status, progress, created_at, updated_at) \
             VALUES ($1, $2, $3, 0, NOW(), NOW()) \
             RETURNING id, correlation_id, task_type, status, progress, error_message, created_at, updated_at",
        )
        .bind(correlation_id)
        .bind(task_type.as_str())
        .bind(status.as_str())
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    /// Find a task by id, failing with `NotFound` when absent. Callers must
    /// treat that as fatal to whatever flow queried it.
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Task> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| TimetablerError::NotFound(format!("task {id} not found")))
    }

    /// Find a task by its correlation id.
    pub async fn find_by_correlation_id(
        pool: &PgPool,
        correlation_id: &str,
    ) -> Result<Option<Task>> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE correlation_id = $1");
        Ok(sqlx::query_as::<_, Task>(&query)
            .bind(correlation_id)
            .fetch_optional(pool)
            .await?)
    }

    /// Most recently created task, if any.
    pub async fn find_most_recent(pool: &PgPool) -> Result<Option<Task>> {
        let query =
            format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC, id DESC LIMIT 1");
        Ok(sqlx::query_as::<_, Task>(&query).fetch_optional(pool).await?)
    }

    /// All tasks, newest first.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Task>> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC, id DESC");
        Ok(sqlx::query_as::<_, Task>(&query).fetch_all(pool).await?)
    }

    /// Tasks currently in a given status, oldest first.
    pub async fn list_by_status(pool: &PgPool, status: TaskStatus) -> Result<Vec<Task>> {
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE status = $1 ORDER BY created_at ASC, id ASC"
        );
        Ok(sqlx::query_as::<_, Task>(&query)
            .bind(status.as_str())
            .fetch_all(pool)
            .await?)
    }

    /// Update run progress.
    pub async fn update_progress(pool: &PgPool, id: i64, progress: i32) -> Result<Task> {
        let task = sqlx::query_as::<_, Task>(
            "UPDATE tasks SET progress = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING id, correlation_id, task_type, status, progress, error_message, created_at, updated_at",
        )
        .bind(id)
        .bind(progress)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| TimetablerError::NotFound(format!("task {id} not found")))?;

        info!(task_id = id, progress, "task progress updated");
        Ok(task)
    }

    /// Apply a partial update to status, progress and error message. Fields
    /// the caller leaves unset keep their stored values.
    pub async fn update_status(pool: &PgPool, id: i64, update: TaskUpdate) -> Result<Task> {
        let task = sqlx::query_as::<_, Task>(
            "UPDATE tasks SET \
                status = COALESCE($2, status), \
                progress = COALESCE($3, progress), \
                error_message = COALESCE($4, error_message), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, correlation_id, task_type, status, progress, error_message, created_at, updated_at",
        )
        .bind(id)
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.progress)
        .bind(update.error_message)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| TimetablerError::NotFound(format!("task {id} not found")))?;

        info!(task_id = id, "task updated");
        Ok(task)
    }

    /// Mark the run completed. Completion implies progress 100.
    pub async fn mark_completed(pool: &PgPool, id: i64) -> Result<Task> {
        let task = sqlx::query_as::<_, Task>(
            "UPDATE tasks SET status = 'COMPLETED', progress = 100, updated_at = NOW() WHERE id = $1 \
             RETURNING id, correlation_id, task_type, status, progress, error_message, created_at, updated_at",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| TimetablerError::NotFound(format!("task {id} not found")))?;

        info!(task_id = id, "task completed");
        Ok(task)
    }

    /// Mark the run failed with the durable, user-facing error record.
    pub async fn mark_failed(pool: &PgPool, id: i64, error_message: &str) -> Result<Task> {
        let task = sqlx::query_as::<_, Task>(
            "UPDATE tasks SET status = 'FAILED', error_message = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING id, correlation_id, task_type, status, progress, error_message, created_at, updated_at",
        )
        .bind(id)
        .bind(error_message)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| TimetablerError::NotFound(format!("task {id} not found")))?;

        error!(task_id = id, error_message, "task failed");
        Ok(task)
    }
}
