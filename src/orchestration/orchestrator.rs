//! # Optimization Orchestrator
//!
//! The state machine driving one optimization run end to end:
//! clear, collect, validate, dispatch, await, reconcile, finalize.
//!
//! ## Lifecycle
//!
//! [`OptimizationOrchestrator::optimize_timetable`] creates the tracking
//! task and returns its identifier immediately; the remainder executes on a
//! detached tokio task so the caller (and unrelated status polling) never
//! waits on the solver. Progress moves monotonically through fixed marks
//! (5, 10, 30, 70, 100). Every error path ends in `mark_failed` - a task
//! never stays `PROCESSING` once its flow has stopped.
//!
//! Nothing serializes concurrent runs: two overlapping calls would clear
//! and re-populate the same assignment rows independently. Callers are
//! expected to trigger one run at a time.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::Result;
use crate::messaging::gateway::MessageGateway;
use crate::messaging::messages::{
    ConnectionStatus, OptimizationResult, ResultStatus, TimetableInputData,
};
use crate::models::assignment::{AllocationStatistics, Assignment};
use crate::models::task::{Task, TaskStatus, TaskType};
use crate::orchestration::reconciler::Reconciler;
use crate::snapshot::{self, SnapshotCollector};

/// Topics on the solver queue.
pub mod topics {
    /// Optimization request/reply.
    pub const OPTIMIZE_TIMETABLE: &str = "optimize_timetable";
    /// Liveness probe.
    pub const TEST_CONNECTION: &str = "test_connection";
}

/// Immediate answer to an optimization trigger; the run itself continues in
/// the background and is observed by polling the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationStarted {
    pub task_id: i64,
    pub correlation_id: String,
}

/// Drives optimization runs. Collaborators are injected at construction so
/// tests can substitute the gateway.
#[derive(Clone)]
pub struct OptimizationOrchestrator {
    pool: PgPool,
    gateway: Arc<dyn MessageGateway>,
    collector: SnapshotCollector,
    reconciler: Reconciler,
}

impl OptimizationOrchestrator {
    pub fn new(pool: PgPool, gateway: Arc<dyn MessageGateway>) -> Self {
        let collector = SnapshotCollector::new(pool.clone());
        let reconciler = Reconciler::new(pool.clone());
        Self {
            pool,
            gateway,
            collector,
            reconciler,
        }
    }

    /// Start an optimization run.
    ///
    /// Creates the tracking task in `PROCESSING` at progress 0 and returns
    /// its identifier immediately; the multi-step flow runs detached. The
    /// spawned handle is supervised so a panic in the flow is logged rather
    /// than silently lost.
    pub async fn optimize_timetable(&self) -> Result<OptimizationStarted> {
        info!("starting timetable optimization");

        let correlation_id = generate_correlation_id();
        let task = Task::create(
            &self.pool,
            &correlation_id,
            TaskType::TimetableOptimization,
            TaskStatus::Processing,
        )
        .await?;

        info!(task_id = task.id, correlation_id, "optimization task created");

        let orchestrator = self.clone();
        let task_id = task.id;
        let flow = tokio::spawn(async move {
            orchestrator.run_optimization(task_id).await;
        });
        tokio::spawn(async move {
            if let Err(join_error) = flow.await {
                error!(task_id, error = %join_error, "background optimization flow aborted");
            }
        });

        Ok(OptimizationStarted {
            task_id: task.id,
            correlation_id,
        })
    }

    /// The background flow body. Public so tests can run it to completion
    /// without going through the spawn.
    pub async fn run_optimization(&self, task_id: i64) {
        if let Err(run_error) = self.execute_run(task_id).await {
            error!(task_id, error = %run_error, "optimization run failed");
            if let Err(mark_error) =
                Task::mark_failed(&self.pool, task_id, &run_error.to_string()).await
            {
                error!(task_id, error = %mark_error, "could not record task failure");
            }
        }
    }

    async fn execute_run(&self, task_id: i64) -> Result<()> {
        // Clearing old allocations: every run starts from a clean pending
        // set, discarding any prior resolution.
        Task::update_progress(&self.pool, task_id, 5).await?;
        Assignment::clear_all(&self.pool).await?;

        Task::update_progress(&self.pool, task_id, 10).await?;
        let snapshot = self.collector.collect().await?;

        let violations = snapshot::validate(&snapshot);
        if !violations.is_empty() {
            Task::mark_failed(
                &self.pool,
                task_id,
                &format!("Dados insuficientes: {}", violations.join(", ")),
            )
            .await?;
            return Ok(());
        }

        Task::update_progress(&self.pool, task_id, 30).await?;
        info!(task_id, "sending snapshot to timetabling solver");
        let reply = self
            .gateway
            .request(topics::OPTIMIZE_TIMETABLE, serde_json::to_value(&snapshot)?)
            .await?;

        Task::update_progress(&self.pool, task_id, 70).await?;
        let result: OptimizationResult = serde_json::from_value(reply)?;

        match result {
            OptimizationResult {
                status: ResultStatus::Success,
                data: Some(payload),
                ..
            } => {
                self.reconciler.apply(&payload.schedule).await?;
                Task::mark_completed(&self.pool, task_id).await?;
                info!(task_id, "optimization completed");
            }
            OptimizationResult { message, .. } => {
                let message = message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Optimization failed".to_string());
                Task::mark_failed(&self.pool, task_id, &message).await?;
            }
        }

        Ok(())
    }

    /// Allocation statistics over the assignment table.
    pub async fn get_statistics(&self) -> Result<AllocationStatistics> {
        Assignment::statistics(&self.pool).await
    }

    /// Liveness probe against the solver.
    pub async fn test_connection(&self) -> Result<ConnectionStatus> {
        info!("testing connection to timetabling solver");
        let reply = self
            .gateway
            .request(topics::TEST_CONNECTION, serde_json::json!({}))
            .await?;
        Ok(serde_json::from_value(reply)?)
    }

    /// Snapshot preview, for debugging what would be dispatched.
    pub async fn collect_timetable_data(&self) -> Result<TimetableInputData> {
        self.collector.collect().await
    }

    /// Unconditionally reset every assignment to pending.
    pub async fn clear_all_allocations(&self) -> Result<u64> {
        Assignment::clear_all(&self.pool).await
    }
}

/// `optimization-{millis}-{uuid8}` token tying the task to its external job.
fn generate_correlation_id() -> String {
    let uuid = Uuid::new_v4().to_string();
    format!(
        "optimization-{}-{}",
        Utc::now().timestamp_millis(),
        &uuid[..8]
    )
}
