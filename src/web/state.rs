//! Shared state handed to every handler.

use std::sync::Arc;

use sqlx::PgPool;

use crate::orchestration::OptimizationOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub orchestrator: Arc<OptimizationOrchestrator>,
}

impl AppState {
    pub fn new(pool: PgPool, orchestrator: Arc<OptimizationOrchestrator>) -> Self {
        Self { pool, orchestrator }
    }
}
