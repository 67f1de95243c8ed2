//! # Orchestration
//!
//! The optimization state machine and the transactional reconciler that
//! applies solver output back onto the assignment store.

pub mod orchestrator;
pub mod reconciler;

pub use orchestrator::{topics, OptimizationOrchestrator, OptimizationStarted};
pub use reconciler::{ReconcileOutcome, Reconciler};
