//! # Timetabler Core
//!
//! Orchestration core for timetable optimization over an academic resource
//! store.
//!
//! ## Overview
//!
//! The crate drives one optimization run end to end: it gathers a consistent
//! snapshot of scheduling inputs, dispatches the job to an external
//! constraint solver through a durable message queue, tracks the run as a
//! resumable [`models::task::Task`], and atomically reconciles the solver's
//! answer back into the assignment store. The solver itself is a black-box
//! RPC peer reached only through the queue.
//!
//! ## Module Organization
//!
//! - [`models`] - Task lifecycle store, assignments, and the reference catalog
//! - [`availability`] - Pure teacher-availability violation predicate
//! - [`snapshot`] - Snapshot collector and completeness validation
//! - [`messaging`] - Queue gateway (emit / request-reply) and wire contracts
//! - [`orchestration`] - The optimization state machine and reconciler
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`web`] - Thin HTTP control surface
//!
//! ## Control Flow
//!
//! A caller triggers [`orchestration::OptimizationOrchestrator::optimize_timetable`],
//! which creates a `PROCESSING` task and returns its identifier immediately.
//! A detached background flow then clears stale allocations, collects and
//! validates the snapshot, submits the job and blocks for the correlated
//! reply, and finally reconciles the result or marks the task `FAILED`.
//! Status polling never waits on that flow.

pub mod availability;
pub mod config;
pub mod error;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod snapshot;
pub mod web;

pub use config::{ConfigManager, DatabaseConfig, MessagingConfig, TimetablerConfig, WebConfig};
pub use error::{Result, TimetablerError};
pub use messaging::{MessageGateway, MessagingError, PgmqGateway};
pub use orchestration::{OptimizationOrchestrator, OptimizationStarted};
