//! # Models
//!
//! Data layer for the orchestration core. Entities are flat `FromRow`
//! structs with explicit foreign-key fields; relations appear only through
//! query joins, never object graphs.

pub mod assignment;
pub mod catalog;
pub mod task;

pub use assignment::{AllocationStatistics, Assignment};
pub use task::{Task, TaskStatus, TaskType, TaskUpdate};
