//! # Messaging
//!
//! Queue gateway and wire contracts for talking to the external timetabling
//! solver. The broker is pgmq on PostgreSQL; durability across process
//! restarts is the broker's responsibility, not this module's.

pub mod errors;
pub mod gateway;
pub mod messages;

pub use errors::MessagingError;
pub use gateway::{MessageGateway, PgmqGateway};
pub use messages::{
    ClassAllocation, ConnectionStatus, OptimizationResult, OptimizationStatistics,
    OptimizedAllocation, ReplyEnvelope, RequestEnvelope, TimeSlot, TimetableInputData,
};
