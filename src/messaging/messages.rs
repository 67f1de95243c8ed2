//! # Wire Contracts
//!
//! Message structures exchanged with the external timetabling solver over
//! the queue, plus the request/reply envelopes the gateway wraps them in.
//! Field names are the solver's contract and must not drift.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::catalog::{
    ClassGroup, Course, CourseType, Schedule, Shift, Space, SpaceType, Subject, Teacher,
};

/// Envelope for messages sent to a solver queue.
///
/// `reply_to` names the queue a correlated [`ReplyEnvelope`] is expected on;
/// fire-and-forget emits leave it unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub correlation_id: String,
    pub reply_to: Option<String>,
    pub pattern: String,
    pub data: Value,
}

/// Envelope for solver replies, matched to the request by correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub correlation_id: String,
    pub data: Value,
}

/// A pending class allocation as presented to the solver.
///
/// `duration` defaults to 2 hours when the assignment carries none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClassAllocation {
    pub id: i64,
    pub class_group_id: i64,
    pub subject_id: i64,
    pub teacher_id: i64,
    pub duration: i64,
}

/// The complete, immutable input payload for one optimization run.
///
/// Built fresh by the snapshot collector per run and never persisted.
/// Collections are deterministically ordered (by name; schedules by weekday
/// Monday through Sunday, then start time; allocations by id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimetableInputData {
    pub space_types: Vec<SpaceType>,
    pub classrooms: Vec<Space>,
    pub course_types: Vec<CourseType>,
    pub courses: Vec<Course>,
    pub shifts: Vec<Shift>,
    pub teachers: Vec<Teacher>,
    pub subjects: Vec<Subject>,
    pub schedules: Vec<Schedule>,
    pub class_groups: Vec<ClassGroup>,
    pub class_allocations: Vec<ClassAllocation>,
    /// teacher id -> schedule ids the teacher declared availability for
    pub teacher_schedules: BTreeMap<i64, Vec<i64>>,
}

/// One discrete slot in a solver answer: day name plus starting hour, with
/// an optionally pre-resolved schedule id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub day: String,
    pub hour: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<i64>,
}

/// Class group echo inside an optimized allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationClassGroup {
    pub id: i64,
    pub name: String,
    pub course: String,
    pub shift: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_id: Option<i64>,
}

/// Subject echo inside an optimized allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationSubject {
    pub id: i64,
    pub name: String,
}

/// Teacher echo inside an optimized allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationTeacher {
    pub id: i64,
    pub name: String,
}

/// Assigned classroom inside an optimized allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationClassroom {
    pub id: i64,
    pub name: String,
    pub floor: i64,
}

/// One solved allocation in the solver's answer. Consumed once by the
/// reconciler, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedAllocation {
    pub allocation_id: i64,
    /// Direct schedule ids from the optimizer, when it resolved them itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_ids: Option<Vec<i64>>,
    pub class_group: AllocationClassGroup,
    pub subject: AllocationSubject,
    pub teacher: AllocationTeacher,
    pub classroom: AllocationClassroom,
    pub time_slots: Vec<TimeSlot>,
    pub duration: i64,
}

/// Aggregate quality metrics reported by the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationStatistics {
    pub hard_constraints_satisfied: bool,
    pub hard_constraints_cost: f64,
    pub total_allocations: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_empty_space: Option<EmptySpaceStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teachers_empty_space: Option<EmptySpaceStats>,
}

/// Idle-slot statistics for groups or teachers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmptySpaceStats {
    pub total: i64,
    pub max_per_day: i64,
    pub average_per_week: f64,
}

/// Outcome marker on [`OptimizationResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Error,
}

/// Successful payload inside an [`OptimizationResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationPayload {
    pub schedule: Vec<OptimizedAllocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<OptimizationStatistics>,
}

/// The solver's reply on the `optimize_timetable` topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub status: ResultStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<OptimizationPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// Reply shape of the `test_connection` liveness probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub status: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimization_result_success_shape() {
        let raw = serde_json::json!({
            "status": "success",
            "message": "Optimization completed",
            "data": {
                "schedule": [{
                    "allocation_id": 7,
                    "class_group": {"id": 1, "name": "ADS-1", "course": "ADS", "shift": "Morning"},
                    "subject": {"id": 3, "name": "Databases"},
                    "teacher": {"id": 5, "name": "Ana"},
                    "classroom": {"id": 2, "name": "B-101", "floor": 1},
                    "time_slots": [{"day": "Monday", "hour": 9, "schedule_id": 1}],
                    "duration": 2
                }],
                "statistics": {
                    "hard_constraints_satisfied": true,
                    "hard_constraints_cost": 0.0,
                    "total_allocations": 1
                }
            }
        });

        let result: OptimizationResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.status, ResultStatus::Success);
        let payload = result.data.unwrap();
        assert_eq!(payload.schedule.len(), 1);
        let item = &payload.schedule[0];
        assert_eq!(item.allocation_id, 7);
        assert_eq!(item.classroom.id, 2);
        assert_eq!(item.time_slots[0].day, "Monday");
        assert_eq!(item.time_slots[0].hour, 9);
        assert_eq!(item.time_slots[0].schedule_id, Some(1));
    }

    #[test]
    fn optimization_result_error_shape() {
        let raw = serde_json::json!({
            "status": "error",
            "message": "No feasible solution",
            "errors": ["teacher 5 over-constrained"]
        });

        let result: OptimizationResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.data.is_none());
        assert_eq!(result.errors.unwrap().len(), 1);
    }

    #[test]
    fn teacher_schedules_serializes_with_string_keys() {
        let mut map = BTreeMap::new();
        map.insert(5_i64, vec![1_i64, 2]);

        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(value["5"], serde_json::json!([1, 2]));
    }

    #[test]
    fn request_envelope_round_trips() {
        let envelope = RequestEnvelope {
            correlation_id: "optimization-1700000000000-abc12345".into(),
            reply_to: Some("optimize_timetable_replies".into()),
            pattern: "optimize_timetable".into(),
            data: serde_json::json!({"classrooms": []}),
        };

        let raw = serde_json::to_string(&envelope).unwrap();
        let back: RequestEnvelope = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.correlation_id, envelope.correlation_id);
        assert_eq!(back.pattern, "optimize_timetable");
    }
}
