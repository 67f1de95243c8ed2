//! # Assignment Model
//!
//! Assignment rows link a class group, subject and teacher to an optional
//! space (room) and schedule. An assignment is **pending** while either
//! `schedule_id` or `space_id` is unset and **resolved** once both are set.
//! The orchestration core only ever mutates `schedule_id`/`space_id`; the
//! identity fields (class group, subject, teacher) belong to the CRUD
//! surface.
//!
//! ## Database Schema
//!
//! Maps to the `assignments` table, plus the `assignment_schedules` join
//! table for the many-to-many schedule association:
//! ```sql
//! CREATE TABLE assignments (
//!   id BIGSERIAL PRIMARY KEY,
//!   schedule_id BIGINT REFERENCES schedules(id),
//!   teacher_id BIGINT REFERENCES users(id),
//!   subject_id BIGINT NOT NULL REFERENCES subjects(id),
//!   space_id BIGINT REFERENCES spaces(id),
//!   class_group_id BIGINT NOT NULL REFERENCES class_groups(id),
//!   created_at TIMESTAMP NOT NULL DEFAULT NOW(),
//!   updated_at TIMESTAMP NOT NULL DEFAULT NOW()
//! );
//! ```

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::info;

use crate::availability::{violates_availability, AvailabilityView};
use crate::error::Result;
use crate::messaging::messages::ClassAllocation;
use crate::models::catalog::{ClassGroup, Schedule, TeacherAvailability};

/// One assignment row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub id: i64,
    pub schedule_id: Option<i64>,
    pub teacher_id: Option<i64>,
    pub subject_id: i64,
    pub space_id: Option<i64>,
    pub class_group_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Assignment enriched with the availability-violation flag, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentWithAvailability {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub violates_availability: bool,
}

/// Allocation counts over the assignment table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationStatistics {
    pub total: i64,
    pub optimized: i64,
    pub pending: i64,
    pub optimization_rate: f64,
}

impl AllocationStatistics {
    /// Derive the full statistics from the two counted quantities.
    /// `optimized + pending == total` holds by construction; the rate is 0
    /// for an empty table.
    pub fn from_counts(total: i64, optimized: i64) -> Self {
        let pending = total - optimized;
        let optimization_rate = if total > 0 {
            (optimized as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Self {
            total,
            optimized,
            pending,
            optimization_rate,
        }
    }
}

impl Assignment {
    /// Null out `schedule_id` and `space_id` on every row. Each run starts
    /// from a clean pending set; prior resolutions, manual ones included,
    /// are discarded. Returns the number of rows touched.
    pub async fn clear_all(pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE assignments SET schedule_id = NULL, space_id = NULL, updated_at = NOW()",
        )
        .execute(pool)
        .await?;

        info!(cleared = result.rows_affected(), "cleared allocations");
        Ok(result.rows_affected())
    }

    /// Pending allocations (schedule or space unset) in solver shape,
    /// ordered by id, with the fixed 2-hour default duration. Rows without
    /// a teacher cannot be optimized and are left out.
    pub async fn list_pending_allocations(pool: &PgPool) -> Result<Vec<ClassAllocation>> {
        Ok(sqlx::query_as::<_, ClassAllocation>(
            "SELECT id, class_group_id, subject_id, teacher_id, 2::BIGINT AS duration \
             FROM assignments \
             WHERE (schedule_id IS NULL OR space_id IS NULL) AND teacher_id IS NOT NULL \
             ORDER BY id ASC",
        )
        .fetch_all(pool)
        .await?)
    }

    /// Allocation statistics: `optimized` counts rows with both schedule
    /// and space set.
    pub async fn statistics(pool: &PgPool) -> Result<AllocationStatistics> {
        let (total, optimized): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
                    COUNT(*) FILTER (WHERE schedule_id IS NOT NULL AND space_id IS NOT NULL) \
             FROM assignments",
        )
        .fetch_one(pool)
        .await?;

        Ok(AllocationStatistics::from_counts(total, optimized))
    }

    /// All assignments, newest first, each enriched with the
    /// availability-violation flag. The flag is recomputed on every read;
    /// it is never cached, so it cannot go stale when availability or
    /// schedules change.
    pub async fn list_with_availability(pool: &PgPool) -> Result<Vec<AssignmentWithAvailability>> {
        let assignments = sqlx::query_as::<_, Assignment>(
            "SELECT id, schedule_id, teacher_id, subject_id, space_id, class_group_id, \
                    created_at, updated_at \
             FROM assignments ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(pool)
        .await?;

        let mut schedules_by_assignment: HashMap<i64, Vec<Schedule>> = HashMap::new();
        for (assignment_id, schedule) in Schedule::list_for_assignments(pool).await? {
            schedules_by_assignment
                .entry(assignment_id)
                .or_default()
                .push(schedule);
        }

        let group_shifts: HashMap<i64, i64> = ClassGroup::list(pool)
            .await?
            .into_iter()
            .map(|g| (g.id, g.shift_id))
            .collect();

        let mut availability: HashMap<i64, HashSet<i64>> = HashMap::new();
        for entry in TeacherAvailability::list(pool).await? {
            availability
                .entry(entry.teacher_id)
                .or_default()
                .insert(entry.schedule_id);
        }

        let empty_schedules: Vec<Schedule> = Vec::new();
        let empty_availability: HashSet<i64> = HashSet::new();

        Ok(assignments
            .into_iter()
            .map(|assignment| {
                let schedules = schedules_by_assignment
                    .get(&assignment.id)
                    .unwrap_or(&empty_schedules);
                let teacher_availability = assignment
                    .teacher_id
                    .and_then(|id| availability.get(&id))
                    .unwrap_or(&empty_availability);
                let view = AvailabilityView {
                    teacher_id: assignment.teacher_id,
                    class_group_shift_id: group_shifts.get(&assignment.class_group_id).copied(),
                    schedules,
                    teacher_availability,
                };
                let violates = violates_availability(&view);
                AssignmentWithAvailability {
                    assignment,
                    violates_availability: violates,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_counts_are_consistent() {
        let stats = AllocationStatistics::from_counts(100, 75);
        assert_eq!(stats.pending, 25);
        assert_eq!(stats.optimized + stats.pending, stats.total);
        assert!((stats.optimization_rate - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn statistics_rate_is_zero_for_empty_table() {
        let stats = AllocationStatistics::from_counts(0, 0);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.optimization_rate, 0.0);
    }

    #[test]
    fn statistics_rate_is_full_when_everything_resolved() {
        let stats = AllocationStatistics::from_counts(1, 1);
        assert_eq!(stats.pending, 0);
        assert!((stats.optimization_rate - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn statistics_serializes_camel_case_rate() {
        let value = serde_json::to_value(AllocationStatistics::from_counts(4, 1)).unwrap();
        assert_eq!(value["optimizationRate"], 25.0);
        assert_eq!(value["total"], 4);
        assert_eq!(value["pending"], 3);
    }
}
