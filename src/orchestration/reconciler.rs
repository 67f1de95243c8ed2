//! # Reconciler
//!
//! Applies the solver's answer to assignment rows inside one transaction.
//!
//! For each optimized allocation carrying at least one time slot, the
//! concrete schedule row is resolved from the first slot's day and an
//! hour-prefix match on `start_time`; on a match, the assignment's
//! `schedule_id` and `space_id` are set. Items with no slots, or whose
//! first slot matches no schedule row, are silently skipped and stay
//! pending - a partial solver result must not abort the whole batch. Any
//! failure *during* the update loop rolls back every write of the run.

use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::{Result, TimetablerError};
use crate::messaging::messages::OptimizedAllocation;

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub applied: usize,
    pub skipped: usize,
}

/// Transactional writer for solver output.
#[derive(Clone)]
pub struct Reconciler {
    pool: PgPool,
}

/// `LIKE` prefix matching schedules that start within the given hour,
/// e.g. hour 9 matches `09:00` and `09:30`.
pub(crate) fn start_time_prefix(hour: i64) -> String {
    format!("{hour:02}:%")
}

impl Reconciler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply one solver schedule, all-or-nothing across the run,
    /// best-effort per item within it.
    pub async fn apply(&self, optimized: &[OptimizedAllocation]) -> Result<ReconcileOutcome> {
        info!(items = optimized.len(), "updating optimized allocations");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TimetablerError::Reconciliation(e.to_string()))?;

        let mut outcome = ReconcileOutcome {
            applied: 0,
            skipped: 0,
        };

        for item in optimized {
            let Some(first_slot) = item.time_slots.first() else {
                debug!(allocation_id = item.allocation_id, "no time slots, skipped");
                outcome.skipped += 1;
                continue;
            };

            let schedule_id: Option<(i64,)> = sqlx::query_as(
                "SELECT id FROM schedules WHERE weekday = $1 AND start_time LIKE $2 LIMIT 1",
            )
            .bind(&first_slot.day)
            .bind(start_time_prefix(first_slot.hour))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| TimetablerError::Reconciliation(e.to_string()))?;

            match schedule_id {
                Some((schedule_id,)) => {
                    sqlx::query(
                        "UPDATE assignments \
                         SET schedule_id = $1, space_id = $2, updated_at = NOW() \
                         WHERE id = $3",
                    )
                    .bind(schedule_id)
                    .bind(item.classroom.id)
                    .bind(item.allocation_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| TimetablerError::Reconciliation(e.to_string()))?;
                    outcome.applied += 1;
                }
                None => {
                    debug!(
                        allocation_id = item.allocation_id,
                        day = %first_slot.day,
                        hour = first_slot.hour,
                        "no schedule row matches first slot, skipped"
                    );
                    outcome.skipped += 1;
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| TimetablerError::Reconciliation(e.to_string()))?;

        info!(
            applied = outcome.applied,
            skipped = outcome.skipped,
            "allocations updated"
        );
        Ok(outcome)
    }
}
