//! # Availability Validator
//!
//! Pure detection of teacher double-booking and shift mismatches. The
//! predicate is deterministic and side-effect-free; it is recomputed on
//! every read and never cached, since availability and schedule data can
//! change underneath any cache.

use std::collections::HashSet;

use crate::models::catalog::Schedule;

/// Borrowed view of the one assignment being checked: its assigned
/// schedules, the owning class group's shift, and the teacher's declared
/// availability set.
#[derive(Debug)]
pub struct AvailabilityView<'a> {
    pub teacher_id: Option<i64>,
    pub class_group_shift_id: Option<i64>,
    pub schedules: &'a [Schedule],
    pub teacher_availability: &'a HashSet<i64>,
}

/// Whether the assignment's teacher/schedule/shift combination is illegal.
///
/// 1. No schedules or no teacher assigned: nothing to violate yet, `false`.
/// 2. Shift mismatch: any assigned schedule whose `shift_id` differs from
///    the class group's shift means the teacher would be scheduled outside
///    the group's shift, `true`.
/// 3. Coverage: the teacher must be declared available for **every**
///    assigned slot, not just one; any uncovered slot is a violation.
pub fn violates_availability(view: &AvailabilityView<'_>) -> bool {
    if view.schedules.is_empty() || view.teacher_id.is_none() {
        return false;
    }

    let shift_mismatch = view
        .schedules
        .iter()
        .any(|schedule| schedule.shift_id != view.class_group_shift_id);
    if shift_mismatch {
        return true;
    }

    let covered = view
        .schedules
        .iter()
        .filter(|schedule| view.teacher_availability.contains(&schedule.id))
        .count();

    covered != view.schedules.len()
}
