//! # Snapshot Collector
//!
//! Assembles the immutable input payload for one optimization run. The
//! collection is read-only and repeatable: running it twice without
//! intervening writes yields identical content, because every collection is
//! read with a fixed deterministic order.

use std::collections::BTreeMap;

use sqlx::PgPool;
use tracing::info;

use crate::error::Result;
use crate::messaging::messages::TimetableInputData;
use crate::models::assignment::Assignment;
use crate::models::catalog::{
    ClassGroup, Course, CourseType, Schedule, Shift, Space, SpaceType, Subject, Teacher,
    TeacherAvailability,
};

/// Reads the current resource state and builds the solver request payload.
#[derive(Clone)]
pub struct SnapshotCollector {
    pool: PgPool,
}

impl SnapshotCollector {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Collect the full snapshot: every reference collection in full, plus
    /// only the assignments currently pending (schedule or space unset) and
    /// the teacher availability map.
    pub async fn collect(&self) -> Result<TimetableInputData> {
        info!("collecting timetable data");

        let space_types = SpaceType::list(&self.pool).await?;
        let classrooms = Space::list(&self.pool).await?;
        let course_types = CourseType::list(&self.pool).await?;
        let courses = Course::list(&self.pool).await?;
        let shifts = Shift::list(&self.pool).await?;
        let teachers = Teacher::list(&self.pool).await?;
        let subjects = Subject::list(&self.pool).await?;
        let schedules = Schedule::list(&self.pool).await?;
        let class_groups = ClassGroup::list(&self.pool).await?;
        let class_allocations = Assignment::list_pending_allocations(&self.pool).await?;

        let mut teacher_schedules: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for entry in TeacherAvailability::list(&self.pool).await? {
            teacher_schedules
                .entry(entry.teacher_id)
                .or_default()
                .push(entry.schedule_id);
        }

        info!(
            allocations = class_allocations.len(),
            classrooms = classrooms.len(),
            teachers = teachers.len(),
            "timetable data collected"
        );

        Ok(TimetableInputData {
            space_types,
            classrooms,
            course_types,
            courses,
            shifts,
            teachers,
            subjects,
            schedules,
            class_groups,
            class_allocations,
            teacher_schedules,
        })
    }
}

/// Non-fatal completeness check: one descriptive violation per empty
/// collection the solver cannot work without. An empty list means the
/// snapshot is usable.
pub fn validate(data: &TimetableInputData) -> Vec<String> {
    let mut errors = Vec::new();

    if data.classrooms.is_empty() {
        errors.push("Nenhuma sala cadastrada no sistema".to_string());
    }
    if data.teachers.is_empty() {
        errors.push("Nenhum professor cadastrado no sistema".to_string());
    }
    if data.schedules.is_empty() {
        errors.push("Nenhum horário cadastrado no sistema".to_string());
    }
    if data.class_allocations.is_empty() {
        errors.push("Nenhuma alocação pendente para otimizar".to_string());
    }
    if data.subjects.is_empty() {
        errors.push("Nenhuma disciplina cadastrada no sistema".to_string());
    }
    if data.class_groups.is_empty() {
        errors.push("Nenhuma turma cadastrada no sistema".to_string());
    }

    errors
}
