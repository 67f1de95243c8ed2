//! # Reference Catalog
//!
//! Read-only queries over the scheduling reference collections: space
//! types, classrooms, course types, courses, shifts, teachers, subjects,
//! time schedules, class groups, and teacher availability. The snapshot
//! collector reads each collection in full with a deterministic order so
//! that two collections without intervening writes are identical.
//!
//! These rows double as wire payload: the serialized field names are part
//! of the solver contract.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::Result;

/// Kind of physical space a subject can require (lab, auditorium, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SpaceType {
    pub id: i64,
    pub name: String,
}

/// A physical room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Space {
    pub id: i64,
    pub name: String,
    pub floor: i64,
    pub capacity: i64,
    pub blocked: bool,
    pub space_type_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CourseType {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub course_type_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Shift {
    pub id: i64,
    pub name: String,
}

/// A teaching user. Sourced from the `users` table filtered to the
/// `teacher` role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Teacher {
    pub id: i64,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub required_space_type_id: i64,
    pub course_id: i64,
}

/// One weekly time slot. `start_time`/`end_time` are `HH:MM` strings.
///
/// `shift_id` ties the slot to a shift so assignments can be checked
/// against their class group's shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Schedule {
    pub id: i64,
    pub weekday: String,
    pub start_time: String,
    pub end_time: String,
    pub shift_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ClassGroup {
    pub id: i64,
    pub name: String,
    pub semester: String,
    pub module: String,
    pub student_count: i64,
    pub course_id: i64,
    pub shift_id: i64,
}

/// One declared teacher-availability entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TeacherAvailability {
    pub teacher_id: i64,
    pub schedule_id: i64,
}

/// Fixed Monday-through-Sunday ranking used wherever schedules are ordered.
const WEEKDAY_ORDER: &str = "CASE weekday \
    WHEN 'Monday' THEN 1 \
    WHEN 'Tuesday' THEN 2 \
    WHEN 'Wednesday' THEN 3 \
    WHEN 'Thursday' THEN 4 \
    WHEN 'Friday' THEN 5 \
    WHEN 'Saturday' THEN 6 \
    WHEN 'Sunday' THEN 7 \
    END";

impl SpaceType {
    pub async fn list(pool: &PgPool) -> Result<Vec<SpaceType>> {
        Ok(
            sqlx::query_as::<_, SpaceType>("SELECT id, name FROM space_types ORDER BY name ASC")
                .fetch_all(pool)
                .await?,
        )
    }
}

impl Space {
    pub async fn list(pool: &PgPool) -> Result<Vec<Space>> {
        Ok(sqlx::query_as::<_, Space>(
            "SELECT id, name, floor, capacity, blocked, space_type_id \
             FROM spaces ORDER BY name ASC",
        )
        .fetch_all(pool)
        .await?)
    }
}

impl CourseType {
    pub async fn list(pool: &PgPool) -> Result<Vec<CourseType>> {
        Ok(
            sqlx::query_as::<_, CourseType>("SELECT id, name FROM course_types ORDER BY name ASC")
                .fetch_all(pool)
                .await?,
        )
    }
}

impl Course {
    pub async fn list(pool: &PgPool) -> Result<Vec<Course>> {
        Ok(sqlx::query_as::<_, Course>(
            "SELECT id, name, course_type_id FROM courses ORDER BY name ASC",
        )
        .fetch_all(pool)
        .await?)
    }
}

impl Shift {
    pub async fn list(pool: &PgPool) -> Result<Vec<Shift>> {
        Ok(
            sqlx::query_as::<_, Shift>("SELECT id, name FROM shifts ORDER BY name ASC")
                .fetch_all(pool)
                .await?,
        )
    }
}

impl Teacher {
    pub async fn list(pool: &PgPool) -> Result<Vec<Teacher>> {
        Ok(sqlx::query_as::<_, Teacher>(
            "SELECT id, full_name FROM users WHERE role = 'teacher' ORDER BY full_name ASC",
        )
        .fetch_all(pool)
        .await?)
    }
}

impl Subject {
    pub async fn list(pool: &PgPool) -> Result<Vec<Subject>> {
        Ok(sqlx::query_as::<_, Subject>(
            "SELECT id, name, required_space_type_id, course_id \
             FROM subjects ORDER BY name ASC",
        )
        .fetch_all(pool)
        .await?)
    }
}

impl Schedule {
    /// Schedules ordered by weekday rank, then start time.
    pub async fn list(pool: &PgPool) -> Result<Vec<Schedule>> {
        let query = format!(
            "SELECT id, weekday, start_time, end_time, shift_id \
             FROM schedules ORDER BY {WEEKDAY_ORDER} ASC, start_time ASC"
        );
        Ok(sqlx::query_as::<_, Schedule>(&query).fetch_all(pool).await?)
    }

    /// Schedules (with shift) for a set of assignments, via the
    /// `assignment_schedules` join table. Returned as
    /// (assignment_id, schedule) pairs.
    pub async fn list_for_assignments(pool: &PgPool) -> Result<Vec<(i64, Schedule)>> {
        #[derive(FromRow)]
        struct Row {
            assignment_id: i64,
            id: i64,
            weekday: String,
            start_time: String,
            end_time: String,
            shift_id: Option<i64>,
        }

        let rows = sqlx::query_as::<_, Row>(
            "SELECT links.assignment_id, s.id, s.weekday, s.start_time, s.end_time, s.shift_id \
             FROM assignment_schedules links \
             JOIN schedules s ON s.id = links.schedule_id \
             ORDER BY links.assignment_id ASC, s.id ASC",
        )
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.assignment_id,
                    Schedule {
                        id: r.id,
                        weekday: r.weekday,
                        start_time: r.start_time,
                        end_time: r.end_time,
                        shift_id: r.shift_id,
                    },
                )
            })
            .collect())
    }
}

impl ClassGroup {
    pub async fn list(pool: &PgPool) -> Result<Vec<ClassGroup>> {
        Ok(sqlx::query_as::<_, ClassGroup>(
            "SELECT id, name, semester, module, student_count, course_id, shift_id \
             FROM class_groups ORDER BY name ASC",
        )
        .fetch_all(pool)
        .await?)
    }
}

impl TeacherAvailability {
    /// All availability entries for teaching users, ordered by teacher then
    /// schedule id. The snapshot collector groups these into the
    /// teacher -> schedule-ids map.
    pub async fn list(pool: &PgPool) -> Result<Vec<TeacherAvailability>> {
        Ok(sqlx::query_as::<_, TeacherAvailability>(
            "SELECT st.teacher_id, st.schedule_id \
             FROM schedule_teachers st \
             JOIN users u ON u.id = st.teacher_id AND u.role = 'teacher' \
             ORDER BY st.teacher_id ASC, st.schedule_id ASC",
        )
        .fetch_all(pool)
        .await?)
    }
}
