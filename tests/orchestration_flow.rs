//! End-to-end orchestration flow against a real database and a scripted
//! gateway. Requires a PostgreSQL instance; every test skips when
//! `TEST_DATABASE_URL` is not provided.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;

use timetabler_core::messaging::{MessageGateway, MessagingError, OptimizedAllocation};
use timetabler_core::models::task::{Task, TaskStatus, TaskType, TaskUpdate};
use timetabler_core::orchestration::{ReconcileOutcome, Reconciler};
use timetabler_core::{OptimizationOrchestrator, TimetablerError};

/// Gateway double: records request patterns and answers with one scripted
/// reply (or a transport error when none is scripted).
struct ScriptedGateway {
    reply: Mutex<Option<Result<Value, MessagingError>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    fn replying(reply: Value) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(Some(Ok(reply))),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(error: MessagingError) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(Some(Err(error))),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageGateway for ScriptedGateway {
    async fn emit(&self, _pattern: &str, _data: Value) -> Result<(), MessagingError> {
        Ok(())
    }

    async fn request(&self, pattern: &str, _data: Value) -> Result<Value, MessagingError> {
        self.requests.lock().unwrap().push(pattern.to_string());
        self.reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| {
                Err(MessagingError::Connection {
                    message: "no scripted reply".to_string(),
                })
            })
    }
}

async fn connect() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    Some(
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .expect("failed to connect to TEST_DATABASE_URL"),
    )
}

/// Both tests share one database, so they serialize on an advisory lock
/// held by a dedicated connection for the duration of the test.
async fn acquire_test_lock(pool: &PgPool) -> sqlx::pool::PoolConnection<sqlx::Postgres> {
    let mut conn = pool.acquire().await.expect("acquire lock connection");
    sqlx::query("SELECT pg_advisory_lock(420042)")
        .execute(&mut *conn)
        .await
        .expect("advisory lock");
    conn
}

async fn release_test_lock(conn: &mut sqlx::pool::PoolConnection<sqlx::Postgres>) {
    sqlx::query("SELECT pg_advisory_unlock(420042)")
        .execute(&mut **conn)
        .await
        .expect("advisory unlock");
}

async fn create_schema(pool: &PgPool) {
    let statements = [
        "CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            full_name VARCHAR NOT NULL,
            role VARCHAR NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS shifts (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS course_types (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS courses (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR NOT NULL,
            course_type_id BIGINT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS space_types (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS spaces (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR NOT NULL,
            floor BIGINT NOT NULL DEFAULT 0,
            capacity BIGINT NOT NULL DEFAULT 0,
            blocked BOOLEAN NOT NULL DEFAULT false,
            space_type_id BIGINT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS subjects (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR NOT NULL,
            required_space_type_id BIGINT NOT NULL,
            course_id BIGINT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS schedules (
            id BIGSERIAL PRIMARY KEY,
            weekday VARCHAR NOT NULL,
            start_time VARCHAR NOT NULL,
            end_time VARCHAR NOT NULL,
            shift_id BIGINT
        )",
        "CREATE TABLE IF NOT EXISTS class_groups (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR NOT NULL,
            semester VARCHAR NOT NULL,
            module VARCHAR NOT NULL,
            student_count BIGINT NOT NULL DEFAULT 0,
            course_id BIGINT NOT NULL,
            shift_id BIGINT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS assignments (
            id BIGSERIAL PRIMARY KEY,
            schedule_id BIGINT,
            teacher_id BIGINT,
            subject_id BIGINT NOT NULL,
            space_id BIGINT,
            class_group_id BIGINT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP NOT NULL DEFAULT NOW()
        )",
        "CREATE TABLE IF NOT EXISTS assignment_schedules (
            id BIGSERIAL PRIMARY KEY,
            assignment_id BIGINT NOT NULL,
            schedule_id BIGINT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS schedule_teachers (
            id BIGSERIAL PRIMARY KEY,
            schedule_id BIGINT NOT NULL,
            teacher_id BIGINT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS tasks (
            id BIGSERIAL PRIMARY KEY,
            correlation_id VARCHAR NOT NULL UNIQUE,
            task_type VARCHAR NOT NULL,
            status VARCHAR NOT NULL DEFAULT 'PROCESSING',
            progress INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP NOT NULL DEFAULT NOW()
        )",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await.expect("schema");
    }
}

async fn reset_data(pool: &PgPool) {
    sqlx::query(
        "TRUNCATE users, shifts, course_types, courses, space_types, spaces, subjects, \
         schedules, class_groups, assignments, assignment_schedules, schedule_teachers, tasks",
    )
    .execute(pool)
    .await
    .expect("truncate");
}

/// Two rooms, one teacher available on schedules {1, 2}, one pending
/// allocation (assignment 7) with no schedule or room.
async fn insert_fixture(pool: &PgPool) {
    let statements = [
        "INSERT INTO shifts (id, name) VALUES (1, 'Morning')",
        "INSERT INTO course_types (id, name) VALUES (1, 'Technical')",
        "INSERT INTO courses (id, name, course_type_id) VALUES (1, 'ADS', 1)",
        "INSERT INTO space_types (id, name) VALUES (1, 'Lab')",
        "INSERT INTO spaces (id, name, floor, capacity, blocked, space_type_id) VALUES \
            (1, 'A-201', 2, 40, false, 1), (2, 'B-101', 1, 40, false, 1)",
        "INSERT INTO users (id, full_name, role) VALUES (5, 'Ana Souza', 'teacher')",
        "INSERT INTO subjects (id, name, required_space_type_id, course_id) VALUES \
            (3, 'Databases', 1, 1)",
        "INSERT INTO schedules (id, weekday, start_time, end_time, shift_id) VALUES \
            (1, 'Monday', '09:00', '11:00', 1), (2, 'Monday', '11:00', '13:00', 1)",
        "INSERT INTO class_groups (id, name, semester, module, student_count, course_id, shift_id) \
            VALUES (1, 'ADS-1', '2025.2', '1', 30, 1, 1)",
        "INSERT INTO assignments (id, schedule_id, teacher_id, subject_id, space_id, class_group_id) \
            VALUES (7, NULL, 5, 3, NULL, 1)",
        "INSERT INTO schedule_teachers (schedule_id, teacher_id) VALUES (1, 5), (2, 5)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await.expect("fixture");
    }
}

async fn insert_pending_assignment(pool: &PgPool, id: i64) {
    sqlx::query(
        "INSERT INTO assignments (id, schedule_id, teacher_id, subject_id, space_id, class_group_id) \
         VALUES ($1, NULL, 5, 3, NULL, 1)",
    )
    .bind(id)
    .execute(pool)
    .await
    .expect("pending assignment");
}

async fn make_task(pool: &PgPool, correlation_id: &str) -> Task {
    Task::create(
        pool,
        correlation_id,
        TaskType::TimetableOptimization,
        TaskStatus::Processing,
    )
    .await
    .expect("create task")
}

fn solved_item(allocation_id: i64, classroom_id: i64, day: &str, hour: i64) -> Value {
    json!({
        "allocation_id": allocation_id,
        "class_group": {"id": 1, "name": "ADS-1", "course": "ADS", "shift": "Morning"},
        "subject": {"id": 3, "name": "Databases"},
        "teacher": {"id": 5, "name": "Ana Souza"},
        "classroom": {"id": classroom_id, "name": "B-101", "floor": 1},
        "time_slots": [{"day": day, "hour": hour}],
        "duration": 2
    })
}

fn slotless_item(allocation_id: i64) -> Value {
    let mut item = solved_item(allocation_id, 2, "Monday", 9);
    item["time_slots"] = json!([]);
    item
}

async fn pending_state(pool: &PgPool, id: i64) -> (Option<i64>, Option<i64>) {
    sqlx::query_as("SELECT schedule_id, space_id FROM assignments WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("assignment row")
}

fn success_reply() -> Value {
    json!({
        "status": "success",
        "message": "Optimization completed",
        "data": {
            "schedule": [{
                "allocation_id": 7,
                "class_group": {"id": 1, "name": "ADS-1", "course": "ADS", "shift": "Morning"},
                "subject": {"id": 3, "name": "Databases"},
                "teacher": {"id": 5, "name": "Ana Souza"},
                "classroom": {"id": 2, "name": "B-101", "floor": 1},
                "time_slots": [{"day": "Monday", "hour": 9}],
                "duration": 2
            }],
            "statistics": {
                "hard_constraints_satisfied": true,
                "hard_constraints_cost": 0.0,
                "total_allocations": 1
            }
        }
    })
}

#[tokio::test]
async fn optimization_run_lifecycle() {
    let Some(pool) = connect().await else {
        eprintln!("skipping: TEST_DATABASE_URL not provided");
        return;
    };
    let mut lock_conn = acquire_test_lock(&pool).await;
    create_schema(&pool).await;

    // Incomplete snapshot: the run fails before any dispatch and the
    // failure names the missing rooms.
    reset_data(&pool).await;
    let gateway = ScriptedGateway::unreachable();
    let orchestrator = OptimizationOrchestrator::new(pool.clone(), gateway.clone());
    let task = make_task(&pool, "lifecycle-validation").await;

    orchestrator.run_optimization(task.id).await;

    let task = Task::find_by_id(&pool, task.id).await.unwrap();
    assert_eq!(task.status(), TaskStatus::Failed);
    let message = task.error_message.expect("failed task carries a message");
    assert!(message.starts_with("Dados insuficientes:"), "{message}");
    assert!(message.contains("Nenhuma sala cadastrada no sistema"), "{message}");
    assert_eq!(gateway.request_count(), 0, "no dispatch on validation failure");

    // Transport failure: the task ends FAILED with a non-empty message,
    // never stuck in PROCESSING, and the assignment stays pending.
    reset_data(&pool).await;
    insert_fixture(&pool).await;
    let gateway = ScriptedGateway::failing(MessagingError::Timeout {
        operation: "request optimize_timetable".into(),
        timeout_seconds: 5,
    });
    let orchestrator = OptimizationOrchestrator::new(pool.clone(), gateway.clone());
    let task = make_task(&pool, "lifecycle-transport").await;

    orchestrator.run_optimization(task.id).await;

    let task = Task::find_by_id(&pool, task.id).await.unwrap();
    assert_eq!(task.status(), TaskStatus::Failed);
    assert!(!task.error_message.unwrap_or_default().is_empty());
    let (schedule_id, space_id): (Option<i64>, Option<i64>) =
        sqlx::query_as("SELECT schedule_id, space_id FROM assignments WHERE id = 7")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!((schedule_id, space_id), (None, None));

    // Solver error reply: FAILED with the solver's message.
    reset_data(&pool).await;
    insert_fixture(&pool).await;
    let gateway = ScriptedGateway::replying(json!({
        "status": "error",
        "message": "No feasible solution"
    }));
    let orchestrator = OptimizationOrchestrator::new(pool.clone(), gateway.clone());
    let task = make_task(&pool, "lifecycle-solver-error").await;

    orchestrator.run_optimization(task.id).await;

    let task = Task::find_by_id(&pool, task.id).await.unwrap();
    assert_eq!(task.status(), TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some("No feasible solution"));

    // Success: allocation 7 lands on schedule 1 (Monday 09) in room 2, the
    // task completes at progress 100, and the statistics add up.
    reset_data(&pool).await;
    insert_fixture(&pool).await;
    let gateway = ScriptedGateway::replying(success_reply());
    let orchestrator = OptimizationOrchestrator::new(pool.clone(), gateway.clone());
    let task = make_task(&pool, "lifecycle-success").await;

    orchestrator.run_optimization(task.id).await;

    let task = Task::find_by_id(&pool, task.id).await.unwrap();
    assert_eq!(task.status(), TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    assert_eq!(gateway.request_count(), 1);

    let (schedule_id, space_id): (Option<i64>, Option<i64>) =
        sqlx::query_as("SELECT schedule_id, space_id FROM assignments WHERE id = 7")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!((schedule_id, space_id), (Some(1), Some(2)));

    let stats = orchestrator.get_statistics().await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.optimized, 1);
    assert_eq!(stats.pending, 0);
    assert!((stats.optimization_rate - 100.0).abs() < f64::EPSILON);

    release_test_lock(&mut lock_conn).await;
}

#[tokio::test]
async fn reconciler_partial_results_and_rollback() {
    let Some(pool) = connect().await else {
        eprintln!("skipping: TEST_DATABASE_URL not provided");
        return;
    };
    let mut lock_conn = acquire_test_lock(&pool).await;
    create_schema(&pool).await;

    // Partial solver answer: allocation 7 resolves on Monday 09, allocation
    // 8's first slot matches no schedule row, and a slotless item is skipped
    // outright. The unmatched items stay pending without failing the batch.
    reset_data(&pool).await;
    insert_fixture(&pool).await;
    insert_pending_assignment(&pool, 8).await;
    insert_pending_assignment(&pool, 9).await;

    let reconciler = Reconciler::new(pool.clone());
    let items: Vec<OptimizedAllocation> = serde_json::from_value(json!([
        solved_item(7, 2, "Monday", 9),
        solved_item(8, 1, "Sunday", 23),
        slotless_item(9),
    ]))
    .unwrap();

    let outcome = reconciler.apply(&items).await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome {
            applied: 1,
            skipped: 2
        }
    );
    assert_eq!(pending_state(&pool, 7).await, (Some(1), Some(2)));
    assert_eq!(pending_state(&pool, 8).await, (None, None));
    assert_eq!(pending_state(&pool, 9).await, (None, None));

    // Mid-batch failure: with a room foreign key in place, the second item
    // names a nonexistent room, the update errors, and the first item's
    // already-executed write is rolled back with the rest of the batch.
    reset_data(&pool).await;
    insert_fixture(&pool).await;
    insert_pending_assignment(&pool, 8).await;
    sqlx::query("ALTER TABLE assignments DROP CONSTRAINT IF EXISTS assignments_space_id_fkey")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "ALTER TABLE assignments ADD CONSTRAINT assignments_space_id_fkey \
         FOREIGN KEY (space_id) REFERENCES spaces(id)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let items: Vec<OptimizedAllocation> = serde_json::from_value(json!([
        solved_item(7, 2, "Monday", 9),
        solved_item(8, 999, "Monday", 11),
    ]))
    .unwrap();

    let result = reconciler.apply(&items).await;
    assert!(
        matches!(result, Err(TimetablerError::Reconciliation(_))),
        "expected a reconciliation error, got {result:?}"
    );
    assert_eq!(pending_state(&pool, 7).await, (None, None), "rolled back");
    assert_eq!(pending_state(&pool, 8).await, (None, None));

    sqlx::query("ALTER TABLE assignments DROP CONSTRAINT assignments_space_id_fkey")
        .execute(&pool)
        .await
        .unwrap();

    release_test_lock(&mut lock_conn).await;
}

#[tokio::test]
async fn task_store_round_trip() {
    let Some(pool) = connect().await else {
        eprintln!("skipping: TEST_DATABASE_URL not provided");
        return;
    };
    let mut lock_conn = acquire_test_lock(&pool).await;
    create_schema(&pool).await;

    let correlation_id = format!("store-{}", uuid::Uuid::new_v4());
    let task = Task::create(
        &pool,
        &correlation_id,
        TaskType::TimetableOptimization,
        TaskStatus::Processing,
    )
    .await
    .unwrap();
    assert_eq!(task.status(), TaskStatus::Processing);
    assert_eq!(task.progress, 0);

    let task = Task::update_progress(&pool, task.id, 30).await.unwrap();
    assert_eq!(task.progress, 30);

    let found = Task::find_by_correlation_id(&pool, &correlation_id)
        .await
        .unwrap()
        .expect("task by correlation id");
    assert_eq!(found.id, task.id);

    let task = Task::mark_completed(&pool, task.id).await.unwrap();
    assert_eq!(task.status(), TaskStatus::Completed);
    assert_eq!(task.progress, 100);

    // Partial update: unset fields keep their stored values.
    let task = Task::update_status(
        &pool,
        task.id,
        TaskUpdate {
            status: Some(TaskStatus::Failed),
            progress: None,
            error_message: Some("operator override".into()),
        },
    )
    .await
    .unwrap();
    assert_eq!(task.status(), TaskStatus::Failed);
    assert_eq!(task.progress, 100, "progress untouched by the update");
    assert_eq!(task.error_message.as_deref(), Some("operator override"));

    let missing = Task::update_status(&pool, i64::MAX, TaskUpdate::default()).await;
    assert!(matches!(
        missing,
        Err(timetabler_core::TimetablerError::NotFound(_))
    ));

    let missing = Task::find_by_id(&pool, i64::MAX).await;
    assert!(matches!(
        missing,
        Err(timetabler_core::TimetablerError::NotFound(_))
    ));

    release_test_lock(&mut lock_conn).await;
}
