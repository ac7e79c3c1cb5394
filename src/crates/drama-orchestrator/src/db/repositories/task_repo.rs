//! Task repository for database operations
//!
//! Every status write is conditional on the current status, so concurrent
//! writers (a worker finishing, a caller cancelling) can never move a task
//! along an edge outside the state graph. A write that loses the race
//! affects zero rows and the caller decides what that means.

use crate::db::connection::DatabasePool;
use crate::db::models::TaskRecord;
use crate::TaskStatus;
use chrono::Utc;

/// Task repository for managing task database operations
pub struct TaskRepository;

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl TaskRepository {
    /// Insert a pending task
    ///
    /// # Arguments
    /// * `pool` - Database connection pool
    /// * `task_id` - Externally visible identifier
    /// * `kind` - Pipeline kind
    /// * `resource_ref` - Domain object the task is tied to, if known yet
    /// * `input` - Pipeline input as a JSON string
    pub async fn create(
        pool: &DatabasePool,
        task_id: &str,
        kind: &str,
        resource_ref: Option<&str>,
        input: Option<&str>,
    ) -> Result<TaskRecord, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query_as::<_, TaskRecord>(
            "INSERT INTO tasks (task_id, kind, resource_ref, status, progress, input, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, ?, ?, ?)
             RETURNING *",
        )
        .bind(task_id)
        .bind(kind)
        .bind(resource_ref)
        .bind(TaskStatus::Pending.as_str())
        .bind(input)
        .bind(&now)
        .bind(&now)
        .fetch_one(pool)
        .await
    }

    /// Get a task by its external id
    pub async fn get_by_task_id(
        pool: &DatabasePool,
        task_id: &str,
    ) -> Result<Option<TaskRecord>, sqlx::Error> {
        sqlx::query_as::<_, TaskRecord>("SELECT * FROM tasks WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }

    /// List tasks, newest first, optionally filtered by status and kind
    pub async fn list(
        pool: &DatabasePool,
        status: Option<&str>,
        kind: Option<&str>,
        limit: i64,
    ) -> Result<Vec<TaskRecord>, sqlx::Error> {
        sqlx::query_as::<_, TaskRecord>(
            "SELECT * FROM tasks
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR kind = ?2)
             ORDER BY id DESC
             LIMIT ?3",
        )
        .bind(status)
        .bind(kind)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// List tasks tied to a domain object, newest first
    pub async fn list_by_resource(
        pool: &DatabasePool,
        resource_ref: &str,
    ) -> Result<Vec<TaskRecord>, sqlx::Error> {
        sqlx::query_as::<_, TaskRecord>(
            "SELECT * FROM tasks WHERE resource_ref = ? ORDER BY id DESC",
        )
        .bind(resource_ref)
        .fetch_all(pool)
        .await
    }

    /// Move a task to `to` if its current status is one of `from`
    ///
    /// Progress only ever moves forward: a lower value than the stored one is
    /// ignored. `started_at` is stamped on the first move to running and
    /// `completed_at` on any move to a terminal status.
    ///
    /// # Returns
    /// Whether a row was updated
    pub async fn transition(
        pool: &DatabasePool,
        task_id: &str,
        from: &[TaskStatus],
        to: TaskStatus,
        progress: Option<i64>,
        message: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        if from.is_empty() {
            return Ok(false);
        }

        let now = Utc::now().to_rfc3339();
        let sql = format!(
            "UPDATE tasks SET
                status = ?,
                progress = MAX(progress, COALESCE(?, progress)),
                message = COALESCE(?, message),
                updated_at = ?,
                started_at = CASE WHEN ? = 'running' THEN COALESCE(started_at, ?) ELSE started_at END,
                completed_at = CASE WHEN ? IN ('completed', 'failed', 'cancelled') THEN ? ELSE completed_at END
             WHERE task_id = ? AND status IN ({})",
            placeholders(from.len())
        );

        let mut query = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(progress)
            .bind(message)
            .bind(&now)
            .bind(to.as_str())
            .bind(&now)
            .bind(to.as_str())
            .bind(&now)
            .bind(task_id);
        for status in from {
            query = query.bind(status.as_str());
        }

        let result = query.execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the pipeline result; running tasks only
    pub async fn complete(
        pool: &DatabasePool,
        task_id: &str,
        result: &str,
        message: &str,
    ) -> Result<bool, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let outcome = sqlx::query(
            "UPDATE tasks SET status = ?, progress = 100, result = ?, message = ?,
                 updated_at = ?, completed_at = ?
             WHERE task_id = ? AND status = ?",
        )
        .bind(TaskStatus::Completed.as_str())
        .bind(result)
        .bind(message)
        .bind(&now)
        .bind(&now)
        .bind(task_id)
        .bind(TaskStatus::Running.as_str())
        .execute(pool)
        .await?;

        Ok(outcome.rows_affected() > 0)
    }

    /// Record a failure; running tasks only, progress is left untouched
    pub async fn fail(
        pool: &DatabasePool,
        task_id: &str,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let outcome = sqlx::query(
            "UPDATE tasks SET status = ?, error_message = ?, message = ?,
                 updated_at = ?, completed_at = ?
             WHERE task_id = ? AND status = ?",
        )
        .bind(TaskStatus::Failed.as_str())
        .bind(error)
        .bind("failed")
        .bind(&now)
        .bind(&now)
        .bind(task_id)
        .bind(TaskStatus::Running.as_str())
        .execute(pool)
        .await?;

        Ok(outcome.rows_affected() > 0)
    }

    /// Point a non-terminal task at the domain object it produced
    pub async fn set_resource_ref(
        pool: &DatabasePool,
        task_id: &str,
        resource_ref: &str,
    ) -> Result<bool, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let outcome = sqlx::query(
            "UPDATE tasks SET resource_ref = ?, updated_at = ?
             WHERE task_id = ? AND status IN (?, ?)",
        )
        .bind(resource_ref)
        .bind(&now)
        .bind(task_id)
        .bind(TaskStatus::Pending.as_str())
        .bind(TaskStatus::Running.as_str())
        .execute(pool)
        .await?;

        Ok(outcome.rows_affected() > 0)
    }

    /// Count tasks by status
    pub async fn count_by_status(
        pool: &DatabasePool,
        status: TaskStatus,
    ) -> Result<i64, sqlx::Error> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(pool)
            .await?;

        Ok(result.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseConnection;

    async fn setup() -> DatabaseConnection {
        DatabaseConnection::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_task() {
        let db = setup().await;
        let task = TaskRepository::create(
            db.pool(),
            "task-1",
            "novel_parse",
            None,
            Some(r#"{"file_path":"a.txt"}"#),
        )
        .await
        .unwrap();

        assert_eq!(task.task_id, "task-1");
        assert_eq!(task.status, "pending");
        assert_eq!(task.progress, 0);
        assert!(task.started_at.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_task_id_rejected() {
        let db = setup().await;
        TaskRepository::create(db.pool(), "dup", "novel_parse", None, None)
            .await
            .unwrap();
        assert!(TaskRepository::create(db.pool(), "dup", "novel_parse", None, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_get_missing_task() {
        let db = setup().await;
        let fetched = TaskRepository::get_by_task_id(db.pool(), "nope").await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn test_transition_respects_source_states() {
        let db = setup().await;
        TaskRepository::create(db.pool(), "t", "novel_parse", None, None)
            .await
            .unwrap();

        // pending -> completed is not allowed
        let moved = TaskRepository::transition(
            db.pool(),
            "t",
            &[TaskStatus::Running],
            TaskStatus::Completed,
            Some(100),
            None,
        )
        .await
        .unwrap();
        assert!(!moved);

        let moved = TaskRepository::transition(
            db.pool(),
            "t",
            &[TaskStatus::Pending],
            TaskStatus::Running,
            Some(0),
            Some("claimed"),
        )
        .await
        .unwrap();
        assert!(moved);

        let task = TaskRepository::get_by_task_id(db.pool(), "t")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.status, "running");
        assert_eq!(task.message.as_deref(), Some("claimed"));
        assert!(task.started_at.is_some());
        assert!(task.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let db = setup().await;
        TaskRepository::create(db.pool(), "t", "novel_parse", None, None)
            .await
            .unwrap();
        let running = [TaskStatus::Pending, TaskStatus::Running];

        TaskRepository::transition(db.pool(), "t", &running, TaskStatus::Running, Some(40), None)
            .await
            .unwrap();
        TaskRepository::transition(db.pool(), "t", &running, TaskStatus::Running, Some(25), None)
            .await
            .unwrap();

        let task = TaskRepository::get_by_task_id(db.pool(), "t")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.progress, 40);
    }

    #[tokio::test]
    async fn test_complete_and_fail_require_running() {
        let db = setup().await;
        TaskRepository::create(db.pool(), "t", "novel_parse", None, None)
            .await
            .unwrap();

        assert!(!TaskRepository::complete(db.pool(), "t", "{}", "done").await.unwrap());
        assert!(!TaskRepository::fail(db.pool(), "t", "boom").await.unwrap());

        TaskRepository::transition(
            db.pool(),
            "t",
            &[TaskStatus::Pending],
            TaskStatus::Running,
            Some(55),
            None,
        )
        .await
        .unwrap();
        assert!(TaskRepository::fail(db.pool(), "t", "boom").await.unwrap());

        let task = TaskRepository::get_by_task_id(db.pool(), "t")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.status, "failed");
        assert_eq!(task.progress, 55);
        assert_eq!(task.error_message.as_deref(), Some("boom"));
        assert!(task.completed_at.is_some());

        // terminal: nothing moves any more
        assert!(!TaskRepository::complete(db.pool(), "t", "{}", "done").await.unwrap());
        assert!(!TaskRepository::set_resource_ref(db.pool(), "t", "drama:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_by_resource_and_filters() {
        let db = setup().await;
        TaskRepository::create(db.pool(), "a", "background_extraction", Some("episode:7"), None)
            .await
            .unwrap();
        TaskRepository::create(db.pool(), "b", "background_extraction", Some("episode:7"), None)
            .await
            .unwrap();
        TaskRepository::create(db.pool(), "c", "novel_parse", None, None)
            .await
            .unwrap();

        let tasks = TaskRepository::list_by_resource(db.pool(), "episode:7").await.unwrap();
        let ids: Vec<_> = tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let parses = TaskRepository::list(db.pool(), None, Some("novel_parse"), 10)
            .await
            .unwrap();
        assert_eq!(parses.len(), 1);

        let pending = TaskRepository::list(db.pool(), Some("pending"), None, 2)
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);

        assert_eq!(
            TaskRepository::count_by_status(db.pool(), TaskStatus::Pending)
                .await
                .unwrap(),
            3
        );
    }
}
