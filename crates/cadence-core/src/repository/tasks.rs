use crate::error::CoreError;
use crate::models::{NewTaskData, Priority, TaskInstance};
use crate::repository::{normalize_short_id, SqliteRepository};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Sqlite, Transaction};
use tracing::info;
use uuid::Uuid;

const PRIORITY_ORDER: &str = "CASE priority WHEN 'MIT' THEN 0 WHEN 'PRIMARY' THEN 1 ELSE 2 END";

#[async_trait]
impl super::TaskRepository for SqliteRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<TaskInstance, CoreError> {
        if data.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("title must not be empty".to_string()));
        }
        if matches!(data.estimated_minutes, Some(m) if m <= 0) {
            return Err(CoreError::InvalidInput(
                "estimated minutes must be a positive integer".to_string(),
            ));
        }

        let mut tx = self.pool().begin().await?;
        Self::ensure_room(&mut tx, &data.owner_id, data.scheduled_date, data.priority, None).await?;

        let now = Utc::now();
        let task = TaskInstance {
            id: Uuid::now_v7(),
            owner_id: data.owner_id,
            source_rule_id: None,
            scheduled_date: data.scheduled_date,
            title: data.title.trim().to_string(),
            description: data.description,
            priority: data.priority,
            estimated_minutes: data.estimated_minutes,
            linked_goal_id: data.linked_goal_id,
            completed: false,
            completed_at: None,
            priority_downgraded: false,
            created_at: now,
            updated_at: now,
        };
        Self::insert_task(&mut tx, &task).await?;

        tx.commit().await?;
        Ok(task)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<TaskInstance>, CoreError> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    async fn find_tasks_by_short_id(&self, short_id: &str) -> Result<Vec<TaskInstance>, CoreError> {
        let fragment = normalize_short_id(short_id)?;
        let tasks = sqlx::query_as("SELECT * FROM tasks WHERE lower(hex(id)) LIKE $1 || '%' OR lower(hex(id)) LIKE '%' || $1")
            .bind(fragment)
            .fetch_all(self.pool())
            .await?;
        Ok(tasks)
    }

    async fn find_tasks_for_date(&self, owner_id: &str, date: NaiveDate) -> Result<Vec<TaskInstance>, CoreError> {
        let sql = format!(
            "SELECT * FROM tasks WHERE owner_id = $1 AND scheduled_date = $2 ORDER BY {}, created_at",
            PRIORITY_ORDER
        );
        let tasks = sqlx::query_as(&sql)
            .bind(owner_id)
            .bind(date)
            .fetch_all(self.pool())
            .await?;
        Ok(tasks)
    }

    async fn find_tasks_for_rule(&self, rule_id: Uuid) -> Result<Vec<TaskInstance>, CoreError> {
        let tasks = sqlx::query_as("SELECT * FROM tasks WHERE source_rule_id = $1 ORDER BY scheduled_date")
            .bind(rule_id)
            .fetch_all(self.pool())
            .await?;
        Ok(tasks)
    }

    async fn complete_task(&self, id: Uuid) -> Result<TaskInstance, CoreError> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"UPDATE tasks
            SET completed = 1, completed_at = COALESCE(completed_at, $1), updated_at = $1
            WHERE id = $2"#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(id.to_string()));
        }

        let task = Self::fetch_task(&mut tx, id).await?;
        tx.commit().await?;
        Ok(task)
    }

    async fn override_priority(&self, id: Uuid, priority: Priority) -> Result<TaskInstance, CoreError> {
        let mut tx = self.pool().begin().await?;

        let task: TaskInstance = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        if task.priority == priority {
            return Ok(task);
        }
        Self::ensure_room(&mut tx, &task.owner_id, task.scheduled_date, priority, Some(id)).await?;

        // An explicit choice supersedes any generation-time downgrade
        sqlx::query("UPDATE tasks SET priority = $1, priority_downgraded = 0, updated_at = $2 WHERE id = $3")
            .bind(priority)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let updated = Self::fetch_task(&mut tx, id).await?;
        tx.commit().await?;
        info!(task_id = %id, from = %task.priority, to = %priority, "priority overridden");
        Ok(updated)
    }
}

impl SqliteRepository {
    async fn fetch_task<'a>(tx: &mut Transaction<'a, Sqlite>, id: Uuid) -> Result<TaskInstance, CoreError> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(task)
    }

    /// Rejects a task that would break the daily cap of its tier.
    async fn ensure_room<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        owner_id: &str,
        date: NaiveDate,
        priority: Priority,
        exclude: Option<Uuid>,
    ) -> Result<(), CoreError> {
        let Some(cap) = priority.daily_cap() else {
            return Ok(());
        };

        let (taken,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM tasks
            WHERE owner_id = $1 AND scheduled_date = $2 AND priority = $3
            AND ($4 IS NULL OR id != $4)"#,
        )
        .bind(owner_id)
        .bind(date)
        .bind(priority)
        .bind(exclude)
        .fetch_one(&mut **tx)
        .await?;

        if taken as usize >= cap {
            return Err(CoreError::PriorityCapExceeded { date, priority });
        }
        Ok(())
    }

    /// Plain insert; a duplicate (rule, date) pair surfaces as `CommitConflict`.
    pub(crate) async fn insert_task<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task: &TaskInstance,
    ) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"INSERT INTO tasks (id, owner_id, source_rule_id, scheduled_date, title, description, priority, estimated_minutes, linked_goal_id, completed, completed_at, priority_downgraded, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
        )
        .bind(task.id)
        .bind(&task.owner_id)
        .bind(task.source_rule_id)
        .bind(task.scheduled_date)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority)
        .bind(task.estimated_minutes)
        .bind(&task.linked_goal_id)
        .bind(task.completed)
        .bind(task.completed_at)
        .bind(task.priority_downgraded)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                match task.source_rule_id {
                    Some(rule_id) => Err(CoreError::CommitConflict { rule_id, date: task.scheduled_date }),
                    None => Err(CoreError::Database(sqlx::Error::Database(db_err))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
