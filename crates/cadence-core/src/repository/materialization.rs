use crate::error::CoreError;
use crate::models::{CommitOutcome, DayPriority, RecurrenceRule, TaskInstance};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};
use uuid::Uuid;

#[async_trait]
impl super::RuleSource for SqliteRepository {
    async fn list_active_rules(&self, owner: Option<&str>) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rules = sqlx::query_as(
            r#"SELECT * FROM recurrence_rules
            WHERE is_active = 1 AND ($1 IS NULL OR owner_id = $1)
            ORDER BY created_at, id"#,
        )
        .bind(owner)
        .fetch_all(self.pool())
        .await?;
        Ok(rules)
    }

    async fn existing_instance_dates(&self, rule_id: Uuid, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, CoreError> {
        let dates = sqlx::query_scalar(
            r#"SELECT scheduled_date FROM tasks
            WHERE source_rule_id = $1 AND scheduled_date BETWEEN $2 AND $3
            ORDER BY scheduled_date"#,
        )
        .bind(rule_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(dates)
    }

    async fn day_priority_load(&self, owners: &[String], start: NaiveDate, end: NaiveDate) -> Result<Vec<DayPriority>, CoreError> {
        if owners.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT owner_id, scheduled_date, priority FROM tasks WHERE scheduled_date BETWEEN ");
        builder.push_bind(start);
        builder.push(" AND ");
        builder.push_bind(end);
        builder.push(" AND owner_id IN (");
        let mut separated = builder.separated(", ");
        for owner in owners {
            separated.push_bind(owner.as_str());
        }
        separated.push_unseparated(")");

        let load = builder.build_query_as().fetch_all(self.pool()).await?;
        Ok(load)
    }
}

#[async_trait]
impl super::CommitSink for SqliteRepository {
    async fn commit_instances(&self, rule_id: Uuid, instances: &[TaskInstance]) -> Result<CommitOutcome, CoreError> {
        if let Some(stray) = instances.iter().find(|i| i.source_rule_id != Some(rule_id)) {
            return Err(CoreError::InvalidInput(format!(
                "instance {} does not belong to rule {}",
                stray.id, rule_id
            )));
        }

        let lock = self.commit_lock(rule_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.insert_batch(rule_id, instances).await
        };
        self.release_commit_lock(rule_id, lock);
        let outcome = outcome?;

        if outcome.inserted > 0 || !outcome.conflicted.is_empty() {
            info!(
                rule_id = %rule_id,
                inserted = outcome.inserted,
                conflicted = outcome.conflicted.len(),
                "committed instance batch"
            );
        }
        Ok(outcome)
    }
}

impl SqliteRepository {
    async fn insert_batch(&self, rule_id: Uuid, instances: &[TaskInstance]) -> Result<CommitOutcome, CoreError> {
        let mut tx = self.pool().begin().await?;
        let mut outcome = CommitOutcome::default();

        for instance in instances {
            // A failed INSERT only rolls back its own statement, the rest of the batch stays in the transaction
            match Self::insert_task(&mut tx, instance).await {
                Ok(()) => outcome.inserted += 1,
                Err(CoreError::CommitConflict { date, .. }) => {
                    debug!(rule_id = %rule_id, %date, "instance already materialized by another writer");
                    outcome.conflicted.push(date);
                }
                Err(e) => return Err(e),
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }
}
