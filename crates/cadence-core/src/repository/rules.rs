use crate::error::CoreError;
use crate::models::{RecurrenceRule, RuleDraft, UpdateRuleData};
use crate::repository::{normalize_short_id, SqliteRepository};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::info;
use uuid::Uuid;

#[async_trait]
impl super::RuleRepository for SqliteRepository {
    async fn create_rule(&self, draft: RuleDraft) -> Result<RecurrenceRule, CoreError> {
        draft.validate()?;

        let now = Utc::now();
        let rule = RecurrenceRule {
            id: Uuid::now_v7(),
            owner_id: draft.owner_id.trim().to_string(),
            title: draft.title.trim().to_string(),
            description: draft.description.clone(),
            priority: draft.priority,
            estimated_minutes: draft.estimated_minutes,
            linked_goal_id: draft.linked_goal_id.clone(),
            pattern: draft.pattern,
            days_of_week: draft.stored_days(),
            custom_interval_days: draft.stored_interval(),
            start_date: draft.start_date,
            end_date: draft.end_date,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO recurrence_rules (id, owner_id, title, description, priority, estimated_minutes, linked_goal_id, pattern, days_of_week, custom_interval_days, start_date, end_date, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"#,
        )
        .bind(rule.id)
        .bind(&rule.owner_id)
        .bind(&rule.title)
        .bind(&rule.description)
        .bind(rule.priority)
        .bind(rule.estimated_minutes)
        .bind(&rule.linked_goal_id)
        .bind(rule.pattern)
        .bind(&rule.days_of_week)
        .bind(rule.custom_interval_days)
        .bind(rule.start_date)
        .bind(rule.end_date)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(self.pool())
        .await?;

        info!(rule_id = %rule.id, owner = %rule.owner_id, pattern = %rule.pattern, "recurrence rule created");
        Ok(rule)
    }

    async fn find_rule_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError> {
        let rule = sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(rule)
    }

    async fn find_rules_by_short_id(&self, short_id: &str) -> Result<Vec<RecurrenceRule>, CoreError> {
        let fragment = normalize_short_id(short_id)?;
        let rules = sqlx::query_as("SELECT * FROM recurrence_rules WHERE lower(hex(id)) LIKE $1 || '%' OR lower(hex(id)) LIKE '%' || $1")
            .bind(fragment)
            .fetch_all(self.pool())
            .await?;
        Ok(rules)
    }

    async fn find_rules_for_owner(&self, owner_id: &str, include_inactive: bool) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rules = sqlx::query_as(
            r#"SELECT * FROM recurrence_rules
            WHERE owner_id = $1 AND (is_active = 1 OR $2)
            ORDER BY created_at, id"#,
        )
        .bind(owner_id)
        .bind(include_inactive)
        .fetch_all(self.pool())
        .await?;
        Ok(rules)
    }

    async fn update_rule(&self, id: Uuid, data: UpdateRuleData) -> Result<RecurrenceRule, CoreError> {
        let mut tx = self.pool().begin().await?;

        let current: RecurrenceRule = sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Rule with id {} not found", id)))?;

        // Validate the rule as it will look after the change
        let draft = data.apply_to(&current)?;
        draft.validate()?;

        sqlx::query(
            r#"UPDATE recurrence_rules
            SET title = $1, description = $2, priority = $3, estimated_minutes = $4, linked_goal_id = $5,
                pattern = $6, days_of_week = $7, custom_interval_days = $8, start_date = $9, end_date = $10,
                updated_at = $11
            WHERE id = $12"#,
        )
        .bind(draft.title.trim())
        .bind(&draft.description)
        .bind(draft.priority)
        .bind(draft.estimated_minutes)
        .bind(&draft.linked_goal_id)
        .bind(draft.pattern)
        .bind(draft.stored_days())
        .bind(draft.stored_interval())
        .bind(draft.start_date)
        .bind(draft.end_date)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let updated = Self::fetch_rule(&mut tx, id).await?;
        tx.commit().await?;
        info!(rule_id = %id, "recurrence rule updated; existing instances left unchanged");
        Ok(updated)
    }

    async fn set_rule_active(&self, id: Uuid, active: bool) -> Result<RecurrenceRule, CoreError> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query("UPDATE recurrence_rules SET is_active = $1, updated_at = $2 WHERE id = $3")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Rule with id {} not found", id)));
        }

        let rule = Self::fetch_rule(&mut tx, id).await?;
        tx.commit().await?;

        info!(rule_id = %id, active, "recurrence rule {}", if active { "resumed" } else { "paused" });
        Ok(rule)
    }
}

impl SqliteRepository {
    /// Re-reads a rule inside the transaction that just wrote it.
    async fn fetch_rule<'a>(tx: &mut Transaction<'a, Sqlite>, id: Uuid) -> Result<RecurrenceRule, CoreError> {
        let rule = sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(rule)
    }
}
