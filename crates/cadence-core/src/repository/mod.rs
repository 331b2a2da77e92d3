use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    CommitOutcome, DayPriority, NewTaskData, Priority, RecurrenceRule, RuleDraft, TaskInstance,
    UpdateRuleData,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// Domain modules
pub mod materialization;
pub mod rules;
pub mod tasks;

/// Domain-specific trait for recurrence rule management
#[async_trait]
pub trait RuleRepository {
    async fn create_rule(&self, draft: RuleDraft) -> Result<RecurrenceRule, CoreError>;
    async fn find_rule_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError>;
    async fn find_rules_by_short_id(&self, short_id: &str) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn find_rules_for_owner(&self, owner_id: &str, include_inactive: bool) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn update_rule(&self, id: Uuid, data: UpdateRuleData) -> Result<RecurrenceRule, CoreError>;
    /// Pauses or resumes a rule. Deactivation is also how rules are retired.
    async fn set_rule_active(&self, id: Uuid, active: bool) -> Result<RecurrenceRule, CoreError>;
}

/// Domain-specific trait for task instances, generated or manual
#[async_trait]
pub trait TaskRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<TaskInstance, CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<TaskInstance>, CoreError>;
    async fn find_tasks_by_short_id(&self, short_id: &str) -> Result<Vec<TaskInstance>, CoreError>;
    async fn find_tasks_for_date(&self, owner_id: &str, date: NaiveDate) -> Result<Vec<TaskInstance>, CoreError>;
    /// Every instance a rule has produced, oldest date first
    async fn find_tasks_for_rule(&self, rule_id: Uuid) -> Result<Vec<TaskInstance>, CoreError>;
    async fn complete_task(&self, id: Uuid) -> Result<TaskInstance, CoreError>;
    /// Explicit priority change on one task (e.g. "promote to MIT"); respects daily caps.
    async fn override_priority(&self, id: Uuid, priority: Priority) -> Result<TaskInstance, CoreError>;
}

/// Where the generation job reads rules and existing state from.
#[async_trait]
pub trait RuleSource {
    /// Active rules for one owner, or for everyone when `owner` is `None`.
    async fn list_active_rules(&self, owner: Option<&str>) -> Result<Vec<RecurrenceRule>, CoreError>;
    /// Dates in `[start, end]` that already have an instance of `rule_id`.
    async fn existing_instance_dates(&self, rule_id: Uuid, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, CoreError>;
    /// Priorities of every persisted task of `owners` in `[start, end]`.
    async fn day_priority_load(&self, owners: &[String], start: NaiveDate, end: NaiveDate) -> Result<Vec<DayPriority>, CoreError>;
}

/// Where the generation job writes instances to.
#[async_trait]
pub trait CommitSink {
    /// Inserts one rule's instances atomically. A (rule, date) pair that
    /// already exists is reported in `conflicted`, not as an error.
    async fn commit_instances(&self, rule_id: Uuid, instances: &[TaskInstance]) -> Result<CommitOutcome, CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository: RuleRepository + TaskRepository + RuleSource + CommitSink + Send + Sync {}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
    /// Serializes commits per rule inside this process
    commit_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            commit_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) fn commit_lock(&self, rule_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.commit_locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(rule_id).or_default().clone()
    }

    /// Drops the lock entry once no commit for the rule holds or awaits it,
    /// so the map only tracks rules with a commit in flight.
    pub(crate) fn release_commit_lock(&self, rule_id: Uuid, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let mut locks = match self.commit_locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        if locks.get(&rule_id).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(&rule_id);
        }
    }

    #[cfg(test)]
    fn tracked_commit_locks(&self) -> usize {
        self.commit_locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

impl Repository for SqliteRepository {}

/// Short ids are hex fragments of the UUID, with or without dashes. They match
/// either end of the ID: v7 IDs share their leading timestamp digits, so the
/// trailing random digits are what the CLI shows.
pub(crate) fn normalize_short_id(short_id: &str) -> Result<String, CoreError> {
    let normalized: String = short_id.chars().filter(|c| *c != '-').collect::<String>().to_lowercase();
    if normalized.len() < 2 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::InvalidInput(format!(
            "'{}' is not a valid short ID (at least 2 hex characters)",
            short_id
        )));
    }
    Ok(normalized)
}
