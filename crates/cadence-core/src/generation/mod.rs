//! The generation job: rules in, exactly-once task instances out.
//!
//! A run walks `Idle → LoadingRules → Expanding → Reconciling → Committing → Idle`.
//! Per-rule problems are collected into the report and never stop other
//! rules; only storage failures move the job to `Failed`.

pub mod constraints;
pub mod guard;

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calendar::days_between;
use crate::error::CoreError;
use crate::models::{GenerationConfig, Priority, RecurrenceRule, TaskInstance};
use crate::recurrence::Schedule;
use crate::repository::{CommitSink, RuleSource};

use constraints::PriorityLedger;
use guard::missing_dates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Idle,
    LoadingRules,
    Expanding,
    Reconciling,
    Committing,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => write!(f, "idle"),
            JobState::LoadingRules => write!(f, "loading-rules"),
            JobState::Expanding => write!(f, "expanding"),
            JobState::Reconciling => write!(f, "reconciling"),
            JobState::Committing => write!(f, "committing"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// A priority lowered at generation time to respect a daily cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Downgrade {
    pub instance_id: Uuid,
    pub rule_id: Uuid,
    pub date: NaiveDate,
    pub from: Priority,
    pub to: Priority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub rule_id: Uuid,
    pub error: String,
}

/// Outcome of one run, for logs and the surrounding UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub created: usize,
    /// Dates that already had an instance, including racing inserts
    pub skipped: usize,
    pub downgraded: Vec<Downgrade>,
    pub per_rule_errors: Vec<RuleFailure>,
    /// True when the run stopped early on request; committed rules stay committed
    pub cancelled: bool,
}

/// One rule's work after reconciliation, ready to commit.
#[derive(Debug)]
struct PlannedBatch {
    rule_id: Uuid,
    instances: Vec<TaskInstance>,
    downgrades: Vec<Downgrade>,
}

/// Orchestrates a generation run against a rule source and a commit sink.
pub struct GenerationJob<'a, R> {
    store: &'a R,
    config: GenerationConfig,
    state: JobState,
    transitions: Vec<JobState>,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a, R> GenerationJob<'a, R>
where
    R: RuleSource + CommitSink + Sync,
{
    pub fn new(store: &'a R, config: GenerationConfig) -> Self {
        Self {
            store,
            config,
            state: JobState::Idle,
            transitions: Vec::new(),
            cancel: None,
        }
    }

    /// Lets the caller stop the run between rules by sending `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state entered during the most recent run, in order.
    pub fn transitions(&self) -> &[JobState] {
        &self.transitions
    }

    fn enter(&mut self, next: JobState) {
        debug!(from = %self.state, to = %next, "generation job transition");
        self.state = next;
        self.transitions.push(next);
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Fails the run on storage errors, otherwise hands the error back for
    /// per-rule reporting.
    fn absorb(&mut self, rule_id: Uuid, err: CoreError, report: &mut GenerationReport) -> Result<(), CoreError> {
        if err.is_infrastructure() {
            self.enter(JobState::Failed);
            return Err(err);
        }
        warn!(rule_id = %rule_id, error = %err, "rule skipped in this run");
        report.per_rule_errors.push(RuleFailure { rule_id, error: err.to_string() });
        Ok(())
    }

    /// Runs generation for one owner, or for every owner when `owner` is `None`.
    ///
    /// # Arguments
    /// * `owner` - Restrict the run to this owner's rules
    /// * `range_start` - First date to materialize (inclusive)
    /// * `range_end` - Last date to materialize (inclusive)
    ///
    /// # Returns
    /// * `Result<GenerationReport, CoreError>` - Counts, downgrades and per-rule
    ///   errors; `Err` only for a malformed window or a storage failure
    ///
    /// # Behavior
    /// - Rules are processed oldest first so collisions resolve the same way
    ///   on every run
    /// - Instances already present for a (rule, date) pair are skipped, so
    ///   replaying any window is harmless
    /// - Each rule commits in its own transaction; a failure leaves the rules
    ///   committed before it intact
    #[tracing::instrument(skip(self), fields(owner = owner.unwrap_or("*")))]
    pub async fn run(
        &mut self,
        owner: Option<&str>,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Result<GenerationReport, CoreError> {
        self.transitions.clear();
        self.state = JobState::Idle;

        if range_end < range_start {
            return Err(CoreError::InvalidRange { start: range_start, end: range_end });
        }
        let window_days = days_between(range_start, range_end) + 1;
        if window_days > i64::from(self.config.max_window_days) {
            return Err(CoreError::InvalidInput(format!(
                "generation window of {} days exceeds the limit of {} days",
                window_days, self.config.max_window_days
            )));
        }

        let mut report = GenerationReport::default();

        // Loading rules
        self.enter(JobState::LoadingRules);
        let mut rules = match self.store.list_active_rules(owner).await {
            Ok(rules) => rules,
            Err(e) => {
                self.enter(JobState::Failed);
                return Err(e);
            }
        };
        rules.retain(|r| r.is_active);
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        if rules.is_empty() {
            self.enter(JobState::Idle);
            info!("no active recurrence rules");
            return Ok(report);
        }

        // Expanding
        self.enter(JobState::Expanding);
        let mut expanded: Vec<(RecurrenceRule, BTreeSet<NaiveDate>)> = Vec::with_capacity(rules.len());
        for rule in rules {
            let expansion = Schedule::from_rule(&rule).and_then(|s| s.expand(range_start, range_end));
            match expansion {
                Ok(expansion) => {
                    debug!(
                        rule_id = %rule.id,
                        examined = expansion.examined,
                        candidates = expansion.dates.len(),
                        "rule expanded"
                    );
                    expanded.push((rule, expansion.dates));
                }
                Err(e) => self.absorb(rule.id, e, &mut report)?,
            }
        }

        // Reconciling
        self.enter(JobState::Reconciling);
        let batches = self.reconcile(expanded, range_start, range_end, &mut report).await?;

        // Committing
        self.enter(JobState::Committing);
        for batch in batches {
            if self.cancelled() {
                info!("generation cancelled between rules");
                report.cancelled = true;
                break;
            }
            if batch.instances.is_empty() {
                continue;
            }

            match self.store.commit_instances(batch.rule_id, &batch.instances).await {
                Ok(outcome) => {
                    report.created += outcome.inserted;
                    report.skipped += outcome.conflicted.len();
                    report.downgraded.extend(
                        batch
                            .downgrades
                            .into_iter()
                            .filter(|d| !outcome.conflicted.contains(&d.date)),
                    );
                }
                Err(e) => self.absorb(batch.rule_id, e, &mut report)?,
            }
        }

        self.enter(JobState::Idle);
        info!(
            created = report.created,
            skipped = report.skipped,
            downgraded = report.downgraded.len(),
            failed_rules = report.per_rule_errors.len(),
            cancelled = report.cancelled,
            "generation run finished"
        );
        Ok(report)
    }

    /// Idempotency guard and priority caps, rule by rule in creation order.
    async fn reconcile(
        &mut self,
        expanded: Vec<(RecurrenceRule, BTreeSet<NaiveDate>)>,
        range_start: NaiveDate,
        range_end: NaiveDate,
        report: &mut GenerationReport,
    ) -> Result<Vec<PlannedBatch>, CoreError> {
        let mut owners: Vec<String> = expanded.iter().map(|(r, _)| r.owner_id.clone()).collect();
        owners.sort();
        owners.dedup();

        let persisted = match self.store.day_priority_load(&owners, range_start, range_end).await {
            Ok(load) => load,
            Err(e) => {
                self.enter(JobState::Failed);
                return Err(e);
            }
        };
        let mut ledger = PriorityLedger::seeded(persisted);

        let mut batches = Vec::with_capacity(expanded.len());

        for (rule, candidates) in expanded {
            if candidates.is_empty() {
                continue;
            }

            let existing = match self.store.existing_instance_dates(rule.id, range_start, range_end).await {
                Ok(dates) => dates,
                Err(e) => {
                    self.absorb(rule.id, e, report)?;
                    continue;
                }
            };
            let missing = missing_dates(&candidates, &existing);
            report.skipped += candidates.len() - missing.len();

            let mut instances = Vec::with_capacity(missing.len());
            let mut downgrades = Vec::new();
            for date in missing {
                let admission = ledger.admit(&rule.owner_id, date, rule.priority);
                let mut instance = TaskInstance::from_rule(&rule, date);

                if admission.downgraded() {
                    instance.priority = admission.granted;
                    instance.priority_downgraded = true;
                    warn!(
                        rule_id = %rule.id,
                        date = %date,
                        from = %admission.requested,
                        to = %admission.granted,
                        "priority conflict resolved by downgrade"
                    );
                    downgrades.push(Downgrade {
                        instance_id: instance.id,
                        rule_id: rule.id,
                        date,
                        from: admission.requested,
                        to: admission.granted,
                    });
                }
                instances.push(instance);
            }

            batches.push(PlannedBatch { rule_id: rule.id, instances, downgrades });
        }

        debug!(batches = batches.len(), "reconciled against existing instances");
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitOutcome, DayPriority, RecurrencePattern};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn rule(title: &str, priority: Priority, age_minutes: i64) -> RecurrenceRule {
        let created = Utc::now() - Duration::minutes(age_minutes);
        RecurrenceRule {
            id: Uuid::now_v7(),
            owner_id: "ana".to_string(),
            title: title.to_string(),
            description: None,
            priority,
            estimated_minutes: Some(25),
            linked_goal_id: None,
            pattern: RecurrencePattern::Daily,
            days_of_week: None,
            custom_interval_days: None,
            start_date: date(1),
            end_date: None,
            is_active: true,
            created_at: created,
            updated_at: created,
        }
    }

    /// In-memory stand-in for the SQLite repository.
    #[derive(Default)]
    struct MemoryStore {
        rules: Vec<RecurrenceRule>,
        tasks: Mutex<Vec<TaskInstance>>,
        fail_loading: bool,
        reject_rule: Option<Uuid>,
    }

    #[async_trait]
    impl RuleSource for MemoryStore {
        async fn list_active_rules(&self, owner: Option<&str>) -> Result<Vec<RecurrenceRule>, CoreError> {
            if self.fail_loading {
                return Err(CoreError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(self
                .rules
                .iter()
                .filter(|r| r.is_active && owner.map_or(true, |o| r.owner_id == o))
                .cloned()
                .collect())
        }

        async fn existing_instance_dates(
            &self,
            rule_id: Uuid,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<NaiveDate>, CoreError> {
            Ok(self
                .tasks
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.source_rule_id == Some(rule_id))
                .filter(|t| t.scheduled_date >= start && t.scheduled_date <= end)
                .map(|t| t.scheduled_date)
                .collect())
        }

        async fn day_priority_load(
            &self,
            owners: &[String],
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<DayPriority>, CoreError> {
            Ok(self
                .tasks
                .lock()
                .unwrap()
                .iter()
                .filter(|t| owners.contains(&t.owner_id))
                .filter(|t| t.scheduled_date >= start && t.scheduled_date <= end)
                .map(|t| DayPriority {
                    owner_id: t.owner_id.clone(),
                    scheduled_date: t.scheduled_date,
                    priority: t.priority,
                })
                .collect())
        }
    }

    #[async_trait]
    impl CommitSink for MemoryStore {
        async fn commit_instances(&self, rule_id: Uuid, instances: &[TaskInstance]) -> Result<CommitOutcome, CoreError> {
            if self.reject_rule == Some(rule_id) {
                return Err(CoreError::InvalidInput("rejected by sink".to_string()));
            }
            let mut tasks = self.tasks.lock().unwrap();
            let mut outcome = CommitOutcome::default();
            for instance in instances {
                let duplicate = tasks
                    .iter()
                    .any(|t| t.source_rule_id == Some(rule_id) && t.scheduled_date == instance.scheduled_date);
                if duplicate {
                    outcome.conflicted.push(instance.scheduled_date);
                } else {
                    tasks.push(instance.clone());
                    outcome.inserted += 1;
                }
            }
            Ok(outcome)
        }
    }

    #[tokio::test]
    async fn test_empty_rule_set_returns_to_idle() {
        let store = MemoryStore::default();
        let mut job = GenerationJob::new(&store, GenerationConfig::default());
        let report = job.run(Some("ana"), date(1), date(7)).await.unwrap();
        assert_eq!(report, GenerationReport::default());
        assert_eq!(job.transitions(), &[JobState::LoadingRules, JobState::Idle]);
    }

    #[tokio::test]
    async fn test_full_run_walks_every_state() {
        let store = MemoryStore { rules: vec![rule("Plan day", Priority::Secondary, 10)], ..Default::default() };
        let mut job = GenerationJob::new(&store, GenerationConfig::default());
        let report = job.run(None, date(1), date(7)).await.unwrap();
        assert_eq!(report.created, 7);
        assert_eq!(
            job.transitions(),
            &[
                JobState::LoadingRules,
                JobState::Expanding,
                JobState::Reconciling,
                JobState::Committing,
                JobState::Idle
            ]
        );
    }

    #[tokio::test]
    async fn test_replay_creates_nothing_new() {
        let store = MemoryStore { rules: vec![rule("Plan day", Priority::Primary, 10)], ..Default::default() };
        let mut job = GenerationJob::new(&store, GenerationConfig::default());

        let first = job.run(None, date(1), date(10)).await.unwrap();
        let second = job.run(None, date(1), date(10)).await.unwrap();
        let overlapping = job.run(None, date(5), date(14)).await.unwrap();

        assert_eq!(first.created, 10);
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped, 10);
        assert_eq!(overlapping.created, 4);
        assert_eq!(overlapping.skipped, 6);
        assert_eq!(store.tasks.lock().unwrap().len(), 14);
    }

    #[tokio::test]
    async fn test_mit_collision_favours_older_rule() {
        let older = rule("Deep work", Priority::Mit, 60);
        let newer = rule("Write report", Priority::Mit, 5);
        let store = MemoryStore { rules: vec![newer.clone(), older.clone()], ..Default::default() };

        let mut job = GenerationJob::new(&store, GenerationConfig::default());
        let report = job.run(None, date(1), date(1)).await.unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(report.downgraded.len(), 1);
        assert_eq!(report.downgraded[0].rule_id, newer.id);
        assert_eq!(report.downgraded[0].from, Priority::Mit);
        assert_eq!(report.downgraded[0].to, Priority::Primary);

        let tasks = store.tasks.lock().unwrap();
        let kept = tasks.iter().find(|t| t.source_rule_id == Some(older.id)).unwrap();
        let lowered = tasks.iter().find(|t| t.source_rule_id == Some(newer.id)).unwrap();
        assert_eq!(kept.priority, Priority::Mit);
        assert!(!kept.priority_downgraded);
        assert_eq!(lowered.priority, Priority::Primary);
        assert!(lowered.priority_downgraded);
        assert_eq!(lowered.id, report.downgraded[0].instance_id);
    }

    #[tokio::test]
    async fn test_corrupt_rule_is_reported_and_others_continue() {
        let mut broken = rule("Gym", Priority::Secondary, 30);
        broken.pattern = RecurrencePattern::Weekly;
        broken.days_of_week = Some("MON,NOPE".to_string());
        let healthy = rule("Read", Priority::Secondary, 20);
        let store = MemoryStore { rules: vec![broken.clone(), healthy], ..Default::default() };

        let mut job = GenerationJob::new(&store, GenerationConfig::default());
        let report = job.run(None, date(1), date(3)).await.unwrap();

        assert_eq!(report.created, 3);
        assert_eq!(report.per_rule_errors.len(), 1);
        assert_eq!(report.per_rule_errors[0].rule_id, broken.id);
        assert_eq!(job.state(), JobState::Idle);
    }

    #[tokio::test]
    async fn test_commit_rejection_is_scoped_to_rule() {
        let rejected = rule("Journal", Priority::Secondary, 30);
        let accepted = rule("Walk", Priority::Secondary, 20);
        let store = MemoryStore {
            rules: vec![rejected.clone(), accepted],
            reject_rule: Some(rejected.id),
            ..Default::default()
        };

        let mut job = GenerationJob::new(&store, GenerationConfig::default());
        let report = job.run(None, date(1), date(2)).await.unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.per_rule_errors[0].rule_id, rejected.id);
    }

    #[tokio::test]
    async fn test_storage_failure_while_loading_fails_the_run() {
        let store = MemoryStore { fail_loading: true, ..Default::default() };
        let mut job = GenerationJob::new(&store, GenerationConfig::default());
        let result = job.run(None, date(1), date(2)).await;
        assert!(matches!(result, Err(CoreError::Database(_))));
        assert_eq!(job.state(), JobState::Failed);
    }

    #[tokio::test]
    async fn test_window_validation() {
        let store = MemoryStore::default();
        let config = GenerationConfig { max_window_days: 7, ..Default::default() };
        let mut job = GenerationJob::new(&store, config);
        assert!(matches!(
            job.run(None, date(5), date(1)).await,
            Err(CoreError::InvalidRange { .. })
        ));
        assert!(matches!(
            job.run(None, date(1), date(8)).await,
            Err(CoreError::InvalidInput(_))
        ));
        assert!(job.run(None, date(1), date(7)).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_run_commits_nothing_further() {
        let store = MemoryStore {
            rules: vec![rule("A", Priority::Secondary, 30), rule("B", Priority::Secondary, 20)],
            ..Default::default()
        };
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let mut job = GenerationJob::new(&store, GenerationConfig::default()).with_cancellation(rx);
        let report = job.run(None, date(1), date(3)).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.created, 0);

        // the next run picks up where the cancelled one stopped
        let mut job = GenerationJob::new(&store, GenerationConfig::default());
        assert_eq!(job.run(None, date(1), date(3)).await.unwrap().created, 6);
    }

    #[tokio::test]
    async fn test_report_serializes_for_machine_output() {
        let older = rule("Deep work", Priority::Mit, 60);
        let newer = rule("Write report", Priority::Mit, 5);
        let store = MemoryStore { rules: vec![older, newer.clone()], ..Default::default() };

        let report = GenerationJob::new(&store, GenerationConfig::default())
            .run(None, date(1), date(1))
            .await
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["created"], 2);
        assert_eq!(json["skipped"], 0);
        assert_eq!(json["cancelled"], false);
        assert_eq!(json["downgraded"][0]["rule_id"], newer.id.to_string());
        assert_eq!(json["downgraded"][0]["from"], "MIT");
        assert_eq!(json["downgraded"][0]["to"], "PRIMARY");
        assert_eq!(json["downgraded"][0]["date"], "2024-01-01");
    }

    proptest::proptest! {
        #[test]
        fn prop_any_replay_is_a_no_op(
            priorities in proptest::collection::vec(0u8..3, 1..5),
            start in 1u32..20,
            len in 0u32..12,
        ) {
            let rules: Vec<RecurrenceRule> = priorities
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let priority = match p {
                        0 => Priority::Mit,
                        1 => Priority::Primary,
                        _ => Priority::Secondary,
                    };
                    rule(&format!("rule {}", i), priority, 100 - i as i64)
                })
                .collect();
            let store = MemoryStore { rules, ..Default::default() };
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

            let (first, second) = runtime.block_on(async {
                let mut job = GenerationJob::new(&store, GenerationConfig::default());
                let first = job.run(None, date(start), date(start + len)).await.unwrap();
                let second = job.run(None, date(start), date(start + len)).await.unwrap();
                (first, second)
            });

            let expected = priorities.len() * (len as usize + 1);
            proptest::prop_assert_eq!(first.created, expected);
            proptest::prop_assert_eq!(second.created, 0);
            proptest::prop_assert_eq!(second.skipped, expected);
            proptest::prop_assert!(second.downgraded.is_empty());

            // caps hold on every day
            let tasks = store.tasks.lock().unwrap();
            for day in start..=start + len {
                let on_day: Vec<_> = tasks.iter().filter(|t| t.scheduled_date == date(day)).collect();
                proptest::prop_assert!(on_day.iter().filter(|t| t.priority == Priority::Mit).count() <= 1);
                proptest::prop_assert!(on_day.iter().filter(|t| t.priority == Priority::Primary).count() <= 3);
            }
        }
    }
}
