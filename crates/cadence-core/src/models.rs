use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Priorities
// ============================================================================

/// Daily priority tier. At most one MIT and three PRIMARY tasks per owner per day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Mit,
    Primary,
    Secondary,
}

impl Priority {
    /// Maximum number of tasks of this tier per day, `None` when uncapped.
    pub fn daily_cap(self) -> Option<usize> {
        match self {
            Priority::Mit => Some(1),
            Priority::Primary => Some(3),
            Priority::Secondary => None,
        }
    }

    /// The next tier down, `None` for the lowest tier.
    pub fn downgrade(self) -> Option<Priority> {
        match self {
            Priority::Mit => Some(Priority::Primary),
            Priority::Primary => Some(Priority::Secondary),
            Priority::Secondary => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Mit => write!(f, "MIT"),
            Priority::Primary => write!(f, "PRIMARY"),
            Priority::Secondary => write!(f, "SECONDARY"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid priority: {0}")]
pub struct ParsePriorityError(String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mit" => Ok(Priority::Mit),
            "primary" => Ok(Priority::Primary),
            "secondary" => Ok(Priority::Secondary),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

// ============================================================================
// Weekdays and patterns
// ============================================================================

/// Locale-independent weekday token, numbered Monday = 0 through Sunday = 6.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
        DayOfWeek::Sat,
        DayOfWeek::Sun,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn from_index(index: u32) -> Option<DayOfWeek> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn is_weekday(self) -> bool {
        self.index() < 5
    }

    pub fn token(self) -> &'static str {
        match self {
            DayOfWeek::Mon => "MON",
            DayOfWeek::Tue => "TUE",
            DayOfWeek::Wed => "WED",
            DayOfWeek::Thu => "THU",
            DayOfWeek::Fri => "FRI",
            DayOfWeek::Sat => "SAT",
            DayOfWeek::Sun => "SUN",
        }
    }

    /// Short display name ("Mon", "Tue", ...).
    pub fn short_name(self) -> &'static str {
        match self {
            DayOfWeek::Mon => "Mon",
            DayOfWeek::Tue => "Tue",
            DayOfWeek::Wed => "Wed",
            DayOfWeek::Thu => "Thu",
            DayOfWeek::Fri => "Fri",
            DayOfWeek::Sat => "Sat",
            DayOfWeek::Sun => "Sun",
        }
    }
}

impl From<chrono::Weekday> for DayOfWeek {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => DayOfWeek::Mon,
            chrono::Weekday::Tue => DayOfWeek::Tue,
            chrono::Weekday::Wed => DayOfWeek::Wed,
            chrono::Weekday::Thu => DayOfWeek::Thu,
            chrono::Weekday::Fri => DayOfWeek::Fri,
            chrono::Weekday::Sat => DayOfWeek::Sat,
            chrono::Weekday::Sun => DayOfWeek::Sun,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid weekday: {0}")]
pub struct ParseDayOfWeekError(String);

impl FromStr for DayOfWeek {
    type Err = ParseDayOfWeekError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mon" | "monday" | "mo" => Ok(DayOfWeek::Mon),
            "tue" | "tuesday" | "tu" => Ok(DayOfWeek::Tue),
            "wed" | "wednesday" | "we" => Ok(DayOfWeek::Wed),
            "thu" | "thursday" | "th" => Ok(DayOfWeek::Thu),
            "fri" | "friday" | "fr" => Ok(DayOfWeek::Fri),
            "sat" | "saturday" | "sa" => Ok(DayOfWeek::Sat),
            "sun" | "sunday" | "su" => Ok(DayOfWeek::Sun),
            _ => Err(ParseDayOfWeekError(s.to_string())),
        }
    }
}

/// Parses a comma-separated day list ("MON,WED,FRI") into an ordered set.
pub fn parse_day_set(raw: &str) -> Result<BTreeSet<DayOfWeek>, ParseDayOfWeekError> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(DayOfWeek::from_str)
        .collect()
}

/// Canonical storage form of a day set: uppercase tokens in Monday-first order.
pub fn format_day_set(days: &BTreeSet<DayOfWeek>) -> String {
    days.iter().map(|d| d.token()).collect::<Vec<_>>().join(",")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RecurrencePattern {
    Daily,
    Weekdays,
    Weekly,
    Custom,
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrencePattern::Daily => write!(f, "DAILY"),
            RecurrencePattern::Weekdays => write!(f, "WEEKDAYS"),
            RecurrencePattern::Weekly => write!(f, "WEEKLY"),
            RecurrencePattern::Custom => write!(f, "CUSTOM"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid recurrence pattern: {0}")]
pub struct ParsePatternError(String);

impl FromStr for RecurrencePattern {
    type Err = ParsePatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(RecurrencePattern::Daily),
            "weekdays" => Ok(RecurrencePattern::Weekdays),
            "weekly" => Ok(RecurrencePattern::Weekly),
            "custom" => Ok(RecurrencePattern::Custom),
            _ => Err(ParsePatternError(s.to_string())),
        }
    }
}

// ============================================================================
// Recurrence rules
// ============================================================================

/// A user's recurring task template, as persisted.
///
/// Rules describe future generation only: editing one never rewrites the
/// instances it already produced. Rules are retired by deactivation, never
/// deleted, so generated history keeps a valid `source_rule_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecurrenceRule {
    /// UUIDv7, so id order matches creation order
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub estimated_minutes: Option<i64>,
    /// Weak reference to a weekly goal, never validated here
    pub linked_goal_id: Option<String>,
    pub pattern: RecurrencePattern,
    /// Comma-separated weekday tokens, meaningful for WEEKLY only
    pub days_of_week: Option<String>,
    /// Meaningful for CUSTOM only
    pub custom_interval_days: Option<i64>,
    /// Inclusive; day 0 of the CUSTOM cadence
    pub start_date: NaiveDate,
    /// Inclusive
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a recurrence rule.
#[derive(Debug, Clone)]
pub struct RuleDraft {
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub estimated_minutes: Option<i64>,
    pub linked_goal_id: Option<String>,
    pub pattern: RecurrencePattern,
    pub days_of_week: BTreeSet<DayOfWeek>,
    pub custom_interval_days: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl RuleDraft {
    /// A daily SECONDARY rule starting on `start_date`; adjust fields from here.
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            owner_id: owner_id.into(),
            title: title.into(),
            description: None,
            priority: Priority::Secondary,
            estimated_minutes: None,
            linked_goal_id: None,
            pattern: RecurrencePattern::Daily,
            days_of_week: BTreeSet::new(),
            custom_interval_days: None,
            start_date,
            end_date: None,
        }
    }

    /// Checks the rule invariants once, at the creation boundary.
    pub fn validate(&self) -> Result<(), crate::error::CoreError> {
        use crate::error::CoreError;

        if self.owner_id.trim().is_empty() {
            return Err(CoreError::InvalidRule("owner must not be empty".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(CoreError::InvalidRule("title must not be empty".to_string()));
        }
        if matches!(self.estimated_minutes, Some(m) if m <= 0) {
            return Err(CoreError::InvalidRule(
                "estimated minutes must be a positive integer".to_string(),
            ));
        }
        crate::recurrence::Schedule::build(
            self.pattern,
            &self.days_of_week,
            self.custom_interval_days,
            self.start_date,
            self.end_date,
        )
        .map(|_| ())
    }

    /// Stored form of the day set; cleared for patterns that ignore it.
    pub(crate) fn stored_days(&self) -> Option<String> {
        match self.pattern {
            RecurrencePattern::Weekly => Some(format_day_set(&self.days_of_week)),
            _ => None,
        }
    }

    pub(crate) fn stored_interval(&self) -> Option<i64> {
        match self.pattern {
            RecurrencePattern::Custom => self.custom_interval_days,
            _ => None,
        }
    }
}

/// Changes to an existing rule. Only future generation is affected.
#[derive(Debug, Clone, Default)]
pub struct UpdateRuleData {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub estimated_minutes: Option<Option<i64>>,
    pub linked_goal_id: Option<Option<String>>,
    pub pattern: Option<RecurrencePattern>,
    pub days_of_week: Option<BTreeSet<DayOfWeek>>,
    pub custom_interval_days: Option<i64>,
    /// Moving the start date resets the CUSTOM cadence anchor
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
}

impl UpdateRuleData {
    /// Folds the changes over the current rule, producing the draft to validate.
    pub fn apply_to(&self, rule: &RecurrenceRule) -> Result<RuleDraft, crate::error::CoreError> {
        let current_days = match rule.days_of_week.as_deref() {
            Some(raw) => parse_day_set(raw)
                .map_err(|e| crate::error::CoreError::InvalidRule(e.to_string()))?,
            None => BTreeSet::new(),
        };

        Ok(RuleDraft {
            owner_id: rule.owner_id.clone(),
            title: self.title.clone().unwrap_or_else(|| rule.title.clone()),
            description: self.description.clone().unwrap_or_else(|| rule.description.clone()),
            priority: self.priority.unwrap_or(rule.priority),
            estimated_minutes: self.estimated_minutes.unwrap_or(rule.estimated_minutes),
            linked_goal_id: self
                .linked_goal_id
                .clone()
                .unwrap_or_else(|| rule.linked_goal_id.clone()),
            pattern: self.pattern.unwrap_or(rule.pattern),
            days_of_week: self.days_of_week.clone().unwrap_or(current_days),
            custom_interval_days: self.custom_interval_days.or(rule.custom_interval_days),
            start_date: self.start_date.unwrap_or(rule.start_date),
            end_date: self.end_date.unwrap_or(rule.end_date),
        })
    }
}

// ============================================================================
// Task instances
// ============================================================================

/// A concrete, date-bound task. Generated instances carry `source_rule_id`;
/// manually created tasks leave it empty.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct TaskInstance {
    pub id: Uuid,
    pub owner_id: String,
    pub source_rule_id: Option<Uuid>,
    pub scheduled_date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub estimated_minutes: Option<i64>,
    pub linked_goal_id: Option<String>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when generation lowered the rule's priority to respect a daily cap
    pub priority_downgraded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskInstance {
    /// Snapshot of `rule` for `date`. Content is copied, not linked.
    pub fn from_rule(rule: &RecurrenceRule, date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            owner_id: rule.owner_id.clone(),
            source_rule_id: Some(rule.id),
            scheduled_date: date,
            title: rule.title.clone(),
            description: rule.description.clone(),
            priority: rule.priority,
            estimated_minutes: rule.estimated_minutes,
            linked_goal_id: rule.linked_goal_id.clone(),
            completed: false,
            completed_at: None,
            priority_downgraded: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Data for a manually created, non-recurring task.
#[derive(Debug, Clone)]
pub struct NewTaskData {
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_date: NaiveDate,
    pub priority: Priority,
    pub estimated_minutes: Option<i64>,
    pub linked_goal_id: Option<String>,
}

/// One persisted task's contribution to a day's priority load.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DayPriority {
    pub owner_id: String,
    pub scheduled_date: NaiveDate,
    pub priority: Priority,
}

/// Result of committing one rule's batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    pub inserted: usize,
    /// Dates another writer materialized first; treated as already present
    pub conflicted: Vec<NaiveDate>,
}

// ============================================================================
// Configuration
// ============================================================================

/// Generation windows, in days. Core counterpart of the CLI's `[generation]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Window used by the periodic run, counted from today
    pub lookahead_days: u32,
    /// Window materialized right after a rule is created or edited
    pub backfill_days: u32,
    /// Largest window a single run will accept
    pub max_window_days: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            lookahead_days: 14,
            backfill_days: 30,
            max_window_days: 366,
        }
    }
}
