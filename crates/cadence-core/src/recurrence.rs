use chrono::{Days, NaiveDate};
use std::collections::BTreeSet;

use crate::calendar::{days_between, intersect, iterate_dates, weekday_of};
use crate::error::CoreError;
use crate::models::{parse_day_set, DayOfWeek, RecurrencePattern, RecurrenceRule};

/// When a rule fires, independent of its validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cadence {
    Daily,
    Weekdays,
    Weekly(BTreeSet<DayOfWeek>),
    /// Every `n` days counted from the rule's start date
    EveryNDays(u32),
}

/// Validated, immutable view of a recurrence rule: cadence plus inclusive
/// validity window.
///
/// Building a `Schedule` is where rule invariants are enforced, both when a
/// rule is created and when a stored rule is read back for generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    cadence: Cadence,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
}

/// Dates produced by [`Schedule::expand`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    pub dates: BTreeSet<NaiveDate>,
    /// Number of calendar dates evaluated; zero when the window was empty
    pub examined: usize,
}

impl Schedule {
    /// Builds a schedule from raw rule parameters.
    ///
    /// # Behavior
    /// - WEEKLY requires a non-empty day set
    /// - CUSTOM requires an interval of at least one day
    /// - A present end date must not precede the start date
    /// - Parameters that do not belong to the pattern are ignored
    pub fn build(
        pattern: RecurrencePattern,
        days_of_week: &BTreeSet<DayOfWeek>,
        custom_interval_days: Option<i64>,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Result<Self, CoreError> {
        if let Some(end) = end_date {
            if end < start_date {
                return Err(CoreError::InvalidRule(format!(
                    "end date {} is before start date {}",
                    end, start_date
                )));
            }
        }

        let cadence = match pattern {
            RecurrencePattern::Daily => Cadence::Daily,
            RecurrencePattern::Weekdays => Cadence::Weekdays,
            RecurrencePattern::Weekly => {
                if days_of_week.is_empty() {
                    return Err(CoreError::InvalidRule(
                        "WEEKLY rules need at least one day of the week".to_string(),
                    ));
                }
                Cadence::Weekly(days_of_week.clone())
            }
            RecurrencePattern::Custom => match custom_interval_days {
                Some(n) if n >= 1 && n <= u32::MAX as i64 => Cadence::EveryNDays(n as u32),
                Some(n) => {
                    return Err(CoreError::InvalidRule(format!(
                        "custom interval must be at least 1 day, got {}",
                        n
                    )))
                }
                None => {
                    return Err(CoreError::InvalidRule(
                        "CUSTOM rules need an interval in days".to_string(),
                    ))
                }
            },
        };

        Ok(Self { cadence, start_date, end_date })
    }

    /// Reads a stored rule back into a schedule. A corrupt day list surfaces
    /// as [`CoreError::InvalidRule`] for this rule alone.
    pub fn from_rule(rule: &RecurrenceRule) -> Result<Self, CoreError> {
        let days = match (rule.pattern, rule.days_of_week.as_deref()) {
            (RecurrencePattern::Weekly, Some(raw)) => parse_day_set(raw).map_err(|e| {
                CoreError::InvalidRule(format!("rule {}: {}", rule.id, e))
            })?,
            _ => BTreeSet::new(),
        };

        Self::build(
            rule.pattern,
            &days,
            rule.custom_interval_days,
            rule.start_date,
            rule.end_date,
        )
        .map_err(|e| match e {
            CoreError::InvalidRule(msg) if !msg.starts_with("rule ") => {
                CoreError::InvalidRule(format!("rule {}: {}", rule.id, msg))
            }
            other => other,
        })
    }

    pub fn cadence(&self) -> &Cadence {
        &self.cadence
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    /// Whether the rule fires on `date`. Pure: same input, same answer.
    pub fn fires(&self, date: NaiveDate) -> bool {
        if date < self.start_date {
            return false;
        }
        if matches!(self.end_date, Some(end) if date > end) {
            return false;
        }

        match &self.cadence {
            Cadence::Daily => true,
            Cadence::Weekdays => weekday_of(date).is_weekday(),
            Cadence::Weekly(days) => days.contains(&weekday_of(date)),
            Cadence::EveryNDays(n) => {
                let offset = days_between(self.start_date, date);
                offset >= 0 && offset % i64::from(*n) == 0
            }
        }
    }

    /// The part of `[range_start, range_end]` in which this rule may fire.
    pub fn effective_window(
        &self,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Option<(NaiveDate, NaiveDate)> {
        intersect((range_start, range_end), self.start_date, self.end_date)
    }

    /// Expands the schedule over an inclusive range.
    ///
    /// # Arguments
    /// * `range_start` - First requested date
    /// * `range_end` - Last requested date
    ///
    /// # Returns
    /// * `Result<Expansion, CoreError>` - Firing dates in the range, or
    ///   `InvalidRange` when `range_end < range_start`
    ///
    /// # Behavior
    /// - Intersect the range with the rule's validity window
    /// - Return immediately, without touching a single date, when the
    ///   intersection is empty (not started yet, already ended)
    /// - Otherwise walk the effective window and keep firing dates
    pub fn expand(&self, range_start: NaiveDate, range_end: NaiveDate) -> Result<Expansion, CoreError> {
        if range_end < range_start {
            return Err(CoreError::InvalidRange { start: range_start, end: range_end });
        }

        let Some((start, end)) = self.effective_window(range_start, range_end) else {
            return Ok(Expansion::default());
        };

        let window = iterate_dates(start, end)?;
        let examined = window.len();
        let dates = window.filter(|date| self.fires(*date)).collect();

        Ok(Expansion { dates, examined })
    }

    /// Next `count` firing dates on or after `from`.
    ///
    /// The search is bounded by the rule's end date or by `count` full cadence
    /// periods, whichever comes first.
    pub fn preview(&self, from: NaiveDate, count: usize) -> Vec<NaiveDate> {
        if count == 0 {
            return Vec::new();
        }

        let first = from.max(self.start_date);
        let period: u64 = match self.cadence {
            Cadence::Daily | Cadence::Weekdays | Cadence::Weekly(_) => 7,
            Cadence::EveryNDays(n) => u64::from(n),
        };
        let horizon = first
            .checked_add_days(Days::new(period.saturating_mul(count as u64)))
            .unwrap_or(NaiveDate::MAX);
        let last = match self.end_date {
            Some(end) => end.min(horizon),
            None => horizon,
        };

        match iterate_dates(first, last) {
            Ok(range) => range.filter(|d| self.fires(*d)).take(count).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Human-readable summary, e.g. "Every Mon, Wed, Fri until 2024-03-01".
    pub fn describe(&self) -> String {
        let base = match &self.cadence {
            Cadence::Daily => "Every day".to_string(),
            Cadence::Weekdays => "Every weekday".to_string(),
            Cadence::Weekly(days) if days.len() == 7 => "Every day".to_string(),
            Cadence::Weekly(days) => format!(
                "Every {}",
                days.iter().map(|d| d.short_name()).collect::<Vec<_>>().join(", ")
            ),
            Cadence::EveryNDays(1) => "Every day".to_string(),
            Cadence::EveryNDays(n) => format!("Every {} days", n),
        };

        match self.end_date {
            Some(end) => format!("{} until {}", base, end),
            None => base,
        }
    }
}
