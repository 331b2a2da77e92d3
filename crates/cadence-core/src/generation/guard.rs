//! Idempotency guard: only dates a rule has not materialized yet survive.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};

/// Candidate dates minus the dates that already have an instance for the rule.
///
/// `existing` is the result of a single per-rule lookup over the same window
/// that produced `candidates`. Replaying a run over overlapping windows
/// therefore never yields a date twice.
pub fn missing_dates(candidates: &BTreeSet<NaiveDate>, existing: &[NaiveDate]) -> BTreeSet<NaiveDate> {
    if existing.is_empty() {
        return candidates.clone();
    }
    let existing: HashSet<&NaiveDate> = existing.iter().collect();
    candidates
        .iter()
        .filter(|date| !existing.contains(date))
        .copied()
        .collect()
}
