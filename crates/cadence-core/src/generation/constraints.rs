//! Per-day priority caps: one MIT and three PRIMARY tasks per owner per date.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::models::{DayPriority, Priority};

/// Tasks already holding each capped tier on one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayLoad {
    pub mit: usize,
    pub primary: usize,
    pub secondary: usize,
}

impl DayLoad {
    pub fn count(&self, priority: Priority) -> usize {
        match priority {
            Priority::Mit => self.mit,
            Priority::Primary => self.primary,
            Priority::Secondary => self.secondary,
        }
    }

    fn record(&mut self, priority: Priority) {
        match priority {
            Priority::Mit => self.mit += 1,
            Priority::Primary => self.primary += 1,
            Priority::Secondary => self.secondary += 1,
        }
    }

    /// Whether one more task of `priority` still fits.
    pub fn has_room_for(&self, priority: Priority) -> bool {
        match priority.daily_cap() {
            Some(cap) => self.count(priority) < cap,
            None => true,
        }
    }
}

/// Outcome of admitting one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub requested: Priority,
    pub granted: Priority,
}

impl Admission {
    pub fn downgraded(&self) -> bool {
        self.requested != self.granted
    }
}

/// Running tally of every owner's daily load: persisted tasks plus candidates
/// already queued in the current run.
///
/// Candidates are never dropped. A tier that is full pushes the candidate one
/// tier down, repeatedly, so an MIT meeting both a taken MIT slot and a full
/// PRIMARY tier lands on SECONDARY.
#[derive(Debug, Default)]
pub struct PriorityLedger {
    days: HashMap<(String, NaiveDate), DayLoad>,
}

impl PriorityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the ledger with persisted tasks, including manual tasks and
    /// manual priority overrides.
    pub fn seeded<I>(persisted: I) -> Self
    where
        I: IntoIterator<Item = DayPriority>,
    {
        let mut ledger = Self::new();
        for task in persisted {
            ledger
                .days
                .entry((task.owner_id, task.scheduled_date))
                .or_default()
                .record(task.priority);
        }
        ledger
    }

    pub fn load(&self, owner_id: &str, date: NaiveDate) -> DayLoad {
        self.days
            .get(&(owner_id.to_string(), date))
            .copied()
            .unwrap_or_default()
    }

    /// Admits a candidate and counts it toward the day.
    pub fn admit(&mut self, owner_id: &str, date: NaiveDate, requested: Priority) -> Admission {
        let load = self.days.entry((owner_id.to_string(), date)).or_default();

        let mut granted = requested;
        while !load.has_room_for(granted) {
            match granted.downgrade() {
                Some(lower) => granted = lower,
                None => break,
            }
        }
        load.record(granted);

        Admission { requested, granted }
    }
}
