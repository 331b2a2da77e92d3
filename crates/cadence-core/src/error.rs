use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Priority;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid date range: {end} is before {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    /// A concurrent writer already materialized this (rule, date) pair.
    #[error("Instance for rule {rule_id} on {date} already exists")]
    CommitConflict { rule_id: Uuid, date: NaiveDate },

    #[error("{date} already has the maximum number of {priority} tasks")]
    PriorityCapExceeded { date: NaiveDate, priority: Priority },

    #[error("Ambiguous short ID. Did you mean one of these?")]
    AmbiguousId(Vec<(String, String)>), // Vec of (ID, Title)
}

impl CoreError {
    /// Storage-level failures abort a generation run; everything else is
    /// scoped to the rule that produced it.
    pub fn is_infrastructure(&self) -> bool {
        match self {
            CoreError::Database(sqlx::Error::Database(_)) => false,
            CoreError::Database(sqlx::Error::RowNotFound) => false,
            CoreError::Database(sqlx::Error::ColumnDecode { .. }) => false,
            CoreError::Database(sqlx::Error::Decode(_)) => false,
            CoreError::Database(_) | CoreError::Migration(_) | CoreError::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_classification() {
        assert!(CoreError::Database(sqlx::Error::PoolTimedOut).is_infrastructure());
        assert!(CoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")).is_infrastructure());
        assert!(!CoreError::InvalidRule("WEEKLY without days".into()).is_infrastructure());
        assert!(!CoreError::Database(sqlx::Error::RowNotFound).is_infrastructure());
    }

    #[test]
    fn test_range_message_names_both_dates() {
        let err = CoreError::InvalidRange {
            start: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert_eq!(err.to_string(), "Invalid date range: 2024-01-01 is before 2024-01-10");
    }
}
