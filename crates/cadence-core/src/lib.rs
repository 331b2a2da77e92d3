//! # Cadence Core Library
//!
//! Turns recurrence rules into concrete, dated task instances, under a
//! fixed per-day priority budget.
//!
//! ## Features
//!
//! - **Recurrence Rules**: daily, weekday, weekly-on-days and every-N-days
//!   patterns, with optional end dates and pause/resume
//! - **Idempotent Generation**: re-running any window creates nothing new,
//!   backed by a unique (rule, date) index
//! - **Priority Caps**: one MIT and three PRIMARY tasks per owner per day;
//!   generated tasks that would break a cap are downgraded and flagged
//! - **Failure Isolation**: a broken rule is reported without stopping
//!   the others
//!
//! ## Core Modules
//!
//! - [`calendar`]: Date ranges and day arithmetic
//! - [`recurrence`]: Rule schedules and date expansion
//! - [`generation`]: The generation job, duplicate guard and priority ledger
//! - [`repository`]: Data access layer with Repository pattern
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     db, generation::GenerationJob, models::{GenerationConfig, RecurrencePattern, RuleDraft},
//!     repository::{RuleRepository, SqliteRepository},
//! };
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = db::establish_connection("cadence.db").await?;
//!     let repo = SqliteRepository::new(pool);
//!
//!     let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//!     let mut draft = RuleDraft::new("ana", "Morning review", start);
//!     draft.pattern = RecurrencePattern::Weekdays;
//!     repo.create_rule(draft).await?;
//!
//!     let end = NaiveDate::from_ymd_opt(2024, 1, 14).unwrap();
//!     let report = GenerationJob::new(&repo, GenerationConfig::default())
//!         .run(Some("ana"), start, end)
//!         .await?;
//!     println!("created {} tasks", report.created);
//!
//!     Ok(())
//! }
//! ```

pub mod calendar;
pub mod db;
pub mod error;
pub mod generation;
pub mod models;
pub mod recurrence;
pub mod repository;
