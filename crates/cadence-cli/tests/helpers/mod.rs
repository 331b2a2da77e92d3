#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test harness for running CLI commands with temporary databases
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    /// Create a new test harness with a temporary database
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self { temp_dir, db_path }
    }

    /// Get a Command instance configured for testing
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("cadence").expect("Failed to find cadence binary");

        // Run inside the temp dir so no stray cadence.toml is picked up
        cmd.current_dir(self.temp_dir.path());
        cmd.env("CADENCE_DATABASE_PATH", &self.db_path);
        cmd.env("CADENCE_OWNER", "tester");
        cmd.env("CADENCE_TIMEZONE", "UTC");
        cmd.env_remove("CADENCE_LOG");
        cmd.env("NO_COLOR", "1");

        cmd
    }

    /// Get the database path for this test instance
    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    /// Helper to run a command and assert success
    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    /// Helper to run a command and assert failure
    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Runs a successful command and returns its stdout
    pub fn stdout_of(&self, args: &[&str]) -> String {
        let output = self.run_success(args).get_output().stdout.clone();
        String::from_utf8_lossy(&output).into_owned()
    }

    /// Runs a successful command and returns the short ID it printed last, as in
    /// "Created rule: 'Gym' (1a2b3c4d)"
    pub fn created_id(&self, args: &[&str]) -> String {
        let stdout = self.stdout_of(args);
        let line = stdout
            .lines()
            .find(|l| l.contains("Created rule") || l.contains("Added task"))
            .expect("no creation line in output");
        let open = line.rfind('(').expect("no id in creation line");
        let close = line.rfind(')').expect("no id in creation line");
        line[open + 1..close].to_string()
    }
}

/// Common test fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// A weekday rule starting on Monday 2024-01-01, without backfill
    pub fn weekday_rule_args() -> Vec<&'static str> {
        vec![
            "rule", "add", "Morning review",
            "--every", "weekdays",
            "--start", "2024-01-01",
            "--no-backfill",
        ]
    }

    /// A Mon/Wed/Fri rule starting on 2024-01-01, without backfill
    pub fn weekly_rule_args() -> Vec<&'static str> {
        vec![
            "rule", "add", "Gym",
            "--every", "weekly",
            "--on", "mon,wed,fri",
            "--start", "2024-01-01",
            "--no-backfill",
        ]
    }
}

/// Utility functions for test assertions
pub mod assertions {
    use predicates::prelude::*;

    /// Predicate to check if output contains rule table headers
    pub fn has_rule_table_headers() -> impl Predicate<str> {
        predicate::str::contains("ID")
            .and(predicate::str::contains("Title"))
            .and(predicate::str::contains("Schedule"))
    }

    /// Predicate to check if output indicates successful rule creation
    pub fn rule_created_successfully() -> impl Predicate<str> {
        predicate::str::contains("✓").and(predicate::str::contains("Created rule"))
    }

    /// Predicate to check for empty result set
    pub fn empty_result() -> impl Predicate<str> {
        predicate::str::contains("No tasks found").or(predicate::str::contains("No rules found"))
    }

    /// Predicate to check that no terminal escape codes leaked into the output
    pub fn is_plain_text() -> impl Predicate<str> {
        predicate::str::contains("\u{1b}[").not()
    }

    /// Predicate to check for error messages
    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error").or(predicate::str::contains("error"))
    }
}
