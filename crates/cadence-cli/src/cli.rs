use cadence_core::models::{Priority, RecurrencePattern};
use clap::{Parser, Subcommand};

use crate::config::LogFormat;

/// Cadence: recurring task rules and their daily instances
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log filter, e.g. `info` or `cadence_core=debug` (overridden by CADENCE_LOG)
    #[clap(long, global = true, default_value = "warn")]
    pub log_level: String,
    /// Log output format
    #[clap(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage recurrence rules
    Rule(RuleCommand),
    /// Manage task instances
    Task(TaskCommand),
    /// Materialize task instances for a date window
    Generate(GenerateCommand),
}

// ============================================================================
// Rules
// ============================================================================

#[derive(Parser, Debug, Clone)]
pub struct RuleCommand {
    #[command(subcommand)]
    pub command: RuleSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RuleSubcommand {
    /// Create a recurrence rule and backfill its upcoming instances
    Add(RuleAddCommand),
    /// List rules
    List(RuleListCommand),
    /// Show a rule, its schedule and recent instances
    Show(RuleIdCommand),
    /// Change a rule; existing instances are left as they are
    Edit(RuleEditCommand),
    /// Stop generating instances for a rule
    Pause(RuleIdCommand),
    /// Resume a paused rule
    Resume(RuleIdCommand),
    /// Show the next dates a rule fires on
    Preview(RulePreviewCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct RuleAddCommand {
    /// The title copied onto every instance
    pub title: String,
    /// The description of the rule
    #[clap(short, long)]
    pub description: Option<String>,
    /// How often the rule fires: daily, weekdays, weekly or custom
    #[clap(short, long, default_value = "daily")]
    pub every: RecurrencePattern,
    /// Days for weekly rules (e.g. "mon,wed,fri")
    #[clap(long, help = "Days of week for weekly rules (mon,tue,wed,thu,fri,sat,sun)")]
    pub on: Option<String>,
    /// Interval in days for custom rules
    #[clap(long)]
    pub interval: Option<i64>,
    /// First date the rule may fire (defaults to today)
    #[clap(long)]
    pub start: Option<String>,
    /// Last date the rule may fire
    #[clap(long)]
    pub until: Option<String>,
    /// Priority of generated instances: mit, primary or secondary
    #[clap(short, long, default_value = "secondary")]
    pub priority: Priority,
    /// Estimated effort in minutes
    #[clap(long)]
    pub estimate: Option<i64>,
    /// Goal the instances contribute to
    #[clap(long)]
    pub goal: Option<String>,
    /// Owner of the rule (defaults to the configured owner)
    #[clap(long)]
    pub owner: Option<String>,
    /// Skip the immediate backfill
    #[clap(long)]
    pub no_backfill: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct RuleListCommand {
    /// Include paused rules
    #[clap(short, long)]
    pub all: bool,
    /// Owner whose rules to list (defaults to the configured owner)
    #[clap(long)]
    pub owner: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct RuleIdCommand {
    /// The ID of the rule (or a unique prefix)
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct RuleEditCommand {
    /// The ID of the rule (or a unique prefix)
    pub id: String,
    /// New title
    #[clap(short, long)]
    pub title: Option<String>,
    /// New description
    #[clap(short, long, conflicts_with = "clear_description")]
    pub description: Option<String>,
    /// Remove the description
    #[clap(long)]
    pub clear_description: bool,
    /// New pattern
    #[clap(short, long)]
    pub every: Option<RecurrencePattern>,
    /// New days for weekly rules
    #[clap(long)]
    pub on: Option<String>,
    /// New interval for custom rules
    #[clap(long)]
    pub interval: Option<i64>,
    /// New start date
    #[clap(long)]
    pub start: Option<String>,
    /// New end date
    #[clap(long, conflicts_with = "no_end")]
    pub until: Option<String>,
    /// Remove the end date
    #[clap(long)]
    pub no_end: bool,
    /// New priority
    #[clap(short, long)]
    pub priority: Option<Priority>,
    /// New estimate in minutes
    #[clap(long)]
    pub estimate: Option<i64>,
    /// New goal
    #[clap(long)]
    pub goal: Option<String>,
    /// Apply without asking for confirmation
    #[clap(short, long)]
    pub yes: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct RulePreviewCommand {
    /// The ID of the rule (or a unique prefix)
    pub id: String,
    /// Number of dates to show
    #[clap(short = 'n', long, default_value_t = 10)]
    pub count: usize,
    /// Date to start from (defaults to today)
    #[clap(long)]
    pub from: Option<String>,
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Parser, Debug, Clone)]
pub struct TaskCommand {
    #[command(subcommand)]
    pub command: TaskSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskSubcommand {
    /// Add a one-off task
    Add(TaskAddCommand),
    /// List the tasks of one day
    List(TaskListCommand),
    /// Mark a task as completed
    Do(TaskIdCommand),
    /// Change a task's priority, e.g. promote it to today's MIT
    Promote(TaskPromoteCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct TaskAddCommand {
    /// The title of the task
    pub title: String,
    /// The description of the task
    #[clap(short, long)]
    pub description: Option<String>,
    /// The day the task is scheduled for (defaults to today)
    #[clap(long)]
    pub date: Option<String>,
    /// The priority of the task
    #[clap(short, long, default_value = "secondary")]
    pub priority: Priority,
    /// Estimated effort in minutes
    #[clap(long)]
    pub estimate: Option<i64>,
    /// Goal the task contributes to
    #[clap(long)]
    pub goal: Option<String>,
    /// Owner of the task (defaults to the configured owner)
    #[clap(long)]
    pub owner: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct TaskListCommand {
    /// The day to list (defaults to today)
    #[clap(long)]
    pub date: Option<String>,
    /// Owner whose tasks to list (defaults to the configured owner)
    #[clap(long)]
    pub owner: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct TaskIdCommand {
    /// The ID of the task (or a unique prefix)
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct TaskPromoteCommand {
    /// The ID of the task (or a unique prefix)
    pub id: String,
    /// Target priority
    #[clap(default_value = "mit")]
    pub priority: Priority,
}

// ============================================================================
// Generation
// ============================================================================

#[derive(Parser, Debug, Clone)]
pub struct GenerateCommand {
    /// First date of the window (defaults to today)
    #[clap(long)]
    pub from: Option<String>,
    /// Last date of the window (defaults to today plus the lookahead)
    #[clap(long)]
    pub to: Option<String>,
    /// Only generate for this owner (defaults to the configured owner)
    #[clap(long, conflicts_with = "all")]
    pub owner: Option<String>,
    /// Generate for every owner
    #[clap(long)]
    pub all: bool,
    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
}
