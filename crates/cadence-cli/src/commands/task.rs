use anyhow::Result;
use cadence_core::models::NewTaskData;
use cadence_core::repository::Repository;
use chrono::NaiveDate;

use crate::cli::{TaskAddCommand, TaskCommand, TaskIdCommand, TaskListCommand, TaskPromoteCommand, TaskSubcommand};
use crate::config::Config;
use crate::parser::parse_optional_date;
use crate::util::{resolve_task_id, short_id};
use crate::views::style;
use crate::views::table::display_tasks;

pub async fn task_command<R: Repository>(
    repository: &R,
    command: TaskCommand,
    config: &Config,
    today: NaiveDate,
) -> Result<()> {
    match command.command {
        TaskSubcommand::Add(cmd) => add_task(repository, cmd, config, today).await,
        TaskSubcommand::List(cmd) => list_tasks(repository, cmd, config, today).await,
        TaskSubcommand::Do(cmd) => do_task(repository, cmd).await,
        TaskSubcommand::Promote(cmd) => promote_task(repository, cmd).await,
    }
}

async fn add_task<R: Repository>(
    repository: &R,
    command: TaskAddCommand,
    config: &Config,
    today: NaiveDate,
) -> Result<()> {
    let scheduled_date = parse_optional_date(command.date.as_deref(), today)?.unwrap_or(today);
    let task = repository
        .add_task(NewTaskData {
            owner_id: command.owner.unwrap_or_else(|| config.owner.clone()),
            title: command.title,
            description: command.description,
            scheduled_date,
            priority: command.priority,
            estimated_minutes: command.estimate,
            linked_goal_id: command.goal,
        })
        .await?;

    println!(
        "{} Added task: '{}' for {} ({})",
        style::success("✓"),
        style::accent(&task.title),
        task.scheduled_date,
        style::ident(short_id(&task.id))
    );
    Ok(())
}

async fn list_tasks<R: Repository>(
    repository: &R,
    command: TaskListCommand,
    config: &Config,
    today: NaiveDate,
) -> Result<()> {
    let owner = command.owner.unwrap_or_else(|| config.owner.clone());
    let date = parse_optional_date(command.date.as_deref(), today)?.unwrap_or(today);
    let tasks = repository.find_tasks_for_date(&owner, date).await?;
    display_tasks(&tasks);
    Ok(())
}

async fn do_task<R: Repository>(repository: &R, command: TaskIdCommand) -> Result<()> {
    let task_id = resolve_task_id(repository, &command.id).await?;
    let task = repository.complete_task(task_id).await?;
    println!("{} Completed task: '{}'", style::success("✓"), task.title);
    Ok(())
}

async fn promote_task<R: Repository>(repository: &R, command: TaskPromoteCommand) -> Result<()> {
    let task_id = resolve_task_id(repository, &command.id).await?;
    let task = repository.override_priority(task_id, command.priority).await?;
    println!(
        "{} '{}' is now {} on {}",
        style::success("✓"),
        style::accent(&task.title),
        task.priority,
        task.scheduled_date
    );
    Ok(())
}
