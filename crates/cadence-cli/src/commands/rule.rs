use anyhow::{anyhow, bail, Result};
use cadence_core::models::{RecurrencePattern, RuleDraft, UpdateRuleData};
use cadence_core::recurrence::Schedule;
use cadence_core::repository::Repository;
use chrono::NaiveDate;
use dialoguer::Confirm;

use crate::cli::{
    RuleAddCommand, RuleCommand, RuleEditCommand, RuleIdCommand, RuleListCommand,
    RulePreviewCommand, RuleSubcommand,
};
use crate::commands::generate::backfill;
use crate::config::Config;
use crate::parser::{parse_date, parse_days, parse_optional_date};
use crate::util::{resolve_rule_id, short_id};
use crate::views::style;
use crate::views::table::{describe_rule, display_rules, display_tasks};

const RECENT_INSTANCES: usize = 10;

pub async fn rule_command<R: Repository>(
    repository: &R,
    command: RuleCommand,
    config: &Config,
    today: NaiveDate,
) -> Result<()> {
    match command.command {
        RuleSubcommand::Add(cmd) => add_command(repository, cmd, config, today).await,
        RuleSubcommand::List(cmd) => list_command(repository, cmd, config).await,
        RuleSubcommand::Show(cmd) => show_command(repository, cmd).await,
        RuleSubcommand::Edit(cmd) => edit_command(repository, cmd, config, today).await,
        RuleSubcommand::Pause(cmd) => set_active_command(repository, cmd, false, config, today).await,
        RuleSubcommand::Resume(cmd) => set_active_command(repository, cmd, true, config, today).await,
        RuleSubcommand::Preview(cmd) => preview_command(repository, cmd, today).await,
    }
}

/// `--on` and `--interval` only make sense for the pattern that reads them.
fn check_pattern_options(pattern: RecurrencePattern, on: Option<&str>, interval: Option<i64>) -> Result<()> {
    if on.is_some() && pattern != RecurrencePattern::Weekly {
        bail!("--on only applies to weekly rules (got {})", pattern);
    }
    if interval.is_some() && pattern != RecurrencePattern::Custom {
        bail!("--interval only applies to custom rules (got {})", pattern);
    }
    Ok(())
}

async fn add_command<R: Repository>(
    repository: &R,
    command: RuleAddCommand,
    config: &Config,
    today: NaiveDate,
) -> Result<()> {
    check_pattern_options(command.every, command.on.as_deref(), command.interval)?;

    let owner = command.owner.unwrap_or_else(|| config.owner.clone());
    let start = parse_optional_date(command.start.as_deref(), today)?.unwrap_or(today);

    let mut draft = RuleDraft::new(owner.clone(), command.title, start);
    draft.description = command.description;
    draft.priority = command.priority;
    draft.estimated_minutes = command.estimate;
    draft.linked_goal_id = command.goal;
    draft.pattern = command.every;
    if let Some(on) = &command.on {
        draft.days_of_week = parse_days(on)?;
    }
    draft.custom_interval_days = command.interval;
    draft.end_date = parse_optional_date(command.until.as_deref(), today)?;

    let rule = repository.create_rule(draft).await?;
    println!(
        "{} Created rule: '{}' ({})",
        style::success("✓"),
        style::accent(&rule.title),
        style::ident(short_id(&rule.id))
    );
    println!("  {}", describe_rule(&rule));

    if !command.no_backfill {
        backfill(repository, &owner, config, today).await?;
    }
    Ok(())
}

async fn list_command<R: Repository>(repository: &R, command: RuleListCommand, config: &Config) -> Result<()> {
    let owner = command.owner.unwrap_or_else(|| config.owner.clone());
    let rules = repository.find_rules_for_owner(&owner, command.all).await?;
    display_rules(&rules);
    Ok(())
}

async fn show_command<R: Repository>(repository: &R, command: RuleIdCommand) -> Result<()> {
    let rule_id = resolve_rule_id(repository, &command.id).await?;
    let rule = repository
        .find_rule_by_id(rule_id)
        .await?
        .ok_or_else(|| anyhow!("Rule not found"))?;

    println!("{}", style::heading("Rule Information"));
    println!("ID:        {}", style::ident(rule.id));
    println!("Title:     {}", style::accent(&rule.title));
    if let Some(description) = &rule.description {
        println!("Details:   {}", description);
    }
    println!("Owner:     {}", rule.owner_id);
    println!("Schedule:  {}", style::success(describe_rule(&rule)));
    println!("Starts:    {}", rule.start_date);
    println!("Priority:  {}", rule.priority);
    if let Some(minutes) = rule.estimated_minutes {
        println!("Estimate:  {} min", minutes);
    }
    if let Some(goal) = &rule.linked_goal_id {
        println!("Goal:      {}", goal);
    }
    println!(
        "Status:    {}",
        if rule.is_active { style::success("active") } else { style::danger("paused") }
    );
    println!("Created:   {}", rule.created_at.format("%Y-%m-%d %H:%M:%S UTC"));

    let instances = repository.find_tasks_for_rule(rule.id).await?;
    println!();
    println!("{} ({} total)", style::heading("Recent instances"), instances.len());
    let recent_start = instances.len().saturating_sub(RECENT_INSTANCES);
    display_tasks(&instances[recent_start..]);
    Ok(())
}

async fn edit_command<R: Repository>(
    repository: &R,
    command: RuleEditCommand,
    config: &Config,
    today: NaiveDate,
) -> Result<()> {
    let rule_id = resolve_rule_id(repository, &command.id).await?;
    let rule = repository
        .find_rule_by_id(rule_id)
        .await?
        .ok_or_else(|| anyhow!("Rule not found"))?;

    let pattern = command.every.unwrap_or(rule.pattern);
    check_pattern_options(pattern, command.on.as_deref(), command.interval)?;

    let update = UpdateRuleData {
        title: command.title,
        description: if command.clear_description {
            Some(None)
        } else {
            command.description.map(Some)
        },
        priority: command.priority,
        estimated_minutes: command.estimate.map(Some),
        linked_goal_id: command.goal.map(Some),
        pattern: command.every,
        days_of_week: command.on.as_deref().map(parse_days).transpose()?,
        custom_interval_days: command.interval,
        start_date: command.start.as_deref().map(|s| parse_date(s, today)).transpose()?,
        end_date: if command.no_end {
            Some(None)
        } else {
            parse_optional_date(command.until.as_deref(), today)?.map(Some)
        },
    };

    if !has_changes(&update) {
        bail!("Nothing to change; pass at least one field to edit");
    }

    if !command.yes {
        let confirmation = Confirm::new()
            .with_prompt(format!(
                "Update rule '{}'? Existing instances keep their current values.",
                rule.title
            ))
            .default(true)
            .interact()
            .unwrap_or(false);
        if !confirmation {
            println!("Edit cancelled.");
            return Ok(());
        }
    }

    let updated = repository.update_rule(rule_id, update).await?;
    println!("{} Updated rule: '{}'", style::success("✓"), style::accent(&updated.title));
    println!("  {}", describe_rule(&updated));

    if updated.is_active {
        backfill(repository, &updated.owner_id, config, today).await?;
    }
    Ok(())
}

fn has_changes(update: &UpdateRuleData) -> bool {
    update.title.is_some()
        || update.description.is_some()
        || update.priority.is_some()
        || update.estimated_minutes.is_some()
        || update.linked_goal_id.is_some()
        || update.pattern.is_some()
        || update.days_of_week.is_some()
        || update.custom_interval_days.is_some()
        || update.start_date.is_some()
        || update.end_date.is_some()
}

async fn set_active_command<R: Repository>(
    repository: &R,
    command: RuleIdCommand,
    active: bool,
    config: &Config,
    today: NaiveDate,
) -> Result<()> {
    let rule_id = resolve_rule_id(repository, &command.id).await?;
    let rule = repository.set_rule_active(rule_id, active).await?;

    if active {
        println!("{} Resumed rule: '{}'", style::success("✓"), style::accent(&rule.title));
        backfill(repository, &rule.owner_id, config, today).await?;
    } else {
        println!("{} Paused rule: '{}'", style::success("✓"), style::accent(&rule.title));
        println!("  Existing instances are kept.");
    }
    Ok(())
}

async fn preview_command<R: Repository>(
    repository: &R,
    command: RulePreviewCommand,
    today: NaiveDate,
) -> Result<()> {
    let rule_id = resolve_rule_id(repository, &command.id).await?;
    let rule = repository
        .find_rule_by_id(rule_id)
        .await?
        .ok_or_else(|| anyhow!("Rule not found"))?;

    let from = parse_optional_date(command.from.as_deref(), today)?.unwrap_or(today);
    let schedule = Schedule::from_rule(&rule)?;
    let dates = schedule.preview(from, command.count);

    println!("{} {}", style::heading("Preview:"), schedule.describe());
    if dates.is_empty() {
        println!("No upcoming dates.");
        return Ok(());
    }
    for (i, date) in dates.iter().enumerate() {
        println!("  {:>2}. {} ({})", i + 1, date, date.format("%a"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_options_must_match_pattern() {
        assert!(check_pattern_options(RecurrencePattern::Weekly, Some("mon"), None).is_ok());
        assert!(check_pattern_options(RecurrencePattern::Custom, None, Some(3)).is_ok());
        assert!(check_pattern_options(RecurrencePattern::Daily, Some("mon"), None).is_err());
        assert!(check_pattern_options(RecurrencePattern::Weekly, None, Some(2)).is_err());
    }

    #[test]
    fn test_empty_update_has_no_changes() {
        assert!(!has_changes(&UpdateRuleData::default()));
        let update = UpdateRuleData { end_date: Some(None), ..Default::default() };
        assert!(has_changes(&update));
    }
}
