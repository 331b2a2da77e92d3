use anyhow::Result;
use cadence_core::generation::{GenerationJob, GenerationReport};
use cadence_core::models::GenerationConfig;
use cadence_core::repository::Repository;
use chrono::{Duration, NaiveDate};
use tokio::sync::watch;
use tracing::warn;

use crate::cli::GenerateCommand;
use crate::config::Config;
use crate::parser::parse_optional_date;
use crate::views::style;
use crate::views::table::display_report_details;

pub async fn generate_command<R: Repository>(
    repository: &R,
    command: GenerateCommand,
    config: &Config,
    today: NaiveDate,
) -> Result<()> {
    let owner = if command.all {
        None
    } else {
        Some(command.owner.unwrap_or_else(|| config.owner.clone()))
    };
    let from = parse_optional_date(command.from.as_deref(), today)?.unwrap_or(today);
    let to = match parse_optional_date(command.to.as_deref(), today)? {
        Some(to) => to,
        None => window_end(from, config.generation.lookahead_days),
    };

    // Ctrl-C stops the run between rules; committed rules stay committed
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current rule");
            let _ = cancel_tx.send(true);
        }
    });

    let mut job = GenerationJob::new(repository, config.generation.clone()).with_cancellation(cancel_rx);
    let result = job.run(owner.as_deref(), from, to).await;
    signal.abort();
    let report = result?;

    if command.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} Generated {} .. {} for {}",
        style::success("✓"),
        from,
        to,
        style::accent(owner.as_deref().unwrap_or("all owners"))
    );
    print_summary(&report);
    display_report_details(&report);
    Ok(())
}

/// Materializes the configured backfill window for one owner, right after a
/// rule was created, edited or resumed.
pub async fn backfill<R: Repository>(
    repository: &R,
    owner: &str,
    config: &Config,
    today: NaiveDate,
) -> Result<Option<GenerationReport>> {
    let Some(end) = backfill_end(today, &config.generation) else {
        return Ok(None);
    };
    let report = GenerationJob::new(repository, config.generation.clone())
        .run(Some(owner), today, end)
        .await?;

    println!(
        "{} Backfilled {} instance(s) through {}",
        style::heading("→"),
        style::strong(report.created.to_string()),
        end
    );
    if !report.downgraded.is_empty() || !report.per_rule_errors.is_empty() {
        display_report_details(&report);
    }
    Ok(Some(report))
}

/// End of the backfill window, capped at `max_window_days` so a saved rule
/// never fails its follow-up generation. `None` when backfill is disabled.
fn backfill_end(today: NaiveDate, generation: &GenerationConfig) -> Option<NaiveDate> {
    if generation.backfill_days == 0 {
        return None;
    }
    Some(window_end(today, generation.backfill_days.min(generation.max_window_days)))
}

/// Last day of a window of `days` days starting at `start`; never shorter than one day.
fn window_end(start: NaiveDate, days: u32) -> NaiveDate {
    start + Duration::days(i64::from(days.max(1)) - 1)
}

fn print_summary(report: &GenerationReport) {
    println!("  Created:    {}", style::success(report.created.to_string()));
    println!("  Skipped:    {}", report.skipped);
    if !report.downgraded.is_empty() {
        println!("  Downgraded: {}", style::notice(report.downgraded.len().to_string()));
    }
    if !report.per_rule_errors.is_empty() {
        println!("  Failed:     {}", style::danger(report.per_rule_errors.len().to_string()));
    }
    if report.cancelled {
        println!("{}", style::ident("Run cancelled; the next run picks up the remaining rules."));
    }
}
