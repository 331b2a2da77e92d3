use anyhow::{Context, Result};
use cadence_core::db;
use cadence_core::error::CoreError;
use cadence_core::repository::SqliteRepository;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;
use crate::views::style;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = config::Config::new().unwrap_or_else(|e| {
        eprintln!("{} Ignoring invalid configuration: {}", style::warning_label("Warning:"), e);
        config::Config::default()
    });

    let log_format = cli.log_format.unwrap_or(config.log_format);
    if let Err(e) = init_logging(&cli.log_level, log_format) {
        eprintln!("{} {:#}", style::warning_label("Warning:"), e);
    }

    let today = match config.today() {
        Ok(today) => today,
        Err(e) => {
            eprintln!("{} {}", style::error_label("Error:"), e);
            std::process::exit(1);
        }
    };

    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{} {}", style::error_label("Error:"), e);
            std::process::exit(1);
        }
    };
    let repository = SqliteRepository::new(db_pool);

    let result = match cli.command {
        cli::Commands::Rule(command) => {
            commands::rule::rule_command(&repository, command, &config, today).await
        }
        cli::Commands::Task(command) => {
            commands::task::task_command(&repository, command, &config, today).await
        }
        cli::Commands::Generate(command) => {
            commands::generate::generate_command(&repository, command, &config, today).await
        }
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

/// Installs the tracing subscriber. `CADENCE_LOG` takes precedence over `--log-level`.
/// Logs go to stderr so command output stays machine-readable.
fn init_logging(log_level: &str, log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_env("CADENCE_LOG").unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .context("Failed to initialize JSON logging")?;
        }
        LogFormat::Pretty => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()
                .context("Failed to initialize pretty logging")?;
        }
    }

    Ok(())
}

fn handle_error(err: anyhow::Error) {
    if let Some(core_error) = err.chain().find_map(|e| e.downcast_ref::<CoreError>()) {
        match core_error {
            CoreError::NotFound(s) => {
                eprintln!("{} {}", style::error_label("Error:"), s);
            }
            CoreError::AmbiguousId(matches) => {
                eprintln!("{}", style::error_label("Error: Ambiguous ID."));
                eprintln!("Did you mean one of these?");
                for (id, label) in matches {
                    eprintln!("  {} ({})", style::ident(id), label);
                }
            }
            CoreError::InvalidInput(s) => {
                eprintln!("{} Invalid input: {}", style::error_label("Error:"), s);
            }
            CoreError::InvalidRule(s) => {
                eprintln!("{} Invalid rule: {}", style::error_label("Error:"), s);
            }
            CoreError::PriorityCapExceeded { date, priority } => {
                eprintln!(
                    "{} {} already has its {} limit; demote another task first",
                    style::error_label("Error:"),
                    date,
                    priority
                );
            }
            _ => eprintln!("{} {:#}", style::error_label("Error:"), err),
        }
    } else {
        eprintln!("{} {:#}", style::error_label("Error:"), err);
    }
}
