use cadence_core::models::GenerationConfig;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use clap::ValueEnum;
use figment::{Figment, providers::{Format, Toml, Env}};
use serde::Deserialize;
use std::str::FromStr;

pub const CONFIG_FILE: &str = "cadence.toml";

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database_path: String,
    /// Owner used when a command does not name one
    pub owner: String,
    /// IANA timezone deciding what "today" is; detected when absent
    pub timezone: Option<String>,
    pub generation: GenerationConfig,
    pub log_format: LogFormat,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "cadence.db".to_string(),
            owner: "default".to_string(),
            timezone: None,
            generation: GenerationConfig::default(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// `cadence.toml` in the working directory, then `CADENCE_*` variables.
    /// Nested keys use a double underscore, e.g. `CADENCE_GENERATION__LOOKAHEAD_DAYS`.
    pub fn new() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("CADENCE_").split("__"))
    }

    /// The configured timezone, or the system's when none is set.
    pub fn timezone(&self) -> Result<Tz, String> {
        match &self.timezone {
            Some(name) => validate_timezone(name),
            None => validate_timezone(&detect_system_timezone()),
        }
    }

    /// Today's date in the configured timezone.
    pub fn today(&self) -> Result<NaiveDate, String> {
        let tz = self.timezone()?;
        Ok(Utc::now().with_timezone(&tz).date_naive())
    }
}

/// Validates that a timezone string is a valid IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<Tz, String> {
    Tz::from_str(timezone)
        .map_err(|_| format!("Invalid timezone: '{}'. Use IANA timezone names like 'America/New_York'", timezone))
}

/// Detects the system timezone, falling back to UTC if detection fails
pub fn detect_system_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    if let Ok(local_tz) = iana_time_zone::get_timezone() {
        if validate_timezone(&local_tz).is_ok() {
            return local_tz;
        }
    }

    "UTC".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_apply_without_sources() {
        Jail::expect_with(|_jail| {
            let config = Config::new()?;
            assert_eq!(config.database_path, "cadence.db");
            assert_eq!(config.generation, GenerationConfig::default());
            assert_eq!(config.log_format, LogFormat::Pretty);
            Ok(())
        });
    }

    #[test]
    fn test_file_and_environment_are_merged() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                owner = "ana"
                timezone = "Europe/Berlin"

                [generation]
                lookahead_days = 7
                "#,
            )?;
            jail.set_env("CADENCE_DATABASE_PATH", "/tmp/other.db");
            jail.set_env("CADENCE_GENERATION__MAX_WINDOW_DAYS", "90");

            let config = Config::new()?;
            assert_eq!(config.owner, "ana");
            assert_eq!(config.database_path, "/tmp/other.db");
            assert_eq!(config.generation.lookahead_days, 7);
            assert_eq!(config.generation.max_window_days, 90);
            assert_eq!(config.generation.backfill_days, 30);
            assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Berlin);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_timezone_is_reported() {
        let config = Config { timezone: Some("Mars/Olympus".to_string()), ..Default::default() };
        assert!(config.timezone().unwrap_err().contains("Mars/Olympus"));
    }
}
