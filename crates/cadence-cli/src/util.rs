use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::repository::Repository;
use uuid::Uuid;

pub async fn resolve_rule_id(repo: &impl Repository, short_id: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(short_id) {
        return Ok(id);
    }
    let rules = repo.find_rules_by_short_id(short_id).await?;
    match rules.len() {
        1 => Ok(rules[0].id),
        0 => Err(anyhow!(CoreError::NotFound(format!(
            "No rule found with ID '{}'",
            short_id
        )))),
        _ => {
            let rule_info: Vec<(String, String)> = rules
                .into_iter()
                .map(|r| (r.id.to_string(), r.title))
                .collect();
            Err(anyhow!(CoreError::AmbiguousId(rule_info)))
        }
    }
}

pub async fn resolve_task_id(repo: &impl Repository, short_id: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(short_id) {
        return Ok(id);
    }
    let tasks = repo.find_tasks_by_short_id(short_id).await?;
    match tasks.len() {
        1 => Ok(tasks[0].id),
        0 => Err(anyhow!(CoreError::NotFound(format!(
            "No task found with ID '{}'",
            short_id
        )))),
        _ => {
            let task_info: Vec<(String, String)> = tasks
                .into_iter()
                .map(|t| (t.id.to_string(), format!("{} on {}", t.title, t.scheduled_date)))
                .collect();
            Err(anyhow!(CoreError::AmbiguousId(task_info)))
        }
    }
}

/// Last eight hex digits of an ID; accepted back wherever an ID is expected.
pub fn short_id(id: &Uuid) -> String {
    let hex = id.simple().to_string();
    hex[hex.len() - 8..].to_string()
}
