use cadence_core::generation::GenerationReport;
use cadence_core::models::{Priority, RecurrenceRule, TaskInstance};
use cadence_core::recurrence::Schedule;
use comfy_table::{Attribute, Cell, Color, Row, Table};

use crate::util::short_id;

fn priority_cell(priority: Priority) -> Cell {
    let cell = Cell::new(priority.to_string());
    match priority {
        Priority::Mit => cell.fg(Color::Red).add_attribute(Attribute::Bold),
        Priority::Primary => cell.fg(Color::Yellow),
        Priority::Secondary => cell,
    }
}

/// Human description of a rule's schedule; stored rules that no longer
/// validate are shown as such rather than hidden.
pub fn describe_rule(rule: &RecurrenceRule) -> String {
    match Schedule::from_rule(rule) {
        Ok(schedule) => schedule.describe(),
        Err(e) => format!("invalid ({})", e),
    }
}

pub fn display_rules(rules: &[RecurrenceRule]) {
    if rules.is_empty() {
        println!("No rules found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Schedule", "Priority", "Starts", "Status"]);

    for rule in rules {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(&rule.id)));

        let mut title_cell = Cell::new(&rule.title);
        if !rule.is_active {
            title_cell = title_cell.fg(Color::DarkGrey);
        }
        row.add_cell(title_cell);
        row.add_cell(Cell::new(describe_rule(rule)));
        row.add_cell(priority_cell(rule.priority));
        row.add_cell(Cell::new(rule.start_date));
        row.add_cell(if rule.is_active {
            Cell::new("active").fg(Color::Green)
        } else {
            Cell::new("paused").fg(Color::DarkGrey)
        });
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_tasks(tasks: &[TaskInstance]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Date", "Priority", "Estimate", "Source"]);

    for task in tasks {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(&task.id)));

        let mut display_title = String::new();
        if task.source_rule_id.is_some() {
            display_title.push('↻');
            display_title.push(' ');
        }
        display_title.push_str(&task.title);

        let mut title_cell = Cell::new(display_title);
        if task.completed {
            title_cell = title_cell.add_attribute(Attribute::CrossedOut).fg(Color::DarkGrey);
        }
        row.add_cell(title_cell);
        row.add_cell(Cell::new(task.scheduled_date));

        let mut priority = priority_cell(task.priority);
        if task.priority_downgraded {
            priority = Cell::new(format!("{} ↓", task.priority)).fg(Color::Magenta);
        }
        row.add_cell(priority);

        row.add_cell(Cell::new(
            task.estimated_minutes
                .map(|m| format!("{}m", m))
                .unwrap_or_else(|| "-".to_string()),
        ));
        row.add_cell(Cell::new(
            task.source_rule_id
                .map(|id| short_id(&id))
                .unwrap_or_else(|| "manual".to_string()),
        ));
        table.add_row(row);
    }

    println!("{table}");
}

/// Downgrades and failed rules of a generation run, if there were any.
pub fn display_report_details(report: &GenerationReport) {
    if !report.downgraded.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Rule", "Date", "Requested", "Assigned"]);
        for downgrade in &report.downgraded {
            table.add_row(vec![
                Cell::new(short_id(&downgrade.rule_id)),
                Cell::new(downgrade.date),
                priority_cell(downgrade.from),
                priority_cell(downgrade.to),
            ]);
        }
        println!("{table}");
    }

    if !report.per_rule_errors.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Rule", "Error"]);
        for failure in &report.per_rule_errors {
            table.add_row(vec![
                Cell::new(short_id(&failure.rule_id)),
                Cell::new(&failure.error).fg(Color::Red),
            ]);
        }
        println!("{table}");
    }
}
