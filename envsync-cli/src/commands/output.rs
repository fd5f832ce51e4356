//! Human-readable rendering of operation reports.
//!
//! Reports arrive as JSON (from the agent or a local run) and are read
//! field by field; a missing field renders as `-`.

use colored::Colorize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

const SHORT_REVISION: usize = 10;

#[derive(Tabled)]
struct CheckoutRow {
    #[tabled(rename = "branch")]
    branch: String,
    #[tabled(rename = "environment")]
    environment: String,
    #[tabled(rename = "from")]
    from: String,
    #[tabled(rename = "to")]
    to: String,
    #[tabled(rename = "hook")]
    hook: String,
}

pub fn print_update_all(report: &Value) {
    let checkouts = report["checkouts"].as_array().cloned().unwrap_or_default();
    println!(
        "{} {} | mirror {} | {} environments | config {}",
        "✓".green().bold(),
        text(&report["status"]),
        text(&report["mirror"]),
        checkouts.len(),
        config_label(&report["config_written"]),
    );

    if !checkouts.is_empty() {
        let rows: Vec<CheckoutRow> = checkouts.iter().map(checkout_row).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    print_cleanup(&report["cleanup"]);
}

pub fn print_update(report: &Value) {
    match report["status"].as_str() {
        Some("Deleted") => println!(
            "{} branch '{}' not found upstream; nothing checked out",
            "·".bright_black().bold(),
            text(&report["branch"]),
        ),
        _ => {
            println!(
                "{} '{}' → {}",
                "✓".green().bold(),
                text(&report["branch"]),
                text(&report["environment"]),
            );
            let mut table = Table::new([checkout_row(report)]);
            table.with(Style::rounded());
            println!("{table}");
        }
    }
}

pub fn print_cleanup(report: &Value) {
    if report["skipped"].as_bool() == Some(true) {
        println!("{} cleanup skipped (not confirmed)", "·".bright_black().bold());
        return;
    }

    let removed: Vec<&str> = report["removed"]
        .as_array()
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if removed.is_empty() {
        println!("{} cleanup: nothing to remove", "✓".green().bold());
    } else {
        println!(
            "{} cleanup removed {}: {}",
            "✓".green().bold(),
            removed.len(),
            removed.join(", ")
        );
    }

    for failure in report["failed"].as_array().into_iter().flatten() {
        println!(
            "{} could not remove {}: {}",
            "✗".red().bold(),
            text(&failure["name"]),
            text(&failure["error"]).as_str().red(),
        );
    }
}

fn checkout_row(checkout: &Value) -> CheckoutRow {
    CheckoutRow {
        branch: text(&checkout["branch"]),
        environment: text(&checkout["environment"]),
        from: short_revision(&checkout["from"]),
        to: short_revision(&checkout["to"]),
        hook: hook_label(&checkout["after_checkout_ok"]),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn short_revision(value: &Value) -> String {
    let full = text(value);
    full.chars().take(SHORT_REVISION).collect()
}

fn hook_label(value: &Value) -> String {
    match value.as_bool() {
        Some(true) => "ok".green().to_string(),
        Some(false) => "failed".red().to_string(),
        None => "-".to_string(),
    }
}

fn config_label(value: &Value) -> String {
    match value.as_bool() {
        Some(true) => "rewritten".to_string(),
        Some(false) => "unchanged".to_string(),
        None => "not managed".to_string(),
    }
}
