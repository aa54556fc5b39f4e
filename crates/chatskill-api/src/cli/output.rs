//! Shared rendering helpers for command output.

use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use chatskill_types::error::SkillError;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A table with the house style and the given header.
pub fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        header
            .iter()
            .map(|h| Cell::new(h).fg(Color::White))
            .collect::<Vec<_>>(),
    );
    table
}

/// Spinner for long operations. Hidden in JSON mode so stdout stays clean.
pub fn spinner(message: impl Into<String>, json: bool) -> ProgressBar {
    if json {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

pub fn success(message: impl std::fmt::Display) {
    println!();
    println!("  {} {message}", style("✓").green().bold());
    println!();
}

/// Message for an empty listing, with a hint on how to create something.
pub fn empty(message: impl std::fmt::Display, hint: impl std::fmt::Display) {
    println!();
    println!("  {} {message}", style("i").blue().bold());
    println!("     {hint}");
    println!();
}

/// A tenant without any skill of the listed type has nothing to list.
pub fn or_empty<T>(result: Result<Vec<T>, SkillError>) -> Result<Vec<T>> {
    match result {
        Ok(items) => Ok(items),
        Err(SkillError::ManagerMissing { .. }) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Truncate to `max` characters, marking the cut.
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}
