//! Shared rendering helpers for CLI commands.

use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use readzone_types::draft::{DraftStatus, ItemFailure};

/// Output mode selected by the global `--json` / `--quiet` flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    /// Styled text should be printed.
    pub fn styled(&self) -> bool {
        !self.json && !self.quiet
    }

    /// Print `value` as pretty JSON when in JSON mode. Returns whether it did.
    pub fn json<T: Serialize>(&self, value: &T) -> anyhow::Result<bool> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Ok(self.json)
    }

    /// Spinner for a long-running step; hidden unless output is styled.
    pub fn spinner(&self, message: &str) -> ProgressBar {
        if !self.styled() {
            return ProgressBar::hidden();
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        spinner
    }
}

pub fn success(message: &str) {
    println!();
    println!("  {} {}", style("✓").green().bold(), message);
    println!();
}

pub fn info(message: &str) {
    println!();
    println!("  {} {}", style("i").blue().bold(), message);
    println!();
}

pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<14} {}", style(format!("{label}:")).bold(), value);
}

pub fn section(title: &str) {
    println!("  {}", style(format!("── {title} ──")).dim());
}

pub fn format_status(status: DraftStatus) -> String {
    match status {
        DraftStatus::Active => format!("{}", style("● active").green()),
        DraftStatus::Expired => format!("{}", style("○ expired").yellow()),
        DraftStatus::Abandoned => format!("{}", style("◌ abandoned").dim()),
        DraftStatus::Migrated => format!("{}", style("◆ migrated").cyan()),
    }
}

pub fn status_cell(status: DraftStatus) -> Cell {
    match status {
        DraftStatus::Active => Cell::new("● active").fg(Color::Green),
        DraftStatus::Expired => Cell::new("○ expired").fg(Color::Yellow),
        DraftStatus::Abandoned => Cell::new("◌ abandoned").fg(Color::DarkGrey),
        DraftStatus::Migrated => Cell::new("◆ migrated").fg(Color::Cyan),
    }
}

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

/// Per-item failures collected by a batch job.
pub fn print_failures(errors: &[ItemFailure]) {
    if errors.is_empty() {
        return;
    }
    let mut failures = table(&["Draft", "Error"]);
    for failure in errors {
        failures.add_row(vec![
            Cell::new(failure.draft_id.to_string()),
            Cell::new(&failure.error).fg(Color::Red),
        ]);
    }
    println!("  {}", style(format!("{} item(s) failed:", errors.len())).red());
    println!("{failures}");
    println!();
}

/// "3h ago" for the past, "in 2d" for the future.
pub fn format_relative_time(dt: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now - *dt;
    let (diff, future) = if diff < chrono::Duration::zero() {
        (-diff, true)
    } else {
        (diff, false)
    };

    let span = if diff.num_minutes() < 1 {
        return "just now".to_string();
    } else if diff.num_hours() < 1 {
        format!("{}m", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d", diff.num_days())
    } else {
        return dt.format("%Y-%m-%d").to_string();
    };

    if future {
        format!("in {span}")
    } else {
        format!("{span} ago")
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{cut}…")
}
