//! Expiration notification CLI commands.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color};
use console::style;

use readzone_types::notification::{ExpirationNotice, NotificationClass};

use super::output::{self, Output};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum NotifyCommand {
    /// List drafts due an expiration warning, without sending anything.
    Targets {
        /// Only this user's drafts, using the wider per-user window.
        #[arg(long)]
        owner: Option<String>,
    },

    /// Send one warning per due draft through the configured transport.
    Send,
}

pub async fn run(state: &AppState, command: NotifyCommand, out: Output) -> Result<()> {
    match command {
        NotifyCommand::Targets { owner } => {
            let targets = match owner {
                Some(owner) => state.notifier.user_expiration_warnings(&owner).await?,
                None => state.notifier.get_expiration_targets().await?,
            };
            if out.json(&targets)? || out.quiet {
                return Ok(());
            }
            print_targets(&targets);
            Ok(())
        }

        NotifyCommand::Send => {
            let spinner = out.spinner(&format!("Sending warnings via {}...", state.sender));
            let report = state.notifier.notify_expiring_drafts().await?;
            spinner.finish_and_clear();

            if out.json(&report)? || out.quiet {
                return Ok(());
            }
            output::success(&format!(
                "Sent {} of {} warning(s) in {} ms",
                report.sent, report.targets, report.duration_ms
            ));
            if report.suppressed > 0 {
                output::field("Suppressed", report.suppressed);
            }
            if report.failed > 0 {
                output::field("Failed", style(report.failed).red());
                println!();
            }
            output::print_failures(&report.errors);
            Ok(())
        }
    }
}

fn class_cell(class: NotificationClass) -> Cell {
    match class {
        NotificationClass::EarlyWarning => Cell::new("early warning").fg(Color::Yellow),
        NotificationClass::FinalWarning => Cell::new("final warning").fg(Color::Red),
        NotificationClass::Expired => Cell::new("expired").fg(Color::DarkGrey),
    }
}

fn print_targets(targets: &[ExpirationNotice]) {
    if targets.is_empty() {
        output::info("No drafts are due an expiration warning.");
        return;
    }

    let mut table = output::table(&["Draft", "Owner", "Title", "Class", "Expires", "Hours left"]);
    for notice in targets {
        table.add_row(vec![
            Cell::new(notice.draft_id.to_string()).fg(Color::DarkGrey),
            Cell::new(&notice.owner_id),
            Cell::new(output::truncate(&notice.display_title, 40)),
            class_cell(notice.class),
            Cell::new(notice.expires_at.format("%Y-%m-%d %H:%M UTC")),
            Cell::new(notice.hours_remaining),
        ]);
    }
    println!();
    println!("{table}");
    println!();
}
