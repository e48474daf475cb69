//! Book sync CLI commands: single draft, batch sweep, metrics.

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use tokio_util::sync::CancellationToken;

use readzone_core::service::sync::BatchSyncOptions;
use readzone_types::draft::DraftId;
use readzone_types::sync::{BatchSyncReport, SyncConfidence};

use super::output::{self, Output};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum SyncCommand {
    /// Sync one draft against the catalog now.
    Draft {
        id: String,
        /// Allow creating a missing catalog book, subject to the auto-create policy.
        #[arg(long)]
        confident: bool,
    },

    /// Sweep unlinked drafts in sub-batches, resuming from the last checkpoint.
    Batch {
        /// Maximum drafts to process.
        #[arg(long)]
        limit: Option<usize>,
        /// Drafts per sub-batch (capped by `sync.max_batch_size`).
        #[arg(long)]
        batch_size: Option<usize>,
        /// Ignore any saved checkpoint and start from the beginning.
        #[arg(long)]
        fresh: bool,
    },

    /// Sync activity over a trailing window.
    Metrics {
        #[arg(long, default_value = "24")]
        hours: i64,
    },
}

pub async fn run(state: &AppState, command: SyncCommand, out: Output) -> Result<()> {
    match command {
        SyncCommand::Draft { id, confident } => {
            let id = id
                .parse::<DraftId>()
                .with_context(|| format!("'{id}' is not a valid draft id"))?;
            let confidence = if confident {
                SyncConfidence::Confirmed
            } else {
                SyncConfidence::Unconfirmed
            };
            let result = state.sync.sync_draft_book(&id, confidence).await?;
            if out.json(&result)? || out.quiet {
                return Ok(());
            }

            let label = if result.outcome.is_synced() {
                style(result.outcome.label()).green().bold()
            } else {
                style(result.outcome.label()).yellow().bold()
            };
            println!();
            output::field("Outcome", label);
            if let Some(book_id) = result.book_id() {
                output::field("Book", book_id);
            }
            output::field("Version", result.version);
            println!();
            Ok(())
        }

        SyncCommand::Batch {
            limit,
            batch_size,
            fresh,
        } => {
            let cancel = CancellationToken::new();
            let watcher = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, stopping after the current sub-batch");
                    watcher.cancel();
                }
            });

            let spinner = out.spinner("Syncing drafts with the book catalog...");
            let report = state
                .sync
                .batch_sync_drafts(
                    BatchSyncOptions {
                        limit,
                        batch_size,
                        fresh,
                    },
                    &cancel,
                )
                .await?;
            spinner.finish_and_clear();

            if out.json(&report)? || out.quiet {
                return Ok(());
            }
            print_batch_report(&report);
            Ok(())
        }

        SyncCommand::Metrics { hours } => {
            let metrics = state.sync.sync_metrics(hours).await?;
            if out.json(&metrics)? || out.quiet {
                return Ok(());
            }
            println!();
            output::section("Book sync");
            output::field(&format!("Synced ({hours}h)"), style(metrics.synced_in_window).bold());
            output::field(
                "Last sync",
                metrics
                    .last_synced_at
                    .map(|at| output::format_relative_time(&at, chrono::Utc::now()))
                    .unwrap_or_else(|| "never".to_string()),
            );
            output::field("Pending", metrics.pending_candidates);
            println!();
            Ok(())
        }
    }
}

fn print_batch_report(report: &BatchSyncReport) {
    if report.interrupted {
        output::info("Interrupted; the next run resumes from the saved checkpoint.");
    } else {
        output::success(&format!(
            "Processed {} draft(s) in {} ms",
            report.processed, report.duration_ms
        ));
    }
    if let Some(cursor) = report.resumed_from {
        output::field("Resumed after", style(cursor).dim());
    }
    output::field("Synced", style(report.synced).green());
    output::field("No match", report.no_match);
    output::field("Ambiguous", report.ambiguous);
    output::field("Timed out", report.timed_out);
    output::field("Conflicts", report.conflicts);
    output::field("Skipped", report.skipped);
    output::field(
        "Failed",
        if report.failed > 0 {
            style(report.failed).red()
        } else {
            style(report.failed).dim()
        },
    );
    println!();
    output::print_failures(&report.errors);
}
