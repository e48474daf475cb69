//! Store migration CLI: shape upgrade, validation, rollback and cleanup.
//!
//! Each mode prints a structured summary (counts, duration, errors).
//! `--validate` exits non-zero when the store is unfit.

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use tokio_util::sync::CancellationToken;

use readzone_types::maintenance::{CleanupReport, MigrationStats, RollbackStats, ValidationReport};

use super::output::{self, Output};
use crate::state::AppState;

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Count what would change without writing.
    #[arg(long)]
    pub dry_run: bool,

    /// Read-only integrity scan.
    #[arg(long, conflicts_with_all = ["rollback", "cleanup"])]
    pub validate: bool,

    /// Return every row to the legacy shape. Requires `--confirm rollback`.
    #[arg(long, requires = "confirm", conflicts_with_all = ["cleanup", "dry_run"])]
    pub rollback: bool,

    /// Confirmation string for destructive operations.
    #[arg(long, value_name = "WORD")]
    pub confirm: Option<String>,

    /// Expire overdue drafts, enforce per-user caps and purge retired rows.
    #[arg(long)]
    pub cleanup: bool,
}

pub async fn run(state: &AppState, args: MigrateArgs, out: Output) -> Result<()> {
    if args.validate {
        let report = state.maintenance.validate().await?;
        if !out.json(&report)? && !out.quiet {
            print_validation(&report);
        }
        if !report.is_fit {
            bail!("store failed validation with {} issue(s)", report.issues.len());
        }
        return Ok(());
    }

    if args.rollback {
        let confirmation = args.confirm.as_deref().unwrap_or_default();
        let spinner = out.spinner("Rolling back to the legacy shape...");
        let stats = state.maintenance.rollback(confirmation).await;
        spinner.finish_and_clear();
        let stats = stats?;
        if !out.json(&stats)? && !out.quiet {
            print_rollback(&stats);
        }
        return Ok(());
    }

    if args.cleanup {
        let spinner = out.spinner("Cleaning up drafts...");
        let report = state.maintenance.cleanup(args.dry_run).await;
        spinner.finish_and_clear();
        let report = report?;
        if !out.json(&report)? && !out.quiet {
            print_cleanup(&report);
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current batch");
            watcher.cancel();
        }
    });

    let spinner = out.spinner("Upgrading draft rows...");
    let stats = state.maintenance.migrate(args.dry_run, &cancel).await;
    spinner.finish_and_clear();
    let stats = stats?;
    if !out.json(&stats)? && !out.quiet {
        print_migration(&stats);
    }
    Ok(())
}

fn dry_run_note(dry_run: bool) {
    if dry_run {
        println!("  {}", style("Dry run: nothing was written.").yellow());
        println!();
    }
}

fn print_migration(stats: &MigrationStats) {
    if stats.interrupted {
        output::info("Migration interrupted; rerun to upgrade the remaining rows.");
    } else {
        output::success(&format!("Migration finished in {} ms", stats.duration_ms));
    }
    dry_run_note(stats.dry_run);
    output::field("Scanned", stats.total);
    output::field(
        if stats.dry_run { "Would migrate" } else { "Migrated" },
        style(stats.migrated).green(),
    );
    output::field("Already current", stats.skipped);
    output::field("Failed", stats.failed);
    println!();
    output::print_failures(&stats.errors);
}

fn print_validation(report: &ValidationReport) {
    if report.is_fit {
        output::success(&format!("Store is fit ({} ms)", report.duration_ms));
    } else {
        println!();
        println!(
            "  {} Store is unfit: {} issue(s)",
            style("✗").red().bold(),
            report.issues.len()
        );
        println!();
    }
    output::field("Rows", report.stats.total);
    output::field("Valid", style(report.stats.valid).green());
    output::field("Expired", report.stats.expired);
    output::field("Orphaned", report.stats.orphaned);
    println!();
    for issue in &report.issues {
        println!("    {} {}", style("•").red(), issue);
    }
    if !report.issues.is_empty() {
        println!();
    }
}

fn print_rollback(stats: &RollbackStats) {
    output::success(&format!(
        "Rolled back {} row(s) in {} batch(es), {} ms",
        stats.reverted, stats.batches, stats.duration_ms
    ));
}

fn print_cleanup(report: &CleanupReport) {
    output::success(&format!("Cleanup finished in {} ms", report.duration_ms));
    dry_run_note(report.dry_run);
    output::field("Expired", report.expired);
    output::field("Over user cap", report.abandoned_excess);
    output::field("Retired purged", report.deleted_retired);
    output::field("Orphans purged", report.deleted_orphaned);
    output::field("Audit pruned", report.audit_pruned);
    output::field("Optimized", if report.optimized { "yes" } else { "no" });
    println!();
    output::print_failures(&report.errors);
}
