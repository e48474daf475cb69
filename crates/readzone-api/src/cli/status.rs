//! System status dashboard command.

use anyhow::Result;
use comfy_table::{Cell, Color};
use console::style;

use crate::state::AppState;

use super::output::{self, Output};

/// Display pool health, migration progress and sync backlog.
pub async fn status(state: &AppState, out: Output) -> Result<()> {
    let pools = state.db_pool.health();
    let migration = state.maintenance.status().await?;
    let metrics = state.sync.sync_metrics(24).await?;

    if out.json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "pools": pools,
            "migration": migration,
            "sync": metrics,
            "notifier": state.sender,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    if out.quiet {
        return Ok(());
    }

    println!();
    println!(
        "  {} ReadZone drafts v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    output::section("Connection pools");
    let mut table = output::table(&["Pool", "In use", "Idle", "Max", "Utilization"]);
    for pool in &pools {
        let utilization = Cell::new(format!("{:.0}%", pool.utilization * 100.0));
        table.add_row(vec![
            Cell::new(pool.name),
            Cell::new(pool.stats.in_use()),
            Cell::new(pool.stats.idle),
            Cell::new(pool.stats.max),
            if pool.under_stress {
                utilization.fg(Color::Red)
            } else {
                utilization.fg(Color::Green)
            },
        ]);
    }
    println!("{table}");
    println!();

    output::section("Migration");
    output::field(
        "Progress",
        if migration.complete {
            style(format!("{}%", migration.progress_percent)).green()
        } else {
            style(format!("{}%", migration.progress_percent)).yellow()
        },
    );
    output::field("Rows", migration.total);
    output::field("Legacy", migration.legacy);
    output::field("Overdue", migration.expired);
    output::field("Audit", migration.audit_records);
    if migration.needs_cleanup {
        println!(
            "  {}",
            style("Cleanup pending: run `rzd migrate --cleanup`").yellow()
        );
    }
    println!();

    output::section("Book sync (24h)");
    output::field("Synced", metrics.synced_in_window);
    output::field("Pending", metrics.pending_candidates);
    println!();

    output::section("System");
    output::field("Data dir", style(state.data_dir.display()).dim());
    output::field("Database", style("SQLite (WAL mode)").dim());
    output::field("Notifier", state.sender);
    println!();

    Ok(())
}
