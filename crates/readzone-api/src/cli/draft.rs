//! Draft lifecycle CLI commands: create, update, show, list, restore,
//! delete, abandon, history.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color};
use console::style;

use readzone_types::audit::AuditEntry;
use readzone_types::book::BookId;
use readzone_types::draft::{CreateDraftRequest, Draft, DraftId, DraftMetadata, DraftPatch, DraftStatus};
use readzone_types::sync::{SyncConfidence, SyncResult};

use super::output::{self, Output};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum DraftCommand {
    /// Create a new draft.
    Create {
        /// Authoring user.
        #[arg(long)]
        owner: String,
        /// Review body (HTML).
        #[arg(long)]
        content: String,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        book: BookArgs,
        /// Canonical book picked from the catalog.
        #[arg(long)]
        book_id: Option<String>,
        /// Opaque UI metadata as a JSON object.
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Apply a change if the draft is still at the expected version.
    Update {
        id: String,
        #[arg(long)]
        owner: String,
        /// Version the edit was based on.
        #[arg(long)]
        expected_version: i64,
        #[arg(long)]
        content: Option<String>,
        /// New title; pass an empty string to clear it.
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        book: BookArgs,
        #[arg(long)]
        metadata: Option<String>,
        /// Bring an expired or abandoned draft back as part of this update.
        #[arg(long)]
        restore: bool,
    },

    /// Show one draft.
    Show {
        id: String,
        #[arg(long)]
        owner: String,
        /// Record the read as the author resuming work.
        #[arg(long)]
        resume: bool,
    },

    /// List a user's drafts, most recently updated first.
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        /// Filter by status (active, expired, abandoned, migrated).
        #[arg(long)]
        status: Option<String>,
    },

    /// Restore an expired or abandoned draft.
    Restore {
        id: String,
        #[arg(long)]
        owner: String,
    },

    /// Permanently remove a draft. Its audit trail is kept.
    #[command(alias = "rm")]
    Delete {
        id: String,
        #[arg(long)]
        owner: String,
    },

    /// Operator action: retire an active draft without publishing it.
    Abandon {
        id: String,
        /// Operator id recorded in the audit trail.
        #[arg(long, default_value = "operator")]
        actor: String,
    },

    /// Audit trail for a draft, newest first.
    History {
        id: String,
        /// Restrict to drafts owned by this user.
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
    },
}

/// Book description captured with a draft.
#[derive(Args)]
pub struct BookArgs {
    /// Free-text book description as a JSON object (`{"title": ..., "author": ...}`).
    #[arg(long)]
    pub book_data: Option<String>,

    /// Vouch for the book data so sync may create a missing catalog book.
    #[arg(long)]
    pub confident: bool,
}

impl BookArgs {
    fn confidence(&self) -> SyncConfidence {
        if self.confident {
            SyncConfidence::Confirmed
        } else {
            SyncConfidence::Unconfirmed
        }
    }
}

pub async fn run(state: &AppState, command: DraftCommand, out: Output) -> Result<()> {
    match command {
        DraftCommand::Create {
            owner,
            content,
            title,
            book,
            book_id,
            metadata,
        } => {
            let request = CreateDraftRequest {
                owner_id: owner,
                content,
                title,
                book_data: book.book_data.clone(),
                book_id: book_id.as_deref().map(parse_book_id).transpose()?,
                metadata: parse_metadata(metadata.as_deref())?.unwrap_or_default(),
            };
            let spinner = out.spinner("Saving draft...");
            let draft = state.drafts.create_draft(request).await?;
            let (draft, sync) = state.sync_after_save(draft, book.confidence()).await;
            spinner.finish_and_clear();
            print_saved(&draft, sync.as_ref(), "Draft created", out)
        }

        DraftCommand::Update {
            id,
            owner,
            expected_version,
            content,
            title,
            book,
            metadata,
            restore,
        } => {
            let patch = DraftPatch {
                title,
                content,
                book_data: book.book_data.clone(),
                metadata: parse_metadata(metadata.as_deref())?,
                restore,
            };
            let spinner = out.spinner("Saving draft...");
            let draft = state
                .drafts
                .update_draft(&parse_draft_id(&id)?, &owner, expected_version, patch)
                .await?;
            let (draft, sync) = state.sync_after_save(draft, book.confidence()).await;
            spinner.finish_and_clear();
            print_saved(&draft, sync.as_ref(), "Draft saved", out)
        }

        DraftCommand::Show { id, owner, resume } => {
            let draft = state
                .drafts
                .get_draft(&parse_draft_id(&id)?, &owner, resume)
                .await?;
            if out.json(&draft)? || out.quiet {
                return Ok(());
            }
            print_draft(&draft);
            Ok(())
        }

        DraftCommand::List {
            owner,
            page,
            limit,
            status,
        } => {
            let status = status
                .map(|s| s.parse::<DraftStatus>().map_err(|e| anyhow::anyhow!(e)))
                .transpose()?;
            let page = state.drafts.list_drafts(&owner, page, limit, status).await?;
            if out.json(&page)? || out.quiet {
                return Ok(());
            }

            if page.items.is_empty() {
                output::info(&format!(
                    "No drafts found. Create one with: {}",
                    style("rzd draft create").yellow()
                ));
                return Ok(());
            }

            let now = chrono::Utc::now();
            let mut table = output::table(&["ID", "Title", "Status", "Version", "Book", "Expires", "Updated"]);
            for draft in &page.items {
                table.add_row(vec![
                    Cell::new(draft.id.to_string()).fg(Color::DarkGrey),
                    Cell::new(output::truncate(draft.title.as_deref().unwrap_or("Untitled"), 40)),
                    output::status_cell(draft.status),
                    Cell::new(draft.version),
                    match draft.book_id {
                        Some(_) => Cell::new("linked").fg(Color::Green),
                        None if draft.needs_book_sync() => Cell::new("pending").fg(Color::Yellow),
                        None => Cell::new("-").fg(Color::DarkGrey),
                    },
                    Cell::new(output::format_relative_time(&draft.expires_at, now)),
                    Cell::new(output::format_relative_time(&draft.updated_at, now)),
                ]);
            }

            println!();
            println!("{table}");
            println!(
                "  {}",
                style(format!(
                    "Page {} · {} of {} draft(s){}",
                    page.page,
                    page.items.len(),
                    page.total,
                    if page.has_next { " · more with --page" } else { "" }
                ))
                .dim()
            );
            println!();
            Ok(())
        }

        DraftCommand::Restore { id, owner } => {
            let draft = state
                .drafts
                .restore_draft(&parse_draft_id(&id)?, &owner)
                .await?;
            if out.json(&draft)? || out.quiet {
                return Ok(());
            }
            output::success(&format!(
                "Draft restored, now expires {}",
                style(draft.expires_at.format("%Y-%m-%d %H:%M UTC")).cyan()
            ));
            Ok(())
        }

        DraftCommand::Delete { id, owner } => {
            let id = parse_draft_id(&id)?;
            state.drafts.delete_draft(&id, &owner).await?;
            if out.json(&serde_json::json!({ "deleted": id }))? || out.quiet {
                return Ok(());
            }
            output::success(&format!("Draft {} deleted", style(id).dim()));
            Ok(())
        }

        DraftCommand::Abandon { id, actor } => {
            let draft = state
                .drafts
                .abandon_draft(&parse_draft_id(&id)?, &actor)
                .await?;
            if out.json(&draft)? || out.quiet {
                return Ok(());
            }
            output::success(&format!("Draft {} abandoned", style(draft.id).dim()));
            Ok(())
        }

        DraftCommand::History { id, owner, limit } => {
            let entries = state
                .drafts
                .draft_history(&parse_draft_id(&id)?, owner.as_deref(), limit)
                .await?;
            if out.json(&entries)? || out.quiet {
                return Ok(());
            }
            print_history(&entries);
            Ok(())
        }
    }
}

fn parse_draft_id(raw: &str) -> Result<DraftId> {
    raw.parse::<DraftId>()
        .with_context(|| format!("'{raw}' is not a valid draft id"))
}

fn parse_book_id(raw: &str) -> Result<BookId> {
    raw.parse::<BookId>()
        .with_context(|| format!("'{raw}' is not a valid book id"))
}

fn parse_metadata(raw: Option<&str>) -> Result<Option<DraftMetadata>> {
    raw.map(|raw| serde_json::from_str::<DraftMetadata>(raw).context("--metadata must be a JSON object"))
        .transpose()
}

fn print_saved(draft: &Draft, sync: Option<&SyncResult>, headline: &str, out: Output) -> Result<()> {
    if out.json {
        let body = serde_json::json!({ "draft": draft, "sync": sync });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }
    if out.quiet {
        return Ok(());
    }

    output::success(headline);
    print_draft(draft);
    if let Some(sync) = sync {
        let outcome = if sync.outcome.is_synced() {
            style(sync.outcome.label()).green()
        } else {
            style(sync.outcome.label()).yellow()
        };
        output::field("Book sync", outcome);
        println!();
    }
    Ok(())
}

fn print_draft(draft: &Draft) {
    let now = chrono::Utc::now();
    println!(
        "  {}",
        style(draft.title.as_deref().unwrap_or("Untitled")).cyan().bold()
    );
    println!();
    output::field("ID", style(draft.id).dim());
    output::field("Owner", &draft.owner_id);
    output::field("Status", output::format_status(draft.status));
    output::field("Version", draft.version);
    output::field(
        "Book",
        match (&draft.book_id, draft.needs_book_sync()) {
            (Some(id), _) => id.to_string(),
            (None, true) => format!("{}", style("sync pending").yellow()),
            (None, false) => format!("{}", style("none").dim()),
        },
    );
    output::field(
        "Expires",
        format!(
            "{} ({})",
            draft.expires_at.format("%Y-%m-%d %H:%M UTC"),
            output::format_relative_time(&draft.expires_at, now)
        ),
    );
    output::field("Updated", output::format_relative_time(&draft.updated_at, now));
    output::field("Content", format!("{} bytes", draft.content.len()));
    println!();
}

fn print_history(entries: &[AuditEntry]) {
    if entries.is_empty() {
        output::info("No audit entries for this draft.");
        return;
    }

    let mut table = output::table(&["When", "Action", "Actor", "Status", "Version", "Details"]);
    for entry in entries {
        let before = entry.before();
        let after = entry.after();
        let status = match (&before, &after) {
            (Some(b), Some(a)) if b.status != a.status => format!("{} → {}", b.status, a.status),
            (_, Some(a)) => a.status.to_string(),
            (Some(b), None) => b.status.to_string(),
            (None, None) => "-".to_string(),
        };
        let version = match (&before, &after) {
            (Some(b), Some(a)) => format!("{} → {}", b.version, a.version),
            (None, Some(a)) => a.version.to_string(),
            (Some(b), None) => b.version.to_string(),
            (None, None) => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(entry.occurred_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(entry.action.to_string()).fg(Color::Cyan),
            Cell::new(&entry.actor_id),
            Cell::new(status),
            Cell::new(version),
            Cell::new(entry.details.as_deref().unwrap_or("")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
}
