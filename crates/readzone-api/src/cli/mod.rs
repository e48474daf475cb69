//! CLI command definitions and dispatch for the `rzd` binary.
//!
//! Uses clap derive macros for argument parsing. Commands are grouped by
//! subsystem (e.g., `rzd draft create`, `rzd sync batch`).

pub mod draft;
pub mod migrate;
pub mod notify;
pub mod output;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Operate the ReadZone review-draft engine.
#[derive(Parser)]
#[command(name = "rzd", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Data directory (defaults to $READZONE_DATA_DIR, then ~/.readzone).
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Config file (defaults to {data_dir}/config.toml).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQLite database file (defaults to {data_dir}/readzone.db).
    #[arg(long, global = true, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export tracing spans via OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create, edit, inspect and retire review drafts.
    Draft {
        #[command(subcommand)]
        action: draft::DraftCommand,
    },

    /// Link drafts to canonical catalog books.
    Sync {
        #[command(subcommand)]
        action: sync::SyncCommand,
    },

    /// Expiration warnings.
    Notify {
        #[command(subcommand)]
        action: notify::NotifyCommand,
    },

    /// Store migration, validation, rollback and cleanup.
    Migrate(migrate::MigrateArgs),

    /// System status dashboard.
    Status,

    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["rzd", "status", "--json", "-vv", "--data-dir", "/tmp/rz"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/rz")));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_rollback_requires_confirm() {
        assert!(Cli::try_parse_from(["rzd", "migrate", "--rollback"]).is_err());
        let cli = Cli::try_parse_from(["rzd", "migrate", "--rollback", "--confirm", "rollback"]).unwrap();
        match cli.command {
            Commands::Migrate(args) => {
                assert!(args.rollback);
                assert_eq!(args.confirm.as_deref(), Some("rollback"));
            }
            _ => panic!("expected migrate"),
        }
    }
}
