//! ReadZone draft engine CLI and REST API entry point.
//!
//! Binary name: `rzd`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::output::Output;
use cli::{Cli, Commands};
use state::{AppState, InitOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,readzone=debug",
        _ => "trace",
    };
    readzone_observe::tracing_setup::init_tracing(filter, cli.log_json, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "rzd", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli).await;
    readzone_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let out = Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    // Initialize application state (config, DB, services)
    let state = AppState::init(InitOptions {
        data_dir: cli.data_dir,
        config: cli.config,
        database: cli.database,
    })
    .await?;

    let result = match cli.command {
        Commands::Draft { action } => cli::draft::run(&state, action, out).await,
        Commands::Sync { action } => cli::sync::run(&state, action, out).await,
        Commands::Notify { action } => cli::notify::run(&state, action, out).await,
        Commands::Migrate(args) => cli::migrate::run(&state, args, out).await,
        Commands::Status => cli::status::status(&state, out).await,
        Commands::Serve { port, host } => serve(state.clone(), &host, port, out).await,
        Commands::Completions { .. } => Ok(()),
    };

    state.db_pool.close().await;
    result
}

async fn serve(state: AppState, host: &str, port: u16, out: Output) -> anyhow::Result<()> {
    if state.config.server.admin_token.is_none() {
        tracing::warn!("server.admin_token is not set; operator routes are disabled");
    }

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if out.styled() {
        println!(
            "  {} ReadZone draft API listening on {}",
            console::style("⚡").bold(),
            console::style(format!("http://{addr}/api/v1")).cyan()
        );
        println!("  {}", console::style("Press Ctrl+C to stop").dim());
    }
    tracing::info!(%addr, "serving REST API");

    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if out.styled() {
        println!("\n  Server stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
