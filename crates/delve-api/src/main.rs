//! Delve CLI and REST API entry point.
//!
//! Binary name: `delve`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, ResearchCommand};
use delve_observe::tracing_setup::{LogLevel, init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "delve", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(LogLevel::from_flags(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let state = AppState::init().await?;
    let result = run(&cli, &state).await;

    state.shutdown().await;
    shutdown_tracing();
    result
}

async fn run(cli: &Cli, state: &AppState) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Serve { port, host } => serve(state, host, *port, cli.quiet).await,

        Commands::Research { action } => match action {
            ResearchCommand::Start {
                company,
                website,
                variant,
                wait,
            } => {
                cli::research::start_research(
                    state,
                    company.clone(),
                    website.clone(),
                    variant,
                    *wait,
                    cli.json,
                    cli.quiet,
                )
                .await
            }
            ResearchCommand::List { status, variant } => {
                cli::research::list_research(state, status.clone(), variant.clone(), cli.json)
                    .await
            }
            ResearchCommand::Show { id } => cli::research::show_research(state, id, cli.json).await,
            ResearchCommand::Cancel { id } => {
                cli::research::cancel_research(state, id, cli.json).await
            }
        },

        Commands::Completions { .. } => Ok(()),
    }
}

async fn serve(state: &AppState, host: &str, port: u16, quiet: bool) -> anyhow::Result<()> {
    let recovered = state.worker_pool.start().await?;
    if recovered.failed > 0 || recovered.requeued > 0 {
        tracing::info!(
            failed = recovered.failed,
            requeued = recovered.requeued,
            "recovered research jobs from previous run"
        );
    }

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if !quiet {
        println!();
        println!(
            "  {} Delve API listening on {}",
            console::style("⚡").bold(),
            console::style(format!("http://{addr}")).cyan()
        );
        println!(
            "  {} research worker(s), model {}",
            state.config.research.workers,
            console::style(&state.config.llm.model).dim()
        );
        println!("  {}", console::style("Press Ctrl+C to stop").dim());
        println!();
    }

    let router = http::router::build_router(state.clone());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if !quiet {
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
