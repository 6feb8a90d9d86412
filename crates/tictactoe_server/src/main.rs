//! Tic-tac-toe league server - unified CLI.

#![warn(missing_docs)]

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use rmcp::ServiceExt;
use tictactoe_server::{
    GameRepository, GameService, LeagueToolServer, LogNotifier, ServerConfig, router,
    send_reminders, spawn_cache_refresher, spawn_reminder_job,
};
use tracing::{info, instrument};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    // stdout carries the MCP protocol, so logs go to stderr in that mode
    initialize_tracing(matches!(cli.command, Command::Mcp));

    let mut config = ServerConfig::load(Some(cli.common.config.as_path()))?;
    if let Some(db_path) = cli.common.db_path {
        config = config.with_db_path(db_path);
    }

    match cli.command {
        Command::Http { port, host } => {
            if let Some(port) = port {
                config = config.with_port(port);
            }
            if let Some(host) = host {
                config = config.with_host(host);
            }
            run_http_server(config).await
        }
        Command::Mcp => run_mcp_server(config).await,
        Command::Migrate => open_service(&config).map(|_| ()),
        Command::Remind => run_reminders(config).await,
    }
}

fn initialize_tracing(to_stderr: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tictactoe_server=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if to_stderr {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Opens the database, applies migrations and builds the service.
#[instrument(skip(config), fields(db_path = %config.db_path()))]
fn open_service(config: &ServerConfig) -> Result<GameService> {
    let repository = GameRepository::new(config.db_path().clone())?;
    repository.run_migrations()?;
    info!("Database ready");
    Ok(GameService::new(repository).with_commit_attempts(*config.max_commit_retries()))
}

/// Run the REST server and its background jobs.
#[instrument(skip(config))]
async fn run_http_server(config: ServerConfig) -> Result<()> {
    let service = open_service(&config)?;

    let refresher = spawn_cache_refresher(
        service.clone(),
        Duration::from_secs(*config.cache_refresh_secs()),
    );
    let reminders = spawn_reminder_job(
        service.clone(),
        Arc::new(LogNotifier),
        config.sender_address().clone(),
        Duration::from_secs(*config.reminder_interval_secs()),
    );

    let app = router(service);
    let listener = tokio::net::TcpListener::bind((config.host().as_str(), *config.port())).await?;
    info!(
        "Server ready at http://{}:{}/",
        config.host(),
        config.port()
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await;

    refresher.abort();
    reminders.abort();
    result?;
    Ok(())
}

/// Run the MCP tool server (stdio mode).
#[instrument(skip(config))]
async fn run_mcp_server(config: ServerConfig) -> Result<()> {
    let service = open_service(&config)?;
    let refresher = spawn_cache_refresher(
        service.clone(),
        Duration::from_secs(*config.cache_refresh_secs()),
    );

    info!("Starting league MCP server");
    let server = LeagueToolServer::new(service);
    let running = server.serve(rmcp::transport::stdio()).await?;
    info!("Server ready - connect via MCP protocol");
    running.waiting().await?;

    refresher.abort();
    Ok(())
}

/// Send one round of reminders.
#[instrument(skip(config))]
async fn run_reminders(config: ServerConfig) -> Result<()> {
    let service = open_service(&config)?;
    let sent = send_reminders(&service, &LogNotifier, config.sender_address()).await?;
    info!(sent, "Reminders sent");
    Ok(())
}
