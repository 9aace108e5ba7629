//! Rewind API server.
//!
//! Aggregates a player's match history from the Riot API, derives their
//! year-in-review stats and lets a language model narrate them.
//!
//! Usage:
//!   rewind-api --port 3000
//!
//! Requires `RIOT_API_KEY` and `GOOGLE_API_KEY` in the environment.

use anyhow::{Context, Result};
use clap::Parser;
use rewind_api::accounts::account_service;
use rewind_api::{
    build_router, AppState, InsightsService, NarrativeClient, NarrativeConfig, RiotClient,
    RiotConfig,
};
use rewind_storage::SqliteStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "rewind-api")]
#[command(about = "League year-in-review backend")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Path to the SQLite database file
    #[arg(short, long, default_value = "rewind.db")]
    database: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Rewind API starting...");
    let riot_config = RiotConfig::from_env().context("Riot API configuration")?;
    let narrative_config =
        NarrativeConfig::from_env().context("Narrative model configuration")?;

    let store = Arc::new(SqliteStore::open(&args.database).context("Failed to open database")?);
    let accounts = account_service(store);
    accounts
        .prepare()
        .await
        .context("Failed to prepare the accounts collection")?;

    let riot = Arc::new(RiotClient::new(riot_config).context("Failed to build the Riot client")?);
    let narrative =
        NarrativeClient::new(narrative_config).context("Failed to build the narrative client")?;
    let insights = Arc::new(InsightsService::new(narrative));

    let app = build_router(AppState {
        riot,
        insights,
        accounts,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
        .await
        .context("Failed to bind HTTP port")?;
    info!("Listening on port {}", args.port);
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
