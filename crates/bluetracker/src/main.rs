//! BlueTracker: harvests staff posts from a Discord server and relays them
//! into a read-only mirror server.

mod config;
mod seeds;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use database::{author, gm_name, stats, Database};
use discord_client::DiscordClient;
use mirror_relay::RelayEngine;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "bluetracker")]
#[command(about = "Harvest staff posts and relay them into a mirror server")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Sweep the source server until interrupted (the default).
    Crawl,
    /// Relay every stored post that was never relayed, then exit.
    Replay,
    /// Print store counters as JSON.
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    info!(
        source = config.relay.source_space_id,
        mirror = config.relay.mirror_space_id,
        "Starting bluetracker"
    );

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    if args.command == Some(Command::Stats) {
        let counts = stats::db_stats(db.pool()).await?;
        println!("{}", serde_json::to_string_pretty(&counts)?);
        db.close().await;
        return Ok(());
    }

    seed_store(&db, &config).await?;

    let platform = Arc::new(DiscordClient::new(config.client_config())?);
    let engine = RelayEngine::new(platform, db.clone(), config.relay.clone())?;
    engine.load_state().await?;

    match args.command.unwrap_or(Command::Crawl) {
        Command::Replay => {
            engine.replay_all().await?;
        }
        Command::Crawl => {
            if config.replay_mode {
                engine.replay_all().await?;
            }
            engine.run_sweeps(shutdown_signal()).await;
        }
        Command::Stats => {}
    }

    db.close().await;
    Ok(())
}

/// Insert the configured tracked authors and name overrides.
async fn seed_store(db: &Database, config: &Config) -> Result<(), database::DatabaseError> {
    let ids: Vec<i64> = config.seed_author_ids.iter().map(|id| *id as i64).collect();
    author::seed_authors(db.pool(), &ids).await?;

    for (id, name) in &config.gm_names {
        gm_name::upsert_gm_name(db.pool(), *id as i64, name, None).await?;
    }

    info!(
        "Seeded {} authors and {} name overrides",
        ids.len(),
        config.gm_names.len()
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
