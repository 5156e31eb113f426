//! Crawl, mirror and relay engine for the BlueTracker relay.
//!
//! A single [`RelayEngine`] owns the store handle and every cache. It is
//! shared by three drivers:
//!
//! - [`RelayEngine::run_sweeps`] crawls every source channel and thread one
//!   page at a time, saving posts by tracked authors
//! - [`RelayEngine::handle_live`] persists and relays a freshly posted message
//! - [`RelayEngine::replay_all`] relays stored posts that were never sent
//!
//! Relayed posts land in a mirror space whose categories, channels and
//! threads are created on demand to match the source.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use database::Database;
//! use discord_client::{ClientConfig, DiscordClient};
//! use mirror_relay::{RelayConfig, RelayEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("sqlite:bluetracker.db?mode=rwc").await?;
//! db.migrate().await?;
//!
//! let platform = Arc::new(DiscordClient::new(ClientConfig::bot("token"))?);
//! let engine = RelayEngine::new(platform, db, RelayConfig::default())?;
//! engine.load_state().await?;
//!
//! // Sweep forever.
//! engine.run_sweeps(std::future::pending()).await;
//! # Ok(())
//! # }
//! ```

pub mod access;
mod bounded;
pub mod config;
pub mod crawler;
pub mod engine;
pub mod error;
pub mod live;
pub mod mirror;
pub mod names;
pub mod publisher;
pub mod replay;
pub mod snippet;
pub mod sweep;
pub mod tracked;

#[cfg(test)]
mod testing;

pub use access::AccessCache;
pub use config::RelayConfig;
pub use crawler::CrawlOutcome;
pub use engine::RelayEngine;
pub use error::{RelayError, Result};
pub use live::LiveOutcome;
pub use mirror::{MirrorProvisioner, MirrorSource, MirrorTarget};
pub use names::{NameProvider, NameResolver, ResolvedName};
pub use publisher::{RelayPublisher, RetryPolicy};
pub use replay::ReplayReport;
pub use sweep::SweepSummary;
pub use tracked::TrackedAuthors;
