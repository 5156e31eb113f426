//! Discord platform client for the BlueTracker relay.
//!
//! This crate provides:
//!
//! - [`ChatPlatform`], the trait the relay engine talks to
//! - [`DiscordClient`], its implementation over the REST API
//! - wire types, snowflake helpers and channel permission resolution
//!
//! Remote failures are reported as one closed [`PlatformError`] enumeration.
//!
//! # Example
//!
//! ```no_run
//! use discord_client::{ChatPlatform, ClientConfig, DiscordClient};
//!
//! # async fn example() -> Result<(), discord_client::PlatformError> {
//! let client = DiscordClient::new(ClientConfig::bot("token"))?;
//!
//! let page = client.history_after(226045346399256576, 0, 50).await?;
//! for message in page {
//!     println!("{}: {}", message.author_display_name(), message.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod permissions;
pub mod platform;
pub mod snowflake;
pub mod types;

mod wire;

pub use client::DiscordClient;
pub use config::{ClientConfig, TokenKind, DEFAULT_API_BASE};
pub use error::{PlatformError, DEFAULT_RETRY_AFTER};
pub use platform::{ChatPlatform, PlatformResult};
pub use types::*;
