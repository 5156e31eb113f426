//! Configuration loaded from environment variables.

use std::collections::{HashMap, HashSet};
use std::env;
use std::time::Duration;

use discord_client::{ClientConfig, TokenKind, DEFAULT_API_BASE};
use mirror_relay::RelayConfig;

use crate::seeds::{GM_NAME_OVERRIDES, SEED_AUTHOR_IDS};

const DEFAULT_DATABASE_URL: &str = "sqlite:bluetracker.db?mode=rwc";

/// Process configuration.
#[derive(Clone)]
pub struct Config {
    /// Account token.
    pub discord_token: String,
    /// How the token is presented.
    pub token_kind: TokenKind,
    /// REST API root.
    pub api_base: String,
    /// SQLite database URL.
    pub database_url: String,
    /// Replay stored posts before sweeping.
    pub replay_mode: bool,
    /// Authors tracked regardless of roles.
    pub seed_author_ids: Vec<u64>,
    /// Display-name overrides written to the store at startup.
    pub gm_names: Vec<(u64, String)>,
    /// Engine options.
    pub relay: RelayConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `DISCORD_TOKEN` | Account token | (required) |
    /// | `DISCORD_TOKEN_KIND` | `bot` or `user` | `bot` |
    /// | `DISCORD_API_BASE` | REST API root | `https://discord.com/api/v10` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:bluetracker.db?mode=rwc` |
    /// | `SOURCE_GUILD_ID` | Server to crawl | GemStone IV |
    /// | `MIRROR_GUILD_ID` | Server to mirror into | BlueTracker |
    /// | `CENTRAL_CHANNEL_ID` | Feed of every live post, empty to disable | #gm-tracker |
    /// | `TRACKED_ROLE_IDS` | Comma-separated staff roles | built in |
    /// | `SEED_AUTHOR_IDS` | Comma-separated tracked users | built in |
    /// | `IGNORED_CHANNEL_IDS` | Comma-separated channels never crawled | built in |
    /// | `GM_NAME_OVERRIDES` | `id=name,...` | built in |
    /// | `CUTOFF_DAYS` | History retention window | `3650` |
    /// | `PAGE_SIZE` | Messages per history request | `50` |
    /// | `REQ_PAUSE_MS` | Pause after each crawl | `2500` |
    /// | `RELAY_PAUSE_MS` | Pause between replayed posts | `2100` |
    /// | `REPLAY_MODE` | Replay stored posts before sweeping | `false` |
    /// | `WEBHOOK_NAME` | Relay webhook name | `BlueTracker` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &'static str| lookup(name).map(|v| v.trim().to_string());

        let discord_token = var("DISCORD_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let token_kind = match var("DISCORD_TOKEN_KIND").as_deref() {
            None | Some("") | Some("bot") => TokenKind::Bot,
            Some("user") => TokenKind::User,
            Some(other) => return Err(ConfigError::InvalidTokenKind(other.to_string())),
        };

        let defaults = RelayConfig::default();

        let central_channel_id = match var("CENTRAL_CHANNEL_ID") {
            None => defaults.central_channel_id,
            Some(value) if value.is_empty() => None,
            Some(value) => Some(parse_number("CENTRAL_CHANNEL_ID", &value)?),
        };

        let gm_names = match var("GM_NAME_OVERRIDES") {
            Some(value) => parse_name_overrides(&value)?,
            None => GM_NAME_OVERRIDES
                .iter()
                .map(|(id, name)| (*id, name.to_string()))
                .collect(),
        };

        let relay = RelayConfig {
            source_space_id: optional_number(&var, "SOURCE_GUILD_ID", defaults.source_space_id)?,
            mirror_space_id: optional_number(&var, "MIRROR_GUILD_ID", defaults.mirror_space_id)?,
            central_channel_id,
            tracked_role_ids: optional_ids(&var, "TRACKED_ROLE_IDS")?
                .map(|ids| ids.into_iter().collect())
                .unwrap_or(defaults.tracked_role_ids),
            ignored_channel_ids: optional_ids(&var, "IGNORED_CHANNEL_IDS")?
                .map(|ids| ids.into_iter().collect::<HashSet<u64>>())
                .unwrap_or(defaults.ignored_channel_ids),
            seed_names: gm_names.iter().cloned().collect::<HashMap<u64, String>>(),
            cutoff_days: optional_number(&var, "CUTOFF_DAYS", defaults.cutoff_days)?,
            page_size: optional_number(&var, "PAGE_SIZE", defaults.page_size)?,
            request_pause: optional_millis(&var, "REQ_PAUSE_MS", defaults.request_pause)?,
            relay_pause: optional_millis(&var, "RELAY_PAUSE_MS", defaults.relay_pause)?,
            webhook_name: var("WEBHOOK_NAME")
                .filter(|n| !n.is_empty())
                .unwrap_or(defaults.webhook_name),
            ..RelayConfig::default()
        };
        relay
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(Self {
            discord_token,
            token_kind,
            api_base: var("DISCORD_API_BASE")
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            database_url: var("SQLITE_PATH")
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            replay_mode: parse_flag("REPLAY_MODE", var("REPLAY_MODE").as_deref())?,
            seed_author_ids: optional_ids(&var, "SEED_AUTHOR_IDS")?
                .unwrap_or_else(|| SEED_AUTHOR_IDS.to_vec()),
            gm_names,
            relay,
        })
    }

    /// Client settings for the platform connection.
    pub fn client_config(&self) -> ClientConfig {
        let config = match self.token_kind {
            TokenKind::Bot => ClientConfig::bot(&self.discord_token),
            TokenKind::User => ClientConfig::user(&self.discord_token),
        };
        config.with_api_base(&self.api_base)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("token_kind", &self.token_kind)
            .field("api_base", &self.api_base)
            .field("database_url", &self.database_url)
            .field("replay_mode", &self.replay_mode)
            .field("seed_author_ids", &self.seed_author_ids.len())
            .field("gm_names", &self.gm_names.len())
            .field("relay", &self.relay)
            .finish()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DISCORD_TOKEN environment variable is required")]
    MissingToken,

    #[error("DISCORD_TOKEN_KIND must be `bot` or `user`, got `{0}`")]
    InvalidTokenKind(String),

    #[error("{var} must be a number, got `{value}`")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be true or false, got `{value}`")]
    InvalidFlag { var: &'static str, value: String },

    #[error("GM_NAME_OVERRIDES entries must look like `id=name`, got `{0}`")]
    InvalidNameOverride(String),

    #[error("invalid relay settings: {0}")]
    Invalid(String),
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.to_string(),
    })
}

fn optional_number<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&'static str) -> Option<String>,
{
    match var(name).filter(|v| !v.is_empty()) {
        Some(value) => parse_number(name, &value),
        None => Ok(default),
    }
}

fn optional_millis<F>(var: &F, name: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    match var(name).filter(|v| !v.is_empty()) {
        Some(value) => parse_number(name, &value).map(Duration::from_millis),
        None => Ok(default),
    }
}

/// Comma-separated IDs. An empty value yields an empty list.
fn optional_ids<F>(var: &F, name: &'static str) -> Result<Option<Vec<u64>>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    var(name)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| parse_number(name, id))
                .collect::<Result<Vec<u64>, ConfigError>>()
        })
        .transpose()
}

fn parse_flag(var: &'static str, value: Option<&str>) -> Result<bool, ConfigError> {
    match value.map(str::to_ascii_lowercase).as_deref() {
        None | Some("") | Some("0") | Some("false") | Some("no") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some(other) => Err(ConfigError::InvalidFlag {
            var,
            value: other.to_string(),
        }),
    }
}

/// `id=name,id=name`.
fn parse_name_overrides(value: &str) -> Result<Vec<(u64, String)>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<(u64, String), ConfigError> {
            let (id, name) = entry
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidNameOverride(entry.to_string()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidNameOverride(entry.to_string()));
            }
            let id = id
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNameOverride(entry.to_string()))?;
            Ok((id, name.to_string()))
        })
        .collect()
}
