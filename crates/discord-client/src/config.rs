//! Configuration types for discord-client.

use std::time::Duration;

/// Default REST API root.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// How the token is presented in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Application bot token, sent as `Bot <token>`.
    Bot,
    /// User account token, sent as-is.
    User,
}

/// Configuration for connecting to the Discord REST API.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API (e.g., "https://discord.com/api/v10").
    pub api_base: String,
    /// Authentication token.
    pub token: String,
    /// How the token is sent.
    pub token_kind: TokenKind,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration for a bot token against the public API.
    pub fn bot(token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            token_kind: TokenKind::Bot,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Create a configuration for a user token against the public API.
    pub fn user(token: impl Into<String>) -> Self {
        Self {
            token_kind: TokenKind::User,
            ..Self::bot(token)
        }
    }

    /// Point the client at a different API root (used by tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        match self.token_kind {
            TokenKind::Bot => format!("Bot {}", self.token),
            TokenKind::User => self.token.clone(),
        }
    }

    /// Build a full endpoint URL from a path like `/channels/1`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base", &self.api_base)
            .field("token_kind", &self.token_kind)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
