//! Database models.
//!
//! Identifiers are platform snowflakes stored as SQLite integers.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A post from a tracked author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Post {
    /// Platform message ID (unique, the dedup key).
    pub id: i64,
    /// Channel or thread the message was posted in.
    #[sqlx(rename = "chan_id")]
    pub channel_id: i64,
    /// Author user ID.
    pub author_id: i64,
    /// Creation time in milliseconds since the Unix epoch.
    #[sqlx(rename = "ts")]
    pub timestamp_ms: i64,
    /// Length-bounded rendition of the message body.
    #[sqlx(rename = "content")]
    pub snippet: Option<String>,
    /// Whether the post has been sent through the relay.
    #[sqlx(rename = "replayed")]
    pub relayed: bool,
}

/// A tracked author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Author {
    #[sqlx(rename = "author_id")]
    pub id: i64,
    /// First display name learned for this author.
    #[sqlx(rename = "author_name")]
    pub display_name: Option<String>,
}

/// A fixed display name for an author, taking precedence over everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GmName {
    pub author_id: i64,
    #[sqlx(rename = "gm_name")]
    pub name: String,
    pub notes: Option<String>,
}

/// The crawl position for a channel or thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChannelCursor {
    #[sqlx(rename = "chan_id")]
    pub channel_id: i64,
    /// Highest message ID processed so far.
    pub last_seen_message_id: i64,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Durable facts about a source channel or thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChannelRecord {
    pub chan_id: i64,
    pub name: Option<String>,
    /// Parent channel when this record is a thread.
    pub parent_id: Option<i64>,
    pub accessible: bool,
}
