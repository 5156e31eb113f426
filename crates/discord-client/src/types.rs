//! Wire types returned by and sent to the REST API.

use serde::{Deserialize, Serialize};

use crate::snowflake;
use crate::wire::{de_opt_u64, de_u64, de_u64_vec};

/// Channel type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "u8")]
pub enum ChannelKind {
    Text,
    Category,
    Announcement,
    AnnouncementThread,
    PublicThread,
    PrivateThread,
    Forum,
    Other(u8),
}

impl From<u8> for ChannelKind {
    fn from(value: u8) -> Self {
        match value {
            0 => ChannelKind::Text,
            4 => ChannelKind::Category,
            5 => ChannelKind::Announcement,
            10 => ChannelKind::AnnouncementThread,
            11 => ChannelKind::PublicThread,
            12 => ChannelKind::PrivateThread,
            15 => ChannelKind::Forum,
            other => ChannelKind::Other(other),
        }
    }
}

impl From<ChannelKind> for u8 {
    fn from(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Text => 0,
            ChannelKind::Category => 4,
            ChannelKind::Announcement => 5,
            ChannelKind::AnnouncementThread => 10,
            ChannelKind::PublicThread => 11,
            ChannelKind::PrivateThread => 12,
            ChannelKind::Forum => 15,
            ChannelKind::Other(other) => other,
        }
    }
}

impl ChannelKind {
    /// Thread channels of any flavour.
    pub fn is_thread(self) -> bool {
        matches!(
            self,
            ChannelKind::PublicThread | ChannelKind::PrivateThread | ChannelKind::AnnouncementThread
        )
    }

    /// Channels with a plain message history that can own threads.
    pub fn is_text(self) -> bool {
        matches!(self, ChannelKind::Text | ChannelKind::Announcement)
    }
}

/// A permission overwrite on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PermissionOverwrite {
    /// Role or member ID.
    #[serde(deserialize_with = "de_u64")]
    pub id: u64,
    /// 0 = role, 1 = member.
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(deserialize_with = "de_u64")]
    pub allow: u64,
    #[serde(deserialize_with = "de_u64")]
    pub deny: u64,
}

impl PermissionOverwrite {
    pub const ROLE: u8 = 0;
    pub const MEMBER: u8 = 1;
}

/// Thread-only channel fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ThreadMetadata {
    #[serde(default)]
    pub archived: bool,
    /// Minutes of inactivity before auto-archiving.
    #[serde(default)]
    pub auto_archive_duration: u32,
    /// ISO-8601 time the archive status last changed.
    #[serde(default)]
    pub archive_timestamp: Option<String>,
}

/// A guild channel, category or thread.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    #[serde(deserialize_with = "de_u64")]
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub guild_id: Option<u64>,
    #[serde(default)]
    pub name: String,
    /// Category for channels, parent channel for threads.
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permission_overwrites: Vec<PermissionOverwrite>,
    #[serde(default)]
    pub thread_metadata: Option<ThreadMetadata>,
}

impl Channel {
    pub fn is_thread(&self) -> bool {
        self.kind.is_thread()
    }

    /// Auto-archive duration for threads, one day otherwise.
    pub fn auto_archive_duration(&self) -> u32 {
        self.thread_metadata
            .as_ref()
            .map(|m| m.auto_archive_duration)
            .filter(|d| *d > 0)
            .unwrap_or(1440)
    }
}

/// A user account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "de_u64")]
    pub id: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    /// Avatar hash.
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Global display name, falling back to the username.
    pub fn display_name(&self) -> &str {
        self.global_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }

    /// CDN URL of the user's avatar, if they have one.
    pub fn avatar_url(&self) -> Option<String> {
        self.avatar.as_ref().map(|hash| {
            format!("https://cdn.discordapp.com/avatars/{}/{}.png", self.id, hash)
        })
    }
}

/// Guild membership of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default, deserialize_with = "de_u64_vec")]
    pub roles: Vec<u64>,
}

/// Pointer from a reply to the message it answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageReference {
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub message_id: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub channel_id: Option<u64>,
}

/// A message in a channel or thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "de_u64")]
    pub id: u64,
    #[serde(deserialize_with = "de_u64")]
    pub channel_id: u64,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub guild_id: Option<u64>,
    pub author: User,
    /// Present on gateway events, usually absent on REST history.
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message_reference: Option<MessageReference>,
    /// Resolved reply target, when the API includes it.
    #[serde(default)]
    pub referenced_message: Option<Box<Message>>,
}

impl Message {
    /// Creation time in Unix milliseconds.
    pub fn timestamp_ms(&self) -> i64 {
        snowflake::timestamp_ms(self.id)
    }

    /// Guild nickname if known, otherwise the author's display name.
    pub fn author_display_name(&self) -> &str {
        self.member
            .as_ref()
            .and_then(|m| m.nick.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.author.display_name())
    }

    /// Role IDs attached to the payload, if the member object was included.
    pub fn member_roles(&self) -> Option<&[u64]> {
        self.member.as_ref().map(|m| m.roles.as_slice())
    }

    /// ID of the message this one replies to.
    pub fn reply_to(&self) -> Option<u64> {
        self.message_reference.as_ref().and_then(|r| r.message_id)
    }
}

/// A guild role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Role {
    #[serde(deserialize_with = "de_u64")]
    pub id: u64,
    #[serde(deserialize_with = "de_u64")]
    pub permissions: u64,
}

/// A guild (the platform's name for a space).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Guild {
    #[serde(deserialize_with = "de_u64")]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub owner_id: Option<u64>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// A channel webhook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Webhook {
    #[serde(deserialize_with = "de_u64")]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    /// Only present for incoming webhooks the caller may use.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub channel_id: Option<u64>,
}

/// Mentions allowed to ping from a webhook message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
}

impl AllowedMentions {
    /// Suppress every mention.
    pub fn none() -> Self {
        Self::default()
    }
}

/// A message sent through a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookMessage {
    pub content: String,
    /// Display name override.
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub allowed_mentions: AllowedMentions,
    /// Thread in the webhook's channel to post into.
    #[serde(skip)]
    pub thread_id: Option<u64>,
}

impl WebhookMessage {
    /// Create a message with mentions suppressed.
    pub fn new(content: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            username: username.into(),
            avatar_url: None,
            allowed_mentions: AllowedMentions::none(),
            thread_id: None,
        }
    }

    /// Set the avatar override.
    pub fn with_avatar(mut self, avatar_url: Option<String>) -> Self {
        self.avatar_url = avatar_url;
        self
    }

    /// Post into a thread of the webhook's channel.
    pub fn in_thread(mut self, thread_id: Option<u64>) -> Self {
        self.thread_id = thread_id;
        self
    }
}
