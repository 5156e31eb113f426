//! The remote chat platform boundary.
//!
//! Everything the relay needs from the platform goes through [`ChatPlatform`],
//! so the engine can run against the HTTP client in production and an
//! in-memory double in tests.

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::types::{Channel, Guild, Message, User, Webhook, WebhookMessage};

/// Result type for platform calls.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Operations against a chat platform's spaces, channels and webhooks.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// The account the client is authenticated as.
    async fn current_user(&self) -> PlatformResult<User>;

    /// A space (guild) with its roles.
    async fn space(&self, space_id: u64) -> PlatformResult<Guild>;

    /// Every channel and category in a space.
    async fn space_channels(&self, space_id: u64) -> PlatformResult<Vec<Channel>>;

    /// Threads currently active anywhere in a space.
    async fn active_threads(&self, space_id: u64) -> PlatformResult<Vec<Channel>>;

    /// Archived public threads of a channel, newest first.
    async fn archived_public_threads(&self, channel_id: u64) -> PlatformResult<Vec<Channel>>;

    /// Look up a channel or thread.
    async fn channel(&self, channel_id: u64) -> PlatformResult<Channel>;

    /// Up to `limit` messages newer than `after`, oldest first.
    async fn history_after(
        &self,
        channel_id: u64,
        after: u64,
        limit: u8,
    ) -> PlatformResult<Vec<Message>>;

    /// Fetch a single message.
    async fn fetch_message(&self, channel_id: u64, message_id: u64) -> PlatformResult<Message>;

    /// Role IDs of a member of a space.
    async fn member_roles(&self, space_id: u64, user_id: u64) -> PlatformResult<Vec<u64>>;

    /// Look up a user.
    async fn user(&self, user_id: u64) -> PlatformResult<User>;

    /// Whether the current account may read the channel's history.
    ///
    /// Threads are judged by their parent's overwrites; pass the parent when
    /// it is already known to save a lookup.
    async fn can_read_history(
        &self,
        channel: &Channel,
        parent: Option<&Channel>,
    ) -> PlatformResult<bool>;

    /// Create a category in a space.
    async fn create_category(&self, space_id: u64, name: &str) -> PlatformResult<Channel>;

    /// Create a text channel, optionally under a category.
    async fn create_text_channel(
        &self,
        space_id: u64,
        name: &str,
        parent_id: Option<u64>,
    ) -> PlatformResult<Channel>;

    /// Deny `@everyone` sending in a channel.
    ///
    /// Returns `false` if the channel was already read-only.
    async fn deny_send_for_everyone(&self, channel: &Channel) -> PlatformResult<bool>;

    /// Create a public thread in a channel.
    async fn create_thread(
        &self,
        channel_id: u64,
        name: &str,
        auto_archive_minutes: u32,
    ) -> PlatformResult<Channel>;

    /// Webhooks installed on a channel.
    async fn webhooks(&self, channel_id: u64) -> PlatformResult<Vec<Webhook>>;

    /// Install a webhook on a channel.
    async fn create_webhook(&self, channel_id: u64, name: &str) -> PlatformResult<Webhook>;

    /// Post a message through a webhook.
    async fn execute_webhook(
        &self,
        webhook: &Webhook,
        message: &WebhookMessage,
    ) -> PlatformResult<()>;
}
