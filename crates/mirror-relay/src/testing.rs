//! In-memory platform double and fixtures for engine tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use database::Database;
use discord_client::{
    permissions, AllowedMentions, Channel, ChannelKind, ChatPlatform, Guild, Member, Message,
    PermissionOverwrite, PlatformError, PlatformResult, ThreadMetadata, User, Webhook,
    WebhookMessage,
};
use indexmap::IndexMap;

use crate::config::RelayConfig;
use crate::engine::RelayEngine;
use crate::publisher::RetryPolicy;

pub const SOURCE_SPACE: u64 = 1;
pub const MIRROR_SPACE: u64 = 2;
pub const GM_ROLE: u64 = 900;
pub const ME: u64 = 99;

/// A message delivered through a webhook.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel_id: u64,
    pub thread_id: Option<u64>,
    pub content: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub allowed_mentions: AllowedMentions,
}

#[derive(Default)]
struct FakeState {
    spaces: HashMap<u64, String>,
    channels: IndexMap<u64, Channel>,
    messages: HashMap<u64, BTreeMap<u64, Message>>,
    unreadable: HashSet<u64>,
    history_errors: HashMap<u64, VecDeque<PlatformError>>,
    archived_errors: HashMap<u64, VecDeque<PlatformError>>,
    channel_errors: HashMap<u64, VecDeque<PlatformError>>,
    member_roles: HashMap<u64, Vec<u64>>,
    role_errors: HashMap<u64, VecDeque<PlatformError>>,
    history_delay: Duration,
    users: HashMap<u64, User>,
    webhooks: HashMap<u64, Vec<Webhook>>,
    webhook_errors: VecDeque<PlatformError>,
    blocked_content: Vec<String>,
    deny_permission_updates: bool,
    sent: Vec<SentMessage>,
    calls: HashMap<&'static str, usize>,
    history_calls: HashMap<u64, usize>,
    next_id: u64,
    create_delay: Duration,
}

impl FakeState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id = self.next_id.max(10_000) + 1;
        self.next_id
    }

    fn count(&mut self, call: &'static str) {
        *self.calls.entry(call).or_default() += 1;
    }
}

/// Scriptable in-memory [`ChatPlatform`].
#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

pub fn text_channel(space: u64, id: u64, name: &str, parent: Option<u64>) -> Channel {
    Channel {
        id,
        kind: ChannelKind::Text,
        guild_id: Some(space),
        name: name.to_string(),
        parent_id: parent,
        position: 0,
        permission_overwrites: Vec::new(),
        thread_metadata: None,
    }
}

pub fn thread_channel(space: u64, id: u64, name: &str, parent: u64, archived: bool) -> Channel {
    Channel {
        id,
        kind: ChannelKind::PublicThread,
        guild_id: Some(space),
        name: name.to_string(),
        parent_id: Some(parent),
        position: 0,
        permission_overwrites: Vec::new(),
        thread_metadata: Some(ThreadMetadata {
            archived,
            auto_archive_duration: 1440,
            archive_timestamp: None,
        }),
    }
}

/// A message by `author` (username `user{author}`) in `channel`.
pub fn message(id: u64, channel: u64, author: u64, content: &str) -> Message {
    Message {
        id,
        channel_id: channel,
        guild_id: Some(SOURCE_SPACE),
        author: User {
            id: author,
            username: format!("user{}", author),
            ..Default::default()
        },
        content: content.to_string(),
        ..Default::default()
    }
}

/// A message whose payload carries the author's member roles.
pub fn message_with_roles(id: u64, channel: u64, author: u64, content: &str, roles: &[u64]) -> Message {
    Message {
        member: Some(Member {
            roles: roles.to_vec(),
            ..Default::default()
        }),
        ..message(id, channel, author, content)
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        let platform = Self::default();
        platform.add_space(SOURCE_SPACE, "GemStone IV");
        platform.add_space(MIRROR_SPACE, "BlueTracker");
        platform
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_space(&self, id: u64, name: &str) {
        self.lock().spaces.insert(id, name.to_string());
    }

    pub fn add_channel(&self, channel: Channel) -> Channel {
        self.lock().channels.insert(channel.id, channel.clone());
        channel
    }

    pub fn add_category(&self, space: u64, id: u64, name: &str) -> Channel {
        self.add_channel(Channel {
            kind: ChannelKind::Category,
            ..text_channel(space, id, name, None)
        })
    }

    pub fn add_text_channel(&self, space: u64, id: u64, name: &str, parent: Option<u64>) -> Channel {
        self.add_channel(text_channel(space, id, name, parent))
    }

    pub fn add_thread(&self, space: u64, id: u64, name: &str, parent: u64, archived: bool) -> Channel {
        self.add_channel(thread_channel(space, id, name, parent, archived))
    }

    pub fn channel_by_id(&self, id: u64) -> Option<Channel> {
        self.lock().channels.get(&id).cloned()
    }

    pub fn push_message(&self, message: Message) {
        self.lock()
            .messages
            .entry(message.channel_id)
            .or_default()
            .insert(message.id, message);
    }

    pub fn add_user(&self, id: u64, username: &str, avatar: Option<&str>) {
        self.lock().users.insert(
            id,
            User {
                id,
                username: username.to_string(),
                avatar: avatar.map(str::to_string),
                ..Default::default()
            },
        );
    }

    pub fn set_member_roles(&self, user: u64, roles: &[u64]) {
        self.lock().member_roles.insert(user, roles.to_vec());
    }

    pub fn set_unreadable(&self, channel: u64) {
        self.lock().unreadable.insert(channel);
    }

    pub fn fail_history(&self, channel: u64, error: PlatformError) {
        self.lock()
            .history_errors
            .entry(channel)
            .or_default()
            .push_back(error);
    }

    pub fn fail_archived(&self, channel: u64, error: PlatformError) {
        self.lock()
            .archived_errors
            .entry(channel)
            .or_default()
            .push_back(error);
    }

    pub fn fail_member_roles(&self, user: u64, error: PlatformError) {
        self.lock()
            .role_errors
            .entry(user)
            .or_default()
            .push_back(error);
    }

    /// Make every history request take `delay` before answering.
    pub fn set_history_delay(&self, delay: Duration) {
        self.lock().history_delay = delay;
    }

    pub fn fail_channel(&self, channel: u64, error: PlatformError) {
        self.lock()
            .channel_errors
            .entry(channel)
            .or_default()
            .push_back(error);
    }

    /// Fail the next webhook execution.
    pub fn fail_webhook(&self, error: PlatformError) {
        self.lock().webhook_errors.push_back(error);
    }

    /// Refuse every webhook message containing `needle`.
    pub fn block_webhook_content(&self, needle: &str) {
        self.lock().blocked_content.push(needle.to_string());
    }

    pub fn fail_permission_updates(&self) {
        self.lock().deny_permission_updates = true;
    }

    pub fn set_create_delay(&self, delay: Duration) {
        self.lock().create_delay = delay;
    }

    pub fn add_webhook(&self, channel: u64, name: &str) -> Webhook {
        let mut state = self.lock();
        let id = state.allocate_id();
        let webhook = Webhook {
            id,
            name: Some(name.to_string()),
            token: Some(format!("token-{}", id)),
            channel_id: Some(channel),
        };
        state.webhooks.entry(channel).or_default().push(webhook.clone());
        webhook
    }

    pub fn delete_webhooks(&self, channel: u64) {
        self.lock().webhooks.remove(&channel);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.lock().sent.clone()
    }

    pub fn calls(&self, call: &str) -> usize {
        self.lock().calls.get(call).copied().unwrap_or(0)
    }

    pub fn history_calls(&self, channel: u64) -> usize {
        self.lock().history_calls.get(&channel).copied().unwrap_or(0)
    }

    async fn creation_delay(&self) {
        let delay = self.lock().create_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn create(&self, call: &'static str, build: impl FnOnce(u64) -> Channel) -> Channel {
        let mut state = self.lock();
        state.count(call);
        let id = state.allocate_id();
        let channel = build(id);
        state.channels.insert(id, channel.clone());
        channel
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn current_user(&self) -> PlatformResult<User> {
        self.lock().count("current_user");
        Ok(User {
            id: ME,
            username: "tracker".to_string(),
            ..Default::default()
        })
    }

    async fn space(&self, space_id: u64) -> PlatformResult<Guild> {
        let mut state = self.lock();
        state.count("space");
        let name = state
            .spaces
            .get(&space_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("space {}", space_id)))?;
        Ok(Guild {
            id: space_id,
            name,
            owner_id: None,
            roles: Vec::new(),
        })
    }

    async fn space_channels(&self, space_id: u64) -> PlatformResult<Vec<Channel>> {
        let mut state = self.lock();
        state.count("space_channels");
        Ok(state
            .channels
            .values()
            .filter(|c| c.guild_id == Some(space_id) && !c.is_thread())
            .cloned()
            .collect())
    }

    async fn active_threads(&self, space_id: u64) -> PlatformResult<Vec<Channel>> {
        let mut state = self.lock();
        state.count("active_threads");
        Ok(state
            .channels
            .values()
            .filter(|c| c.guild_id == Some(space_id) && c.is_thread())
            .filter(|c| !c.thread_metadata.as_ref().is_some_and(|m| m.archived))
            .cloned()
            .collect())
    }

    async fn archived_public_threads(&self, channel_id: u64) -> PlatformResult<Vec<Channel>> {
        let mut state = self.lock();
        state.count("archived_public_threads");
        if let Some(error) = state
            .archived_errors
            .get_mut(&channel_id)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        let mut threads: Vec<Channel> = state
            .channels
            .values()
            .filter(|c| c.kind == ChannelKind::PublicThread && c.parent_id == Some(channel_id))
            .filter(|c| c.thread_metadata.as_ref().is_some_and(|m| m.archived))
            .cloned()
            .collect();
        // Newest first, like the real listing.
        threads.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(threads)
    }

    async fn channel(&self, channel_id: u64) -> PlatformResult<Channel> {
        let mut state = self.lock();
        state.count("channel");
        if let Some(error) = state
            .channel_errors
            .get_mut(&channel_id)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        state
            .channels
            .get(&channel_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("channel {}", channel_id)))
    }

    async fn history_after(
        &self,
        channel_id: u64,
        after: u64,
        limit: u8,
    ) -> PlatformResult<Vec<Message>> {
        let delay = self.lock().history_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.count("history_after");
        *state.history_calls.entry(channel_id).or_default() += 1;
        if let Some(error) = state
            .history_errors
            .get_mut(&channel_id)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        Ok(state
            .messages
            .get(&channel_id)
            .map(|messages| {
                messages
                    .range(after.saturating_add(1)..)
                    .take(usize::from(limit))
                    .map(|(_, m)| m.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_message(&self, channel_id: u64, message_id: u64) -> PlatformResult<Message> {
        let mut state = self.lock();
        state.count("fetch_message");
        state
            .messages
            .get(&channel_id)
            .and_then(|messages| messages.get(&message_id))
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("message {}", message_id)))
    }

    async fn member_roles(&self, _space_id: u64, user_id: u64) -> PlatformResult<Vec<u64>> {
        let mut state = self.lock();
        state.count("member_roles");
        if let Some(error) = state
            .role_errors
            .get_mut(&user_id)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        Ok(state.member_roles.get(&user_id).cloned().unwrap_or_default())
    }

    async fn user(&self, user_id: u64) -> PlatformResult<User> {
        let mut state = self.lock();
        state.count("user");
        state
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("user {}", user_id)))
    }

    async fn can_read_history(
        &self,
        channel: &Channel,
        parent: Option<&Channel>,
    ) -> PlatformResult<bool> {
        let mut state = self.lock();
        state.count("can_read_history");
        let scope = match parent {
            Some(parent) if channel.is_thread() => parent.id,
            _ => channel.id,
        };
        Ok(!state.unreadable.contains(&scope) && !state.unreadable.contains(&channel.id))
    }

    async fn create_category(&self, space_id: u64, name: &str) -> PlatformResult<Channel> {
        self.creation_delay().await;
        Ok(self.create("create_category", |id| Channel {
            kind: ChannelKind::Category,
            ..text_channel(space_id, id, name, None)
        }))
    }

    async fn create_text_channel(
        &self,
        space_id: u64,
        name: &str,
        parent_id: Option<u64>,
    ) -> PlatformResult<Channel> {
        self.creation_delay().await;
        Ok(self.create("create_text_channel", |id| {
            text_channel(space_id, id, name, parent_id)
        }))
    }

    async fn deny_send_for_everyone(&self, channel: &Channel) -> PlatformResult<bool> {
        let mut state = self.lock();
        state.count("deny_send_for_everyone");
        if state.deny_permission_updates {
            return Err(PlatformError::Forbidden("missing permissions".to_string()));
        }
        let space = channel.guild_id.unwrap_or_default();
        let stored = state
            .channels
            .get_mut(&channel.id)
            .ok_or_else(|| PlatformError::NotFound(format!("channel {}", channel.id)))?;
        if permissions::everyone_denied_send(stored, space) {
            return Ok(false);
        }
        stored.permission_overwrites.push(PermissionOverwrite {
            id: space,
            kind: PermissionOverwrite::ROLE,
            allow: 0,
            deny: permissions::SEND_MESSAGES,
        });
        Ok(true)
    }

    async fn create_thread(
        &self,
        channel_id: u64,
        name: &str,
        auto_archive_minutes: u32,
    ) -> PlatformResult<Channel> {
        self.creation_delay().await;
        let space = self
            .channel_by_id(channel_id)
            .and_then(|c| c.guild_id)
            .unwrap_or_default();
        Ok(self.create("create_thread", |id| Channel {
            thread_metadata: Some(ThreadMetadata {
                archived: false,
                auto_archive_duration: auto_archive_minutes,
                archive_timestamp: None,
            }),
            ..thread_channel(space, id, name, channel_id, false)
        }))
    }

    async fn webhooks(&self, channel_id: u64) -> PlatformResult<Vec<Webhook>> {
        let mut state = self.lock();
        state.count("webhooks");
        Ok(state.webhooks.get(&channel_id).cloned().unwrap_or_default())
    }

    async fn create_webhook(&self, channel_id: u64, name: &str) -> PlatformResult<Webhook> {
        self.lock().count("create_webhook");
        Ok(self.add_webhook(channel_id, name))
    }

    async fn execute_webhook(
        &self,
        webhook: &Webhook,
        message: &WebhookMessage,
    ) -> PlatformResult<()> {
        let mut state = self.lock();
        state.count("execute_webhook");
        if let Some(error) = state.webhook_errors.pop_front() {
            return Err(error);
        }

        let channel_id = webhook.channel_id.unwrap_or_default();
        let installed = state
            .webhooks
            .get(&channel_id)
            .is_some_and(|hooks| hooks.iter().any(|h| h.id == webhook.id));
        if !installed {
            return Err(PlatformError::NotFound(format!("webhook {}", webhook.id)));
        }
        if state
            .blocked_content
            .iter()
            .any(|needle| message.content.contains(needle.as_str()))
        {
            return Err(PlatformError::Forbidden("blocked".to_string()));
        }

        state.sent.push(SentMessage {
            channel_id,
            thread_id: message.thread_id,
            content: message.content.clone(),
            username: message.username.clone(),
            avatar_url: message.avatar_url.clone(),
            allowed_mentions: message.allowed_mentions.clone(),
        });
        Ok(())
    }
}

pub async fn test_db() -> Database {
    let db = Database::connect_with_pool_size("sqlite::memory:", 1)
        .await
        .unwrap();
    db.migrate().await.unwrap();
    db
}

/// Engine settings with every pause zeroed and no retention cutoff.
pub fn test_config() -> RelayConfig {
    RelayConfig {
        source_space_id: SOURCE_SPACE,
        mirror_space_id: MIRROR_SPACE,
        central_channel_id: None,
        tracked_role_ids: [GM_ROLE].into_iter().collect(),
        ignored_channel_ids: HashSet::new(),
        seed_names: HashMap::new(),
        cutoff_days: 36_500,
        page_size: 50,
        request_pause: Duration::ZERO,
        relay_pause: Duration::ZERO,
        history_timeout: Duration::from_secs(15),
        create_cooldown: Duration::ZERO,
        reply_fetch_pause: Duration::ZERO,
        reset_every_sweeps: 50,
        sweep_pause: Duration::ZERO,
        sweep_error_pause: Duration::ZERO,
        webhook_name: "BlueTracker".to_string(),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_rate_limit_waits: 5,
        },
    }
}

pub async fn test_engine(platform: &Arc<FakePlatform>, config: RelayConfig) -> RelayEngine {
    RelayEngine::new(platform.clone(), test_db().await, config).unwrap()
}
