//! The long-lived engine shared by the sweep loop, the live handler and the
//! replay driver.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use database::{author, channel, Database};
use discord_client::{Channel, ChatPlatform, Message, PlatformError, PlatformResult, WebhookMessage};
use indexmap::IndexMap;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::access::AccessCache;
use crate::bounded::halve_map;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::mirror::{MirrorProvisioner, MirrorSource, MirrorTarget, SourceThread};
use crate::names::{NameResolver, ResolvedName};
use crate::publisher::RelayPublisher;
use crate::snippet;
use crate::tracked::TrackedAuthors;

/// Largest number of cached member role lists.
pub const MAX_CACHED_MEMBERS: usize = 10_000;

/// Largest number of cached source channels.
pub const MAX_CACHED_CHANNELS: usize = 1000;

/// Crawler, mirror and relay state for one source/mirror space pair.
pub struct RelayEngine {
    pub(crate) platform: Arc<dyn ChatPlatform>,
    pub(crate) db: Database,
    pub(crate) config: RelayConfig,
    pub(crate) access: AccessCache,
    pub(crate) tracked: TrackedAuthors,
    pub(crate) mirrors: MirrorProvisioner,
    pub(crate) publisher: RelayPublisher,
    pub(crate) names: NameResolver,
    member_roles: Mutex<IndexMap<u64, Vec<u64>>>,
    source_channels: Mutex<IndexMap<u64, Channel>>,
    space_names: Mutex<IndexMap<u64, String>>,
    me: OnceCell<u64>,
}

impl RelayEngine {
    /// Create an engine with the standard name provider chain.
    pub fn new(platform: Arc<dyn ChatPlatform>, db: Database, config: RelayConfig) -> Result<Self> {
        config.validate()?;

        let names = NameResolver::standard(
            db.pool().clone(),
            config.seed_names.clone(),
            platform.clone(),
        );

        Ok(Self {
            access: AccessCache::new(),
            tracked: TrackedAuthors::new(config.tracked_role_ids.clone(), std::iter::empty()),
            mirrors: MirrorProvisioner::new(platform.clone(), config.create_cooldown),
            publisher: RelayPublisher::new(
                platform.clone(),
                config.webhook_name.clone(),
                config.retry.clone(),
            ),
            names,
            member_roles: Mutex::new(IndexMap::new()),
            source_channels: Mutex::new(IndexMap::new()),
            space_names: Mutex::new(IndexMap::new()),
            me: OnceCell::new(),
            platform,
            db,
            config,
        })
    }

    /// Replace the display-name provider chain.
    pub fn with_names(mut self, names: NameResolver) -> Self {
        self.names = names;
        self
    }

    /// Reload the inaccessible channels and known authors from the store.
    pub async fn load_state(&self) -> Result<()> {
        let inaccessible = channel::list_inaccessible(self.db.pool()).await?;
        let authors = author::list_author_ids(self.db.pool()).await?;

        info!(
            "Loaded {} inaccessible channels and {} known authors",
            inaccessible.len(),
            authors.len()
        );
        self.access
            .load_inaccessible(inaccessible.into_iter().map(|id| id as u64));
        self.tracked.remember_all(authors.into_iter().map(|id| id as u64));
        Ok(())
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn access(&self) -> &AccessCache {
        &self.access
    }

    pub fn tracked(&self) -> &TrackedAuthors {
        &self.tracked
    }

    pub fn mirrors(&self) -> &MirrorProvisioner {
        &self.mirrors
    }

    pub fn publisher(&self) -> &RelayPublisher {
        &self.publisher
    }

    /// The account the engine runs as.
    pub(crate) async fn my_id(&self) -> PlatformResult<u64> {
        self.me
            .get_or_try_init(|| async { self.platform.current_user().await.map(|u| u.id) })
            .await
            .copied()
    }

    fn roles_cache(&self) -> MutexGuard<'_, IndexMap<u64, Vec<u64>>> {
        self.member_roles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn channel_cache(&self) -> MutexGuard<'_, IndexMap<u64, Channel>> {
        self.source_channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Source-space roles of an author.
    pub(crate) async fn author_roles(&self, author_id: u64) -> PlatformResult<Vec<u64>> {
        if let Some(roles) = self.roles_cache().get(&author_id) {
            return Ok(roles.clone());
        }

        let roles = self
            .platform
            .member_roles(self.config.source_space_id, author_id)
            .await?;
        self.roles_cache().insert(author_id, roles.clone());
        Ok(roles)
    }

    /// Whether a message was written by a tracked author.
    ///
    /// Fails when the author's roles are needed and cannot be looked up; the
    /// caller must not treat that as "untracked".
    pub(crate) async fn is_tracked(&self, message: &Message) -> PlatformResult<bool> {
        let author_id = message.author.id;
        if self.tracked.is_known(author_id) {
            return Ok(true);
        }
        if !self.tracked.tracks_roles() {
            return Ok(false);
        }

        let roles = match message.member_roles() {
            Some(roles) => roles.to_vec(),
            None => self.author_roles(author_id).await?,
        };
        Ok(self.tracked.has_tracked_role(&roles))
    }

    /// Remember a tracked author in memory and in the store.
    pub(crate) async fn record_author(&self, message: &Message) -> Result<()> {
        let author_id = message.author.id;
        if self.tracked.remember(author_id) {
            debug!("Now tracking author {}", author_id);
        }
        author::upsert_author(
            self.db.pool(),
            author_id as i64,
            Some(message.author_display_name()),
        )
        .await?;
        Ok(())
    }

    /// Snippet for a message, quoting the message it replies to.
    pub(crate) async fn build_snippet(&self, message: &Message) -> String {
        let body = snippet::body(&message.content);
        let Some(parent_id) = message.reply_to() else {
            return body;
        };

        let parent = match &message.referenced_message {
            Some(parent) => Some((**parent).clone()),
            None => {
                let fetched = self
                    .platform
                    .fetch_message(message.channel_id, parent_id)
                    .await;
                tokio::time::sleep(self.config.reply_fetch_pause).await;
                match fetched {
                    Ok(parent) => Some(parent),
                    Err(e) => {
                        debug!("Reply parent {} unavailable: {}", parent_id, e);
                        None
                    }
                }
            }
        };

        match parent {
            Some(parent) => {
                snippet::reply_prefix(parent.author_display_name(), &parent.content) + &body
            }
            None => body,
        }
    }

    /// Cache a source channel seen in a listing.
    pub(crate) fn remember_channel(&self, channel: &Channel) {
        let mut cache = self.channel_cache();
        cache.insert(channel.id, channel.clone());
    }

    /// A source channel or thread, from cache or the remote.
    pub(crate) async fn source_channel(&self, channel_id: u64) -> PlatformResult<Channel> {
        if let Some(channel) = self.channel_cache().get(&channel_id) {
            return Ok(channel.clone());
        }
        let channel = self.platform.channel(channel_id).await?;
        self.remember_channel(&channel);
        Ok(channel)
    }

    /// Display name of a space.
    pub(crate) async fn space_name(&self, space_id: u64) -> PlatformResult<String> {
        let cached = self
            .space_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&space_id)
            .cloned();
        if let Some(name) = cached {
            return Ok(name);
        }

        let name = self.platform.space(space_id).await?.name;
        self.space_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(space_id, name.clone());
        Ok(name)
    }

    /// Names describing where a source channel or thread lives.
    pub(crate) async fn mirror_source(&self, channel: &Channel) -> Result<MirrorSource> {
        let space_id = channel.guild_id.unwrap_or(self.config.source_space_id);

        let (text_channel, thread) = match (channel.is_thread(), channel.parent_id) {
            (true, None) => return Err(RelayError::NoMirror(channel.id)),
            (true, Some(parent_id)) => (
                self.source_channel(parent_id).await?,
                Some(SourceThread {
                    id: channel.id,
                    name: channel.name.clone(),
                    auto_archive_minutes: channel.auto_archive_duration(),
                }),
            ),
            _ => (channel.clone(), None),
        };

        let category_name = match text_channel.parent_id {
            Some(category_id) => match self.source_channel(category_id).await {
                Ok(category) => Some(category.name),
                Err(PlatformError::NotFound(_)) => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        Ok(MirrorSource {
            space_id,
            channel_id: text_channel.id,
            channel_name: text_channel.name,
            category_name,
            thread,
        })
    }

    /// Provision the mirror for `channel` and publish `message` into it.
    pub(crate) async fn deliver(
        &self,
        channel: &Channel,
        message: WebhookMessage,
    ) -> Result<MirrorTarget> {
        let source = self.mirror_source(channel).await?;
        let target = self
            .mirrors
            .ensure_mirror(self.config.mirror_space_id, &source)
            .await?;

        match self.publisher.publish(&target, message).await {
            Ok(()) => Ok(target),
            Err(e @ PlatformError::NotFound(_)) => {
                // The destination may be gone too; provision again next time.
                self.mirrors.forget(&source);
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The webhook message relaying a post from `channel`.
    pub(crate) async fn render_post(
        &self,
        author_id: u64,
        live_name: Option<ResolvedName>,
        channel: &Channel,
        message_id: u64,
        snippet: &str,
    ) -> Result<WebhookMessage> {
        let space_id = channel.guild_id.unwrap_or(self.config.source_space_id);
        let name = self.names.resolve(author_id, live_name).await;
        let space_name = self.space_name(space_id).await?;

        let content = snippet::render(
            &name.name,
            &space_name,
            &channel.name,
            snippet,
            &snippet::jump_url(space_id, channel.id, message_id),
        );
        Ok(WebhookMessage::new(content, name.name).with_avatar(name.avatar_url))
    }

    /// Halve every cache that has outgrown its bound.
    pub fn evict_caches(&self) -> usize {
        let dropped = self.mirrors.evict()
            + self.publisher.evict()
            + halve_map(&mut *self.roles_cache(), MAX_CACHED_MEMBERS)
            + halve_map(&mut *self.channel_cache(), MAX_CACHED_CHANNELS);
        if dropped > 0 {
            info!("Evicted {} cached entries", dropped);
        }
        dropped
    }
}
