//! Destination hierarchy provisioning.
//!
//! Every source channel gets a same-named read-only text channel in the
//! mirror space, under a category named after the source category. Source
//! threads map to same-named public threads of that channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use discord_client::{Channel, ChannelKind, ChatPlatform, PlatformError, PlatformResult};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::bounded::halve_map;

/// Category used for source channels that have none.
pub const NO_CATEGORY: &str = "No-Category";

/// Largest number of cached mappings.
pub const MAX_CACHED_MIRRORS: usize = 1000;

/// Where a relayed post is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MirrorTarget {
    /// Text channel holding the webhook.
    pub channel_id: u64,
    /// Thread of that channel, for posts from source threads.
    pub thread_id: Option<u64>,
}

impl MirrorTarget {
    /// A plain channel target.
    pub fn channel(channel_id: u64) -> Self {
        Self {
            channel_id,
            thread_id: None,
        }
    }
}

/// A source thread to mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceThread {
    pub id: u64,
    pub name: String,
    pub auto_archive_minutes: u32,
}

/// Names and IDs describing a source channel or thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSource {
    pub space_id: u64,
    /// The text channel, or the thread's parent channel.
    pub channel_id: u64,
    pub channel_name: String,
    pub category_name: Option<String>,
    pub thread: Option<SourceThread>,
}

impl MirrorSource {
    /// Cache key: the source space and the innermost source channel.
    pub fn key(&self) -> (u64, u64) {
        let inner = self.thread.as_ref().map_or(self.channel_id, |t| t.id);
        (self.space_id, inner)
    }
}

/// Text channel names are stored lowercased with dashes for spaces.
fn same_channel_name(existing: &str, wanted: &str) -> bool {
    let normalize = |s: &str| s.trim().to_lowercase().replace(' ', "-");
    existing == wanted || normalize(existing) == normalize(wanted)
}

/// Finds or creates mirror destinations and memoizes the mapping.
pub struct MirrorProvisioner {
    platform: Arc<dyn ChatPlatform>,
    cooldown: Duration,
    cache: Mutex<IndexMap<(u64, u64), MirrorTarget>>,
    creation: tokio::sync::Mutex<()>,
}

impl MirrorProvisioner {
    pub fn new(platform: Arc<dyn ChatPlatform>, cooldown: Duration) -> Self {
        Self {
            platform,
            cooldown,
            cache: Mutex::new(IndexMap::new()),
            creation: tokio::sync::Mutex::new(()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, IndexMap<(u64, u64), MirrorTarget>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cached(&self, source: &MirrorSource) -> Option<MirrorTarget> {
        self.cache().get(&source.key()).copied()
    }

    /// The destination for `source` in `destination_space`, creating any
    /// missing category, channel or thread.
    pub async fn ensure_mirror(
        &self,
        destination_space: u64,
        source: &MirrorSource,
    ) -> PlatformResult<MirrorTarget> {
        if let Some(target) = self.cached(source) {
            return Ok(target);
        }

        let _guard = self.creation.lock().await;
        // Another caller may have provisioned it while we waited.
        if let Some(target) = self.cached(source) {
            return Ok(target);
        }

        let existing = self.platform.space_channels(destination_space).await?;

        let category_name = source.category_name.as_deref().unwrap_or(NO_CATEGORY);
        let category_id = match existing
            .iter()
            .find(|c| c.kind == ChannelKind::Category && c.name == category_name)
        {
            Some(category) => category.id,
            None => {
                let created = self
                    .platform
                    .create_category(destination_space, category_name)
                    .await?;
                info!("Created mirror category {}", category_name);
                tokio::time::sleep(self.cooldown).await;
                created.id
            }
        };

        let channel_id = match existing.iter().find(|c| {
            c.kind.is_text()
                && c.parent_id == Some(category_id)
                && same_channel_name(&c.name, &source.channel_name)
        }) {
            Some(channel) => channel.id,
            None => {
                let created = self
                    .platform
                    .create_text_channel(destination_space, &source.channel_name, Some(category_id))
                    .await?;
                info!(
                    "Created mirror channel #{} in {}",
                    source.channel_name, category_name
                );
                self.make_read_only(&created).await;
                tokio::time::sleep(self.cooldown).await;
                created.id
            }
        };

        let target = match &source.thread {
            None => MirrorTarget::channel(channel_id),
            Some(thread) => {
                let thread_id = self
                    .ensure_thread(destination_space, channel_id, thread)
                    .await?;
                MirrorTarget {
                    channel_id,
                    thread_id: Some(thread_id),
                }
            }
        };

        self.cache().insert(source.key(), target);
        Ok(target)
    }

    async fn ensure_thread(
        &self,
        destination_space: u64,
        channel_id: u64,
        thread: &SourceThread,
    ) -> PlatformResult<u64> {
        let is_match = |c: &Channel| c.parent_id == Some(channel_id) && c.name == thread.name;

        let active = self.platform.active_threads(destination_space).await?;
        if let Some(found) = active.iter().find(|c| is_match(c)) {
            return Ok(found.id);
        }

        // Posting into an archived thread revives it.
        match self.platform.archived_public_threads(channel_id).await {
            Ok(archived) => {
                if let Some(found) = archived.iter().find(|c| is_match(c)) {
                    return Ok(found.id);
                }
            }
            Err(e) => debug!("Archived thread listing failed in {}: {}", channel_id, e),
        }

        let created = self
            .platform
            .create_thread(channel_id, &thread.name, thread.auto_archive_minutes)
            .await?;
        info!("Created mirror thread {} in channel {}", thread.name, channel_id);
        tokio::time::sleep(self.cooldown).await;
        Ok(created.id)
    }

    /// Deny `@everyone` sending in a freshly created channel.
    async fn make_read_only(&self, channel: &Channel) {
        match self.platform.deny_send_for_everyone(channel).await {
            Ok(true) => debug!("Made #{} read-only", channel.name),
            Ok(false) => {}
            Err(PlatformError::Forbidden(_)) => {
                warn!("Cannot make #{} read-only - missing permissions", channel.name)
            }
            Err(e) => warn!("Failed to make #{} read-only: {}", channel.name, e),
        }
    }

    /// Forget a mapping whose destination has disappeared.
    pub fn forget(&self, source: &MirrorSource) {
        self.cache().shift_remove(&source.key());
    }

    /// Drop the older half of the cache when it is over its bound.
    pub fn evict(&self) -> usize {
        let dropped = halve_map(&mut *self.cache(), MAX_CACHED_MIRRORS);
        if dropped > 0 {
            info!("Cleaned mirror cache: {} entries removed", dropped);
        }
        dropped
    }

    pub fn cached_count(&self) -> usize {
        self.cache().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePlatform, MIRROR_SPACE, SOURCE_SPACE};
    use discord_client::permissions;

    fn provisioner(platform: &Arc<FakePlatform>) -> MirrorProvisioner {
        MirrorProvisioner::new(platform.clone(), Duration::ZERO)
    }

    fn channel_source(channel_id: u64, name: &str, category: Option<&str>) -> MirrorSource {
        MirrorSource {
            space_id: SOURCE_SPACE,
            channel_id,
            channel_name: name.to_string(),
            category_name: category.map(str::to_string),
            thread: None,
        }
    }

    #[tokio::test]
    async fn test_creates_hierarchy_once() {
        let platform = Arc::new(FakePlatform::new());
        let mirrors = provisioner(&platform);
        let source = channel_source(10, "announcements", Some("News"));

        let target = mirrors.ensure_mirror(MIRROR_SPACE, &source).await.unwrap();
        assert_eq!(target.thread_id, None);
        assert_eq!(mirrors.ensure_mirror(MIRROR_SPACE, &source).await.unwrap(), target);

        assert_eq!(platform.calls("create_category"), 1);
        assert_eq!(platform.calls("create_text_channel"), 1);
        assert_eq!(platform.calls("space_channels"), 1);

        let created = platform.channel_by_id(target.channel_id).unwrap();
        assert_eq!(created.name, "announcements");
        let category = platform.channel_by_id(created.parent_id.unwrap()).unwrap();
        assert_eq!(category.name, "News");
        assert!(permissions::everyone_denied_send(&created, MIRROR_SPACE));
    }

    #[tokio::test]
    async fn test_uncategorized_channels_share_fallback_category() {
        let platform = Arc::new(FakePlatform::new());
        let mirrors = provisioner(&platform);

        let a = mirrors
            .ensure_mirror(MIRROR_SPACE, &channel_source(10, "general", None))
            .await
            .unwrap();
        let b = mirrors
            .ensure_mirror(MIRROR_SPACE, &channel_source(11, "trading", None))
            .await
            .unwrap();

        assert_eq!(platform.calls("create_category"), 1);
        let parent_a = platform.channel_by_id(a.channel_id).unwrap().parent_id;
        let parent_b = platform.channel_by_id(b.channel_id).unwrap().parent_id;
        assert_eq!(parent_a, parent_b);
        assert_eq!(platform.channel_by_id(parent_a.unwrap()).unwrap().name, NO_CATEGORY);
    }

    #[tokio::test]
    async fn test_reuses_existing_destination_by_name() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_category(MIRROR_SPACE, 500, "News");
        platform.add_text_channel(MIRROR_SPACE, 501, "announcements", Some(500));
        let mirrors = provisioner(&platform);

        let target = mirrors
            .ensure_mirror(MIRROR_SPACE, &channel_source(10, "Announcements", Some("News")))
            .await
            .unwrap();

        assert_eq!(target, MirrorTarget::channel(501));
        assert_eq!(platform.calls("create_category"), 0);
        assert_eq!(platform.calls("create_text_channel"), 0);
    }

    #[tokio::test]
    async fn test_thread_source_gets_thread_target() {
        let platform = Arc::new(FakePlatform::new());
        let mirrors = provisioner(&platform);
        let source = MirrorSource {
            thread: Some(SourceThread {
                id: 12,
                name: "Merchant schedule".to_string(),
                auto_archive_minutes: 4320,
            }),
            ..channel_source(10, "events", Some("Game"))
        };

        let target = mirrors.ensure_mirror(MIRROR_SPACE, &source).await.unwrap();
        let thread = platform.channel_by_id(target.thread_id.unwrap()).unwrap();
        assert_eq!(thread.name, "Merchant schedule");
        assert_eq!(thread.parent_id, Some(target.channel_id));
        assert_eq!(thread.auto_archive_duration(), 4320);

        // The parent channel's own mapping is separate.
        let parent = mirrors
            .ensure_mirror(MIRROR_SPACE, &channel_source(10, "events", Some("Game")))
            .await
            .unwrap();
        assert_eq!(parent, MirrorTarget::channel(target.channel_id));
        assert_eq!(platform.calls("create_text_channel"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_create_one_destination() {
        let platform = Arc::new(FakePlatform::new());
        platform.set_create_delay(Duration::from_millis(20));
        let mirrors = Arc::new(provisioner(&platform));
        let source = channel_source(10, "announcements", Some("News"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let mirrors = mirrors.clone();
                let source = source.clone();
                tokio::spawn(async move { mirrors.ensure_mirror(MIRROR_SPACE, &source).await })
            })
            .collect();

        let mut targets = Vec::new();
        for result in futures::future::join_all(handles).await {
            targets.push(result.unwrap().unwrap());
        }

        assert!(targets.iter().all(|t| *t == targets[0]));
        assert_eq!(platform.calls("create_category"), 1);
        assert_eq!(platform.calls("create_text_channel"), 1);
    }

    #[tokio::test]
    async fn test_read_only_failure_does_not_block_mirroring() {
        let platform = Arc::new(FakePlatform::new());
        platform.fail_permission_updates();
        let mirrors = provisioner(&platform);

        let target = mirrors
            .ensure_mirror(MIRROR_SPACE, &channel_source(10, "general", None))
            .await
            .unwrap();
        assert!(platform.channel_by_id(target.channel_id).is_some());
    }

    #[tokio::test]
    async fn test_forget_and_evict() {
        let platform = Arc::new(FakePlatform::new());
        let mirrors = provisioner(&platform);
        let source = channel_source(10, "general", None);

        mirrors.ensure_mirror(MIRROR_SPACE, &source).await.unwrap();
        assert_eq!(mirrors.cached_count(), 1);
        mirrors.forget(&source);
        assert!(mirrors.cached(&source).is_none());
        assert_eq!(mirrors.evict(), 0);
    }
}
