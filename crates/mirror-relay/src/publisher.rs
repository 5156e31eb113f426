//! Webhook publishing with rate-limit-aware retry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use discord_client::{ChatPlatform, PlatformError, PlatformResult, Webhook, WebhookMessage};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::bounded::halve_map;
use crate::mirror::MirrorTarget;

/// Largest number of cached webhooks.
pub const MAX_CACHED_WEBHOOKS: usize = 100;

/// Retry bounds for one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed for timeouts and server errors.
    pub max_attempts: u32,
    /// First backoff; doubled after each transient failure.
    pub base_delay: Duration,
    /// Rate-limit waits allowed, counted separately from attempts.
    pub max_rate_limit_waits: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_rate_limit_waits: 5,
        }
    }
}

impl RetryPolicy {
    /// Backoff before the retry following failed attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Sends rendered posts through a webhook on the destination channel.
pub struct RelayPublisher {
    platform: Arc<dyn ChatPlatform>,
    webhook_name: String,
    policy: RetryPolicy,
    webhooks: Mutex<IndexMap<u64, Webhook>>,
    creation: tokio::sync::Mutex<()>,
}

impl RelayPublisher {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        webhook_name: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            platform,
            webhook_name: webhook_name.into(),
            policy,
            webhooks: Mutex::new(IndexMap::new()),
            creation: tokio::sync::Mutex::new(()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, IndexMap<u64, Webhook>> {
        self.webhooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached(&self, channel_id: u64) -> Option<Webhook> {
        self.cache().get(&channel_id).cloned()
    }

    /// The relay's webhook on a channel, found by name or created.
    pub async fn webhook_for(&self, channel_id: u64) -> PlatformResult<Webhook> {
        if let Some(webhook) = self.cached(channel_id) {
            return Ok(webhook);
        }

        let _guard = self.creation.lock().await;
        if let Some(webhook) = self.cached(channel_id) {
            return Ok(webhook);
        }

        let existing = self
            .platform
            .webhooks(channel_id)
            .await?
            .into_iter()
            .find(|w| w.name.as_deref() == Some(self.webhook_name.as_str()) && w.token.is_some());

        let webhook = match existing {
            Some(webhook) => webhook,
            None => {
                info!(
                    "Creating webhook {} in channel {}",
                    self.webhook_name, channel_id
                );
                self.platform
                    .create_webhook(channel_id, &self.webhook_name)
                    .await?
            }
        };

        self.cache().insert(channel_id, webhook.clone());
        Ok(webhook)
    }

    /// Send `message` to `target`, retrying per the policy.
    pub async fn publish(&self, target: &MirrorTarget, message: WebhookMessage) -> PlatformResult<()> {
        let webhook = self.webhook_for(target.channel_id).await?;
        let message = message.in_thread(target.thread_id);

        let mut attempt = 0;
        let mut waits = 0;

        loop {
            match self.platform.execute_webhook(&webhook, &message).await {
                Ok(()) => return Ok(()),
                Err(PlatformError::RateLimited { retry_after })
                    if waits < self.policy.max_rate_limit_waits =>
                {
                    waits += 1;
                    warn!(
                        "Webhook rate limited in channel {}, waiting {:?}",
                        target.channel_id, retry_after
                    );
                    tokio::time::sleep(retry_after).await;
                }
                Err(e @ PlatformError::RateLimited { .. }) => return Err(e),
                Err(e @ PlatformError::NotFound(_)) => {
                    // Webhook was deleted; the next publish recreates it.
                    self.invalidate(target.channel_id);
                    return Err(e);
                }
                Err(e) if e.is_transient() && attempt + 1 < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    attempt += 1;
                    debug!(
                        "Webhook send failed ({}), retry {} in {:?}",
                        e, attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(
                        "Webhook send to channel {} failed after {} attempt(s): {}",
                        target.channel_id,
                        attempt + 1,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Forget the cached webhook for a channel.
    pub fn invalidate(&self, channel_id: u64) {
        self.cache().shift_remove(&channel_id);
    }

    /// Drop the older half of the cache when it is over its bound.
    pub fn evict(&self) -> usize {
        let dropped = halve_map(&mut *self.cache(), MAX_CACHED_WEBHOOKS);
        if dropped > 0 {
            info!("Cleaned webhook cache: {} entries removed", dropped);
        }
        dropped
    }

    pub fn cached_count(&self) -> usize {
        self.cache().len()
    }
}
