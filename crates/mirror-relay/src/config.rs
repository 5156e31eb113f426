//! Engine configuration.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::publisher::RetryPolicy;

/// GemStone IV.
pub const DEFAULT_SOURCE_SPACE_ID: u64 = 226045346399256576;

/// BlueTracker.
pub const DEFAULT_MIRROR_SPACE_ID: u64 = 1383182313210511472;

/// #gm-tracker.
pub const DEFAULT_CENTRAL_CHANNEL_ID: u64 = 1383196587270078515;

/// Server Admin, Product Manager, Senior GameMaster, GameMaster.
pub const DEFAULT_TRACKED_ROLE_IDS: [u64; 4] = [
    587394944897908736,
    680574750208294924,
    226053427690471425,
    226053100790743044,
];

/// Off-Topic, Platinum off-topic thread, Games and Trivia.
pub const DEFAULT_IGNORED_CHANNEL_IDS: [u64; 3] = [
    613879283038814228,
    1333880748461260921,
    1171221232402845767,
];

/// Name of the webhook the relay installs and reuses.
pub const DEFAULT_WEBHOOK_NAME: &str = "BlueTracker";

/// Largest page the history endpoint serves.
pub const MAX_PAGE_SIZE: u8 = 100;

/// Configuration for the relay engine.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Space whose channels are crawled.
    pub source_space_id: u64,

    /// Space the mirror hierarchy is created in.
    pub mirror_space_id: u64,

    /// Channel receiving every live post, if any.
    pub central_channel_id: Option<u64>,

    /// Holders of these roles are tracked authors.
    pub tracked_role_ids: HashSet<u64>,

    /// Channels and threads never crawled or relayed.
    pub ignored_channel_ids: HashSet<u64>,

    /// Static display names consulted after the override table.
    pub seed_names: HashMap<u64, String>,

    /// How far back history is harvested.
    pub cutoff_days: u32,

    /// Messages per history request.
    pub page_size: u8,

    /// Pause after each channel crawl that hit the remote.
    pub request_pause: Duration,

    /// Pause between replayed messages.
    pub relay_pause: Duration,

    /// Hard deadline for one history request.
    pub history_timeout: Duration,

    /// Pause after creating a category, channel or thread.
    pub create_cooldown: Duration,

    /// Courtesy pause after fetching a reply's parent message.
    pub reply_fetch_pause: Duration,

    /// Every Nth completed sweep clears the access cache and trims caches.
    pub reset_every_sweeps: u64,

    /// Pause between full sweeps.
    pub sweep_pause: Duration,

    /// Pause after a sweep fails.
    pub sweep_error_pause: Duration,

    /// Webhook name looked up before creating one.
    pub webhook_name: String,

    /// Publish retry bounds.
    pub retry: RetryPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            source_space_id: DEFAULT_SOURCE_SPACE_ID,
            mirror_space_id: DEFAULT_MIRROR_SPACE_ID,
            central_channel_id: Some(DEFAULT_CENTRAL_CHANNEL_ID),
            tracked_role_ids: DEFAULT_TRACKED_ROLE_IDS.into_iter().collect(),
            ignored_channel_ids: DEFAULT_IGNORED_CHANNEL_IDS.into_iter().collect(),
            seed_names: HashMap::new(),
            cutoff_days: 365 * 10,
            page_size: 50,
            request_pause: Duration::from_millis(2500),
            relay_pause: Duration::from_millis(2100),
            history_timeout: Duration::from_secs(15),
            create_cooldown: Duration::from_secs(1),
            reply_fetch_pause: Duration::from_millis(200),
            reset_every_sweeps: 50,
            sweep_pause: Duration::from_secs(30),
            sweep_error_pause: Duration::from_secs(10),
            webhook_name: DEFAULT_WEBHOOK_NAME.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RelayConfig {
    /// Check values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(RelayError::Config(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        if self.source_space_id == self.mirror_space_id {
            return Err(RelayError::Config(
                "source and mirror spaces must differ".to_string(),
            ));
        }
        if self.reset_every_sweeps == 0 {
            return Err(RelayError::Config(
                "reset interval must be at least one sweep".to_string(),
            ));
        }
        if self.webhook_name.trim().is_empty() {
            return Err(RelayError::Config("webhook name is empty".to_string()));
        }
        Ok(())
    }

    /// Whether a channel or thread is excluded from crawling and relaying.
    pub fn is_ignored(&self, channel_id: u64) -> bool {
        self.ignored_channel_ids.contains(&channel_id)
    }

    /// Retention cutoff in Unix milliseconds, relative to `now_ms`.
    pub fn cutoff_ms(&self, now_ms: i64) -> i64 {
        now_ms - i64::from(self.cutoff_days) * 86_400_000
    }
}
