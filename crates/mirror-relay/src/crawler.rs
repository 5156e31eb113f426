//! Incremental, cursor-based history crawling.
//!
//! Each crawl fetches one page forward from the channel's cursor. A channel
//! that returns an empty page has caught up and is left alone for the rest
//! of the epoch; one that refuses access is left alone until the access
//! cache is reset.

use chrono::Utc;
use database::{channel, cursor, post, ChannelRecord, Post};
use discord_client::{snowflake, Channel, Message, PlatformError};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::engine::RelayEngine;
use crate::error::Result;

/// What one crawl of a channel did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Cached inaccessible or exhausted; nothing was requested.
    Skipped,
    /// Access was refused or the channel is gone.
    Inaccessible,
    /// Caught up with the remote head for this epoch.
    Exhausted,
    /// A page was processed.
    Progressed { fetched: usize, saved: usize },
    /// The history request exceeded its deadline.
    TimedOut,
    /// A retryable failure; the channel is tried again next sweep.
    Deferred { reason: String },
}

impl CrawlOutcome {
    /// Whether the crawl made a remote request.
    pub fn hit_remote(&self) -> bool {
        !matches!(self, CrawlOutcome::Skipped)
    }
}

impl RelayEngine {
    /// Crawl one page of a channel or thread.
    ///
    /// Ignored channels must be filtered out by the caller.
    pub async fn crawl(&self, channel: &Channel) -> Result<CrawlOutcome> {
        if self.access.should_skip(channel.id) {
            return Ok(CrawlOutcome::Skipped);
        }
        self.remember_channel(channel);

        let parent = match channel.parent_id {
            Some(parent_id) if channel.is_thread() => match self.source_channel(parent_id).await {
                Ok(parent) => Some(parent),
                Err(e) => return self.crawl_failed(channel, e).await,
            },
            _ => None,
        };
        match self.platform.can_read_history(channel, parent.as_ref()).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("No history permission in #{}", channel.name);
                self.mark_inaccessible(channel).await?;
                return Ok(CrawlOutcome::Inaccessible);
            }
            Err(e) => return self.crawl_failed(channel, e).await,
        }

        let pool = self.db.pool();
        let cutoff_ms = self.config.cutoff_ms(Utc::now().timestamp_millis());
        let after = match cursor::get_cursor(pool, channel.id as i64).await? {
            Some(cursor) => cursor.last_seen_message_id as u64,
            None => snowflake::from_timestamp_ms(cutoff_ms),
        };

        let request = self
            .platform
            .history_after(channel.id, after, self.config.page_size);
        let page = match timeout(self.config.history_timeout, request).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => return self.crawl_failed(channel, e).await,
            Err(_) => {
                warn!("Timeout in #{}, skipping this pass", channel.name);
                return Ok(CrawlOutcome::TimedOut);
            }
        };

        channel::upsert_channel(pool, &channel_record(channel, true)).await?;

        if page.is_empty() {
            self.access.mark_exhausted(channel.id);
            debug!("#{} is caught up", channel.name);
            return Ok(CrawlOutcome::Exhausted);
        }

        // The cursor only covers messages that were fully handled.
        let mut highest = after;
        let mut saved = 0;
        let mut interrupted = None;
        for message in &page {
            if message.timestamp_ms() >= cutoff_ms
                && !post::post_exists(pool, message.id as i64).await?
            {
                match self.is_tracked(message).await {
                    Ok(true) => {
                        if self.save_post(channel, message).await? {
                            saved += 1;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        interrupted = Some(e);
                        break;
                    }
                }
            }
            highest = highest.max(message.id);
        }

        if highest != after {
            cursor::advance_cursor(pool, channel.id as i64, highest as i64).await?;
        }

        if let Some(error) = interrupted {
            warn!(
                "Role lookup failed in #{}, resuming after {} next pass: {}",
                channel.name, highest, error
            );
            return Ok(CrawlOutcome::Deferred {
                reason: error.to_string(),
            });
        }

        info!(
            "#{:<28} pulled={:<3} saved={:<3} cursor={}",
            channel.name,
            page.len(),
            saved,
            highest
        );
        Ok(CrawlOutcome::Progressed {
            fetched: page.len(),
            saved,
        })
    }

    async fn save_post(&self, channel: &Channel, message: &Message) -> Result<bool> {
        self.record_author(message).await?;
        let snippet = self.build_snippet(message).await;

        let record = Post {
            id: message.id as i64,
            channel_id: channel.id as i64,
            author_id: message.author.id as i64,
            timestamp_ms: message.timestamp_ms(),
            snippet: Some(snippet),
            relayed: false,
        };
        let inserted = post::insert_post(self.db.pool(), &record).await?;
        if inserted {
            debug!(
                "Saved post {} by {} in #{}",
                message.id,
                message.author_display_name(),
                channel.name
            );
        }
        Ok(inserted)
    }

    async fn crawl_failed(&self, channel: &Channel, error: PlatformError) -> Result<CrawlOutcome> {
        match error {
            PlatformError::Forbidden(_) | PlatformError::NotFound(_) => {
                info!("#{} is inaccessible: {}", channel.name, error);
                self.mark_inaccessible(channel).await?;
                Ok(CrawlOutcome::Inaccessible)
            }
            PlatformError::Timeout => {
                warn!("Timeout in #{}, skipping this pass", channel.name);
                Ok(CrawlOutcome::TimedOut)
            }
            PlatformError::RateLimited { .. } | PlatformError::Transient { .. } => {
                warn!("Deferring #{}: {}", channel.name, error);
                Ok(CrawlOutcome::Deferred {
                    reason: error.to_string(),
                })
            }
            PlatformError::Unclassified(_) => {
                warn!("Error in #{}: {}", channel.name, error);
                Ok(CrawlOutcome::Deferred {
                    reason: error.to_string(),
                })
            }
        }
    }

    async fn mark_inaccessible(&self, channel: &Channel) -> Result<()> {
        self.access.mark_inaccessible(channel.id);
        channel::upsert_channel(self.db.pool(), &channel_record(channel, false)).await?;
        Ok(())
    }

    /// Threads of `parent` in crawl order: the active ones from `active`,
    /// then archived public threads oldest first.
    pub async fn channel_threads(&self, parent: &Channel, active: &[Channel]) -> Result<Vec<Channel>> {
        let mut threads: Vec<Channel> = active
            .iter()
            .filter(|t| t.parent_id == Some(parent.id))
            .cloned()
            .collect();

        match self.platform.archived_public_threads(parent.id).await {
            Ok(archived) => {
                for mut thread in archived.into_iter().rev() {
                    if threads.iter().any(|t| t.id == thread.id) {
                        continue;
                    }
                    thread.guild_id.get_or_insert(self.config.source_space_id);
                    threads.push(thread);
                }
            }
            Err(PlatformError::Forbidden(_)) => {
                info!("No access to archived threads in #{}, skipping", parent.name);
            }
            Err(e @ (PlatformError::RateLimited { .. } | PlatformError::Transient { .. })) => {
                warn!("Skipping archived threads in #{}: {}", parent.name, e);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(threads)
    }
}

fn channel_record(channel: &Channel, accessible: bool) -> ChannelRecord {
    ChannelRecord {
        chan_id: channel.id as i64,
        name: Some(channel.name.clone()).filter(|n| !n.is_empty()),
        parent_id: channel.parent_id.map(|id| id as i64),
        accessible,
    }
}
