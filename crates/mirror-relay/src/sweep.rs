//! Round-robin sweeps over every source channel and thread.

use std::future::Future;

use discord_client::Channel;
use tracing::{debug, error, info, warn};

use crate::crawler::CrawlOutcome;
use crate::engine::RelayEngine;
use crate::error::Result;

/// Counters for one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub number: u64,
    pub channels: usize,
    pub threads: usize,
    pub fetched: usize,
    pub saved: usize,
    pub skipped: usize,
    pub exhausted: usize,
    pub inaccessible: usize,
    pub deferred: usize,
}

impl SweepSummary {
    fn record(&mut self, outcome: &CrawlOutcome) {
        match outcome {
            CrawlOutcome::Skipped => self.skipped += 1,
            CrawlOutcome::Inaccessible => self.inaccessible += 1,
            CrawlOutcome::Exhausted => self.exhausted += 1,
            CrawlOutcome::Progressed { fetched, saved } => {
                self.fetched += fetched;
                self.saved += saved;
            }
            CrawlOutcome::TimedOut | CrawlOutcome::Deferred { .. } => self.deferred += 1,
        }
    }
}

impl RelayEngine {
    /// Crawl every non-ignored text channel of the source space, each
    /// followed by its threads.
    pub async fn sweep_once(&self, number: u64) -> Result<SweepSummary> {
        let space_id = self.config.source_space_id;
        let listing = self.platform.space_channels(space_id).await?;
        let active = self.platform.active_threads(space_id).await?;
        for channel in &listing {
            self.remember_channel(channel);
        }

        let mut summary = SweepSummary {
            number,
            ..Default::default()
        };

        let channels = listing
            .iter()
            .filter(|c| c.kind.is_text() && !self.config.is_ignored(c.id));
        for channel in channels {
            summary.channels += 1;
            self.crawl_and_record(channel, &mut summary).await;

            if self.access.is_inaccessible(channel.id) {
                continue;
            }
            let threads = match self.channel_threads(channel, &active).await {
                Ok(threads) => threads,
                Err(e) => {
                    warn!("Could not list threads of #{}: {}", channel.name, e);
                    summary.deferred += 1;
                    continue;
                }
            };
            for thread in threads {
                if self.config.is_ignored(thread.id) {
                    continue;
                }
                summary.threads += 1;
                self.crawl_and_record(&thread, &mut summary).await;
            }
        }

        info!(
            "Sweep {} done: {} channels, {} threads, {} fetched, {} saved, {} skipped, {} exhausted, {} inaccessible, {} deferred",
            summary.number,
            summary.channels,
            summary.threads,
            summary.fetched,
            summary.saved,
            summary.skipped,
            summary.exhausted,
            summary.inaccessible,
            summary.deferred
        );
        Ok(summary)
    }

    /// Crawl one channel; failures are counted as deferred and never end
    /// the sweep.
    async fn crawl_and_record(&self, channel: &Channel, summary: &mut SweepSummary) {
        let hit_remote = match self.crawl(channel).await {
            Ok(outcome) => {
                summary.record(&outcome);
                outcome.hit_remote()
            }
            Err(e) => {
                error!("Crawl of #{} failed: {}", channel.name, e);
                summary.deferred += 1;
                true
            }
        };
        if hit_remote {
            tokio::time::sleep(self.config.request_pause).await;
        }
    }

    /// Every Nth sweep, start a new access epoch and trim the caches.
    pub fn end_of_sweep(&self, number: u64) {
        if number % self.config.reset_every_sweeps != 0 {
            return;
        }
        let (inaccessible, exhausted) = self.access.counts();
        let epoch = self.access.reset_epoch();
        self.evict_caches();
        info!(
            "Epoch {} started: cleared {} inaccessible and {} exhausted channels",
            epoch, inaccessible, exhausted
        );
    }

    /// Sweep until `shutdown` completes.
    pub async fn run_sweeps<S>(&self, shutdown: S)
    where
        S: Future<Output = ()> + Send,
    {
        info!(
            "Starting sweeps of space {} (pause {:?})",
            self.config.source_space_id, self.config.sweep_pause
        );
        tokio::pin!(shutdown);

        let mut number = 0;
        loop {
            number += 1;
            let pause = tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("Shutdown signal received, stopping sweeps");
                    return;
                }

                result = self.sweep_once(number) => match result {
                    Ok(_) => self.config.sweep_pause,
                    Err(e) => {
                        error!("Sweep {} failed: {}", number, e);
                        self.config.sweep_error_pause
                    }
                },
            };
            self.end_of_sweep(number);

            debug!("Next sweep in {:?}", pause);
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("Shutdown signal received, stopping sweeps");
                    return;
                }

                () = tokio::time::sleep(pause) => {}
            }
        }
    }
}
