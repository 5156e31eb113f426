//! Draining stored posts that were never relayed.

use std::time::{Duration, Instant};

use database::{post, Post};
use discord_client::PlatformError;
use tracing::{error, info, warn};

use crate::engine::RelayEngine;
use crate::error::Result;
use crate::snippet;

/// Totals for one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Unrelayed posts found when the run started.
    pub total: usize,
    pub sent: usize,
    /// Posts that could not be sent; they are marked relayed regardless.
    pub failed: usize,
    /// Posts whose source channel no longer exists.
    pub channel_gone: usize,
    /// Posts the live handler relayed while the run was in progress.
    pub already_relayed: usize,
}

enum ReplayStep {
    Sent,
    ChannelGone,
    AlreadyRelayed,
}

impl RelayEngine {
    /// Relay every stored post not yet relayed, oldest first.
    ///
    /// Each post is marked relayed once it has been handled, whether or not
    /// the send succeeded, so a poisoned post cannot stall later runs.
    pub async fn replay_all(&self) -> Result<ReplayReport> {
        let pending = post::list_unrelayed(self.db.pool()).await?;
        let mut report = ReplayReport {
            total: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            info!("Nothing to replay");
            return Ok(report);
        }

        info!("Starting replay of {} posts", report.total);
        let started = Instant::now();

        for (index, record) in pending.iter().enumerate() {
            let sent_something = match self.replay_one(record).await {
                Ok(ReplayStep::Sent) => {
                    report.sent += 1;
                    true
                }
                Ok(ReplayStep::ChannelGone) => {
                    report.channel_gone += 1;
                    false
                }
                Ok(ReplayStep::AlreadyRelayed) => {
                    report.already_relayed += 1;
                    false
                }
                Err(e) => {
                    warn!("Replay of post {} failed: {}", record.id, e);
                    report.failed += 1;
                    if let Err(e) = post::mark_relayed(self.db.pool(), record.id).await {
                        error!("Could not mark post {} as relayed: {}", record.id, e);
                    }
                    true
                }
            };

            let done = index + 1;
            log_progress(done, report.total, started.elapsed());
            if sent_something && done < report.total {
                tokio::time::sleep(self.config.relay_pause).await;
            }
        }

        info!(
            "Replay complete: {} sent, {} failed, {} channel gone, {} already relayed",
            report.sent, report.failed, report.channel_gone, report.already_relayed
        );
        Ok(report)
    }

    async fn replay_one(&self, record: &Post) -> Result<ReplayStep> {
        let pool = self.db.pool();

        // The live handler may have claimed it after the listing.
        match post::get_post(pool, record.id).await? {
            Some(current) if !current.relayed => {}
            _ => return Ok(ReplayStep::AlreadyRelayed),
        }

        let channel = match self.source_channel(record.channel_id as u64).await {
            Ok(channel) => channel,
            Err(PlatformError::NotFound(_)) => {
                info!("Source channel {} is gone, dropping post {}", record.channel_id, record.id);
                post::mark_relayed(pool, record.id).await?;
                return Ok(ReplayStep::ChannelGone);
            }
            Err(e) => return Err(e.into()),
        };

        let body = snippet::body(record.snippet.as_deref().unwrap_or_default());
        let rendered = self
            .render_post(record.author_id as u64, None, &channel, record.id as u64, &body)
            .await?;
        self.deliver(&channel, rendered).await?;

        post::mark_relayed(pool, record.id).await?;
        Ok(ReplayStep::Sent)
    }
}

fn log_progress(done: usize, total: usize, elapsed: Duration) {
    let per_post = elapsed.as_secs_f64() / done as f64;
    let eta_minutes = per_post * (total - done) as f64 / 60.0;
    info!(
        "[replay] {}/{} ({:.1}%) ETA: {:.1} min Elapsed: {:.1} min",
        done,
        total,
        done as f64 * 100.0 / total as f64,
        eta_minutes,
        elapsed.as_secs_f64() / 60.0
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::testing::{test_config, test_engine, FakePlatform, SOURCE_SPACE};
    use database::{author, Database};

    const CHANNEL: u64 = 10;

    fn stored(id: i64, ts: i64, text: &str) -> Post {
        Post {
            id,
            channel_id: CHANNEL as i64,
            author_id: 2,
            timestamp_ms: ts,
            snippet: Some(text.to_string()),
            relayed: false,
        }
    }

    async fn store(db: &Database, posts: &[Post]) {
        for p in posts {
            post::insert_post(db.pool(), p).await.unwrap();
        }
    }

    fn setup() -> Arc<FakePlatform> {
        let platform = Arc::new(FakePlatform::new());
        platform.add_text_channel(SOURCE_SPACE, CHANNEL, "announcements", None);
        platform
    }

    #[tokio::test]
    async fn test_failing_post_is_marked_and_replay_continues() {
        let platform = setup();
        platform.block_webhook_content("second");
        let engine = test_engine(&platform, test_config()).await;
        store(
            engine.db(),
            &[
                stored(3, 300, "third"),
                stored(1, 100, "first"),
                stored(2, 200, "second"),
            ],
        )
        .await;

        let report = engine.replay_all().await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);

        let sent: Vec<String> = platform.sent().into_iter().map(|m| m.content).collect();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains("\nfirst\n"));
        assert!(sent[1].contains("\nthird\n"));

        assert_eq!(post::count_unrelayed(engine.db().pool()).await.unwrap(), 0);
        for id in 1..=3 {
            assert!(post::get_post(engine.db().pool(), id).await.unwrap().unwrap().relayed);
        }
    }

    #[tokio::test]
    async fn test_store_failure_while_marking_does_not_stop_replay() {
        let platform = setup();
        platform.block_webhook_content("second");
        let engine = test_engine(&platform, test_config()).await;
        store(
            engine.db(),
            &[stored(1, 100, "first"), stored(2, 200, "second"), stored(3, 300, "third")],
        )
        .await;
        sqlx::query(
            r#"
            CREATE TRIGGER refuse_mark BEFORE UPDATE OF replayed ON posts
            WHEN NEW.id = 2
            BEGIN
                SELECT RAISE(ABORT, 'disk I/O error');
            END
            "#,
        )
        .execute(engine.db().pool())
        .await
        .unwrap();

        let report = engine.replay_all().await.unwrap();
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(platform.sent().len(), 2);
        assert!(post::get_post(engine.db().pool(), 3).await.unwrap().unwrap().relayed);
        assert!(!post::get_post(engine.db().pool(), 2).await.unwrap().unwrap().relayed);
    }

    #[tokio::test]
    async fn test_replay_leaves_every_row_relayed() {
        let platform = setup();
        let engine = test_engine(&platform, test_config()).await;
        let mut posts: Vec<Post> = (1..=5).map(|i| stored(i, i * 10, "news")).collect();
        posts.push(Post {
            channel_id: 99,
            ..stored(6, 60, "from a deleted channel")
        });
        store(engine.db(), &posts).await;

        let report = engine.replay_all().await.unwrap();
        assert_eq!(report.sent, 5);
        assert_eq!(report.channel_gone, 1);
        assert_eq!(post::count_unrelayed(engine.db().pool()).await.unwrap(), 0);

        let again = engine.replay_all().await.unwrap();
        assert_eq!(again, ReplayReport::default());
        assert_eq!(platform.sent().len(), 5);
    }

    #[tokio::test]
    async fn test_names_and_links_in_replayed_posts() {
        let platform = setup();
        let engine = test_engine(&platform, test_config()).await;
        author::upsert_author(engine.db().pool(), 2, Some("Isten")).await.unwrap();
        store(engine.db(), &[stored(101, 1, &"x".repeat(250))]).await;

        engine.replay_all().await.unwrap();

        let sent = platform.sent();
        assert_eq!(sent[0].username, "Isten");
        let expected = format!(
            "Isten (GemStone IV • #announcements):\n{}…\nhttps://discord.com/channels/1/10/101",
            "x".repeat(197)
        );
        assert_eq!(sent[0].content, expected);
    }

    #[tokio::test]
    async fn test_channel_lookup_failure_counts_as_failed() {
        let platform = setup();
        platform.fail_channel(CHANNEL, PlatformError::Timeout);
        let engine = test_engine(&platform, test_config()).await;
        store(engine.db(), &[stored(1, 1, "first"), stored(2, 2, "second")]).await;

        let report = engine.replay_all().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(post::count_unrelayed(engine.db().pool()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let platform = setup();
        let engine = test_engine(&platform, test_config()).await;
        assert_eq!(engine.replay_all().await.unwrap(), ReplayReport::default());
    }
}
