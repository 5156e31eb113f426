//! Relaying messages as they arrive.

use database::{post, Post};
use discord_client::Message;
use tracing::{debug, info, warn};

use crate::engine::RelayEngine;
use crate::error::{RelayError, Result};
use crate::mirror::MirrorTarget;
use crate::names::ResolvedName;

/// Result of handling one live message.
#[derive(Debug)]
pub enum LiveOutcome {
    /// The post was claimed and sent to the destinations that accepted it.
    Relayed { central: bool, mirror: bool },
    /// Another path relayed this post first.
    AlreadyRelayed,
    /// The message is not relayed.
    Skipped { reason: &'static str },
    /// The post could not be prepared or claimed.
    Failed(RelayError),
}

impl RelayEngine {
    /// Persist and relay a newly posted message.
    ///
    /// Errors are logged and returned in the outcome, never propagated.
    pub async fn handle_live(&self, message: &Message) -> LiveOutcome {
        match self.relay_live(message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Live relay of message {} failed: {}", message.id, e);
                LiveOutcome::Failed(e)
            }
        }
    }

    async fn relay_live(&self, message: &Message) -> Result<LiveOutcome> {
        if let Some(reason) = self.live_skip_reason(message).await? {
            debug!("Skipping message {}: {}", message.id, reason);
            return Ok(LiveOutcome::Skipped { reason });
        }

        let channel = self.source_channel(message.channel_id).await?;
        self.record_author(message).await?;
        let snippet = self.build_snippet(message).await;

        let live_name = ResolvedName {
            name: message.author_display_name().to_string(),
            avatar_url: message.author.avatar_url(),
        };
        let rendered = self
            .render_post(message.author.id, Some(live_name), &channel, message.id, &snippet)
            .await?;

        let record = Post {
            id: message.id as i64,
            channel_id: channel.id as i64,
            author_id: message.author.id as i64,
            timestamp_ms: message.timestamp_ms(),
            snippet: Some(snippet),
            relayed: true,
        };
        if !post::claim_post(self.db.pool(), &record).await? {
            debug!("Message {} was already relayed", message.id);
            return Ok(LiveOutcome::AlreadyRelayed);
        }

        let central = match self.config.central_channel_id {
            Some(central_id) => match self
                .publisher
                .publish(&MirrorTarget::channel(central_id), rendered.clone())
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    warn!("Central feed relay of {} failed: {}", message.id, e);
                    false
                }
            },
            None => false,
        };

        let mirror = match self.deliver(&channel, rendered).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Mirror relay of {} failed: {}", message.id, e);
                false
            }
        };

        info!(
            "Relayed live post {} by {} from #{} (central={}, mirror={})",
            message.id,
            message.author_display_name(),
            channel.name,
            central,
            mirror
        );
        Ok(LiveOutcome::Relayed { central, mirror })
    }

    async fn live_skip_reason(&self, message: &Message) -> Result<Option<&'static str>> {
        if message.author.bot {
            return Ok(Some("bot author"));
        }
        if message.author.id == self.my_id().await? {
            return Ok(Some("own message"));
        }
        if message.guild_id != Some(self.config.source_space_id) {
            return Ok(Some("other space"));
        }
        if self.config.is_ignored(message.channel_id) {
            return Ok(Some("ignored channel"));
        }
        if !self.is_tracked(message).await? {
            return Ok(Some("untracked author"));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::RelayConfig;
    use crate::testing::{
        message, message_with_roles, test_config, test_engine, FakePlatform, GM_ROLE, ME,
        MIRROR_SPACE, SOURCE_SPACE,
    };
    use discord_client::PlatformError;

    const CHANNEL: u64 = 10;
    const CENTRAL: u64 = 500;
    const GM: u64 = 2;

    fn setup() -> Arc<FakePlatform> {
        let platform = Arc::new(FakePlatform::new());
        platform.add_category(SOURCE_SPACE, 5, "Game");
        platform.add_text_channel(SOURCE_SPACE, CHANNEL, "announcements", Some(5));
        platform.add_text_channel(MIRROR_SPACE, CENTRAL, "gm-tracker", None);
        platform
    }

    fn with_central() -> RelayConfig {
        RelayConfig {
            central_channel_id: Some(CENTRAL),
            ..test_config()
        }
    }

    fn gm_post(id: u64, content: &str) -> Message {
        message_with_roles(id, CHANNEL, GM, content, &[GM_ROLE])
    }

    #[tokio::test]
    async fn test_relays_to_central_and_mirror() {
        let platform = setup();
        let engine = test_engine(&platform, with_central()).await;

        let outcome = engine.handle_live(&gm_post(101, "Server restart at 5.")).await;
        assert!(matches!(
            outcome,
            LiveOutcome::Relayed {
                central: true,
                mirror: true
            }
        ));

        let sent = platform.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].channel_id, CENTRAL);
        assert_ne!(sent[1].channel_id, CENTRAL);
        assert_eq!(
            sent[0].content,
            "user2 (GemStone IV • #announcements):\nServer restart at 5.\n\
             https://discord.com/channels/1/10/101"
        );
        assert_eq!(sent[0].username, "user2");

        let stored = post::get_post(engine.db().pool(), 101).await.unwrap().unwrap();
        assert!(stored.relayed);
        assert!(engine.tracked().is_known(GM));
    }

    #[tokio::test]
    async fn test_second_delivery_is_not_relayed() {
        let platform = setup();
        let engine = test_engine(&platform, test_config()).await;

        engine.handle_live(&gm_post(101, "once")).await;
        let outcome = engine.handle_live(&gm_post(101, "once")).await;
        assert!(matches!(outcome, LiveOutcome::AlreadyRelayed));
        assert_eq!(platform.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_claims_post_saved_by_crawler() {
        let platform = setup();
        let engine = test_engine(&platform, test_config()).await;
        let crawled = Post {
            id: 101,
            channel_id: CHANNEL as i64,
            author_id: GM as i64,
            timestamp_ms: 0,
            snippet: Some("from history".to_string()),
            relayed: false,
        };
        post::insert_post(engine.db().pool(), &crawled).await.unwrap();

        engine.handle_live(&gm_post(101, "from history")).await;

        assert_eq!(post::count_unrelayed(engine.db().pool()).await.unwrap(), 0);
        assert_eq!(platform.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_filters() {
        let platform = setup();
        let config = RelayConfig {
            ignored_channel_ids: [CHANNEL + 1].into_iter().collect(),
            ..test_config()
        };
        let engine = test_engine(&platform, config).await;

        let mut bot = gm_post(101, "beep");
        bot.author.bot = true;
        let own = message_with_roles(102, CHANNEL, ME, "mine", &[GM_ROLE]);
        let mut elsewhere = gm_post(103, "hi");
        elsewhere.guild_id = Some(MIRROR_SPACE);
        let ignored = message_with_roles(104, CHANNEL + 1, GM, "off-topic", &[GM_ROLE]);
        let player = message(105, CHANNEL, 3, "hello");

        for (msg, expected) in [
            (bot, "bot author"),
            (own, "own message"),
            (elsewhere, "other space"),
            (ignored, "ignored channel"),
            (player, "untracked author"),
        ] {
            match engine.handle_live(&msg).await {
                LiveOutcome::Skipped { reason } => assert_eq!(reason, expected),
                other => panic!("expected skip for {}, got {:?}", expected, other),
            }
        }
        assert!(platform.sent().is_empty());
        assert_eq!(
            database::stats::db_stats(engine.db().pool()).await.unwrap().posts,
            0
        );
    }

    #[tokio::test]
    async fn test_central_failure_still_mirrors() {
        let platform = setup();
        platform.fail_webhook(PlatformError::Forbidden("Missing Permissions".to_string()));
        let engine = test_engine(&platform, with_central()).await;

        let outcome = engine.handle_live(&gm_post(101, "news")).await;
        assert!(matches!(
            outcome,
            LiveOutcome::Relayed {
                central: false,
                mirror: true
            }
        ));
        assert_eq!(platform.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_override_name_replaces_live_name() {
        let platform = setup();
        let engine = test_engine(&platform, test_config()).await;
        database::gm_name::upsert_gm_name(engine.db().pool(), GM as i64, "Naijin", None)
            .await
            .unwrap();

        engine.handle_live(&gm_post(101, "news")).await;
        let sent = platform.sent();
        assert_eq!(sent[0].username, "Naijin");
        assert!(sent[0].content.starts_with("Naijin (GemStone IV • #announcements):"));
    }

    #[tokio::test]
    async fn test_unknown_channel_fails_without_claiming() {
        let platform = setup();
        let engine = test_engine(&platform, test_config()).await;

        let outcome = engine
            .handle_live(&message_with_roles(101, 77, GM, "news", &[GM_ROLE]))
            .await;
        assert!(matches!(
            outcome,
            LiveOutcome::Failed(RelayError::Platform(PlatformError::NotFound(_)))
        ));
        assert!(!post::post_exists(engine.db().pool(), 101).await.unwrap());
    }

    #[tokio::test]
    async fn test_role_lookup_failure_leaves_post_for_crawler() {
        let platform = setup();
        platform.fail_member_roles(GM, PlatformError::Transient {
            status: Some(503),
            message: String::new(),
        });
        let engine = test_engine(&platform, test_config()).await;

        let outcome = engine.handle_live(&message(101, CHANNEL, GM, "news")).await;
        assert!(matches!(
            outcome,
            LiveOutcome::Failed(RelayError::Platform(PlatformError::Transient { .. }))
        ));
        assert!(!post::post_exists(engine.db().pool(), 101).await.unwrap());
        assert!(platform.sent().is_empty());
    }
}
