//! Discord REST client.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::PlatformError;
use crate::permissions;
use crate::platform::{ChatPlatform, PlatformResult};
use crate::types::{Channel, Guild, Member, Message, User, Webhook, WebhookMessage};

/// How long a guild's role table and our own roles are trusted.
const PERMISSION_CONTEXT_TTL: Duration = Duration::from_secs(600);

/// Page size for archived thread listings.
const ARCHIVED_PAGE_LIMIT: u8 = 100;

const CHANNEL_TYPE_TEXT: u8 = 0;
const CHANNEL_TYPE_CATEGORY: u8 = 4;
const CHANNEL_TYPE_PUBLIC_THREAD: u8 = 11;

#[derive(Debug, Deserialize)]
struct ThreadList {
    #[serde(default)]
    threads: Vec<Channel>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

/// Guild roles plus the current account's roles in that guild.
#[derive(Debug, Clone)]
struct PermissionContext {
    guild: Guild,
    my_roles: Vec<u64>,
    fetched_at: Instant,
}

/// HTTP implementation of [`ChatPlatform`].
pub struct DiscordClient {
    http: Client,
    config: ClientConfig,
    me: OnceCell<User>,
    permission_contexts: Mutex<HashMap<u64, PermissionContext>>,
}

impl DiscordClient {
    /// Build a client. No request is made until the first call.
    pub fn new(config: ClientConfig) -> PlatformResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("bluetracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Unclassified(e.to_string()))?;

        Ok(Self {
            http,
            config,
            me: OnceCell::new(),
            permission_contexts: Mutex::new(HashMap::new()),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.config.url(path))
            .header("Authorization", self.config.authorization())
    }

    /// Send a request and classify any non-success status.
    async fn send(&self, builder: RequestBuilder) -> PlatformResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let header_hint = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok());
        let body = response.text().await.unwrap_or_default();

        let retry_after = if status == StatusCode::TOO_MANY_REQUESTS {
            serde_json::from_str::<RateLimitBody>(&body)
                .ok()
                .map(|b| b.retry_after)
                .or(header_hint)
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64)
        } else {
            None
        };

        debug!("HTTP {} from platform: {}", status, body);
        Err(PlatformError::from_status(status.as_u16(), retry_after, body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PlatformResult<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        Ok(response.json().await?)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> PlatformResult<T> {
        let response = self
            .send(self.request(Method::POST, path).json(body))
            .await?;
        Ok(response.json().await?)
    }

    /// Guild roles and our own roles, refreshed after the TTL.
    async fn permission_context(&self, guild_id: u64) -> PlatformResult<PermissionContext> {
        if let Some(ctx) = self.cached_context(guild_id) {
            return Ok(ctx);
        }

        let me = self.current_user().await?;
        let guild = self.space(guild_id).await?;
        let my_roles = self.member_roles(guild_id, me.id).await?;
        let ctx = PermissionContext {
            guild,
            my_roles,
            fetched_at: Instant::now(),
        };

        if let Ok(mut contexts) = self.permission_contexts.lock() {
            contexts.insert(guild_id, ctx.clone());
        }
        Ok(ctx)
    }

    fn cached_context(&self, guild_id: u64) -> Option<PermissionContext> {
        let contexts = self.permission_contexts.lock().ok()?;
        contexts
            .get(&guild_id)
            .filter(|ctx| ctx.fetched_at.elapsed() < PERMISSION_CONTEXT_TTL)
            .cloned()
    }
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    async fn current_user(&self) -> PlatformResult<User> {
        self.me
            .get_or_try_init(|| self.get_json::<User>("/users/@me"))
            .await
            .cloned()
    }

    async fn space(&self, space_id: u64) -> PlatformResult<Guild> {
        self.get_json(&format!("/guilds/{}", space_id)).await
    }

    async fn space_channels(&self, space_id: u64) -> PlatformResult<Vec<Channel>> {
        self.get_json(&format!("/guilds/{}/channels", space_id))
            .await
    }

    async fn active_threads(&self, space_id: u64) -> PlatformResult<Vec<Channel>> {
        let list: ThreadList = self
            .get_json(&format!("/guilds/{}/threads/active", space_id))
            .await?;
        Ok(list.threads)
    }

    async fn archived_public_threads(&self, channel_id: u64) -> PlatformResult<Vec<Channel>> {
        let path = format!("/channels/{}/threads/archived/public", channel_id);
        let mut threads: Vec<Channel> = Vec::new();
        let mut before: Option<String> = None;

        loop {
            let mut builder = self
                .request(Method::GET, &path)
                .query(&[("limit", ARCHIVED_PAGE_LIMIT.to_string())]);
            if let Some(ts) = &before {
                builder = builder.query(&[("before", ts.as_str())]);
            }

            let page: ThreadList = self.send(builder).await?.json().await?;
            let next = page
                .threads
                .last()
                .and_then(|t| t.thread_metadata.as_ref())
                .and_then(|m| m.archive_timestamp.clone());
            threads.extend(page.threads);

            match next {
                Some(ts) if page.has_more => before = Some(ts),
                _ => break,
            }
        }

        Ok(threads)
    }

    async fn channel(&self, channel_id: u64) -> PlatformResult<Channel> {
        self.get_json(&format!("/channels/{}", channel_id)).await
    }

    async fn history_after(
        &self,
        channel_id: u64,
        after: u64,
        limit: u8,
    ) -> PlatformResult<Vec<Message>> {
        let builder = self
            .request(Method::GET, &format!("/channels/{}/messages", channel_id))
            .query(&[("after", after.to_string()), ("limit", limit.to_string())]);
        let mut messages: Vec<Message> = self.send(builder).await?.json().await?;

        // The API returns newest first even when paging forward.
        messages.sort_by_key(|m| m.id);
        Ok(messages)
    }

    async fn fetch_message(&self, channel_id: u64, message_id: u64) -> PlatformResult<Message> {
        self.get_json(&format!("/channels/{}/messages/{}", channel_id, message_id))
            .await
    }

    async fn member_roles(&self, space_id: u64, user_id: u64) -> PlatformResult<Vec<u64>> {
        match self
            .get_json::<Member>(&format!("/guilds/{}/members/{}", space_id, user_id))
            .await
        {
            Ok(member) => Ok(member.roles),
            // Users who left the space have no roles.
            Err(PlatformError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn user(&self, user_id: u64) -> PlatformResult<User> {
        self.get_json(&format!("/users/{}", user_id)).await
    }

    async fn can_read_history(
        &self,
        channel: &Channel,
        parent: Option<&Channel>,
    ) -> PlatformResult<bool> {
        let Some(guild_id) = channel.guild_id else {
            return Ok(true);
        };

        // Threads inherit their parent's overwrites.
        let fetched;
        let scope = match (channel.is_thread(), channel.parent_id, parent) {
            (true, _, Some(parent)) => parent,
            (true, Some(parent_id), None) => {
                fetched = self.channel(parent_id).await?;
                &fetched
            }
            _ => channel,
        };

        let me = self.current_user().await?;
        let ctx = self.permission_context(guild_id).await?;
        let base = permissions::base_permissions(&ctx.guild, me.id, &ctx.my_roles);
        let perms = permissions::channel_permissions(
            base,
            guild_id,
            me.id,
            &ctx.my_roles,
            &scope.permission_overwrites,
        );
        Ok(permissions::can_read_history(perms))
    }

    async fn create_category(&self, space_id: u64, name: &str) -> PlatformResult<Channel> {
        self.post_json(
            &format!("/guilds/{}/channels", space_id),
            &json!({ "name": name, "type": CHANNEL_TYPE_CATEGORY }),
        )
        .await
    }

    async fn create_text_channel(
        &self,
        space_id: u64,
        name: &str,
        parent_id: Option<u64>,
    ) -> PlatformResult<Channel> {
        let mut body = json!({ "name": name, "type": CHANNEL_TYPE_TEXT });
        if let Some(parent_id) = parent_id {
            body["parent_id"] = json!(parent_id.to_string());
        }
        self.post_json(&format!("/guilds/{}/channels", space_id), &body)
            .await
    }

    async fn deny_send_for_everyone(&self, channel: &Channel) -> PlatformResult<bool> {
        let guild_id = channel.guild_id.ok_or_else(|| {
            PlatformError::Unclassified(format!("channel {} has no guild", channel.id))
        })?;
        if permissions::everyone_denied_send(channel, guild_id) {
            return Ok(false);
        }

        let (allow, deny) = channel
            .permission_overwrites
            .iter()
            .find(|o| o.id == guild_id)
            .map(|o| (o.allow, o.deny))
            .unwrap_or((0, 0));

        let body = json!({
            "type": 0,
            "allow": allow.to_string(),
            "deny": (deny | permissions::SEND_MESSAGES).to_string(),
        });
        self.send(
            self.request(
                Method::PUT,
                &format!("/channels/{}/permissions/{}", channel.id, guild_id),
            )
            .json(&body),
        )
        .await?;
        Ok(true)
    }

    async fn create_thread(
        &self,
        channel_id: u64,
        name: &str,
        auto_archive_minutes: u32,
    ) -> PlatformResult<Channel> {
        self.post_json(
            &format!("/channels/{}/threads", channel_id),
            &json!({
                "name": name,
                "type": CHANNEL_TYPE_PUBLIC_THREAD,
                "auto_archive_duration": auto_archive_minutes,
            }),
        )
        .await
    }

    async fn webhooks(&self, channel_id: u64) -> PlatformResult<Vec<Webhook>> {
        self.get_json(&format!("/channels/{}/webhooks", channel_id))
            .await
    }

    async fn create_webhook(&self, channel_id: u64, name: &str) -> PlatformResult<Webhook> {
        self.post_json(
            &format!("/channels/{}/webhooks", channel_id),
            &json!({ "name": name }),
        )
        .await
    }

    async fn execute_webhook(
        &self,
        webhook: &Webhook,
        message: &WebhookMessage,
    ) -> PlatformResult<()> {
        let Some(token) = webhook.token.as_deref() else {
            warn!("Webhook {} has no token", webhook.id);
            return Err(PlatformError::Unclassified(format!(
                "webhook {} has no token",
                webhook.id
            )));
        };

        // Webhook execution is authorized by the token in the path.
        let mut builder = self
            .http
            .post(self.config.url(&format!("/webhooks/{}/{}", webhook.id, token)))
            .json(message);
        if let Some(thread_id) = message.thread_id {
            builder = builder.query(&[("thread_id", thread_id.to_string())]);
        }

        self.send(builder).await?;
        Ok(())
    }
}

impl std::fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordClient")
            .field("config", &self.config)
            .finish()
    }
}
