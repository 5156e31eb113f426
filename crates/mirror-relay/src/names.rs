//! Display-name resolution for relayed posts.
//!
//! Names come from an ordered chain of providers; the first one that knows
//! the author wins.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use database::{author, gm_name};
use discord_client::ChatPlatform;
use sqlx::SqlitePool;
use tracing::{debug, warn};

/// A display name and, when one was learned, an avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub name: String,
    pub avatar_url: Option<String>,
}

impl ResolvedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar_url: None,
        }
    }

    /// Name used when nothing knows the author.
    pub fn placeholder(author_id: u64) -> Self {
        Self::new(format!("ID {}", author_id))
    }
}

/// A source of display names.
#[async_trait]
pub trait NameProvider: Send + Sync {
    /// Short label for logs.
    fn label(&self) -> &'static str;

    /// The author's name, if this provider knows it.
    async fn lookup(&self, author_id: u64) -> Option<ResolvedName>;
}

/// Fixed names from the `gm_names` override table.
pub struct GmNameTable {
    pool: SqlitePool,
}

impl GmNameTable {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NameProvider for GmNameTable {
    fn label(&self) -> &'static str {
        "gm_names"
    }

    async fn lookup(&self, author_id: u64) -> Option<ResolvedName> {
        match gm_name::get_gm_name(&self.pool, author_id as i64).await {
            Ok(record) => record.map(|r| ResolvedName::new(r.name)),
            Err(e) => {
                warn!("Name override lookup failed for {}: {}", author_id, e);
                None
            }
        }
    }
}

/// Names compiled into the configuration.
pub struct SeedNames {
    names: HashMap<u64, String>,
}

impl SeedNames {
    pub fn new(names: HashMap<u64, String>) -> Self {
        Self { names }
    }
}

#[async_trait]
impl NameProvider for SeedNames {
    fn label(&self) -> &'static str {
        "seed"
    }

    async fn lookup(&self, author_id: u64) -> Option<ResolvedName> {
        self.names.get(&author_id).map(ResolvedName::new)
    }
}

/// The first name recorded for an author in the store.
pub struct KnownAuthorNames {
    pool: SqlitePool,
}

impl KnownAuthorNames {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NameProvider for KnownAuthorNames {
    fn label(&self) -> &'static str {
        "authors"
    }

    async fn lookup(&self, author_id: u64) -> Option<ResolvedName> {
        match author::get_author(&self.pool, author_id as i64).await {
            Ok(record) => record
                .and_then(|a| a.display_name)
                .filter(|n| !n.is_empty())
                .map(ResolvedName::new),
            Err(e) => {
                warn!("Author lookup failed for {}: {}", author_id, e);
                None
            }
        }
    }
}

/// A remote user lookup, which also yields the avatar.
pub struct RemoteUserNames {
    platform: Arc<dyn ChatPlatform>,
}

impl RemoteUserNames {
    pub fn new(platform: Arc<dyn ChatPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl NameProvider for RemoteUserNames {
    fn label(&self) -> &'static str {
        "remote"
    }

    async fn lookup(&self, author_id: u64) -> Option<ResolvedName> {
        match self.platform.user(author_id).await {
            Ok(user) => Some(ResolvedName {
                name: user.display_name().to_string(),
                avatar_url: user.avatar_url(),
            }),
            Err(e) => {
                debug!("User lookup failed for {}: {}", author_id, e);
                None
            }
        }
    }
}

/// Ordered provider chain.
///
/// `overrides` always win. A live display name, when the caller has one,
/// comes next, then the `fallbacks`, then `"ID {id}"`.
pub struct NameResolver {
    overrides: Vec<Box<dyn NameProvider>>,
    fallbacks: Vec<Box<dyn NameProvider>>,
}

impl NameResolver {
    pub fn new(
        overrides: Vec<Box<dyn NameProvider>>,
        fallbacks: Vec<Box<dyn NameProvider>>,
    ) -> Self {
        Self {
            overrides,
            fallbacks,
        }
    }

    /// Override table, seed names, stored author names, remote lookup.
    pub fn standard(
        pool: SqlitePool,
        seed_names: HashMap<u64, String>,
        platform: Arc<dyn ChatPlatform>,
    ) -> Self {
        Self::new(
            vec![
                Box::new(GmNameTable::new(pool.clone())),
                Box::new(SeedNames::new(seed_names)),
            ],
            vec![
                Box::new(KnownAuthorNames::new(pool)),
                Box::new(RemoteUserNames::new(platform)),
            ],
        )
    }

    /// Resolve a name for an author.
    pub async fn resolve(&self, author_id: u64, live: Option<ResolvedName>) -> ResolvedName {
        if let Some(found) = first_match(&self.overrides, author_id).await {
            // Keep the live avatar under an overridden name.
            return ResolvedName {
                avatar_url: found
                    .avatar_url
                    .or_else(|| live.and_then(|l| l.avatar_url)),
                ..found
            };
        }
        if let Some(live) = live.filter(|l| !l.name.is_empty()) {
            return live;
        }
        first_match(&self.fallbacks, author_id)
            .await
            .unwrap_or_else(|| ResolvedName::placeholder(author_id))
    }
}

async fn first_match(
    providers: &[Box<dyn NameProvider>],
    author_id: u64,
) -> Option<ResolvedName> {
    for provider in providers {
        if let Some(found) = provider.lookup(author_id).await {
            debug!("Resolved {} via {}", author_id, provider.label());
            return Some(found);
        }
    }
    None
}
