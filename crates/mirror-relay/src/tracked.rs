//! The tracked-author predicate.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Authors whose posts are harvested: holders of a tracked role, plus every
/// author ever seen posting as one (so retired staff stay tracked).
#[derive(Debug, Default)]
pub struct TrackedAuthors {
    roles: HashSet<u64>,
    known: Mutex<HashSet<u64>>,
}

impl TrackedAuthors {
    pub fn new(roles: HashSet<u64>, known: impl IntoIterator<Item = u64>) -> Self {
        Self {
            roles,
            known: Mutex::new(known.into_iter().collect()),
        }
    }

    fn known(&self) -> MutexGuard<'_, HashSet<u64>> {
        self.known.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether role lookups can matter at all.
    pub fn tracks_roles(&self) -> bool {
        !self.roles.is_empty()
    }

    pub fn is_known(&self, author_id: u64) -> bool {
        self.known().contains(&author_id)
    }

    /// Whether any of `role_ids` is a tracked role.
    pub fn has_tracked_role(&self, role_ids: &[u64]) -> bool {
        role_ids.iter().any(|r| self.roles.contains(r))
    }

    /// Add an author to the known set. Returns `true` if newly added.
    pub fn remember(&self, author_id: u64) -> bool {
        self.known().insert(author_id)
    }

    /// Add many authors, e.g. every author already in the store.
    pub fn remember_all(&self, ids: impl IntoIterator<Item = u64>) {
        self.known().extend(ids);
    }

    pub fn known_count(&self) -> usize {
        self.known().len()
    }
}
