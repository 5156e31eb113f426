//! Channel accessibility and per-epoch exhaustion.

use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexSet;

use crate::bounded::halve_set;

/// Largest number of channel IDs kept in either set.
pub const MAX_TRACKED_CHANNELS: usize = 10_000;

#[derive(Debug, Default)]
struct AccessState {
    inaccessible: IndexSet<u64>,
    exhausted: IndexSet<u64>,
    epoch: u64,
}

/// Which channels the crawler must leave alone until the next reset.
///
/// Inaccessible channels were refused or have disappeared. Exhausted
/// channels returned an empty page in the current epoch.
#[derive(Debug, Default)]
pub struct AccessCache {
    state: Mutex<AccessState>,
}

impl AccessCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AccessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed the inaccessible set, e.g. from the store on startup.
    pub fn load_inaccessible(&self, ids: impl IntoIterator<Item = u64>) {
        let mut state = self.lock();
        state.inaccessible.extend(ids);
        halve_set(&mut state.inaccessible, MAX_TRACKED_CHANNELS);
    }

    pub fn is_inaccessible(&self, channel_id: u64) -> bool {
        self.lock().inaccessible.contains(&channel_id)
    }

    pub fn is_exhausted(&self, channel_id: u64) -> bool {
        self.lock().exhausted.contains(&channel_id)
    }

    /// Whether a crawl of this channel should return without a remote call.
    pub fn should_skip(&self, channel_id: u64) -> bool {
        let state = self.lock();
        state.inaccessible.contains(&channel_id) || state.exhausted.contains(&channel_id)
    }

    pub fn mark_inaccessible(&self, channel_id: u64) {
        let mut state = self.lock();
        state.inaccessible.insert(channel_id);
        halve_set(&mut state.inaccessible, MAX_TRACKED_CHANNELS);
    }

    pub fn mark_exhausted(&self, channel_id: u64) {
        let mut state = self.lock();
        state.exhausted.insert(channel_id);
        halve_set(&mut state.exhausted, MAX_TRACKED_CHANNELS);
    }

    /// Start a new epoch: every channel becomes eligible again.
    pub fn reset_epoch(&self) -> u64 {
        let mut state = self.lock();
        state.inaccessible.clear();
        state.exhausted.clear();
        state.epoch += 1;
        state.epoch
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// `(inaccessible, exhausted)` counts.
    pub fn counts(&self) -> (usize, usize) {
        let state = self.lock();
        (state.inaccessible.len(), state.exhausted.len())
    }
}
