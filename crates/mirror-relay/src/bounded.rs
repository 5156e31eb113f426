//! Size bounds for the in-memory caches.
//!
//! Caches are insertion-ordered; when one grows past its limit the older
//! half is dropped.

use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};

/// Halve `map` if it holds more than `limit` entries. Returns how many were dropped.
pub(crate) fn halve_map<K: Hash + Eq, V>(map: &mut IndexMap<K, V>, limit: usize) -> usize {
    if map.len() <= limit {
        return 0;
    }
    let drop = map.len() / 2;
    map.drain(..drop).count()
}

/// Halve `set` if it holds more than `limit` entries. Returns how many were dropped.
pub(crate) fn halve_set<T: Hash + Eq>(set: &mut IndexSet<T>, limit: usize) -> usize {
    if set.len() <= limit {
        return 0;
    }
    let drop = set.len() / 2;
    set.drain(..drop).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halving_drops_oldest() {
        let mut map: IndexMap<u64, u64> = (0..11).map(|i| (i, i)).collect();
        assert_eq!(halve_map(&mut map, 10), 5);
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![5, 6, 7, 8, 9, 10]);

        assert_eq!(halve_map(&mut map, 10), 0);

        let mut set: IndexSet<u64> = (0..4).collect();
        assert_eq!(halve_set(&mut set, 3), 2);
        assert!(set.contains(&3) && !set.contains(&0));
    }
}
