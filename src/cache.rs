//! Entity cache — memoized conversion results
//!
//! A pure concurrent container keyed by (entity id, target format). The
//! engine decides when to read and write; the cache never emits events
//! and never evicts. The check-then-compute sequence around it is not
//! atomic: two concurrent misses on one key may both compute, and the
//! last insert wins.

use crate::record::{EntityId, NativeRecord};
use dashmap::DashMap;

/// Identifies one memoized conversion result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub entity_id: EntityId,
    /// Lower-cased target format name
    pub target_format: String,
}

impl CacheKey {
    pub fn new(entity_id: EntityId, target_format: &str) -> Self {
        Self {
            entity_id,
            target_format: target_format.to_lowercase(),
        }
    }
}

/// Concurrent map of cache keys to converted records.
///
/// At most one stored value per key at any instant. Entries live until
/// process end; callers needing bounded memory must add eviction.
#[derive(Debug, Default)]
pub struct EntityCache {
    entries: DashMap<CacheKey, NativeRecord>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<NativeRecord> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    pub fn insert(&self, key: CacheKey, record: NativeRecord) {
        self.entries.insert(key, record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
