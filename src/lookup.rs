//! Source-of-record lookup — resolves entities on cache miss
//!
//! The engine calls this on a cache miss to obtain the native record
//! before converting. A real implementation queries a datastore; the
//! in-memory implementation here backs tests and embedders without one.
//! Retry policy, if any, belongs behind this trait, not in the core.

use crate::error::{RosettaError, RosettaResult};
use crate::record::{EntityId, NativeRecord};
use async_trait::async_trait;
use dashmap::DashMap;

/// Resolves an entity's native record from its source of record.
#[async_trait]
pub trait EntityLookup: Send + Sync {
    /// Fetch the record for `id` in `format`, or `EntityNotFound`.
    async fn fetch(&self, id: &EntityId, format: &str) -> RosettaResult<NativeRecord>;
}

/// Map-backed lookup for tests and embedders without a datastore.
#[derive(Debug, Default)]
pub struct InMemoryLookup {
    records: DashMap<(EntityId, String), NativeRecord>,
}

impl InMemoryLookup {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn insert(&self, id: EntityId, format: &str, record: NativeRecord) {
        self.records.insert((id, format.to_lowercase()), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl EntityLookup for InMemoryLookup {
    async fn fetch(&self, id: &EntityId, format: &str) -> RosettaResult<NativeRecord> {
        self.records
            .get(&(id.clone(), format.to_lowercase()))
            .map(|r| r.value().clone())
            .ok_or_else(|| RosettaError::EntityNotFound {
                id: id.clone(),
                format: format.to_lowercase(),
            })
    }
}
