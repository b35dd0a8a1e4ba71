//! Adapter registry — named converters under case-insensitive lookup
//!
//! A pure concurrent container. Event emission on registration lives in
//! the engine, so the registry itself stays trivially testable.

use super::traits::FormatAdapter;
use dashmap::DashMap;
use std::sync::Arc;

/// Holds the registered format adapters.
///
/// Names are case-insensitive; re-registering a name replaces the prior
/// adapter. Reads and writes may happen concurrently from any thread.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: DashMap<String, Arc<dyn FormatAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: DashMap::new(),
        }
    }

    /// Insert or overwrite the adapter for a format.
    ///
    /// Returns the displaced adapter, if any.
    pub fn register(
        &self,
        format: &str,
        adapter: Arc<dyn FormatAdapter>,
    ) -> Option<Arc<dyn FormatAdapter>> {
        self.adapters.insert(format.to_lowercase(), adapter)
    }

    /// Look up the adapter for a format.
    pub fn get(&self, format: &str) -> Option<Arc<dyn FormatAdapter>> {
        self.adapters
            .get(&format.to_lowercase())
            .map(|r| r.value().clone())
    }

    pub fn contains(&self, format: &str) -> bool {
        self.adapters.contains_key(&format.to_lowercase())
    }

    /// All registered format names, in no particular order.
    pub fn formats(&self) -> Vec<String> {
        self.adapters.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}
