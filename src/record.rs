//! Record representations: native records and the normalized form
//!
//! Adapters convert between a format's native record and one canonical
//! `NormalizedRecord`, so n formats need n adapters instead of n² pairwise
//! converters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Unique identifier for an entity, stable across formats
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A record in some format's native representation.
///
/// The payload is opaque to the core — the owning adapter downcasts
/// internally. Cloning shares the payload.
#[derive(Clone)]
pub struct NativeRecord {
    format: String,
    data: Arc<dyn Any + Send + Sync>,
}

impl NativeRecord {
    pub fn new(format: impl Into<String>, data: impl Any + Send + Sync) -> Self {
        Self {
            format: format.into(),
            data: Arc::new(data),
        }
    }

    /// The format name this record claims to be in.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Attempt to downcast the payload to a concrete native type.
    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl fmt::Debug for NativeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRecord")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// The canonical intermediate representation.
///
/// A small closed set of typed fields plus a generic extension map, so
/// adapters stay extensible without untyped key-value bags. Every adapter
/// must round-trip id, name, and payload losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: EntityId,
    pub name: String,
    /// Opaque per-record data. Values are owned JSON trees, so a nested
    /// container can never reference an ancestor.
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// Adapter-specific fields outside the closed set
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl NormalizedRecord {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            payload: Map::new(),
            extensions: Map::new(),
        }
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn native_record_downcasts_to_original_type() {
        let record = NativeRecord::new("json", vec![1u32, 2, 3]);
        assert_eq!(record.format(), "json");
        assert_eq!(record.downcast::<Vec<u32>>(), Some(&vec![1, 2, 3]));
        assert!(record.downcast::<String>().is_none());
    }

    #[test]
    fn cloned_native_record_shares_payload() {
        let record = NativeRecord::new("json", "hello".to_string());
        let clone = record.clone();
        assert_eq!(clone.downcast::<String>(), record.downcast::<String>());
    }

    #[test]
    fn normalized_record_builder() {
        let record = NormalizedRecord::new("e-1", "widget")
            .with_payload("color", json!("red"))
            .with_extension("schema_version", json!(2));

        assert_eq!(record.id, EntityId::new("e-1"));
        assert_eq!(record.name, "widget");
        assert_eq!(record.payload["color"], json!("red"));
        assert_eq!(record.extensions["schema_version"], json!(2));
    }

    #[test]
    fn normalized_record_serde_round_trip() {
        let record = NormalizedRecord::new("e-2", "gadget").with_payload("n", json!(7));
        let json = serde_json::to_string(&record).unwrap();
        let back: NormalizedRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
