//! FormatAdapter trait — the contract adapters implement
//!
//! An adapter is a bidirectional converter between one named format and
//! the normalized form, plus a validation check and a capability
//! description. Adapter functions are pure; the engine owns all event
//! emission and caching around them.

use crate::error::RosettaResult;
use crate::record::{NativeRecord, NormalizedRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What an adapter can do, published on registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterCapabilities {
    /// Canonical (lower-cased) format name
    pub format: String,
    /// Feature flags, e.g. `supports_streaming`, `supports_batch`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, bool>,
}

impl AdapterCapabilities {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into().to_lowercase(),
            flags: BTreeMap::new(),
        }
    }

    pub fn with_flag(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.flags.insert(name.into(), enabled);
        self
    }

    /// True if the named flag is present and enabled.
    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }
}

/// The contract format adapters implement.
///
/// `to_normalized` and `from_normalized` must round-trip id, name, and
/// payload losslessly for any record the adapter validates. The adapter
/// downcasts `NativeRecord` internally; a failed downcast is a
/// `Conversion` error, not a panic.
pub trait FormatAdapter: Send + Sync {
    /// Capability description, carried on the `adapter.registered` event
    fn capabilities(&self) -> AdapterCapabilities;

    /// Convert a native record into the normalized form
    fn to_normalized(&self, native: &NativeRecord) -> RosettaResult<NormalizedRecord>;

    /// Reconstruct a native record from the normalized form
    fn from_normalized(&self, record: &NormalizedRecord) -> RosettaResult<NativeRecord>;

    /// Whether the native record is acceptable to this adapter
    fn validate(&self, native: &NativeRecord) -> bool;
}
