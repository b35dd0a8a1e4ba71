//! Rosetta: Format Interoperability Engine
//!
//! Registers named format adapters and converts records between formats
//! through one canonical intermediate representation, while observing
//! conversions, caching results, and wrapping units of work with
//! transactional lifecycle events.
//!
//! # Core Concepts
//!
//! - **Adapters**: pluggable bidirectional converters for one named format
//! - **Normalized form**: the intermediate representation, so n formats
//!   need n adapters instead of n² pairwise converters
//! - **Event bus**: a single background dispatcher delivering lifecycle
//!   events to subscribers in priority order
//!
//! # Example
//!
//! ```
//! use rosetta::{InMemoryLookup, RosettaEngine};
//! use std::sync::Arc;
//!
//! let engine = RosettaEngine::new(Arc::new(InMemoryLookup::new()));
//! // Register adapters, then convert between their formats.
//! ```

mod adapter;
mod bus;
mod cache;
mod engine;
mod error;
mod lookup;
mod metrics;
mod record;


pub use adapter::{AdapterCapabilities, AdapterRegistry, FormatAdapter};
pub use bus::{Event, EventBus, EventKind, EventMetadata, SubscriberError};
pub use cache::{CacheKey, EntityCache};
pub use engine::{RosettaEngine, TransactionContext};
pub use error::{RosettaError, RosettaResult};
pub use lookup::{EntityLookup, InMemoryLookup};
pub use metrics::{HealthStatus, MetricsSnapshot};
pub use record::{EntityId, NativeRecord, NormalizedRecord};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
