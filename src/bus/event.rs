//! Event types carried on the priority bus
//!
//! Events are created by a producer, queued once, delivered at most once
//! per subscriber, then discarded. Priority is an explicit metadata value
//! when set, otherwise a per-kind default (lower value = delivered first).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// The kinds of events the core emits or routes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An adapter was registered or replaced
    AdapterRegistered,
    /// A record passed through the normalized form
    EntityConversion,
    /// An adapter failed during conversion
    ConversionError,
    CacheHit,
    CacheMiss,
    TransactionStart,
    TransactionSuccess,
    TransactionFailure,
    /// A connection between two systems was established
    Connection,
    /// Bulk data moved between two systems
    DataTransfer,
    SystemNotification,
    Error,
    /// Caller-defined event kind
    Custom(String),
}

impl EventKind {
    /// Default priority when the event carries no explicit one.
    ///
    /// Lower values dispatch first: error-class 0, system notifications 5,
    /// connections 10, data transfer 15, everything else 100.
    pub fn default_priority(&self) -> i64 {
        match self {
            Self::Error | Self::ConversionError | Self::TransactionFailure => 0,
            Self::SystemNotification | Self::AdapterRegistered => 5,
            Self::Connection => 10,
            Self::DataTransfer | Self::EntityConversion => 15,
            _ => 100,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AdapterRegistered => "adapter.registered",
            Self::EntityConversion => "entity.conversion",
            Self::ConversionError => "entity.conversion.error",
            Self::CacheHit => "cache.hit",
            Self::CacheMiss => "cache.miss",
            Self::TransactionStart => "transaction.start",
            Self::TransactionSuccess => "transaction.success",
            Self::TransactionFailure => "transaction.failure",
            Self::Connection => "connection",
            Self::DataTransfer => "data.transfer",
            Self::SystemNotification => "system.notification",
            Self::Error => "error",
            Self::Custom(name) => name,
        };
        write!(f, "{name}")
    }
}

/// Event metadata: a typed priority override plus an extension map.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventMetadata {
    /// Explicit priority; overrides the kind's default when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// One event on the bus.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub destination: String,
    pub payload: Map<String, Value>,
    pub metadata: EventMetadata,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            source: String::new(),
            destination: String::new(),
            payload: Map::new(),
            metadata: EventMetadata::default(),
        }
    }

    /// A connection event between two named systems.
    pub fn connection(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::new(EventKind::Connection)
            .with_source(source)
            .with_destination(destination)
    }

    /// A data-transfer event carrying the moved data as payload.
    pub fn data_transfer(
        source: impl Into<String>,
        destination: impl Into<String>,
        data: Value,
    ) -> Self {
        Self::new(EventKind::DataTransfer)
            .with_source(source)
            .with_destination(destination)
            .with_payload("data", data)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.metadata.priority = Some(priority);
        self
    }

    /// The priority this event dispatches at.
    pub fn effective_priority(&self) -> i64 {
        self.metadata
            .priority
            .unwrap_or_else(|| self.kind.default_priority())
    }
}

/// Heap entry: orders by (priority, arrival sequence), lowest first.
#[derive(Debug)]
pub(crate) struct QueuedEvent {
    pub event: Event,
    pub priority: i64,
    pub seq: u64,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedEvent {}

impl Ord for QueuedEvent {
    // BinaryHeap is a max-heap; reverse so the lowest (priority, seq) pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
