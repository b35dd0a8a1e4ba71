//! RosettaEngine: the context object owning registry, cache, and bus
//!
//! One engine instance replaces the process-wide shared maps of older
//! designs: every operation goes through an explicit engine, which keeps
//! state visible and test isolation trivial. Multiple caller threads may
//! invoke `convert`, `get_entity`, and `execute_in_transaction`
//! concurrently.

use crate::adapter::{AdapterRegistry, FormatAdapter};
use crate::bus::{Event, EventBus, EventKind};
use crate::cache::{CacheKey, EntityCache};
use crate::error::{RosettaError, RosettaResult};
use crate::lookup::EntityLookup;
use crate::metrics::MetricsSnapshot;
use crate::record::{EntityId, NativeRecord};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Ephemeral state for one unit-of-work invocation.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    pub started_at: DateTime<Utc>,
    start: Instant,
}

impl TransactionContext {
    pub fn begin() -> Self {
        Self {
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// The interoperability engine.
///
/// Owns the adapter registry, the entity cache, the event bus handle,
/// and the source-of-record lookup used on cache miss.
pub struct RosettaEngine {
    registry: AdapterRegistry,
    cache: EntityCache,
    bus: EventBus,
    lookup: Arc<dyn EntityLookup>,
}

impl RosettaEngine {
    pub fn new(lookup: Arc<dyn EntityLookup>) -> Self {
        Self::with_bus(lookup, EventBus::new())
    }

    /// Build an engine sharing an existing bus (e.g. with other engines
    /// or an external metrics consumer).
    pub fn with_bus(lookup: Arc<dyn EntityLookup>, bus: EventBus) -> Self {
        Self {
            registry: AdapterRegistry::new(),
            cache: EntityCache::new(),
            bus,
            lookup,
        }
    }

    /// The bus this engine publishes lifecycle events onto.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Look up a registered adapter by format name.
    pub fn adapter(&self, format: &str) -> Option<Arc<dyn FormatAdapter>> {
        self.registry.get(format)
    }

    /// Register or replace the adapter for a format.
    ///
    /// Queues an `adapter.registered` event carrying the adapter's
    /// capabilities.
    pub fn register_adapter(&self, format: &str, adapter: Arc<dyn FormatAdapter>) {
        let capabilities = adapter.capabilities();
        let replaced = self.registry.register(format, adapter).is_some();
        info!(format, replaced, "registered format adapter");

        self.bus.queue_event(
            Event::new(EventKind::AdapterRegistered)
                .with_source(format.to_lowercase())
                .with_payload("format", json!(format.to_lowercase()))
                .with_payload(
                    "capabilities",
                    serde_json::to_value(&capabilities).unwrap_or(Value::Null),
                ),
        );
    }

    /// Convert a record from one format to another through the
    /// normalized form.
    ///
    /// Fails with `AdapterNotFound` naming whichever format is
    /// unregistered. Pure aside from the queued `entity.conversion`
    /// event; performs no caching and no validation.
    pub fn convert(
        &self,
        entity: &NativeRecord,
        source: &str,
        target: &str,
    ) -> RosettaResult<NativeRecord> {
        let source_adapter = self
            .registry
            .get(source)
            .ok_or_else(|| RosettaError::AdapterNotFound(source.to_string()))?;
        let target_adapter = self
            .registry
            .get(target)
            .ok_or_else(|| RosettaError::AdapterNotFound(target.to_string()))?;

        let normalized = match source_adapter.to_normalized(entity) {
            Ok(normalized) => normalized,
            Err(error) => return Err(self.conversion_failed(source, target, error)),
        };

        self.bus.queue_event(
            Event::new(EventKind::EntityConversion)
                .with_source(source.to_lowercase())
                .with_destination(target.to_lowercase()),
        );

        match target_adapter.from_normalized(&normalized) {
            Ok(record) => Ok(record),
            Err(error) => Err(self.conversion_failed(source, target, error)),
        }
    }

    /// Validate a record with its source adapter, then convert it.
    ///
    /// A failing validation aborts before any conversion or event.
    pub fn create_entity(
        &self,
        entity: &NativeRecord,
        source: &str,
        target: &str,
    ) -> RosettaResult<NativeRecord> {
        let source_adapter = self
            .registry
            .get(source)
            .ok_or_else(|| RosettaError::AdapterNotFound(source.to_string()))?;

        if !source_adapter.validate(entity) {
            return Err(RosettaError::Validation {
                format: source.to_lowercase(),
                reason: "adapter rejected native record".to_string(),
            });
        }

        self.convert(entity, source, target)
    }

    /// Fetch an entity in the target format, memoizing the conversion.
    ///
    /// A hit returns the cached record and queues `cache.hit`. A miss
    /// queues `cache.miss`, resolves the source of record, converts, and
    /// stores the result — only after a successful conversion. There is
    /// no single-flight: concurrent misses on one key may both compute,
    /// and the last insert wins.
    pub async fn get_entity(
        &self,
        id: &EntityId,
        source: &str,
        target: &str,
    ) -> RosettaResult<NativeRecord> {
        let key = CacheKey::new(id.clone(), target);

        if let Some(cached) = self.cache.get(&key) {
            self.bus.queue_event(
                Event::new(EventKind::CacheHit)
                    .with_destination(target.to_lowercase())
                    .with_payload("id", json!(id.as_str())),
            );
            return Ok(cached);
        }

        self.bus.queue_event(
            Event::new(EventKind::CacheMiss)
                .with_source(source.to_lowercase())
                .with_destination(target.to_lowercase())
                .with_payload("id", json!(id.as_str())),
        );

        let native = self.lookup.fetch(id, source).await?;
        let converted = self.convert(&native, source, target)?;
        self.cache.insert(key, converted.clone());
        Ok(converted)
    }

    /// Run a unit of work inside an observed boundary.
    ///
    /// Queues `transaction.start`, then `transaction.success` with the
    /// duration on normal return, or `transaction.failure` with the
    /// duration and error description on failure — and returns the
    /// original error unmodified. Observability only: no rollback, no
    /// isolation, no retry.
    pub async fn execute_in_transaction<T, F, Fut>(&self, work: F) -> RosettaResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RosettaResult<T>>,
    {
        let ctx = TransactionContext::begin();
        self.bus.queue_event(
            Event::new(EventKind::TransactionStart)
                .with_payload("timestamp", json!(ctx.started_at.timestamp_millis())),
        );

        match work().await {
            Ok(value) => {
                self.bus.queue_event(
                    Event::new(EventKind::TransactionSuccess)
                        .with_payload("timestamp", json!(Utc::now().timestamp_millis()))
                        .with_payload("duration_ms", json!(ctx.elapsed_ms())),
                );
                Ok(value)
            }
            Err(error) => {
                self.bus.queue_event(
                    Event::new(EventKind::TransactionFailure)
                        .with_payload("timestamp", json!(Utc::now().timestamp_millis()))
                        .with_payload("duration_ms", json!(ctx.elapsed_ms()))
                        .with_payload("error", json!(error.to_string())),
                );
                Err(error)
            }
        }
    }

    /// Point-in-time snapshot of counts and lifetime ratios.
    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot::collect(&self.bus, self.registry.formats(), self.cache.len())
    }

    /// Evaluate the current metrics for adaptive tuning.
    ///
    /// Logs a hint when the lifetime hit ratio is under 0.5 and queues a
    /// `system.notification` event carrying the snapshot.
    pub fn review_feedback(&self) -> MetricsSnapshot {
        let snapshot = self.metrics();
        if snapshot.cache_hits + snapshot.cache_misses > 0 && snapshot.cache_hit_ratio < 0.5 {
            warn!(
                hit_ratio = snapshot.cache_hit_ratio,
                "low cache hit ratio; caching strategy may need adjustment"
            );
        }

        self.bus.queue_event(
            Event::new(EventKind::SystemNotification).with_payload(
                "metrics",
                serde_json::to_value(&snapshot).unwrap_or(Value::Null),
            ),
        );
        snapshot
    }

    fn conversion_failed(&self, source: &str, target: &str, error: RosettaError) -> RosettaError {
        warn!(source, target, %error, "conversion failed");
        self.bus.queue_event(
            Event::new(EventKind::ConversionError)
                .with_source(source.to_lowercase())
                .with_destination(target.to_lowercase())
                .with_payload("error", json!(error.to_string())),
        );
        error
    }
}

impl std::fmt::Debug for RosettaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosettaEngine")
            .field("registry", &self.registry)
            .field("cache_size", &self.cache.len())
            .field("bus", &self.bus)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterCapabilities;
    use crate::lookup::InMemoryLookup;
    use crate::record::NormalizedRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use async_trait::async_trait;

    /// A minimal native shape shared by the test adapters.
    #[derive(Debug, Clone, PartialEq)]
    struct PlainRecord {
        id: String,
        name: String,
        data: serde_json::Map<String, Value>,
    }

    /// Field-copy adapter for an arbitrary format name.
    struct PlainAdapter {
        format: &'static str,
    }

    impl FormatAdapter for PlainAdapter {
        fn capabilities(&self) -> AdapterCapabilities {
            AdapterCapabilities::new(self.format).with_flag("supports_batch", true)
        }

        fn to_normalized(&self, native: &NativeRecord) -> RosettaResult<NormalizedRecord> {
            let record = native.downcast::<PlainRecord>().ok_or_else(|| {
                RosettaError::conversion(self.format, "unexpected native record type")
            })?;
            let mut normalized = NormalizedRecord::new(record.id.as_str(), record.name.as_str());
            normalized.payload = record.data.clone();
            Ok(normalized)
        }

        fn from_normalized(&self, record: &NormalizedRecord) -> RosettaResult<NativeRecord> {
            Ok(NativeRecord::new(
                self.format,
                PlainRecord {
                    id: record.id.as_str().to_string(),
                    name: record.name.clone(),
                    data: record.payload.clone(),
                },
            ))
        }

        fn validate(&self, native: &NativeRecord) -> bool {
            native
                .downcast::<PlainRecord>()
                .map(|r| !r.name.is_empty())
                .unwrap_or(false)
        }
    }

    /// Adapter whose conversions always fail.
    struct BrokenAdapter;

    impl FormatAdapter for BrokenAdapter {
        fn capabilities(&self) -> AdapterCapabilities {
            AdapterCapabilities::new("broken")
        }

        fn to_normalized(&self, _native: &NativeRecord) -> RosettaResult<NormalizedRecord> {
            Err(RosettaError::conversion("broken", "always fails"))
        }

        fn from_normalized(&self, _record: &NormalizedRecord) -> RosettaResult<NativeRecord> {
            Err(RosettaError::conversion("broken", "always fails"))
        }

        fn validate(&self, _native: &NativeRecord) -> bool {
            true
        }
    }

    /// Lookup wrapper that counts fetches.
    struct CountingLookup {
        inner: InMemoryLookup,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl EntityLookup for CountingLookup {
        async fn fetch(&self, id: &EntityId, format: &str) -> RosettaResult<NativeRecord> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(id, format).await
        }
    }

    fn plain(id: &str, name: &str) -> NativeRecord {
        NativeRecord::new(
            "go",
            PlainRecord {
                id: id.to_string(),
                name: name.to_string(),
                data: serde_json::Map::new(),
            },
        )
    }

    fn engine_with_adapters() -> RosettaEngine {
        let engine = RosettaEngine::new(Arc::new(InMemoryLookup::new()));
        engine.register_adapter("go", Arc::new(PlainAdapter { format: "go" }));
        engine.register_adapter("python", Arc::new(PlainAdapter { format: "python" }));
        engine
    }

    #[test]
    fn register_queues_capabilities_event() {
        let engine = RosettaEngine::new(Arc::new(InMemoryLookup::new()));
        engine.register_adapter("Go", Arc::new(PlainAdapter { format: "go" }));

        assert_eq!(engine.bus().count(&EventKind::AdapterRegistered), 1);
        assert!(engine.adapter("go").is_some());
        assert!(engine.adapter("GO").is_some());
    }

    #[test]
    fn convert_round_trips_identity_name_payload() {
        let engine = engine_with_adapters();
        let mut data = serde_json::Map::new();
        data.insert("weight".to_string(), json!(12));
        let entity = NativeRecord::new(
            "go",
            PlainRecord {
                id: "e-1".to_string(),
                name: "widget".to_string(),
                data,
            },
        );

        let converted = engine.convert(&entity, "go", "python").unwrap();
        let out = converted.downcast::<PlainRecord>().unwrap();
        assert_eq!(out.id, "e-1");
        assert_eq!(out.name, "widget");
        assert_eq!(out.data["weight"], json!(12));
        assert_eq!(engine.bus().count(&EventKind::EntityConversion), 1);
    }

    #[test]
    fn convert_fails_naming_the_missing_format() {
        let engine = engine_with_adapters();
        let entity = plain("e-1", "widget");

        let err = engine.convert(&entity, "go", "unknownformat").unwrap_err();
        match err {
            RosettaError::AdapterNotFound(format) => assert_eq!(format, "unknownformat"),
            other => panic!("unexpected error: {other}"),
        }

        let err = engine.convert(&entity, "cobol", "go").unwrap_err();
        match err {
            RosettaError::AdapterNotFound(format) => assert_eq!(format, "cobol"),
            other => panic!("unexpected error: {other}"),
        }

        // No conversion happened, so no conversion events either.
        assert_eq!(engine.bus().count(&EventKind::EntityConversion), 0);
        assert_eq!(engine.bus().count(&EventKind::ConversionError), 0);
    }

    #[test]
    fn failing_adapter_queues_conversion_error() {
        let engine = engine_with_adapters();
        engine.register_adapter("broken", Arc::new(BrokenAdapter));
        let entity = plain("e-1", "widget");

        let err = engine.convert(&entity, "broken", "go").unwrap_err();
        assert!(matches!(err, RosettaError::Conversion { .. }));
        assert_eq!(engine.bus().count(&EventKind::ConversionError), 1);
        // to_normalized failed, so the conversion event was never reached.
        assert_eq!(engine.bus().count(&EventKind::EntityConversion), 0);
    }

    #[test]
    fn create_entity_blocks_on_validation_before_any_event() {
        let engine = engine_with_adapters();
        let invalid = plain("e-1", "");

        let err = engine.create_entity(&invalid, "go", "python").unwrap_err();
        match err {
            RosettaError::Validation { format, .. } => assert_eq!(format, "go"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.bus().count(&EventKind::EntityConversion), 0);
        assert_eq!(engine.bus().count(&EventKind::ConversionError), 0);
    }

    #[test]
    fn create_entity_converts_valid_records() {
        let engine = engine_with_adapters();
        let entity = plain("e-1", "widget");

        let converted = engine.create_entity(&entity, "go", "python").unwrap();
        assert_eq!(converted.format(), "python");
        assert_eq!(engine.bus().count(&EventKind::EntityConversion), 1);
    }

    #[tokio::test]
    async fn get_entity_misses_then_hits() {
        let lookup = Arc::new(CountingLookup {
            inner: InMemoryLookup::new(),
            fetches: AtomicUsize::new(0),
        });
        lookup
            .inner
            .insert(EntityId::new("e-1"), "go", plain("e-1", "widget"));

        let engine = RosettaEngine::with_bus(lookup.clone(), EventBus::new());
        engine.register_adapter("go", Arc::new(PlainAdapter { format: "go" }));
        engine.register_adapter("python", Arc::new(PlainAdapter { format: "python" }));

        let id = EntityId::new("e-1");
        let first = engine.get_entity(&id, "go", "python").await.unwrap();
        let second = engine.get_entity(&id, "go", "python").await.unwrap();

        assert_eq!(
            first.downcast::<PlainRecord>(),
            second.downcast::<PlainRecord>()
        );
        assert_eq!(lookup.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(engine.bus().count(&EventKind::CacheMiss), 1);
        assert_eq!(engine.bus().count(&EventKind::CacheHit), 1);
        // One conversion total: the hit performed none.
        assert_eq!(engine.bus().count(&EventKind::EntityConversion), 1);
    }

    #[tokio::test]
    async fn get_entity_failure_writes_nothing() {
        let engine = RosettaEngine::new(Arc::new(InMemoryLookup::new()));
        engine.register_adapter("go", Arc::new(PlainAdapter { format: "go" }));
        engine.register_adapter("python", Arc::new(PlainAdapter { format: "python" }));

        let err = engine
            .get_entity(&EntityId::new("ghost"), "go", "python")
            .await
            .unwrap_err();
        assert!(matches!(err, RosettaError::EntityNotFound { .. }));
        assert_eq!(engine.metrics().cache_size, 0);
    }

    #[tokio::test]
    async fn transaction_success_emits_start_and_success() {
        let engine = engine_with_adapters();
        let result = engine
            .execute_in_transaction(|| async { Ok(41 + 1) })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(engine.bus().count(&EventKind::TransactionStart), 1);
        assert_eq!(engine.bus().count(&EventKind::TransactionSuccess), 1);
        assert_eq!(engine.bus().count(&EventKind::TransactionFailure), 0);
    }

    #[tokio::test]
    async fn transaction_failure_reaches_caller_unmodified() {
        let engine = engine_with_adapters();
        let err = engine
            .execute_in_transaction::<(), _, _>(|| async {
                Err(RosettaError::Transaction("disk on fire".to_string()))
            })
            .await
            .unwrap_err();

        match err {
            RosettaError::Transaction(message) => assert_eq!(message, "disk on fire"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.bus().count(&EventKind::TransactionStart), 1);
        assert_eq!(engine.bus().count(&EventKind::TransactionFailure), 1);
        assert_eq!(engine.bus().count(&EventKind::TransactionSuccess), 0);
    }

    #[tokio::test]
    async fn metrics_reflect_engine_activity() {
        let lookup = Arc::new(InMemoryLookup::new());
        lookup.insert(EntityId::new("e-1"), "go", plain("e-1", "widget"));

        let engine = RosettaEngine::new(lookup);
        engine.register_adapter("go", Arc::new(PlainAdapter { format: "go" }));
        engine.register_adapter("python", Arc::new(PlainAdapter { format: "python" }));

        let id = EntityId::new("e-1");
        engine.get_entity(&id, "go", "python").await.unwrap();
        engine.get_entity(&id, "go", "python").await.unwrap();
        engine.get_entity(&id, "go", "python").await.unwrap();

        let snapshot = engine.metrics();
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.cache_hits, 2);
        assert!((snapshot.cache_hit_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(snapshot.cache_size, 1);
        let mut formats = snapshot.registered_formats.clone();
        formats.sort();
        assert_eq!(formats, vec!["go".to_string(), "python".to_string()]);
    }

    #[test]
    fn review_feedback_queues_a_notification() {
        let engine = engine_with_adapters();
        engine.review_feedback();
        assert_eq!(engine.bus().count(&EventKind::SystemNotification), 1);
    }
}
