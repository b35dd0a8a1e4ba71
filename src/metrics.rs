//! Metrics and feedback — lifetime ratios derived from event counters
//!
//! All counters are monotonic and never reset, so every ratio here is
//! lifetime-cumulative, not windowed. Callers wanting recency-weighted
//! signals must build a windowing layer on top.

use crate::bus::{EventBus, EventKind};
use serde::Serialize;

/// Point-in-time snapshot of counts and derived ratios.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Lower-cased names of all registered formats
    pub registered_formats: Vec<String>,
    /// Entries currently held by the cache
    pub cache_size: usize,
    pub conversions: u64,
    pub conversion_errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub transactions_started: u64,
    pub transactions_succeeded: u64,
    pub transactions_failed: u64,
    /// hits / (hits + misses); 0.0 before any cache traffic
    pub cache_hit_ratio: f64,
    /// successes / starts; 0.0 before any transaction
    pub transaction_success_rate: f64,
    /// conversion errors / conversions; 0.0 before any conversion
    pub conversion_error_rate: f64,
}

/// Coarse health classification derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl MetricsSnapshot {
    /// Build a snapshot from the bus counters plus registry/cache sizes.
    pub(crate) fn collect(
        bus: &EventBus,
        registered_formats: Vec<String>,
        cache_size: usize,
    ) -> Self {
        let conversions = bus.count(&EventKind::EntityConversion);
        let conversion_errors = bus.count(&EventKind::ConversionError);
        let cache_hits = bus.count(&EventKind::CacheHit);
        let cache_misses = bus.count(&EventKind::CacheMiss);
        let transactions_started = bus.count(&EventKind::TransactionStart);
        let transactions_succeeded = bus.count(&EventKind::TransactionSuccess);
        let transactions_failed = bus.count(&EventKind::TransactionFailure);

        Self {
            registered_formats,
            cache_size,
            conversions,
            conversion_errors,
            cache_hits,
            cache_misses,
            transactions_started,
            transactions_succeeded,
            transactions_failed,
            cache_hit_ratio: ratio(cache_hits, cache_hits + cache_misses),
            transaction_success_rate: ratio(transactions_succeeded, transactions_started),
            conversion_error_rate: ratio(conversion_errors, conversions),
        }
    }

    /// Healthy when conversions err under 1% and transactions succeed
    /// over 99% (vacuously healthy with no traffic).
    pub fn health(&self) -> HealthStatus {
        let conversions_ok = self.conversion_error_rate < 0.01;
        let transactions_ok =
            self.transactions_started == 0 || self.transaction_success_rate > 0.99;
        if conversions_ok && transactions_ok {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
