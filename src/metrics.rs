//! Process-wide mapper counters.
//!
//! [`STATS`] is always available; with the `metrics` feature every increment is also
//! recorded on OpenTelemetry counters of the global meter `tidemap`.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "metrics")]
use opentelemetry::{global, metrics::Counter};

pub static STATS: Lazy<MapperStats> = Lazy::new(MapperStats::default);

#[cfg(feature = "metrics")]
pub static METRICS: Lazy<MapperMetrics> = Lazy::new(MapperMetrics::init);

#[derive(Debug, Default)]
pub struct MapperStats {
    schemas_resolved: AtomicU64,
    rows_hydrated: AtomicU64,
    identity_hits: AtomicU64,
    statements_executed: AtomicU64,
}

/// Point-in-time copy of [`MapperStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub schemas_resolved: u64,
    pub rows_hydrated: u64,
    pub identity_hits: u64,
    pub statements_executed: u64,
}

impl MapperStats {
    pub fn record_schema(&self) {
        self.schemas_resolved.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        METRICS.schemas_resolved.add(1, &[]);
    }

    pub fn record_hydration(&self) {
        self.rows_hydrated.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        METRICS.rows_hydrated.add(1, &[]);
    }

    pub fn record_identity_hit(&self) {
        self.identity_hits.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        METRICS.identity_hits.add(1, &[]);
    }

    pub fn record_statement(&self) {
        self.statements_executed.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        METRICS.statements_executed.add(1, &[]);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            schemas_resolved: self.schemas_resolved.load(Ordering::Relaxed),
            rows_hydrated: self.rows_hydrated.load(Ordering::Relaxed),
            identity_hits: self.identity_hits.load(Ordering::Relaxed),
            statements_executed: self.statements_executed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(feature = "metrics")]
pub struct MapperMetrics {
    pub schemas_resolved: Counter<u64>,
    pub rows_hydrated: Counter<u64>,
    pub identity_hits: Counter<u64>,
    pub statements_executed: Counter<u64>,
}

#[cfg(feature = "metrics")]
impl MapperMetrics {
    pub fn init() -> Self {
        let meter = global::meter("tidemap");

        Self {
            schemas_resolved: meter
                .u64_counter("tidemap_schemas_resolved_total")
                .with_description("Schemas built from declarative metadata")
                .build(),
            rows_hydrated: meter
                .u64_counter("tidemap_rows_hydrated_total")
                .with_description("Rows materialised into model instances")
                .build(),
            identity_hits: meter
                .u64_counter("tidemap_identity_hits_total")
                .with_description("Reads answered by the identity cache")
                .build(),
            statements_executed: meter
                .u64_counter("tidemap_statements_total")
                .with_description("SQL statements sent to the driver")
                .build(),
        }
    }
}
