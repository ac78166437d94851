use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free consumer throughput counters.
///
/// `snapshot()` atomically reads and resets all counters, making it
/// suitable for periodic reporting without contention.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    probe_events: AtomicU64,
    aggregation_records: AtomicU64,
    translation_failures: AtomicU64,
}

/// Counter values accumulated since the previous snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub probe_events: u64,
    pub aggregation_records: u64,
    pub translation_failures: u64,
}

impl ConsumerStats {
    /// Create a new zeroed ConsumerStats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one probe firing delivered to a sink.
    pub fn record_probe(&self) {
        self.probe_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one successfully translated aggregation record.
    pub fn record_aggregation(&self) {
        self.aggregation_records.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one aggregation tuple the translator refused.
    pub fn record_translation_failure(&self) {
        self.translation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically read and reset all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            probe_events: self.probe_events.swap(0, Ordering::Relaxed),
            aggregation_records: self.aggregation_records.swap(0, Ordering::Relaxed),
            translation_failures: self.translation_failures.swap(0, Ordering::Relaxed),
        }
    }
}
