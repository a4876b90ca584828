use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const UNSET_TS: u64 = 0;

#[derive(Debug)]
pub struct AtomicMetric {
    success: AtomicU64,
    failure: AtomicU64,
    last_success_ms: AtomicU64,
    last_failure_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AtomicSnapshot {
    pub successes: u64,
    pub failures: u64,
    pub last_success_ms: Option<u64>,
    pub last_failure_ms: Option<u64>,
}

impl AtomicMetric {
    pub const fn new() -> Self {
        Self {
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            last_success_ms: AtomicU64::new(UNSET_TS),
            last_failure_ms: AtomicU64::new(UNSET_TS),
        }
    }

    pub fn record_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
        self.last_success_ms
            .store(current_unix_ms(), Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failure.fetch_add(1, Ordering::Relaxed);
        self.last_failure_ms
            .store(current_unix_ms(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AtomicSnapshot {
        AtomicSnapshot {
            successes: self.success.load(Ordering::Relaxed),
            failures: self.failure.load(Ordering::Relaxed),
            last_success_ms: to_option(self.last_success_ms.load(Ordering::Relaxed)),
            last_failure_ms: to_option(self.last_failure_ms.load(Ordering::Relaxed)),
        }
    }
}

impl Default for AtomicMetric {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivery counters for both drain loops.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    pub operations: AtomicMetric,
    pub discarded_operations: AtomicU64,
    pub changes: AtomicMetric,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetricsSnapshot {
    pub operations: AtomicSnapshot,
    pub discarded_operations: u64,
    pub changes: AtomicSnapshot,
}

impl SyncMetrics {
    pub fn record_discard(&self) {
        self.discarded_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        SyncMetricsSnapshot {
            operations: self.operations.snapshot(),
            discarded_operations: self.discarded_operations.load(Ordering::Relaxed),
            changes: self.changes.snapshot(),
        }
    }
}

fn to_option(value: u64) -> Option<u64> {
    if value == UNSET_TS { None } else { Some(value) }
}

fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_outcomes() {
        let metrics = SyncMetrics::default();
        metrics.operations.record_success();
        metrics.operations.record_failure();
        metrics.operations.record_failure();
        metrics.record_discard();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.operations.successes, 1);
        assert_eq!(snapshot.operations.failures, 2);
        assert!(snapshot.operations.last_failure_ms.is_some());
        assert_eq!(snapshot.discarded_operations, 1);
        assert_eq!(snapshot.changes.successes, 0);
        assert!(snapshot.changes.last_success_ms.is_none());
    }
}
