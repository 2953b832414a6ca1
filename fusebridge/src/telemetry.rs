//! Bridge telemetry: lock-free counters and point-in-time snapshots.
//!
//! Counters are monotonic and updated from the control thread's dispatch
//! path; snapshots are cheap copies safe to take from anywhere.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters covering the dispatch path and the mount lifecycle.
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    calls_dispatched: AtomicU64,
    calls_auto_completed: AtomicU64,
    calls_failed: AtomicU64,
    mounts_started: AtomicU64,
    mounts_failed: AtomicU64,
    mounts_released: AtomicU64,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn call_dispatched(&self) {
        self.calls_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn call_auto_completed(&self) {
        self.calls_auto_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn call_failed(&self) {
        self.calls_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn mount_started(&self) {
        self.mounts_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn mount_failed(&self) {
        self.mounts_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn mount_released(&self) {
        self.mounts_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls_dispatched: self.calls_dispatched.load(Ordering::Relaxed),
            calls_auto_completed: self.calls_auto_completed.load(Ordering::Relaxed),
            calls_failed: self.calls_failed.load(Ordering::Relaxed),
            mounts_started: self.mounts_started.load(Ordering::Relaxed),
            mounts_failed: self.mounts_failed.load(Ordering::Relaxed),
            mounts_released: self.mounts_released.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Calls that reached the dispatch bridge.
    pub calls_dispatched: u64,
    /// Calls answered without a registered handler.
    pub calls_auto_completed: u64,
    /// Calls whose reply carried a negative status.
    pub calls_failed: u64,
    /// Mount attempts begun (slot allocated, worker spawned).
    pub mounts_started: u64,
    /// Mounts that failed to establish.
    pub mounts_failed: u64,
    /// Instances fully torn down.
    pub mounts_released: u64,
}

impl MetricsSnapshot {
    /// Instances currently live.
    pub fn active_mounts(&self) -> u64 {
        self.mounts_started.saturating_sub(self.mounts_released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = BridgeMetrics::new();
        metrics.call_dispatched();
        metrics.call_dispatched();
        metrics.call_auto_completed();
        metrics.call_failed();

        let snap = metrics.snapshot();
        assert_eq!(snap.calls_dispatched, 2);
        assert_eq!(snap.calls_auto_completed, 1);
        assert_eq!(snap.calls_failed, 1);
    }

    #[test]
    fn test_active_mounts_derivation() {
        let metrics = BridgeMetrics::new();
        metrics.mount_started();
        metrics.mount_started();
        metrics.mount_released();
        assert_eq!(metrics.snapshot().active_mounts(), 1);

        metrics.mount_released();
        metrics.mount_released();
        assert_eq!(metrics.snapshot().active_mounts(), 0);
    }
}
