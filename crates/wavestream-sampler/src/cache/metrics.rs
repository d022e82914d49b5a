//! Cache statistics.
//!
//! Counters are shared by every cache of one manager and updated with
//! relaxed atomics from whichever thread touches a node.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for node lookups, fills and eviction.
#[derive(Default)]
pub struct CacheMetrics {
    /// Bytes read from handles while filling nodes
    bytes_read: AtomicU64,
    /// Handle reads issued while filling nodes
    read_ops: AtomicU64,
    /// Lookups answered by a resident node
    node_hits: AtomicU64,
    /// Lookups that created a node
    node_misses: AtomicU64,
    /// Handle reads that failed during a fill
    read_errors: AtomicU64,
    /// Nodes released by sweeps
    nodes_freed: AtomicU64,
    /// Sweeps run because the budget was exceeded
    sweeps: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
        self.read_ops.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_hit(&self) {
        self.node_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.node_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a sweep that released `freed` nodes.
    #[inline]
    pub fn record_sweep(&self, freed: usize) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.nodes_freed.fetch_add(freed as u64, Ordering::Relaxed);
    }

    /// Take a snapshot of current metrics.
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            read_ops: self.read_ops.load(Ordering::Relaxed),
            node_hits: self.node_hits.load(Ordering::Relaxed),
            node_misses: self.node_misses.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            nodes_freed: self.nodes_freed.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of cache metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub bytes_read: u64,
    pub read_ops: u64,
    pub node_hits: u64,
    pub node_misses: u64,
    pub read_errors: u64,
    pub nodes_freed: u64,
    pub sweeps: u64,
}

impl CacheMetricsSnapshot {
    /// Fraction of lookups answered without creating a node (0.0 - 1.0).
    ///
    /// Returns 1.0 if no lookups have occurred.
    pub fn hit_rate(&self) -> f32 {
        let total = self.node_hits + self.node_misses;
        if total == 0 {
            1.0
        } else {
            self.node_hits as f32 / total as f32
        }
    }

    /// Average bytes per handle read.
    pub fn avg_read_size(&self) -> u64 {
        if self.read_ops == 0 {
            0
        } else {
            self.bytes_read / self.read_ops
        }
    }
}
