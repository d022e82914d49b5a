//! Registry of caches sharing one memory budget.
//!
//! Every [`DataCache`] belongs to a [`CacheManager`]. The manager counts
//! nodes nobody references ("aged" nodes) across all of its caches. Once
//! they need more bytes than the configured budget, the next cache in
//! round-robin order gives up its oldest unreferenced nodes.
//!
//! Lock order: the manager's registry lock is always taken before any cache
//! lock. The fill lock is a leaf and only guards the fill condition.

use super::metrics::{CacheMetrics, CacheMetricsSnapshot};
use super::node::CacheNode;
use super::{DataCache, LOW_PERSISTENCY_RESIDENT_SET};
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use wavestream_core::{DataHandle, StreamConfig};

struct Registry {
    /// Caches in sweep order; the head is trimmed next.
    caches: VecDeque<(u64, Weak<DataCache>)>,
}

/// Owner of the cache list, the aged-node tally and the fill condition.
pub struct CacheManager {
    config: StreamConfig,
    registry: Mutex<Registry>,
    /// Unreferenced nodes across all caches, changed under the owning
    /// cache's lock.
    n_aged: AtomicUsize,
    fill_lock: Mutex<()>,
    node_filled: Condvar,
    metrics: CacheMetrics,
    next_id: AtomicU64,
}

impl CacheManager {
    /// Create a manager for caches using `config`'s node size and budget.
    pub fn new(config: StreamConfig) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            registry: Mutex::new(Registry {
                caches: VecDeque::new(),
            }),
            n_aged: AtomicUsize::new(0),
            fill_lock: Mutex::new(()),
            node_filled: Condvar::new(),
            metrics: CacheMetrics::new(),
            next_id: AtomicU64::new(1),
        }))
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Values per node.
    pub fn node_size(&self) -> usize {
        self.config.node_size
    }

    /// Create a new cache over `handle` with `padding` values on each side
    /// of every node.
    pub fn create_cache(
        self: &Arc<Self>,
        handle: Arc<DataHandle>,
        padding: usize,
    ) -> Result<Arc<DataCache>> {
        let mut registry = self.registry.lock();
        self.register(&mut registry, handle, padding)
    }

    /// Return a cache over `handle` with at least `min_padding`, creating
    /// one if none exists yet.
    pub fn cache_for_handle(
        self: &Arc<Self>,
        handle: &Arc<DataHandle>,
        min_padding: usize,
    ) -> Result<Arc<DataCache>> {
        let mut registry = self.registry.lock();
        // upgraded caches are released only after the registry lock
        let live: Vec<Arc<DataCache>> = registry
            .caches
            .iter()
            .filter_map(|(_, weak)| weak.upgrade())
            .collect();
        let result = match live
            .iter()
            .find(|cache| Arc::ptr_eq(cache.handle(), handle) && cache.padding() >= min_padding)
        {
            Some(cache) => Ok(cache.clone()),
            None => self.register(&mut registry, handle.clone(), min_padding),
        };
        drop(registry);
        drop(live);
        result
    }

    fn register(
        self: &Arc<Self>,
        registry: &mut Registry,
        handle: Arc<DataHandle>,
        padding: usize,
    ) -> Result<Arc<DataCache>> {
        let node_size = self.config.node_size;
        if padding == 0 || padding >= node_size / 2 {
            return Err(Error::InvalidCache(format!(
                "padding {} must be in 1..{} for node size {}",
                padding,
                node_size / 2,
                node_size
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            "cache {} over \"{}\" (node size {}, padding {})",
            id,
            handle.name(),
            node_size,
            padding
        );
        let cache = Arc::new(DataCache::new(id, self.clone(), handle, padding));
        registry.caches.push_back((id, Arc::downgrade(&cache)));
        Ok(cache)
    }

    /// Number of live caches.
    pub fn n_caches(&self) -> usize {
        self.registry
            .lock()
            .caches
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    /// Unreferenced nodes across all caches.
    pub fn aged_nodes(&self) -> usize {
        self.n_aged.load(Ordering::Acquire)
    }

    /// Bytes held by unreferenced nodes, padding excluded.
    pub fn aged_bytes(&self) -> usize {
        self.aged_nodes() * self.config.node_bytes()
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn counters(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// A node's reference count dropped to 0.
    pub(crate) fn node_aged(&self) {
        self.n_aged.fetch_add(1, Ordering::AcqRel);
    }

    /// A node's reference count went from 0 to 1.
    pub(crate) fn node_rejuvenated(&self) {
        self.n_aged.fetch_sub(1, Ordering::AcqRel);
    }

    /// Unreferenced nodes were freed.
    pub(crate) fn nodes_released(&self, n: usize) {
        if n > 0 {
            self.n_aged.fetch_sub(n, Ordering::AcqRel);
        }
    }

    /// Sweep one cache if the aged nodes exceed the budget.
    ///
    /// Must be called without holding any cache lock.
    pub(crate) fn enforce_budget(&self) {
        let node_bytes = self.config.node_bytes();
        let budget = self.config.cache_memory;
        if self.aged_bytes() <= budget {
            return;
        }

        let mut registry = self.registry.lock();
        let cache = loop {
            let Some((id, weak)) = registry.caches.pop_front() else {
                return;
            };
            if let Some(cache) = weak.upgrade() {
                registry.caches.push_back((id, weak));
                break cache;
            }
        };

        let mut inner = cache.lock_inner();
        drop(registry);

        let current = self.aged_bytes();
        if current <= budget {
            return;
        }
        let n_nodes = inner.n_nodes();
        let max_lru = if inner.high_persistency() {
            let overhang = current - budget + budget / 16;
            let n_free = (overhang / node_bytes).min(n_nodes);
            (n_nodes / 2 + n_nodes / 4).max(n_nodes - n_free)
        } else {
            n_nodes / 4
        };
        let max_lru = max_lru.max(LOW_PERSISTENCY_RESIDENT_SET);
        let freed = inner.free_olders(u32::try_from(max_lru).unwrap_or(u32::MAX));
        self.nodes_released(freed);
        drop(inner);

        self.metrics.record_sweep(freed);
        tracing::debug!(
            "swept \"{}\": freed {} of {} nodes ({} aged bytes, budget {})",
            cache.handle().name(),
            freed,
            n_nodes,
            current,
            budget
        );
    }

    /// Wait until `node` has been filled by its creator.
    pub(crate) fn wait_filled(&self, node: &CacheNode) {
        let mut guard = self.fill_lock.lock();
        while !node.is_loaded() {
            self.node_filled.wait(&mut guard);
        }
    }

    /// Wake every thread waiting for a node fill.
    pub(crate) fn notify_filled(&self) {
        let _guard = self.fill_lock.lock();
        self.node_filled.notify_all();
    }

    /// Forget a cache that is being destroyed along with its aged nodes.
    pub(crate) fn unregister(&self, id: u64, aged: usize) {
        self.nodes_released(aged);
        self.registry
            .lock()
            .caches
            .retain(|(cache_id, _)| *cache_id != id);
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("config", &self.config)
            .field("n_caches", &self.n_caches())
            .field("aged_nodes", &self.aged_nodes())
            .finish()
    }
}
