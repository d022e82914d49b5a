//! Block cache over data handles.
//!
//! A [`DataCache`] overlays fixed-size, padded nodes on a [`DataHandle`].
//! Nodes are created on first access, pinned through [`NodeRef`]s and aged
//! once nobody references them. All caches of a [`CacheManager`] share one
//! memory budget for aged nodes.
//!
//! ```text
//!            padding   node_size values    padding
//!           |<----->|<------------------>|<----->|
//! handle: ..[ prev  |  offset .. +size   | next  ]..
//! ```
//!
//! Padding values are real handle data (or zeros outside the handle), so a
//! reader can look `padding` values past either end of a node.

mod handle;
mod manager;
mod metrics;
mod node;

pub use handle::CachedHandle;
pub use manager::CacheManager;
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use node::{CacheNode, LoadRequest, NodeRef};

use parking_lot::{Mutex, MutexGuard};
use std::cmp::Ordering;
use std::sync::Arc;
use wavestream_core::{DataHandle, PaddedBuffer};

/// Ages closer than this to the newest stamp are not refreshed on unref.
const AGE_EPSILON: u32 = 3;

/// Nodes every cache keeps across a sweep.
pub(crate) const LOW_PERSISTENCY_RESIDENT_SET: usize = 5;

pub(crate) struct CacheInner {
    /// Sorted by offset, no two nodes covering the same span.
    nodes: Vec<Arc<CacheNode>>,
    max_age: u32,
    open_count: u32,
    high_persistency: bool,
    /// The handle failed to open; every node reads as silence.
    broken: bool,
    length: i64,
}

impl CacheInner {
    pub(crate) fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn high_persistency(&self) -> bool {
        self.high_persistency
    }

    /// Free unreferenced nodes older than the newest `max_lru` age stamps and
    /// rebase the remaining ages. Returns the number of freed nodes.
    pub(crate) fn free_olders(&mut self, max_lru: u32) -> usize {
        let max_lru = max_lru.max(AGE_EPSILON);
        if max_lru >= self.max_age {
            return 0;
        }
        let rejuvenate = self.max_age - max_lru;
        let before = self.nodes.len();
        self.nodes.retain(|node| {
            let age = node.age();
            if node.ref_count() == 0 && age <= rejuvenate {
                false
            } else {
                node.set_age(age - age.min(rejuvenate));
                true
            }
        });
        self.max_age = max_lru;
        before - self.nodes.len()
    }

    fn find(&self, offset: i64, node_size: i64) -> std::result::Result<usize, usize> {
        self.nodes.binary_search_by(|node| {
            if offset < node.offset() {
                Ordering::Greater
            } else if offset >= node.offset() + node_size {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        })
    }
}

/// Padded block cache over one handle.
pub struct DataCache {
    id: u64,
    manager: Arc<CacheManager>,
    handle: Arc<DataHandle>,
    node_size: usize,
    padding: usize,
    inner: Mutex<CacheInner>,
}

impl DataCache {
    fn new(id: u64, manager: Arc<CacheManager>, handle: Arc<DataHandle>, padding: usize) -> Self {
        let node_size = manager.node_size();
        Self {
            id,
            manager,
            handle,
            node_size,
            padding,
            inner: Mutex::new(CacheInner {
                nodes: Vec::new(),
                max_age: 0,
                open_count: 0,
                high_persistency: false,
                broken: false,
                length: 0,
            }),
        }
    }

    pub fn handle(&self) -> &Arc<DataHandle> {
        &self.handle
    }

    pub fn manager(&self) -> &Arc<CacheManager> {
        &self.manager
    }

    /// Values per node.
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Values of padding on each side of a node.
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Resident nodes, loaded or pending.
    pub fn n_nodes(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().open_count > 0
    }

    /// Whether the open handle asked for its nodes to be kept longer.
    pub fn high_persistency(&self) -> bool {
        self.inner.lock().high_persistency
    }

    /// Open the cache. The first open opens the handle.
    ///
    /// A handle that fails to open is logged and the cache serves silence
    /// until its last close.
    pub fn open(&self) {
        let mut inner = self.inner.lock();
        if inner.open_count == 0 {
            match self.handle.open() {
                Ok(()) => {
                    let setup = self.handle.setup();
                    inner.length = setup.n_values;
                    inner.high_persistency = setup.needs_cache;
                    inner.broken = false;
                }
                Err(err) => {
                    tracing::warn!(
                        "cache over \"{}\" serves silence, open failed: {}",
                        self.handle.name(),
                        err
                    );
                    inner.length = 0;
                    inner.high_persistency = false;
                    inner.broken = true;
                }
            }
        }
        inner.open_count += 1;
    }

    /// Close the cache. The last close closes the handle; nodes stay
    /// resident until swept or the cache is dropped.
    ///
    /// # Panics
    /// If the cache is not open.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        assert!(
            inner.open_count > 0,
            "close on unopened cache over \"{}\"",
            self.handle.name()
        );
        inner.open_count -= 1;
        if inner.open_count == 0 {
            if !inner.broken {
                self.handle.close();
            }
            inner.high_persistency = false;
            inner.broken = false;
        }
    }

    /// Reference the node covering `offset`.
    ///
    /// Returns `None` only for [`LoadRequest::Peek`] when the node is not
    /// resident and filled.
    ///
    /// # Panics
    /// If the cache is closed or `offset` lies outside the handle.
    pub fn ref_node(self: &Arc<Self>, offset: i64, request: LoadRequest) -> Option<NodeRef> {
        let node_size = self.node_size as i64;
        let mut inner = self.inner.lock();
        assert!(
            inner.open_count > 0,
            "ref_node on unopened cache over \"{}\"",
            self.handle.name()
        );
        assert!(
            offset >= 0 && (inner.broken || offset < inner.length),
            "node offset {} out of range for \"{}\" (length {})",
            offset,
            self.handle.name(),
            inner.length
        );

        match inner.find(offset, node_size) {
            Ok(index) => {
                let node = inner.nodes[index].clone();
                if request == LoadRequest::Peek && !node.is_loaded() {
                    return None;
                }
                if node.add_ref() == 0 {
                    self.manager.node_rejuvenated();
                }
                drop(inner);

                self.manager.counters().record_hit();
                if request == LoadRequest::DemandLoad {
                    self.manager.wait_filled(&node);
                }
                Some(NodeRef::new(self.clone(), node))
            }
            Err(_) if request == LoadRequest::Peek => None,
            Err(index) => {
                let node = Arc::new(CacheNode::pending(offset - offset % node_size));
                inner.nodes.insert(index, node.clone());
                let prev = index.checked_sub(1).map(|i| inner.nodes[i].clone());
                let (length, broken) = (inner.length, inner.broken);
                drop(inner);

                tracing::trace!("new node at {} in \"{}\"", node.offset(), self.handle.name());
                self.manager.counters().record_miss();
                let data = self.fill(&node, prev.as_deref(), length, broken);
                node.publish(data);
                self.manager.notify_filled();
                Some(NodeRef::new(self.clone(), node))
            }
        }
    }

    /// Release a node reference. Same as dropping it.
    pub fn unref_node(&self, node: NodeRef) {
        debug_assert!(std::ptr::eq(Arc::as_ptr(node.cache()), self));
        drop(node);
    }

    /// Drop one reference of `node`, aging it when the last one goes.
    pub(crate) fn release_node(&self, node: &CacheNode) {
        let mut inner = self.inner.lock();
        debug_assert!(
            inner
                .find(node.offset(), self.node_size as i64)
                .is_ok_and(|i| std::ptr::eq(Arc::as_ptr(&inner.nodes[i]), node)),
            "unref of a node not owned by this cache"
        );
        let aged = node.release() == 0;
        if aged {
            if node.age() + AGE_EPSILON <= inner.max_age || inner.max_age < AGE_EPSILON {
                inner.max_age += 1;
                node.set_age(inner.max_age);
            }
            self.manager.node_aged();
        }
        drop(inner);

        if aged {
            self.manager.enforce_budget();
        }
    }

    /// Free unreferenced nodes older than the newest `max_lru` age stamps.
    /// Returns the number of freed nodes.
    pub fn free_olders(&self, max_lru: u32) -> usize {
        let mut inner = self.inner.lock();
        let freed = inner.free_olders(max_lru);
        self.manager.nodes_released(freed);
        freed
    }

    pub(crate) fn lock_inner(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock()
    }

    /// Load the padded span of `node`, reusing the overlap with `prev`.
    fn fill(
        &self,
        node: &CacheNode,
        prev: Option<&CacheNode>,
        length: i64,
        broken: bool,
    ) -> PaddedBuffer {
        let mut buffer = PaddedBuffer::zeroed(self.node_size, self.padding);
        let span_start = node.offset() - self.padding as i64;
        let raw = buffer.raw_mut();
        let mut pos = 0usize;
        let mut offset = span_start;
        if offset < 0 {
            // values before the handle start stay zero
            pos = (-offset) as usize;
            offset = 0;
        }

        if let Some((prev, data)) = prev.and_then(|prev| prev.data().map(|data| (prev, data))) {
            let prev_start = prev.offset() - self.padding as i64;
            let prev_end = prev_start.saturating_add(data.raw().len() as i64);
            if offset >= prev_start && offset < prev_end {
                let overlap = ((prev_end - offset) as usize).min(raw.len() - pos);
                let from = (offset - prev_start) as usize;
                raw[pos..pos + overlap].copy_from_slice(&data.raw()[from..from + overlap]);
                pos += overlap;
                offset += overlap as i64;
            }
        }

        while !broken && pos < raw.len() && offset < length {
            let n = (raw.len() - pos).min((length - offset) as usize);
            match self.handle.read(offset, &mut raw[pos..pos + n]) {
                Ok(0) => break,
                Ok(l) => {
                    self.manager
                        .counters()
                        .record_read((l * std::mem::size_of::<f32>()) as u64);
                    pos += l;
                    offset += l as i64;
                }
                Err(err) => {
                    self.manager.counters().record_read_error();
                    tracing::warn!(
                        "reading \"{}\" at {} failed, filling with silence: {}",
                        self.handle.name(),
                        offset,
                        err
                    );
                    break;
                }
            }
        }
        buffer
    }
}

impl Drop for DataCache {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.open_count > 0 {
            tracing::warn!(
                "cache over \"{}\" dropped while open",
                self.handle.name()
            );
            if !inner.broken {
                self.handle.close();
            }
        }
        let aged = inner.nodes.iter().filter(|node| node.ref_count() == 0).count();
        self.manager.unregister(self.id, aged);
    }
}

impl std::fmt::Debug for DataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCache")
            .field("handle", &self.handle.name())
            .field("node_size", &self.node_size)
            .field("padding", &self.padding)
            .field("n_nodes", &self.n_nodes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavestream_core::handle::MemoryHandle;
    use wavestream_core::{DataSource, Error, HandleSetup, OpenReason, Result, StreamConfig};

    const NODE_SIZE: usize = 512;

    fn manager(budget_nodes: usize) -> Arc<CacheManager> {
        let config = StreamConfig::with_node_size(NODE_SIZE)
            .memory_budget(budget_nodes * NODE_SIZE * 4)
            .wave_chunk_pads(4, 16);
        CacheManager::new(config).unwrap()
    }

    fn ramp(n: usize) -> Arc<DataHandle> {
        MemoryHandle::mono((0..n).map(|i| i as f32).collect::<Vec<_>>()).unwrap()
    }

    /// Ramp source with configurable persistency and failures.
    struct TestSource {
        n_values: i64,
        needs_cache: bool,
        fail_open: bool,
        fail_from: i64,
    }

    impl TestSource {
        fn ramp(n_values: i64) -> Self {
            Self {
                n_values,
                needs_cache: false,
                fail_open: false,
                fail_from: i64::MAX,
            }
        }
    }

    impl DataSource for TestSource {
        fn open(&self, name: &str) -> Result<HandleSetup> {
            if self.fail_open {
                return Err(Error::Open {
                    name: name.to_string(),
                    reason: OpenReason::Unavailable("offline".to_string()),
                });
            }
            let mut setup = HandleSetup::new(self.n_values, 1);
            setup.needs_cache = self.needs_cache;
            Ok(setup)
        }

        fn read(&self, _: &HandleSetup, offset: i64, values: &mut [f32]) -> Result<usize> {
            if offset >= self.fail_from {
                return Err(Error::Read {
                    name: "test".to_string(),
                    offset,
                    message: "simulated".to_string(),
                });
            }
            let n = values.len().min((self.fail_from - offset) as usize);
            for (i, v) in values[..n].iter_mut().enumerate() {
                *v = (offset + i as i64) as f32;
            }
            Ok(n)
        }
    }

    /// Reference then release every node in `[0, n_nodes)`.
    fn churn(cache: &Arc<DataCache>, n_nodes: usize) {
        for i in 0..n_nodes {
            let node = cache
                .ref_node((i * NODE_SIZE) as i64, LoadRequest::DemandLoad)
                .unwrap();
            drop(node);
        }
    }

    // =========================================================================
    // Node lookup
    // =========================================================================

    #[test]
    fn test_first_node_layout() {
        let manager = manager(64);
        let cache = manager.create_cache(ramp(10_000), 8).unwrap();
        cache.open();

        let node = cache.ref_node(0, LoadRequest::DemandLoad).unwrap();
        assert_eq!(node.offset(), 0);
        let data = node.data().unwrap();
        assert_eq!(data.len(), NODE_SIZE);
        assert_eq!(data.padding(), 8);
        for i in -8..0 {
            assert_eq!(data[i], 0.0);
        }
        for i in 0..(NODE_SIZE as isize + 8) {
            assert_eq!(data[i], i as f32);
        }
        drop(node);
        cache.close();
    }

    #[test]
    fn test_last_node_zero_fills_past_end() {
        let manager = manager(64);
        let cache = manager.create_cache(ramp(10_000), 8).unwrap();
        cache.open();

        let node = cache.ref_node(9_999, LoadRequest::DemandLoad).unwrap();
        assert_eq!(node.offset(), 9_728);
        assert_eq!(node.value(271), 9_999.0);
        assert_eq!(node.value(-8), 9_720.0);
        for i in 272..(NODE_SIZE as isize + 8) {
            assert_eq!(node.value(i), 0.0);
        }
        drop(node);
        cache.close();
    }

    #[test]
    fn test_node_created_once() {
        let manager = manager(64);
        let cache = manager.create_cache(ramp(4_096), 8).unwrap();
        cache.open();

        let a = cache.ref_node(700, LoadRequest::Request).unwrap();
        let b = cache.ref_node(1_000, LoadRequest::DemandLoad).unwrap();
        assert!(Arc::ptr_eq(a.node(), b.node()));
        assert_eq!(cache.n_nodes(), 1);

        let metrics = manager.metrics();
        assert_eq!(metrics.node_misses, 1);
        assert_eq!(metrics.node_hits, 1);
        drop((a, b));
        cache.close();
    }

    #[test]
    fn test_nodes_stay_sorted() {
        let manager = manager(64);
        let cache = manager.create_cache(ramp(8_192), 8).unwrap();
        cache.open();

        let pinned: Vec<NodeRef> = [5, 1, 9, 3, 0, 7]
            .iter()
            .map(|&i| cache.ref_node(i * 512 + 17, LoadRequest::DemandLoad).unwrap())
            .collect();
        let offsets: Vec<i64> = cache.lock_inner().nodes.iter().map(|n| n.offset()).collect();
        assert_eq!(offsets, vec![0, 512, 1_536, 2_560, 3_584, 4_608]);
        drop(pinned);
        cache.close();
    }

    #[test]
    fn test_overlap_matches_handle() {
        let manager = manager(64);
        let cache = manager.create_cache(ramp(4_096), 16).unwrap();
        cache.open();

        let first = cache.ref_node(0, LoadRequest::DemandLoad).unwrap();
        let second = cache.ref_node(512, LoadRequest::DemandLoad).unwrap();
        for i in -16..(NODE_SIZE as isize + 16) {
            assert_eq!(second.value(i), (512 + i) as f32);
        }
        drop((first, second));
        cache.close();
    }

    #[test]
    fn test_peek_never_loads() {
        let manager = manager(64);
        let cache = manager.create_cache(ramp(4_096), 8).unwrap();
        cache.open();

        assert!(cache.ref_node(100, LoadRequest::Peek).is_none());
        assert_eq!(cache.n_nodes(), 0);

        let node = cache.ref_node(100, LoadRequest::Request).unwrap();
        drop(node);
        let peeked = cache.ref_node(100, LoadRequest::Peek).unwrap();
        assert!(peeked.is_loaded());
        drop(peeked);
        cache.close();
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_ref_node_out_of_range_panics() {
        let manager = manager(64);
        let cache = manager.create_cache(ramp(1_000), 8).unwrap();
        cache.open();
        let _ = cache.ref_node(1_000, LoadRequest::Request);
    }

    #[test]
    #[should_panic(expected = "ref_node on unopened cache")]
    fn test_ref_node_closed_panics() {
        let manager = manager(64);
        let cache = manager.create_cache(ramp(1_000), 8).unwrap();
        let _ = cache.ref_node(0, LoadRequest::Request);
    }

    // =========================================================================
    // Open / close and failures
    // =========================================================================

    #[test]
    fn test_open_close_follows_handle() {
        let manager = manager(64);
        let handle = ramp(1_000);
        let cache = manager.create_cache(handle.clone(), 8).unwrap();

        cache.open();
        cache.open();
        assert!(handle.is_open());
        cache.close();
        assert!(handle.is_open());
        cache.close();
        assert!(!handle.is_open());
        assert!(!cache.is_open());
    }

    #[test]
    fn test_failed_open_serves_silence() {
        let manager = manager(64);
        let mut source = TestSource::ramp(4_096);
        source.fail_open = true;
        let cache = manager
            .create_cache(DataHandle::new("offline", source), 8)
            .unwrap();

        cache.open();
        assert!(cache.is_open());
        let node = cache.ref_node(1_024, LoadRequest::DemandLoad).unwrap();
        assert!(node.data().unwrap().raw().iter().all(|&v| v == 0.0));
        drop(node);
        cache.close();
    }

    #[test]
    fn test_read_error_zero_fills() {
        let manager = manager(64);
        let mut source = TestSource::ramp(4_096);
        source.fail_from = 600;
        let cache = manager
            .create_cache(DataHandle::new("flaky", source), 8)
            .unwrap();
        cache.open();

        let node = cache.ref_node(512, LoadRequest::DemandLoad).unwrap();
        assert_eq!(node.value(87), 599.0);
        assert_eq!(node.value(88), 0.0);
        assert_eq!(node.value(511), 0.0);
        assert!(manager.metrics().read_errors >= 1);
        drop(node);
        cache.close();
    }

    #[test]
    fn test_needs_cache_sets_high_persistency() {
        let manager = manager(64);
        let mut source = TestSource::ramp(4_096);
        source.needs_cache = true;
        let cache = manager
            .create_cache(DataHandle::new("remote", source), 8)
            .unwrap();

        assert!(!cache.high_persistency());
        cache.open();
        assert!(cache.high_persistency());
        cache.close();
        assert!(!cache.high_persistency());
    }

    // =========================================================================
    // Manager registry
    // =========================================================================

    #[test]
    fn test_invalid_padding_rejected() {
        let manager = manager(64);
        assert!(manager.create_cache(ramp(100), 0).is_err());
        assert!(manager.create_cache(ramp(100), NODE_SIZE / 2).is_err());
        assert!(manager.create_cache(ramp(100), NODE_SIZE / 2 - 1).is_ok());
    }

    #[test]
    fn test_cache_for_handle_reuses() {
        let manager = manager(64);
        let handle = ramp(1_000);

        let a = manager.cache_for_handle(&handle, 16).unwrap();
        let b = manager.cache_for_handle(&handle, 8).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = manager.cache_for_handle(&handle, 32).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(manager.n_caches(), 2);

        drop((a, b, c));
        assert_eq!(manager.n_caches(), 0);
    }

    // =========================================================================
    // Aging and sweeps
    // =========================================================================

    #[test]
    fn test_aged_nodes_tracked() {
        let manager = manager(64);
        let cache = manager.create_cache(ramp(8_192), 8).unwrap();
        cache.open();

        let node = cache.ref_node(0, LoadRequest::DemandLoad).unwrap();
        assert_eq!(manager.aged_nodes(), 0);
        drop(node);
        assert_eq!(manager.aged_nodes(), 1);

        let node = cache.ref_node(0, LoadRequest::Peek).unwrap();
        assert_eq!(manager.aged_nodes(), 0);
        cache.unref_node(node);
        assert_eq!(manager.aged_bytes(), NODE_SIZE * 4);

        cache.close();
        drop(cache);
        assert_eq!(manager.aged_nodes(), 0);
    }

    #[test]
    fn test_sweep_keeps_budget() {
        let manager = manager(8);
        let cache = manager.create_cache(ramp(64 * NODE_SIZE), 8).unwrap();
        cache.open();

        for i in 0..40 {
            let node = cache
                .ref_node((i * NODE_SIZE) as i64, LoadRequest::DemandLoad)
                .unwrap();
            drop(node);
            assert!(manager.aged_bytes() <= manager.config().cache_memory);
        }
        assert!(cache.n_nodes() <= 8);
        assert!(manager.metrics().sweeps > 0);
        assert!(manager.metrics().nodes_freed >= 32);

        // most recently used nodes survive
        assert!(cache.ref_node(39 * NODE_SIZE as i64, LoadRequest::Peek).is_some());
        assert!(cache.ref_node(0, LoadRequest::Peek).is_none());
        cache.close();
    }

    #[test]
    fn test_sweep_never_frees_pinned() {
        let manager = manager(8);
        let cache = manager.create_cache(ramp(64 * NODE_SIZE), 8).unwrap();
        cache.open();

        let pinned = cache.ref_node(0, LoadRequest::DemandLoad).unwrap();
        for i in 1..40 {
            let node = cache
                .ref_node((i * NODE_SIZE) as i64, LoadRequest::DemandLoad)
                .unwrap();
            drop(node);
        }
        assert!(manager.metrics().sweeps > 0);
        assert_eq!(pinned.value(100), 100.0);
        assert!(cache.ref_node(0, LoadRequest::Peek).is_some());
        drop(pinned);
        cache.close();
    }

    #[test]
    fn test_high_persistency_keeps_more() {
        let manager = manager(8);
        let mut source = TestSource::ramp(64 * NODE_SIZE as i64);
        source.needs_cache = true;
        let cache = manager
            .create_cache(DataHandle::new("remote", source), 8)
            .unwrap();
        cache.open();

        churn(&cache, 40);
        assert_eq!(cache.n_nodes(), 8);
        assert_eq!(manager.aged_nodes(), 8);
        cache.close();
    }

    #[test]
    fn test_sweeps_rotate_between_caches() {
        let manager = manager(8);
        let a = manager.create_cache(ramp(64 * NODE_SIZE), 8).unwrap();
        let b = manager.create_cache(ramp(64 * NODE_SIZE), 8).unwrap();
        a.open();
        b.open();

        churn(&a, 6);
        churn(&b, 6);
        // each cache gave up one node and neither drops below its resident set
        assert_eq!(a.n_nodes(), LOW_PERSISTENCY_RESIDENT_SET);
        assert_eq!(b.n_nodes(), LOW_PERSISTENCY_RESIDENT_SET);
        assert_eq!(manager.metrics().nodes_freed, 2);
        assert!(manager.metrics().sweeps >= 2);
        a.close();
        b.close();
    }

    #[test]
    fn test_free_olders_explicit() {
        let manager = manager(64);
        let cache = manager.create_cache(ramp(64 * NODE_SIZE), 8).unwrap();
        cache.open();

        churn(&cache, 20);
        assert_eq!(cache.n_nodes(), 20);
        let freed = cache.free_olders(5);
        assert_eq!(freed, 15);
        assert_eq!(cache.n_nodes(), 5);
        assert_eq!(manager.aged_nodes(), 5);

        // already within the requested window
        assert_eq!(cache.free_olders(10), 0);
        cache.close();
    }

    // =========================================================================
    // Cached handle
    // =========================================================================

    #[test]
    fn test_cached_handle_matches_source() {
        let manager = manager(64);
        let cache = manager.create_cache(ramp(5_000), 8).unwrap();
        let cached = CachedHandle::new(cache.clone());
        cached.open().unwrap();
        assert_eq!(cached.length(), 5_000);
        assert!(cache.is_open());

        let mut buf = vec![0.0; 5_000];
        assert_eq!(cached.read_exact(0, &mut buf).unwrap(), 5_000);
        assert!(buf.iter().enumerate().all(|(i, &v)| v == i as f32));

        // a single read stops at the end of the node's right padding
        let mut big = vec![0.0; 2_000];
        assert_eq!(cached.read(100, &mut big).unwrap(), 512 + 8 - 100);

        cached.close();
        assert!(!cache.is_open());
        assert!(!cache.handle().is_open());
    }

    #[test]
    fn test_concurrent_demand_loads() {
        let manager = manager(256);
        let cache = manager.create_cache(ramp(32 * NODE_SIZE), 8).unwrap();
        cache.open();

        std::thread::scope(|scope| {
            for t in 0..4 {
                let cache = cache.clone();
                scope.spawn(move || {
                    for round in 0..8 {
                        for i in 0..32 {
                            let offset = ((i * 7 + t + round) % 32 * NODE_SIZE + 3) as i64;
                            let node = cache.ref_node(offset, LoadRequest::DemandLoad).unwrap();
                            assert_eq!(node.value(3), offset as f32);
                        }
                    }
                });
            }
        });
        assert_eq!(cache.n_nodes(), 32);
        cache.close();
    }
}
