//! Cache nodes and the references that pin them.

use super::DataCache;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use wavestream_core::PaddedBuffer;

/// How [`DataCache::ref_node`] treats a node that is missing or still loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRequest {
    /// Return the node even if another thread is still filling it; a missing
    /// node is created and filled before returning.
    Request,
    /// Like `Request`, but wait until the node's data is available.
    DemandLoad,
    /// Only return a node that is resident and filled; never load.
    Peek,
}

/// One node-sized span of a handle plus padding on both sides.
///
/// Reference count and age are only modified under the owning cache's lock.
pub struct CacheNode {
    offset: i64,
    ref_count: AtomicU32,
    age: AtomicU32,
    data: OnceLock<PaddedBuffer>,
}

impl CacheNode {
    /// A pending node, referenced once by its creator.
    pub(crate) fn pending(offset: i64) -> Self {
        Self {
            offset,
            ref_count: AtomicU32::new(1),
            age: AtomicU32::new(0),
            data: OnceLock::new(),
        }
    }

    /// Handle offset of the first logical value, a multiple of the node size.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Filled data, `None` while the node is loading.
    pub fn data(&self) -> Option<&PaddedBuffer> {
        self.data.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.data.get().is_some()
    }

    pub(crate) fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::Relaxed)
    }

    /// Increment, returning the previous count.
    pub(crate) fn add_ref(&self) -> u32 {
        self.ref_count.fetch_add(1, Ordering::Relaxed)
    }

    /// Decrement, returning the new count.
    pub(crate) fn release(&self) -> u32 {
        let previous = self.ref_count.fetch_sub(1, Ordering::Relaxed);
        assert!(previous > 0, "unref of unreferenced node at {}", self.offset);
        previous - 1
    }

    pub(crate) fn age(&self) -> u32 {
        self.age.load(Ordering::Relaxed)
    }

    pub(crate) fn set_age(&self, age: u32) {
        self.age.store(age, Ordering::Relaxed);
    }

    /// Publish the filled buffer. Only the creating thread calls this.
    pub(crate) fn publish(&self, buffer: PaddedBuffer) {
        if self.data.set(buffer).is_err() {
            tracing::warn!("node at {} filled twice", self.offset);
        }
    }
}

impl std::fmt::Debug for CacheNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheNode")
            .field("offset", &self.offset)
            .field("ref_count", &self.ref_count())
            .field("age", &self.age())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// A pinned node. The node cannot be evicted while this exists; dropping it
/// releases the pin.
pub struct NodeRef {
    cache: Arc<DataCache>,
    node: Arc<CacheNode>,
}

impl NodeRef {
    pub(crate) fn new(cache: Arc<DataCache>, node: Arc<CacheNode>) -> Self {
        Self { cache, node }
    }

    /// Handle offset of the node's first logical value.
    pub fn offset(&self) -> i64 {
        self.node.offset
    }

    /// Filled data, `None` while another thread is still loading it.
    pub fn data(&self) -> Option<&PaddedBuffer> {
        self.node.data()
    }

    pub fn is_loaded(&self) -> bool {
        self.node.is_loaded()
    }

    /// Block until the node is filled and return its data.
    pub fn wait_loaded(&self) -> &PaddedBuffer {
        loop {
            if let Some(data) = self.node.data() {
                return data;
            }
            self.cache.manager().wait_filled(&self.node);
        }
    }

    /// Value at `index` relative to the node offset; the padding on either
    /// side is addressable.
    pub fn value(&self, index: isize) -> f32 {
        self.wait_loaded()[index]
    }

    /// Cache the node belongs to.
    pub fn cache(&self) -> &Arc<DataCache> {
        &self.cache
    }

    pub(crate) fn node(&self) -> &Arc<CacheNode> {
        &self.node
    }
}

impl Drop for NodeRef {
    fn drop(&mut self) {
        self.cache.release_node(&self.node);
    }
}

impl std::fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("cache", &self.cache.handle().name())
            .field("node", &self.node)
            .finish()
    }
}
