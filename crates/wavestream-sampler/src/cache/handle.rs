//! Handle reading through a cache.

use super::{DataCache, LoadRequest};
use std::sync::Arc;
use wavestream_core::{DataHandle, DataSource, Error, HandleSetup, Result};

/// Serves reads from the cache node covering each offset.
///
/// A read returns at most the rest of one node (including its right
/// padding), so sequential readers walk the cache node by node.
pub struct CachedHandle {
    cache: Arc<DataCache>,
}

impl CachedHandle {
    pub fn new(cache: Arc<DataCache>) -> Arc<DataHandle> {
        let name = format!("{}#cached", cache.handle().name());
        DataHandle::new(name, Self { cache })
    }
}

impl DataSource for CachedHandle {
    fn open(&self, _name: &str) -> Result<HandleSetup> {
        let src = self.cache.handle();
        src.open()?;
        self.cache.open();
        let setup = src.setup();
        src.close();
        Ok(setup)
    }

    fn read(&self, _setup: &HandleSetup, offset: i64, values: &mut [f32]) -> Result<usize> {
        let Some(node) = self.cache.ref_node(offset, LoadRequest::DemandLoad) else {
            return Err(Error::Read {
                name: self.cache.handle().name().to_string(),
                offset,
                message: "no cache node".to_string(),
            });
        };
        let data = node.wait_loaded();
        let rel = (offset - node.offset()) as usize;
        let n = values
            .len()
            .min(self.cache.node_size() + self.cache.padding() - rel);
        values[..n].copy_from_slice(data.slice(rel as isize, n));
        Ok(n)
    }

    fn close(&self) {
        self.cache.close();
    }

    fn source(&self) -> Option<&Arc<DataHandle>> {
        Some(self.cache.handle())
    }
}
