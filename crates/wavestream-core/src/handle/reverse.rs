//! Reversed view on a handle.

use super::{read_full, DataHandle, DataSource, HandleSetup};
use crate::error::Result;
use std::sync::Arc;

/// Plays its source back to front.
pub struct ReverseHandle {
    src: Arc<DataHandle>,
}

impl ReverseHandle {
    /// Wrap `src` so value `i` reads source value `length - 1 - i`.
    pub fn new(src: Arc<DataHandle>) -> Arc<DataHandle> {
        let name = format!("{}#reversed", src.name());
        DataHandle::new(name, Self { src })
    }
}

impl DataSource for ReverseHandle {
    fn open(&self, _name: &str) -> Result<HandleSetup> {
        self.src.open()?;
        Ok(self.src.setup())
    }

    fn read(&self, setup: &HandleSetup, offset: i64, values: &mut [f32]) -> Result<usize> {
        let mirrored = setup.n_values - (offset + values.len() as i64);
        read_full(&self.src, mirrored, values)?;
        values.reverse();
        Ok(values.len())
    }

    fn close(&self) {
        self.src.close();
    }

    fn source(&self) -> Option<&Arc<DataHandle>> {
        Some(&self.src)
    }
}
