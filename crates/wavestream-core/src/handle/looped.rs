//! Cheap endless loop over a handle.

use super::{DataHandle, DataSource, HandleSetup};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Repeats `[first, last]` of its source forever by offset modulo.
///
/// Reports `i64::MAX` values while looping. A source too short to contain
/// `last` is passed through unchanged.
pub struct LoopHandle {
    src: Arc<DataHandle>,
    requested_first: i64,
    requested_last: i64,
    /// Loop start and width resolved on open, width 0 when not looping.
    resolved: Mutex<(i64, i64)>,
}

impl LoopHandle {
    /// Loop the inclusive range `[first, last]` of `src`.
    pub fn new(src: Arc<DataHandle>, first: i64, last: i64) -> Result<Arc<DataHandle>> {
        if first < 0 || last < first {
            return Err(Error::Format(format!(
                "invalid loop range [{}, {}]",
                first, last
            )));
        }
        let name = format!("{}#loop", src.name());
        Ok(DataHandle::new(
            name,
            Self {
                src,
                requested_first: first,
                requested_last: last,
                resolved: Mutex::new((0, 0)),
            },
        ))
    }
}

impl DataSource for LoopHandle {
    fn open(&self, _name: &str) -> Result<HandleSetup> {
        self.src.open()?;
        let mut setup = self.src.setup();
        let resolved = if setup.n_values > self.requested_last {
            let width = self.requested_last - self.requested_first + 1;
            setup.n_values = i64::MAX;
            (self.requested_first, width)
        } else {
            (setup.n_values, 0)
        };
        *self.resolved.lock() = resolved;
        Ok(setup)
    }

    fn read(&self, _setup: &HandleSetup, offset: i64, values: &mut [f32]) -> Result<usize> {
        let (loop_start, width) = *self.resolved.lock();
        let n = values.len() as i64;
        if offset < loop_start {
            let l = n.min(loop_start - offset) as usize;
            self.src.read(offset, &mut values[..l])
        } else {
            let phase = (offset - loop_start) % width;
            let l = n.min(width - phase) as usize;
            self.src.read(loop_start + phase, &mut values[..l])
        }
    }

    fn close(&self) {
        self.src.close();
    }

    fn source(&self) -> Option<&Arc<DataHandle>> {
        Some(&self.src)
    }
}
