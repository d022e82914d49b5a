//! Handle over interleaved values held in memory.

use super::{xinfo, DataHandle, DataSource, HandleSetup, Xinfos};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Lowest mixing frequency a memory handle accepts.
const MIN_MIX_FREQ: f32 = 4000.0;

/// In-memory sample source.
pub struct MemoryHandle {
    setup: HandleSetup,
    values: Arc<[f32]>,
}

impl MemoryHandle {
    /// Create a handle over `values`.
    ///
    /// Trailing values that do not fill a whole frame are dropped.
    pub fn new(
        n_channels: u32,
        bit_depth: u32,
        mix_freq: f32,
        osc_freq: f32,
        values: impl Into<Arc<[f32]>>,
    ) -> Result<Arc<DataHandle>> {
        let values = values.into();
        if n_channels == 0 {
            return Err(Error::Format("memory handle needs at least one channel".into()));
        }
        if bit_depth == 0 {
            return Err(Error::Format("memory handle needs a bit depth".into()));
        }
        if mix_freq.is_nan() || mix_freq < MIN_MIX_FREQ {
            return Err(Error::Format(format!(
                "mix frequency {} below {}",
                mix_freq, MIN_MIX_FREQ
            )));
        }
        if !osc_freq.is_finite() || osc_freq <= 0.0 {
            return Err(Error::Format(format!("invalid osc frequency {}", osc_freq)));
        }
        if values.len() < n_channels as usize {
            return Err(Error::Format(format!(
                "{} values cannot hold a frame of {} channels",
                values.len(),
                n_channels
            )));
        }

        let n_values = values.len() - values.len() % n_channels as usize;
        let setup = HandleSetup {
            n_values: n_values as i64,
            n_channels,
            bit_depth,
            mix_freq,
            osc_freq,
            needs_cache: false,
            xinfos: Xinfos::new().with(xinfo::OSC_FREQ, osc_freq.to_string()),
        };
        Ok(DataHandle::new("memory", Self { setup, values }))
    }

    /// Mono 32-bit handle at 44.1 kHz, mostly for tests and generated material.
    pub fn mono(values: impl Into<Arc<[f32]>>) -> Result<Arc<DataHandle>> {
        Self::new(1, 32, 44100.0, 440.0, values)
    }
}

impl DataSource for MemoryHandle {
    fn open(&self, _name: &str) -> Result<HandleSetup> {
        Ok(self.setup.clone())
    }

    fn read(&self, _setup: &HandleSetup, offset: i64, values: &mut [f32]) -> Result<usize> {
        let start = offset as usize;
        values.copy_from_slice(&self.values[start..start + values.len()]);
        Ok(values.len())
    }
}
