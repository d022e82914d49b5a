//! Handle splicing a foreign buffer into its source.

use super::{DataHandle, DataSource, HandleSetup};
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::Arc;

/// Inserts `paste` values at an offset of the source.
///
/// An insertion point past the end of the source leaves a run of zeros
/// between the source's last value and the pasted values. Lengths saturate
/// at `i64::MAX`, so an endless source stays endless.
pub struct InsertHandle {
    src: Arc<DataHandle>,
    paste_bit_depth: u32,
    requested_offset: Option<i64>,
    paste: Arc<[f32]>,
    /// Source length and insertion offset, resolved on open.
    layout: Mutex<(i64, i64)>,
}

impl InsertHandle {
    /// Insert `paste` at `paste_offset`, or append it when `None`.
    pub fn new(
        src: Arc<DataHandle>,
        paste_bit_depth: u32,
        paste_offset: Option<i64>,
        paste: impl Into<Arc<[f32]>>,
    ) -> Arc<DataHandle> {
        let name = format!("{}#insert", src.name());
        DataHandle::new(
            name,
            Self {
                src,
                paste_bit_depth,
                requested_offset: paste_offset.filter(|&offset| offset >= 0),
                paste: paste.into(),
                layout: Mutex::new((0, 0)),
            },
        )
    }

    /// Read one contiguous phase: source head, zero gap, pasted values or source tail.
    fn read_phase(&self, offset: i64, values: &mut [f32]) -> Result<usize> {
        let (src_len, paste_offset) = *self.layout.lock();
        let n = values.len() as i64;
        let paste_end = paste_offset.saturating_add(self.paste.len() as i64);

        if offset < paste_offset && offset < src_len {
            let l = n.min(paste_offset.min(src_len) - offset) as usize;
            self.src.read(offset, &mut values[..l])
        } else if offset < paste_offset {
            let l = n.min(paste_offset - offset) as usize;
            values[..l].fill(0.0);
            Ok(l)
        } else if offset < paste_end {
            let l = n.min(paste_end - offset) as usize;
            let start = (offset - paste_offset) as usize;
            values[..l].copy_from_slice(&self.paste[start..start + l]);
            Ok(l)
        } else {
            self.src.read(offset - self.paste.len() as i64, values)
        }
    }
}

impl DataSource for InsertHandle {
    fn open(&self, _name: &str) -> Result<HandleSetup> {
        self.src.open()?;
        let mut setup = self.src.setup();
        let src_len = setup.n_values;
        let paste_offset = self.requested_offset.unwrap_or(src_len);

        setup.n_values = src_len
            .max(paste_offset)
            .saturating_add(self.paste.len() as i64);
        setup.bit_depth = setup.bit_depth.max(self.paste_bit_depth);
        *self.layout.lock() = (src_len, paste_offset);
        Ok(setup)
    }

    fn read(&self, _setup: &HandleSetup, offset: i64, values: &mut [f32]) -> Result<usize> {
        let mut done = 0;
        while done < values.len() {
            match self.read_phase(offset + done as i64, &mut values[done..]) {
                Ok(0) => break,
                Ok(l) => done += l,
                Err(err) if done > 0 => {
                    tracing::debug!("insert read stops after {} values: {}", done, err);
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(done)
    }

    fn close(&self) {
        self.src.close();
    }

    fn source(&self) -> Option<&Arc<DataHandle>> {
        Some(&self.src)
    }
}
