//! Handles with ranges removed from their source.

use super::{DataHandle, DataSource, HandleSetup};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Removes `n_cut` values at `cut_offset` and `tail_cut` values at the end.
///
/// Cropping is the special case of a cut at offset 0 plus a tail cut.
pub struct CutHandle {
    src: Arc<DataHandle>,
    cut_offset: i64,
    n_cut: i64,
    tail_cut: i64,
}

impl CutHandle {
    /// Elide `[cut_offset, cut_offset + n_cut)` from `src`.
    pub fn cut(src: Arc<DataHandle>, cut_offset: i64, n_cut: i64) -> Result<Arc<DataHandle>> {
        if cut_offset < 0 || n_cut < 0 {
            return Err(Error::Format(format!(
                "invalid cut range {}+{}",
                cut_offset, n_cut
            )));
        }
        let name = format!("{}#cut", src.name());
        Ok(Self::translate(src, name, cut_offset, n_cut, 0))
    }

    /// Drop `head` values from the start and `tail` values from the end.
    pub fn crop(src: Arc<DataHandle>, head: i64, tail: i64) -> Result<Arc<DataHandle>> {
        if head < 0 || tail < 0 {
            return Err(Error::Format(format!("invalid crop {}/{}", head, tail)));
        }
        let name = format!("{}#crop", src.name());
        Ok(Self::translate(src, name, 0, head, tail))
    }

    fn translate(
        src: Arc<DataHandle>,
        name: String,
        cut_offset: i64,
        n_cut: i64,
        tail_cut: i64,
    ) -> Arc<DataHandle> {
        DataHandle::new(
            name,
            Self {
                src,
                cut_offset: if n_cut > 0 { cut_offset } else { 0 },
                n_cut,
                tail_cut,
            },
        )
    }
}

impl DataSource for CutHandle {
    fn open(&self, _name: &str) -> Result<HandleSetup> {
        self.src.open()?;
        let mut setup = self.src.setup();
        setup.n_values -= setup.n_values.min(self.tail_cut);
        // a cut reaching past the end only removes what is there
        let in_range = (setup.n_values - self.cut_offset).max(0);
        setup.n_values -= in_range.min(self.n_cut);
        Ok(setup)
    }

    fn read(&self, _setup: &HandleSetup, offset: i64, values: &mut [f32]) -> Result<usize> {
        let n = values.len();
        let mut done = 0;
        if offset < self.cut_offset {
            let before = n.min((self.cut_offset - offset) as usize);
            done = self.src.read(offset, &mut values[..before])?;
            if done < before || done == n {
                return Ok(done);
            }
        }

        let src_offset = offset + done as i64 + self.n_cut;
        match self.src.read(src_offset, &mut values[done..]) {
            Ok(l) => Ok(done + l),
            Err(err) if done > 0 => {
                tracing::debug!("cut read stops after {} values: {}", done, err);
                Ok(done)
            }
            Err(err) => Err(err),
        }
    }

    fn close(&self) {
        self.src.close();
    }

    fn source(&self) -> Option<&Arc<DataHandle>> {
        Some(&self.src)
    }
}
