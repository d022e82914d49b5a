//! Gain applied to a handle.

use super::{DataHandle, DataSource, HandleSetup};
use crate::error::Result;
use std::sync::Arc;

/// Multiplies every source value by a constant factor.
pub struct ScaleHandle {
    src: Arc<DataHandle>,
    factor: f32,
}

impl ScaleHandle {
    pub fn new(src: Arc<DataHandle>, factor: f32) -> Arc<DataHandle> {
        let name = format!("{}#scale", src.name());
        DataHandle::new(name, Self { src, factor })
    }
}

impl DataSource for ScaleHandle {
    fn open(&self, _name: &str) -> Result<HandleSetup> {
        self.src.open()?;
        let mut setup = self.src.setup();
        // scaled values no longer fit the source's integer depth
        setup.bit_depth = 32;
        Ok(setup)
    }

    fn read(&self, _setup: &HandleSetup, offset: i64, values: &mut [f32]) -> Result<usize> {
        let n = self.src.read(offset, values)?;
        for value in &mut values[..n] {
            *value *= self.factor;
        }
        Ok(n)
    }

    fn close(&self) {
        self.src.close();
    }

    fn source(&self) -> Option<&Arc<DataHandle>> {
        Some(&self.src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::MemoryHandle;
    use approx::assert_relative_eq;

    #[test]
    fn test_scale_multiplies() {
        let src = MemoryHandle::new(1, 16, 44100.0, 440.0, vec![0.5, -0.25, 1.0]).unwrap();
        let scaled = ScaleHandle::new(src, 0.5);
        scaled.open().unwrap();
        assert_eq!(scaled.bit_depth(), 32);

        let mut buf = [0.0; 3];
        assert_eq!(scaled.read(0, &mut buf).unwrap(), 3);
        assert_relative_eq!(buf[0], 0.25);
        assert_relative_eq!(buf[1], -0.125);
        assert_relative_eq!(buf[2], 0.5);
        scaled.close();
    }
}
