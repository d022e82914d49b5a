//! Buffered single-value access to a handle.

use super::DataHandle;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Values a [`PeekBuffer`] holds at most.
pub const PEEK_BUFFER_SIZE: usize = 8192;

/// Attempts at reading a value before it is taken as silence.
const READ_ATTEMPTS: usize = 6;

/// Where a refill places the missed position within the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeekDirection {
    /// Buffer starts at the position, for forward scans.
    Forward,
    /// Buffer ends at the position, for backward scans.
    Backward,
    /// Buffer is centered on the position.
    #[default]
    Centered,
}

/// Window of values over an open handle, refilled around a position
/// whenever a peek misses it.
///
/// Reads that keep failing are logged and the values read as 0.0.
pub struct PeekBuffer {
    handle: Arc<DataHandle>,
    dir: PeekDirection,
    start: i64,
    end: i64,
    data: Box<[f32]>,
}

impl PeekBuffer {
    /// Empty window over `handle`, which must stay open while peeking.
    pub fn new(handle: Arc<DataHandle>, dir: PeekDirection) -> Self {
        Self {
            handle,
            dir,
            start: 0,
            end: 0,
            data: vec![0.0; PEEK_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    pub fn handle(&self) -> &Arc<DataHandle> {
        &self.handle
    }

    pub fn direction(&self) -> PeekDirection {
        self.dir
    }

    /// Change the refill placement; the current window stays valid.
    pub fn set_direction(&mut self, dir: PeekDirection) {
        self.dir = dir;
    }

    /// Value range currently buffered.
    pub fn window(&self) -> std::ops::Range<i64> {
        self.start..self.end
    }

    /// Value at `pos`.
    ///
    /// # Panics
    /// If the handle is not open.
    pub fn peek(&mut self, pos: i64) -> Result<f32> {
        if pos < self.start || pos >= self.end {
            let length = self.handle.length();
            if pos < 0 || pos >= length {
                return Err(Error::OutOfRange {
                    name: self.handle.name().to_string(),
                    offset: pos,
                    length,
                });
            }
            self.refill(pos, length);
        }
        Ok(self.data[(pos - self.start) as usize])
    }

    fn refill(&mut self, pos: i64, length: i64) {
        let size = length.min(PEEK_BUFFER_SIZE as i64);
        let start = match self.dir {
            PeekDirection::Forward => pos,
            PeekDirection::Backward => pos - size + 1,
            PeekDirection::Centered => pos - size / 2,
        };
        self.end = (start + size).min(length);
        self.start = start.max(0);

        let mut k = self.start;
        while k < self.end {
            let at = (k - self.start) as usize;
            let wanted = (self.end - k) as usize;
            let mut got = 0;
            for _ in 0..READ_ATTEMPTS {
                match self.handle.read(k, &mut self.data[at..at + wanted]) {
                    Ok(n) if n > 0 => {
                        got = n;
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        let name = self.handle.name();
                        tracing::trace!("peek read of \"{}\" at {}: {}", name, k, err);
                    }
                }
            }
            if got == 0 {
                tracing::info!(
                    "failed to read \"{}\" at {}, peeking silence",
                    self.handle.name(),
                    k
                );
                self.data[at] = 0.0;
                got = 1;
            }
            k += got as i64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{DataSource, HandleSetup, MemoryHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ramp(n: usize) -> Arc<DataHandle> {
        MemoryHandle::mono((0..n).map(|i| i as f32).collect::<Vec<_>>()).unwrap()
    }

    /// Counts reads and fails every read starting at `bad`.
    struct CountingSource {
        n_values: i64,
        bad: i64,
        reads: Arc<AtomicUsize>,
    }

    impl DataSource for CountingSource {
        fn open(&self, _name: &str) -> Result<HandleSetup> {
            Ok(HandleSetup::new(self.n_values, 1))
        }

        fn read(&self, _setup: &HandleSetup, offset: i64, values: &mut [f32]) -> Result<usize> {
            self.reads.fetch_add(1, Ordering::Relaxed);
            if offset == self.bad {
                return Err(Error::Format("bad sector".into()));
            }
            // stop short of the bad value
            let n = if offset < self.bad {
                values.len().min((self.bad - offset) as usize)
            } else {
                values.len()
            };
            for (i, v) in values[..n].iter_mut().enumerate() {
                *v = (offset + i as i64) as f32;
            }
            Ok(n)
        }
    }

    #[test]
    fn test_window_placement() {
        let handle = ramp(20_000);
        handle.open().unwrap();

        let mut forward = PeekBuffer::new(handle.clone(), PeekDirection::Forward);
        assert_eq!(forward.peek(100).unwrap(), 100.0);
        assert_eq!(forward.window(), 100..8292);
        assert_eq!(forward.peek(19_000).unwrap(), 19_000.0);
        assert_eq!(forward.window(), 19_000..20_000);

        let mut backward = PeekBuffer::new(handle.clone(), PeekDirection::Backward);
        assert_eq!(backward.peek(10_000).unwrap(), 10_000.0);
        assert_eq!(backward.window(), 1809..10_001);
        assert_eq!(backward.peek(5).unwrap(), 5.0);
        assert_eq!(backward.window(), 0..6);

        let mut centered = PeekBuffer::new(handle.clone(), PeekDirection::default());
        assert_eq!(centered.peek(10_000).unwrap(), 10_000.0);
        assert_eq!(centered.window(), 5904..14_096);
        handle.close();
    }

    #[test]
    fn test_hits_do_not_read() {
        let reads = Arc::new(AtomicUsize::new(0));
        let handle = DataHandle::new(
            "counting",
            CountingSource {
                n_values: 100,
                bad: 1000,
                reads: reads.clone(),
            },
        );
        handle.open().unwrap();
        let mut peek = PeekBuffer::new(handle.clone(), PeekDirection::Forward);
        for pos in (0..100).chain((0..100).rev()) {
            assert_eq!(peek.peek(pos).unwrap(), pos as f32);
        }
        assert_eq!(reads.load(Ordering::Relaxed), 1);
        assert_eq!(peek.window(), 0..100);

        // scanning backwards from a forward window refills on every miss
        let mut peek = PeekBuffer::new(handle.clone(), PeekDirection::Forward);
        peek.peek(99).unwrap();
        peek.peek(98).unwrap();
        assert_eq!(reads.load(Ordering::Relaxed), 3);
        peek.set_direction(PeekDirection::Backward);
        peek.peek(97).unwrap();
        assert_eq!(peek.window(), 0..98);
        for pos in 0..98 {
            assert_eq!(peek.peek(pos).unwrap(), pos as f32);
        }
        assert_eq!(reads.load(Ordering::Relaxed), 4);
        handle.close();
    }

    #[test]
    fn test_unreadable_value_peeks_silence() {
        let reads = Arc::new(AtomicUsize::new(0));
        let handle = DataHandle::new(
            "bad-sector",
            CountingSource {
                n_values: 50,
                bad: 20,
                reads: reads.clone(),
            },
        );
        handle.open().unwrap();
        let mut peek = PeekBuffer::new(handle.clone(), PeekDirection::Centered);
        assert_eq!(peek.peek(25).unwrap(), 25.0);
        assert_eq!(peek.window(), 0..50);
        assert_eq!(peek.peek(20).unwrap(), 0.0);
        assert_eq!(peek.peek(19).unwrap(), 19.0);
        assert_eq!(peek.peek(21).unwrap(), 21.0);
        // 1 read up to the bad value, 6 attempts on it, 1 read past it
        assert_eq!(reads.load(Ordering::Relaxed), 1 + READ_ATTEMPTS + 1);
        handle.close();
    }

    #[test]
    fn test_out_of_range_peek() {
        let handle = ramp(10);
        handle.open().unwrap();
        let mut peek = PeekBuffer::new(handle.clone(), PeekDirection::Forward);
        assert!(matches!(
            peek.peek(10),
            Err(Error::OutOfRange { length: 10, .. })
        ));
        assert!(peek.peek(-1).is_err());
        assert_eq!(peek.peek(9).unwrap(), 9.0);
        handle.close();
    }
}
