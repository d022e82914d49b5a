//! Readable sample sources.
//!
//! A [`DataHandle`] is a reference-counted (`Arc`) and open-counted view on a
//! one-dimensional stream of interleaved samples. The concrete behaviour
//! lives in a [`DataSource`]: memory buffers, WAV files, or decorators
//! wrapping another handle (reverse, cut, insert, loop, scale, xinfo).
//! Setups carry string [`Xinfos`] next to the numeric format.
//!
//! Protocol misuse (closing an unopened handle, reading or querying the
//! format while closed) panics. Recoverable failures are [`Error`]s.

mod cut;
mod insert;
mod looped;
mod memory;
mod peek;
mod reverse;
mod scale;
#[cfg(feature = "wav")]
mod wave_file;
pub mod xinfo;

pub use cut::CutHandle;
pub use insert::InsertHandle;
pub use looped::LoopHandle;
pub use memory::MemoryHandle;
pub use peek::{PeekBuffer, PeekDirection, PEEK_BUFFER_SIZE};
pub use reverse::ReverseHandle;
pub use scale::ScaleHandle;
#[cfg(feature = "wav")]
pub use wave_file::WaveFileHandle;
pub use xinfo::{XinfoHandle, Xinfos};

use crate::error::{Error, OpenReason, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Format of an open handle.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleSetup {
    /// Total number of values (frames * channels).
    pub n_values: i64,
    pub n_channels: u32,
    pub bit_depth: u32,
    pub mix_freq: f32,
    pub osc_freq: f32,
    /// The source is expensive to re-read (e.g. remote or decoded), so a
    /// cache over it should hold on to its nodes longer.
    pub needs_cache: bool,
    /// Free-form metadata; see [`xinfo`] for the keys handles interpret.
    pub xinfos: Xinfos,
}

impl HandleSetup {
    /// Setup for an interleaved stream with the common defaults.
    pub fn new(n_values: i64, n_channels: u32) -> Self {
        Self {
            n_values,
            n_channels,
            bit_depth: 32,
            mix_freq: 44100.0,
            osc_freq: 440.0,
            needs_cache: false,
            xinfos: Xinfos::new(),
        }
    }

    /// Number of whole frames.
    pub fn n_frames(&self) -> i64 {
        self.n_values / self.n_channels.max(1) as i64
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.n_values < 0 {
            return Err(format!("negative length {}", self.n_values));
        }
        if self.n_channels == 0 {
            return Err("zero channels".to_string());
        }
        if self.bit_depth == 0 {
            return Err("zero bit depth".to_string());
        }
        let positive = |freq: f32| freq.is_finite() && freq > 0.0;
        if !positive(self.mix_freq) || !positive(self.osc_freq) {
            return Err(format!(
                "invalid frequencies (mix {}, osc {})",
                self.mix_freq, self.osc_freq
            ));
        }
        Ok(())
    }
}

/// Behaviour behind a [`DataHandle`].
///
/// `open` runs on the first open of the owning handle and `close` on the
/// last close. `read` is only called while open, with a non-empty request
/// already clamped to the handle's length.
pub trait DataSource: Send + Sync {
    /// Prepare the source and report its format.
    fn open(&self, name: &str) -> Result<HandleSetup>;

    /// Fill `values` starting at `offset`, returning how many were written.
    fn read(&self, setup: &HandleSetup, offset: i64, values: &mut [f32]) -> Result<usize>;

    /// Release whatever `open` acquired.
    fn close(&self) {}

    /// The handle this source wraps, if it is a decorator.
    fn source(&self) -> Option<&Arc<DataHandle>> {
        None
    }

    /// Length of the output tail a renderer keeps producing after the last
    /// value (e.g. filter ring-out), zero for plain sources.
    fn state_length(&self) -> i64 {
        self.source().map_or(0, |src| src.state_length())
    }
}

struct HandleState {
    open_count: u32,
    setup: Option<HandleSetup>,
}

/// Reference-counted, open-counted sample source.
pub struct DataHandle {
    name: String,
    source: Box<dyn DataSource>,
    state: Mutex<HandleState>,
}

impl DataHandle {
    /// Wrap a source into a new, closed handle.
    pub fn new(name: impl Into<String>, source: impl DataSource + 'static) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            source: Box::new(source),
            state: Mutex::new(HandleState {
                open_count: 0,
                setup: None,
            }),
        })
    }

    /// Name for diagnostics. Decorators append to their source's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live references.
    pub fn ref_count(this: &Arc<Self>) -> usize {
        Arc::strong_count(this)
    }

    /// Open the handle. The first open queries the source for its format.
    pub fn open(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.open_count == 0 {
            let mut setup = self.source.open(&self.name)?;
            if let Some(freq) = setup.xinfos.get_float(xinfo::OSC_FREQ) {
                if freq.is_finite() && freq > 0.0 {
                    setup.osc_freq = freq;
                }
            }
            if let Err(reason) = setup.check() {
                self.source.close();
                tracing::debug!("rejecting \"{}\": {}", self.name, reason);
                return Err(Error::open(&self.name, OpenReason::FormatInvalid(reason)));
            }
            tracing::debug!(
                "opened \"{}\": {} values, {} channels",
                self.name,
                setup.n_values,
                setup.n_channels
            );
            state.setup = Some(setup);
        }
        state.open_count += 1;
        Ok(())
    }

    /// Close the handle. The last close releases the source and its format.
    ///
    /// # Panics
    /// If the handle is not open.
    pub fn close(&self) {
        let mut state = self.state.lock();
        assert!(
            state.open_count > 0,
            "close on unopened handle \"{}\"",
            self.name
        );
        state.open_count -= 1;
        if state.open_count == 0 {
            self.source.close();
            state.setup = None;
            tracing::debug!("closed \"{}\"", self.name);
        }
    }

    /// Current open count.
    pub fn open_count(&self) -> u32 {
        self.state.lock().open_count
    }

    /// Whether the handle is open.
    pub fn is_open(&self) -> bool {
        self.open_count() > 0
    }

    /// Format of the open handle, `None` while closed.
    pub fn try_setup(&self) -> Option<HandleSetup> {
        self.state.lock().setup.clone()
    }

    /// Format of the open handle.
    ///
    /// # Panics
    /// If the handle is not open.
    pub fn setup(&self) -> HandleSetup {
        match self.try_setup() {
            Some(setup) => setup,
            None => panic!("format access on unopened handle \"{}\"", self.name),
        }
    }

    /// Read up to `values.len()` values starting at `offset`.
    ///
    /// The request is clamped to the end of the handle. Short reads are
    /// allowed; an empty request returns 0.
    ///
    /// # Panics
    /// If the handle is not open.
    pub fn read(&self, offset: i64, values: &mut [f32]) -> Result<usize> {
        if values.is_empty() {
            return Ok(0);
        }
        let setup = self.setup();
        if offset < 0 || offset >= setup.n_values {
            return Err(Error::OutOfRange {
                name: self.name.clone(),
                offset,
                length: setup.n_values,
            });
        }
        let n = (values.len() as i64).min(setup.n_values - offset) as usize;
        self.source.read(&setup, offset, &mut values[..n])
    }

    /// Read until `values` is full or the end of the handle is reached.
    pub fn read_exact(&self, offset: i64, values: &mut [f32]) -> Result<usize> {
        let n = (values.len() as i64).min(self.length().saturating_sub(offset).max(0)) as usize;
        let mut done = 0;
        while done < n {
            let got = self.read(offset + done as i64, &mut values[done..n])?;
            if got == 0 {
                break;
            }
            done += got;
        }
        Ok(done)
    }

    /// Total number of values.
    pub fn length(&self) -> i64 {
        self.setup().n_values
    }

    pub fn n_channels(&self) -> u32 {
        self.setup().n_channels
    }

    pub fn bit_depth(&self) -> u32 {
        self.setup().bit_depth
    }

    pub fn mix_freq(&self) -> f32 {
        self.setup().mix_freq
    }

    pub fn osc_freq(&self) -> f32 {
        self.setup().osc_freq
    }

    /// Metadata of the open handle.
    pub fn xinfos(&self) -> Xinfos {
        self.setup().xinfos
    }

    /// Playback volume from the `volume` xinfo. Missing or out of `(0, 1]`
    /// means unity.
    pub fn volume(&self) -> f32 {
        match self.setup().xinfos.get_float(xinfo::VOLUME) {
            Some(volume) if volume > 0.0 && volume <= 1.0 => volume,
            _ => 1.0,
        }
    }

    /// Fine tuning in cents from the `fine-tune` xinfo, 0 if missing.
    pub fn fine_tune(&self) -> f32 {
        self.setup()
            .xinfos
            .get_float(xinfo::FINE_TUNE)
            .filter(|cents| cents.is_finite())
            .unwrap_or(0.0)
    }

    /// Persistency hint for caches layered on this handle.
    pub fn needs_cache(&self) -> bool {
        self.setup().needs_cache
    }

    /// The handle this one decorates, if any.
    pub fn source_handle(&self) -> Option<Arc<DataHandle>> {
        self.source.source().cloned()
    }

    /// Ring-out length in values reported along the decorator chain.
    pub fn state_length(&self) -> i64 {
        self.source.state_length()
    }
}

impl Drop for DataHandle {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.open_count > 0 {
            tracing::warn!(
                "handle \"{}\" dropped while open ({} opens)",
                self.name,
                state.open_count
            );
            self.source.close();
        }
    }
}

impl std::fmt::Debug for DataHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DataHandle")
            .field("name", &self.name)
            .field("open_count", &state.open_count)
            .field("setup", &state.setup)
            .finish()
    }
}

/// Read `values.len()` values of `src` at `offset` in a loop, failing on the
/// first error or premature end.
pub(crate) fn read_full(src: &DataHandle, offset: i64, values: &mut [f32]) -> Result<()> {
    let n = src.read_exact(offset, values)?;
    if n < values.len() {
        return Err(Error::read(
            src.name(),
            offset + n as i64,
            "unexpected end of data",
        ));
    }
    Ok(())
}
