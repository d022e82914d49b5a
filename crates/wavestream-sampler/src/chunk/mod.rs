//! Looped, padded wave playback over a data cache.
//!
//! A [`WaveChunk`] presents a cached handle as a wave with an optional loop
//! applied. Renderers ask for [`WaveBlock`]s at arbitrary offsets in either
//! direction; every block is a contiguous run they can read, including a
//! few frames of padding past both ends, without further lookups.
//!
//! Straight runs are served directly from cache nodes. Around
//! discontinuities (the start and end of the wave, the loop boundaries and
//! the loop wrap-around) the chunk renders small segments at open time:
//!
//! ```text
//!  silence |head| straight |enter| wrap  wrap  wrap |leave| straight |tail| silence
//! ```

mod block;
mod layout;
mod loops;
mod segment;

pub use block::{PlayDirection, WaveBlock};
pub use loops::{LoopSpec, LoopType, ParseLoopTypeError, ResolvedLoop};
pub use segment::SegmentKind;

use crate::cache::DataCache;
use crate::error::{Error, Result};
use arc_swap::ArcSwapOption;
use layout::{ChunkLayout, Tuning};
use loops::{Timeline, MAX_WAVE_VALUES};
use parking_lot::Mutex;
use segment::FrameReader;
use std::ops::Range;
use std::sync::Arc;

/// A playable wave over a [`DataCache`].
pub struct WaveChunk {
    cache: Arc<DataCache>,
    requested: LoopSpec,
    open_count: Mutex<u32>,
    layout: ArcSwapOption<ChunkLayout>,
}

impl WaveChunk {
    /// Create a closed chunk playing `cache` with `loop_spec` applied.
    pub fn new(cache: Arc<DataCache>, loop_spec: LoopSpec) -> Self {
        Self {
            cache,
            requested: loop_spec,
            open_count: Mutex::new(0),
            layout: ArcSwapOption::empty(),
        }
    }

    pub fn cache(&self) -> &Arc<DataCache> {
        &self.cache
    }

    /// Loop as requested at creation.
    pub fn loop_spec(&self) -> &LoopSpec {
        &self.requested
    }

    /// Open the chunk. The first open validates the handle, opens the cache
    /// and renders the segments.
    pub fn open(&self) -> Result<()> {
        let mut open_count = self.open_count.lock();
        if *open_count == 0 {
            let layout = self.build_layout()?;
            tracing::debug!(
                "opened wave chunk over \"{}\": {} frames, {:?}",
                self.cache.handle().name(),
                layout.timeline.wave_length(),
                layout.timeline.looping()
            );
            self.layout.store(Some(Arc::new(layout)));
        }
        *open_count += 1;
        Ok(())
    }

    fn build_layout(&self) -> Result<ChunkLayout> {
        let handle = self.cache.handle();
        handle.open()?;
        let layout = self.layout_for_open_handle();
        handle.close();
        layout
    }

    fn layout_for_open_handle(&self) -> Result<ChunkLayout> {
        let handle = self.cache.handle();
        let setup = handle.setup();
        let n_channels = i64::from(setup.n_channels);
        if setup.n_values < n_channels {
            return Err(Error::FileEmpty(handle.name().to_string()));
        }
        if setup.n_values > MAX_WAVE_VALUES {
            return Err(Error::TooLong {
                name: handle.name().to_string(),
                n_values: setup.n_values,
            });
        }

        let config = self.cache.manager().config();
        let required = config.chunk_cache_padding(setup.n_channels as usize);
        if self.cache.padding() < required {
            return Err(Error::InsufficientPadding {
                name: handle.name().to_string(),
                padding: self.cache.padding(),
                required,
            });
        }

        let timeline = Timeline::resolve(&self.requested, setup.n_frames(), n_channels);
        self.cache.open();
        Ok(ChunkLayout::build(
            &self.cache,
            timeline,
            n_channels,
            config.wave_chunk_padding as i64,
            config.big_pad_frames() as i64,
            Tuning {
                mix_freq: setup.mix_freq,
                osc_freq: setup.osc_freq,
                volume: handle.volume(),
                fine_tune: handle.fine_tune(),
            },
        ))
    }

    /// Close the chunk. The last close drops the segments and closes the
    /// cache; blocks still held stay readable.
    ///
    /// # Panics
    /// If the chunk is not open.
    pub fn close(&self) {
        let mut open_count = self.open_count.lock();
        assert!(
            *open_count > 0,
            "close on unopened wave chunk over \"{}\"",
            self.cache.handle().name()
        );
        *open_count -= 1;
        if *open_count == 0 {
            self.layout.store(None);
            self.cache.close();
        }
    }

    pub fn is_open(&self) -> bool {
        *self.open_count.lock() > 0
    }

    fn layout(&self) -> Arc<ChunkLayout> {
        match self.layout.load_full() {
            Some(layout) => layout,
            None => panic!(
                "access to unopened wave chunk over \"{}\"",
                self.cache.handle().name()
            ),
        }
    }

    /// Block covering `offset` (in values), aligned down to a frame
    /// boundary, that continues in `dir`.
    ///
    /// # Panics
    /// If the chunk is not open.
    pub fn use_block(&self, offset: i64, dir: PlayDirection) -> WaveBlock {
        self.layout().block(&self.cache, offset, dir)
    }

    /// Hand a block back. Same as dropping it.
    pub fn unuse_block(&self, block: WaveBlock) {
        drop(block);
    }

    /// Render `n_values` values of the wave starting at `offset` by looking
    /// up every frame individually.
    pub fn debug_block(&self, offset: i64, n_values: usize) -> Vec<f32> {
        let layout = self.layout();
        let ch = layout.n_channels;
        let mut reader = FrameReader::new(&self.cache, ch as usize);
        (offset..offset + n_values as i64)
            .map(|pos| {
                let v = pos.div_euclid(ch);
                let channel = pos.rem_euclid(ch);
                layout
                    .timeline
                    .source_frame(v)
                    .map_or(0.0, |src| reader.value(src * ch + channel))
            })
            .collect()
    }

    pub fn n_channels(&self) -> u32 {
        self.layout().n_channels as u32
    }

    /// Source length in values, whole frames only.
    pub fn length(&self) -> i64 {
        let layout = self.layout();
        layout.timeline.length() * layout.n_channels
    }

    /// Wave length in values with the loop applied.
    pub fn wave_length(&self) -> i64 {
        let layout = self.layout();
        layout.timeline.wave_length() * layout.n_channels
    }

    /// Loop in effect, in frames; degenerate requests resolve to no loop.
    pub fn resolved_loop(&self) -> ResolvedLoop {
        *self.layout().timeline.looping()
    }

    /// True if the wave leaves its loop playing the source backwards.
    pub fn ends_backwards(&self) -> bool {
        self.layout().timeline.ends_backwards()
    }

    pub fn mix_freq(&self) -> f32 {
        self.layout().tuning.mix_freq
    }

    pub fn osc_freq(&self) -> f32 {
        self.layout().tuning.osc_freq
    }

    /// Playback gain from the handle's `volume` xinfo, 1.0 without one.
    pub fn volume(&self) -> f32 {
        self.layout().tuning.volume
    }

    /// Tuning offset in cents from the handle's `fine-tune` xinfo.
    pub fn fine_tune(&self) -> f32 {
        self.layout().tuning.fine_tune
    }

    /// Frames of padding readable around every block.
    pub fn padding(&self) -> usize {
        self.layout().padding as usize
    }

    /// Value range a segment covers, padding excluded. Wrap segments are
    /// given relative to the loop origin.
    pub fn segment(&self, kind: SegmentKind) -> Option<Range<i64>> {
        let layout = self.layout();
        let ch = layout.n_channels;
        layout
            .segment(kind)
            .map(|segment| segment.first * ch..(segment.last + 1) * ch)
    }
}

impl Drop for WaveChunk {
    fn drop(&mut self) {
        let open_count = *self.open_count.get_mut();
        if open_count > 0 {
            tracing::warn!(
                "wave chunk over \"{}\" dropped while open",
                self.cache.handle().name()
            );
            self.layout.store(None);
            for _ in 0..open_count {
                self.cache.close();
            }
        }
    }
}

impl std::fmt::Debug for WaveChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveChunk")
            .field("handle", &self.cache.handle().name())
            .field("loop", &self.requested)
            .field("open_count", &*self.open_count.lock())
            .finish()
    }
}
