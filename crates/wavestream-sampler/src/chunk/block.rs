//! Blocks handed to the renderer.

use crate::cache::NodeRef;
use std::sync::Arc;
use wavestream_core::PaddedBuffer;

/// Direction a renderer walks the wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayDirection {
    #[default]
    Forward,
    Reverse,
}

impl PlayDirection {
    pub fn is_forward(&self) -> bool {
        matches!(self, Self::Forward)
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self, Self::Reverse)
    }

    /// +1 forward, -1 reverse.
    pub fn sign(&self) -> i64 {
        if self.is_reverse() {
            -1
        } else {
            1
        }
    }
}

pub(crate) enum BlockData {
    Silence,
    Segment(Arc<PaddedBuffer>),
    Node(NodeRef),
}

/// A run of frames the renderer can read without further lookups.
///
/// Frame `n` along the play direction starts at `n * dirstride`. Values up
/// to the wave chunk padding (in frames) beyond either end of the run are
/// readable and hold the neighbouring samples of the wave.
pub struct WaveBlock {
    pub(crate) offset: i64,
    pub(crate) play_dir: PlayDirection,
    pub(crate) length: usize,
    pub(crate) dirstride: isize,
    pub(crate) next_offset: i64,
    pub(crate) start: isize,
    pub(crate) data: BlockData,
}

impl WaveBlock {
    /// Frame-aligned wave offset (in values) of the first frame.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn play_dir(&self) -> PlayDirection {
        self.play_dir
    }

    /// Number of values in the run.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of frames in the run.
    pub fn frames(&self) -> usize {
        self.length / self.dirstride.unsigned_abs()
    }

    /// Distance in values between consecutive frames, negative when the
    /// data is walked backwards.
    pub fn dirstride(&self) -> isize {
        self.dirstride
    }

    /// Offset to request next when continuing in the same direction.
    pub fn next_offset(&self) -> i64 {
        self.next_offset
    }

    /// True if the block lies entirely outside the wave.
    pub fn is_silent(&self) -> bool {
        matches!(self.data, BlockData::Silence)
    }

    /// Value at `rel` values from the block start.
    pub fn value(&self, rel: isize) -> f32 {
        let index = self.start + rel;
        match &self.data {
            BlockData::Silence => 0.0,
            BlockData::Segment(buffer) => buffer[index],
            BlockData::Node(node) => node.value(index),
        }
    }

    /// Sample of `channel` in frame `n` along the play direction. `n` may
    /// be negative or past the run to reach the padding.
    pub fn sample(&self, n: isize, channel: usize) -> f32 {
        self.value(n * self.dirstride + channel as isize)
    }

    /// Copy the run into `out` in play order, interleaved.
    pub fn copy_to(&self, out: &mut [f32]) -> usize {
        let channels = self.dirstride.unsigned_abs();
        let n = out.len().min(self.length) / channels * channels;
        for (i, value) in out[..n].iter_mut().enumerate() {
            *value = self.sample((i / channels) as isize, i % channels);
        }
        n
    }
}

impl std::fmt::Debug for WaveBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.data {
            BlockData::Silence => "silence",
            BlockData::Segment(_) => "segment",
            BlockData::Node(_) => "node",
        };
        f.debug_struct("WaveBlock")
            .field("offset", &self.offset)
            .field("play_dir", &self.play_dir)
            .field("length", &self.length)
            .field("dirstride", &self.dirstride)
            .field("next_offset", &self.next_offset)
            .field("source", &source)
            .finish()
    }
}
