//! Precomputed wave segments around discontinuities.

use crate::cache::{DataCache, LoadRequest, NodeRef};
use std::sync::Arc;
use wavestream_core::PaddedBuffer;

/// Which part of the wave a segment covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Start of the wave, including the silence before it.
    Head,
    /// Transition from the straight run into the loop.
    Enter,
    /// The loop wrap-around, repeated every loop period.
    Wrap,
    /// The ping-pong turn at the loop start.
    PingPongWrap,
    /// Transition from the loop back to a straight run.
    Leave,
    /// End of the wave, including the silence after it.
    Tail,
}

/// Rendered frames `first..=last` plus `padding` frames on each side.
///
/// Head, enter, leave and tail are placed in wave frames; the periodic wrap
/// segments in folded loop coordinates.
pub(crate) struct Segment {
    pub(crate) kind: SegmentKind,
    pub(crate) first: i64,
    pub(crate) last: i64,
    pub(crate) data: Arc<PaddedBuffer>,
}

impl Segment {
    /// Render frames `first..=last` with `map` giving the source frame of
    /// each position, or `None` for silence.
    pub(crate) fn render(
        kind: SegmentKind,
        first: i64,
        last: i64,
        padding: i64,
        reader: &mut FrameReader<'_>,
        map: impl Fn(i64) -> Option<i64>,
    ) -> Self {
        let n_channels = reader.n_channels;
        let n_frames = (last - first + 1) as usize;
        let mut buffer = PaddedBuffer::zeroed(n_frames * n_channels, padding as usize * n_channels);
        for (frame, out) in (first - padding..=last + padding)
            .zip(buffer.raw_mut().chunks_exact_mut(n_channels))
        {
            if let Some(src) = map(frame) {
                reader.frame(src, out);
            }
        }
        Self {
            kind,
            first,
            last,
            data: Arc::new(buffer),
        }
    }

    pub(crate) fn contains(&self, frame: i64) -> bool {
        (self.first..=self.last).contains(&frame)
    }

    pub(crate) fn n_frames(&self) -> i64 {
        self.last - self.first + 1
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("kind", &self.kind)
            .field("first", &self.first)
            .field("last", &self.last)
            .finish()
    }
}

/// Reads source frames through a cache, holding on to the last node.
pub(crate) struct FrameReader<'a> {
    cache: &'a Arc<DataCache>,
    n_channels: usize,
    node: Option<NodeRef>,
}

impl<'a> FrameReader<'a> {
    pub(crate) fn new(cache: &'a Arc<DataCache>, n_channels: usize) -> Self {
        Self {
            cache,
            n_channels,
            node: None,
        }
    }

    /// Value at handle offset `offset`.
    pub(crate) fn value(&mut self, offset: i64) -> f32 {
        let node_size = self.cache.node_size() as i64;
        let resident = self
            .node
            .as_ref()
            .is_some_and(|node| offset >= node.offset() && offset < node.offset() + node_size);
        if !resident {
            self.node = None;
            self.node = self.cache.ref_node(offset, LoadRequest::DemandLoad);
        }
        match &self.node {
            Some(node) => node.value((offset - node.offset()) as isize),
            None => 0.0,
        }
    }

    /// Copy source frame `src` into `out`.
    pub(crate) fn frame(&mut self, src: i64, out: &mut [f32]) {
        let base = src * self.n_channels as i64;
        for (channel, value) in out.iter_mut().enumerate() {
            *value = self.value(base + channel as i64);
        }
    }
}
