//! Segment layout of an open wave chunk and block classification.

use super::block::{BlockData, PlayDirection, WaveBlock};
use super::loops::{LoopType, Timeline};
use super::segment::{FrameReader, Segment, SegmentKind};
use crate::cache::{DataCache, LoadRequest};
use std::sync::Arc;

/// Silent blocks never span more values than this.
const SILENCE_VALUES: i64 = 4096;

/// Where a requested frame falls.
enum Zone<'a> {
    Silence { frames: i64 },
    Segment { segment: &'a Segment, rel: i64 },
    /// Straight run of source frames between wave frames `lo..=hi`;
    /// `reversed` runs walk the source backwards.
    Linear { src: i64, reversed: bool, lo: i64, hi: i64 },
}

/// Playback parameters a chunk takes from its handle at open time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Tuning {
    pub(crate) mix_freq: f32,
    pub(crate) osc_freq: f32,
    pub(crate) volume: f32,
    pub(crate) fine_tune: f32,
}

/// Everything a wave chunk derives at open time.
#[derive(Debug)]
pub(crate) struct ChunkLayout {
    pub(crate) n_channels: i64,
    pub(crate) padding: i64,
    pub(crate) timeline: Timeline,
    pub(crate) tuning: Tuning,
    head: Segment,
    tail: Segment,
    looped: Option<LoopSegments>,
}

#[derive(Debug)]
struct LoopSegments {
    enter: Segment,
    leave: Segment,
    wrap: Segment,
    ppwrap: Option<Segment>,
}

impl ChunkLayout {
    /// Lay out segments for `timeline` and render them from `cache`.
    pub(crate) fn build(
        cache: &Arc<DataCache>,
        timeline: Timeline,
        n_channels: i64,
        padding: i64,
        big_pad: i64,
        tuning: Tuning,
    ) -> Self {
        let p = padding;
        let wave_length = timeline.wave_length();
        let mut reader = FrameReader::new(cache, n_channels as usize);
        let truth = |v: i64| timeline.source_frame(v);

        let head = Segment::render(SegmentKind::Head, -p, big_pad, p, &mut reader, truth);
        let tail = Segment::render(
            SegmentKind::Tail,
            wave_length - 1 - big_pad,
            wave_length - 1 + p,
            p,
            &mut reader,
            truth,
        );

        let looped = timeline.looping().is_looping().then(|| {
            let fold = |u: i64| Some(timeline.fold(u));
            let period = timeline.period();
            let width = timeline.width();
            let large = width >= big_pad + 2 * p + 2;

            let (wrap, ppwrap) = match (timeline.looping().loop_type, large) {
                (LoopType::PingPong, true) => (
                    (period - p, period + big_pad),
                    Some((width - p, width + big_pad)),
                ),
                (_, true) => ((period - p, period + big_pad), None),
                (_, false) => ((0, period - 1 + big_pad), None),
            };
            let span = (wrap.1 - wrap.0).max(ppwrap.map_or(0, |(lo, hi)| hi - lo)) + p;

            let first = timeline.looping().first;
            let last = timeline.looping().last;
            let end = timeline.loop_end();
            let enter = (last - p, (last + 1 + big_pad).max(first + span - 1));
            let leave = (end - span, end + big_pad);

            LoopSegments {
                enter: Segment::render(SegmentKind::Enter, enter.0, enter.1, p, &mut reader, truth),
                leave: Segment::render(SegmentKind::Leave, leave.0, leave.1, p, &mut reader, truth),
                wrap: Segment::render(SegmentKind::Wrap, wrap.0, wrap.1, p, &mut reader, fold),
                ppwrap: ppwrap.map(|(lo, hi)| {
                    Segment::render(SegmentKind::PingPongWrap, lo, hi, p, &mut reader, fold)
                }),
            }
        });

        Self {
            n_channels,
            padding,
            timeline,
            tuning,
            head,
            tail,
            looped,
        }
    }

    pub(crate) fn segment(&self, kind: SegmentKind) -> Option<&Segment> {
        match kind {
            SegmentKind::Head => Some(&self.head),
            SegmentKind::Tail => Some(&self.tail),
            SegmentKind::Enter => self.looped.as_ref().map(|l| &l.enter),
            SegmentKind::Leave => self.looped.as_ref().map(|l| &l.leave),
            SegmentKind::Wrap => self.looped.as_ref().map(|l| &l.wrap),
            SegmentKind::PingPongWrap => self.looped.as_ref().and_then(|l| l.ppwrap.as_ref()),
        }
    }

    fn classify(&self, v: i64) -> Zone<'_> {
        let head = &self.head;
        let tail = &self.tail;
        if v < head.first {
            return Zone::Silence {
                frames: head.first - v,
            };
        }
        if v > tail.last {
            return Zone::Silence {
                frames: v - tail.last,
            };
        }
        if head.contains(v) {
            return Zone::Segment {
                segment: head,
                rel: v - head.first,
            };
        }

        let Some(looped) = &self.looped else {
            if tail.contains(v) {
                return Zone::Segment {
                    segment: tail,
                    rel: v - tail.first,
                };
            }
            return Zone::Linear {
                src: v,
                reversed: false,
                lo: head.last + 1,
                hi: tail.first - 1,
            };
        };

        if v < looped.enter.first {
            return Zone::Linear {
                src: v,
                reversed: false,
                lo: head.last + 1,
                hi: looped.enter.first - 1,
            };
        }
        for segment in [&looped.enter, tail] {
            if segment.contains(v) {
                return Zone::Segment {
                    segment,
                    rel: v - segment.first,
                };
            }
        }
        if v > looped.leave.last {
            return Zone::Linear {
                src: self.timeline.source_frame(v).unwrap_or_default(),
                reversed: self.timeline.ends_backwards(),
                lo: looped.leave.last + 1,
                hi: tail.first - 1,
            };
        }
        if looped.leave.contains(v) {
            return Zone::Segment {
                segment: &looped.leave,
                rel: v - looped.leave.first,
            };
        }

        self.classify_loop(looped, v)
    }

    /// Frames strictly between the enter and leave segments.
    fn classify_loop<'a>(&'a self, looped: &'a LoopSegments, v: i64) -> Zone<'a> {
        let period = self.timeline.period();
        let phase = (v - self.timeline.origin()).rem_euclid(period);
        for segment in std::iter::once(&looped.wrap).chain(looped.ppwrap.as_ref()) {
            for u in [phase, phase + period] {
                if segment.contains(u) {
                    return Zone::Segment {
                        segment,
                        rel: u - segment.first,
                    };
                }
            }
        }

        let first = self.timeline.looping().first;
        let last = self.timeline.looping().last;
        let wrap = &looped.wrap;
        let (src, reversed, gap_lo, gap_hi) = match &looped.ppwrap {
            None => (first + phase, false, wrap.last - period + 1, wrap.first - 1),
            Some(ppwrap) if phase < ppwrap.first => (
                last - phase,
                true,
                wrap.last - period + 1,
                ppwrap.first - 1,
            ),
            Some(ppwrap) => (
                first + phase - self.timeline.width(),
                false,
                ppwrap.last + 1,
                wrap.first - 1,
            ),
        };
        Zone::Linear {
            src,
            reversed,
            lo: v - (phase - gap_lo),
            hi: v + (gap_hi - phase),
        }
    }

    /// Block starting at frame-aligned `offset` (in values).
    pub(crate) fn block(&self, cache: &Arc<DataCache>, offset: i64, dir: PlayDirection) -> WaveBlock {
        let ch = self.n_channels;
        let v = offset.div_euclid(ch);
        let play_stride = dir.sign() * ch;

        let (frames, start, stride, data) = match self.classify(v) {
            Zone::Silence { frames } => {
                let frames = frames.min((SILENCE_VALUES / ch).max(1));
                (frames, 0, play_stride, BlockData::Silence)
            }
            Zone::Segment { segment, rel } => {
                let frames = if dir.is_forward() {
                    segment.n_frames() - rel
                } else {
                    rel + 1
                };
                let data = BlockData::Segment(segment.data.clone());
                (frames, rel * ch, play_stride, data)
            }
            Zone::Linear {
                src,
                reversed,
                lo,
                hi,
            } => {
                let zone_frames = if dir.is_forward() { hi - v + 1 } else { v - lo + 1 };
                let backward = reversed != dir.is_reverse();
                let Some(node) = cache.ref_node(src * ch, LoadRequest::DemandLoad) else {
                    panic!("demand load of source frame {} returned no node", src);
                };
                let rel = src * ch - node.offset();
                let node_size = cache.node_size() as i64;
                let pad = cache.padding() as i64;
                let p = self.padding;
                // keep p frames of context on both sides inside the node
                let node_frames = if backward {
                    (rel + pad - p * ch).div_euclid(ch) + 1
                } else {
                    (node_size + pad - (p + 1) * ch - rel).div_euclid(ch) + 1
                };
                let frames = zone_frames.min(node_frames).max(1);
                let stride = if backward { -ch } else { ch };
                (frames, rel, stride, BlockData::Node(node))
            }
        };

        WaveBlock {
            offset: v * ch,
            play_dir: dir,
            length: (frames * ch) as usize,
            dirstride: stride as isize,
            next_offset: (v + dir.sign() * frames) * ch,
            start: start as isize,
            data,
        }
    }
}
