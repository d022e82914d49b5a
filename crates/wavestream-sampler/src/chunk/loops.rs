//! Loop descriptions and the virtual wave timeline they produce.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a loop region is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopType {
    #[default]
    None,
    /// Restart at the loop start after the loop end.
    Jump,
    /// Alternate between playing the loop region forwards and backwards.
    PingPong,
}

impl LoopType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Jump => "jump",
            Self::PingPong => "pingpong",
        }
    }
}

impl fmt::Display for LoopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown loop type \"{0}\"")]
pub struct ParseLoopTypeError(pub String);

impl FromStr for LoopType {
    type Err = ParseLoopTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "jump" => Ok(Self::Jump),
            "pingpong" | "ping-pong" | "ping_pong" => Ok(Self::PingPong),
            _ => Err(ParseLoopTypeError(s.to_string())),
        }
    }
}

/// Requested loop, in values of the underlying handle.
///
/// `first` and `last` are inclusive. A request that does not fit the handle
/// is played without looping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSpec {
    pub loop_type: LoopType,
    pub first: i64,
    pub last: i64,
    pub count: u32,
}

impl LoopSpec {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn jump(first: i64, last: i64, count: u32) -> Self {
        Self {
            loop_type: LoopType::Jump,
            first,
            last,
            count,
        }
    }

    pub fn ping_pong(first: i64, last: i64, count: u32) -> Self {
        Self {
            loop_type: LoopType::PingPong,
            first,
            last,
            count,
        }
    }
}

/// Loop after validation against a handle, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLoop {
    pub loop_type: LoopType,
    pub first: i64,
    pub last: i64,
    pub count: i64,
}

impl ResolvedLoop {
    const NONE: Self = Self {
        loop_type: LoopType::None,
        first: 0,
        last: 0,
        count: 0,
    };

    pub fn is_looping(&self) -> bool {
        self.loop_type != LoopType::None
    }
}

/// Largest wave, in values, a chunk addresses; leaves headroom for
/// padding arithmetic around both ends.
pub(crate) const MAX_WAVE_VALUES: i64 = i64::MAX / 4;

/// Mapping from wave frames to source frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Timeline {
    /// Source length in frames.
    length: i64,
    looping: ResolvedLoop,
}

impl Timeline {
    /// Resolve `spec` against a source of `n_frames` frames with `n_channels`
    /// interleaved channels.
    pub(crate) fn resolve(spec: &LoopSpec, n_frames: i64, n_channels: i64) -> Self {
        let first = spec.first.div_euclid(n_channels);
        let last = spec.last.div_euclid(n_channels);
        let mut count = i64::from(spec.count);

        let valid = spec.loop_type != LoopType::None
            && count >= 1
            && spec.first >= 0
            && first < last
            && last < n_frames;
        if !valid {
            if spec.loop_type != LoopType::None {
                tracing::debug!(
                    "ignoring {} loop {}..={} x{} on {} frames",
                    spec.loop_type,
                    spec.first,
                    spec.last,
                    spec.count,
                    n_frames
                );
            }
            return Self {
                length: n_frames,
                looping: ResolvedLoop::NONE,
            };
        }

        // keep the wave length addressable in values
        let width = match spec.loop_type {
            LoopType::Jump => last - first + 1,
            _ => last - first,
        };
        let max_frames = MAX_WAVE_VALUES / n_channels;
        count = count.min((max_frames - n_frames) / width);
        if count < 1 {
            return Self {
                length: n_frames,
                looping: ResolvedLoop::NONE,
            };
        }

        Self {
            length: n_frames,
            looping: ResolvedLoop {
                loop_type: spec.loop_type,
                first,
                last,
                count,
            },
        }
    }

    pub(crate) fn length(&self) -> i64 {
        self.length
    }

    pub(crate) fn looping(&self) -> &ResolvedLoop {
        &self.looping
    }

    fn first(&self) -> i64 {
        self.looping.first
    }

    fn last(&self) -> i64 {
        self.looping.last
    }

    /// Frames in one traversal of the loop region.
    pub(crate) fn width(&self) -> i64 {
        match self.looping.loop_type {
            LoopType::None => 0,
            LoopType::Jump => self.last() - self.first() + 1,
            LoopType::PingPong => self.last() - self.first(),
        }
    }

    /// Frames after which the folded loop pattern repeats.
    pub(crate) fn period(&self) -> i64 {
        match self.looping.loop_type {
            LoopType::PingPong => 2 * self.width(),
            _ => self.width(),
        }
    }

    /// Wave frame at which folded coordinate 0 sits.
    pub(crate) fn origin(&self) -> i64 {
        match self.looping.loop_type {
            LoopType::Jump => self.last() + 1,
            _ => self.last(),
        }
    }

    /// Last wave frame still inside the looped region.
    pub(crate) fn loop_end(&self) -> i64 {
        self.last() + self.looping.count * self.width()
    }

    /// A ping-pong loop with an odd count leaves the region backwards.
    pub(crate) fn ends_backwards(&self) -> bool {
        self.looping.loop_type == LoopType::PingPong && self.looping.count % 2 == 1
    }

    /// Length of the wave in frames.
    pub(crate) fn wave_length(&self) -> i64 {
        let count = self.looping.count;
        match self.looping.loop_type {
            LoopType::None => self.length,
            LoopType::Jump => self.length + count * self.width(),
            LoopType::PingPong if count % 2 == 0 => self.length + count * self.width(),
            LoopType::PingPong => self.last() + 1 + count * self.width() + self.first(),
        }
    }

    /// Source frame for folded coordinate `u` (see [`Timeline::origin`]).
    ///
    /// Valid for wave frames from the loop start through the loop end.
    pub(crate) fn fold(&self, u: i64) -> i64 {
        match self.looping.loop_type {
            LoopType::PingPong => {
                let width = self.width();
                let phase = u.rem_euclid(2 * width);
                if phase <= width {
                    self.last() - phase
                } else {
                    self.first() + (phase - width)
                }
            }
            _ => self.first() + u.rem_euclid(self.width()),
        }
    }

    /// Source frame played at wave frame `v`, `None` outside the wave.
    pub(crate) fn source_frame(&self, v: i64) -> Option<i64> {
        if v < 0 || v >= self.wave_length() {
            return None;
        }
        if !self.looping.is_looping() || v <= self.last() {
            return Some(v);
        }
        let end = self.loop_end();
        if v <= end {
            return Some(self.fold(v - self.origin()));
        }
        let tail = v - end;
        let src = match self.looping.loop_type {
            LoopType::Jump => v - self.looping.count * self.width(),
            _ if self.ends_backwards() => self.first() - tail,
            _ => self.last() + tail,
        };
        Some(src)
    }
}
