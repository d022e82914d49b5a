//! Streaming configuration.
//!
//! Sizes shared by every cache and wave chunk created from one cache manager.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Smallest node size accepted by [`StreamConfig::validate`].
pub const MIN_NODE_SIZE: usize = 16;

/// Configuration for cache nodes, the cache memory budget and wave chunk padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Values per cache node, a power of two (default: 1024)
    pub node_size: usize,
    /// Byte budget for cache nodes nobody references (default: 10 MiB)
    pub cache_memory: usize,
    /// Interpolation padding per side in frames (default: 64)
    pub wave_chunk_padding: usize,
    /// Minimum run length around segment boundaries in frames (default: 256)
    pub wave_chunk_big_pad: usize,
    /// Widest wave chunk, in channels, whose cache padding the node size
    /// must hold (default: 2)
    pub max_channels: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            node_size: 1024,
            cache_memory: 10 * 1024 * 1024, // 10 MiB
            wave_chunk_padding: 64,
            wave_chunk_big_pad: 256,
            max_channels: 2,
        }
    }
}

impl StreamConfig {
    /// Config with a custom node size, other fields at their defaults.
    pub fn with_node_size(node_size: usize) -> Self {
        Self {
            node_size,
            ..Default::default()
        }
    }

    /// Set the cache memory budget in bytes.
    pub fn memory_budget(mut self, bytes: usize) -> Self {
        self.cache_memory = bytes;
        self
    }

    /// Set wave chunk padding and big pad, both in frames.
    pub fn wave_chunk_pads(mut self, padding: usize, big_pad: usize) -> Self {
        self.wave_chunk_padding = padding;
        self.wave_chunk_big_pad = big_pad;
        self
    }

    /// Set the widest wave chunk the node size must serve.
    pub fn max_channels(mut self, n_channels: usize) -> Self {
        self.max_channels = n_channels;
        self
    }

    /// Apply the sizing rules between fields.
    ///
    /// Padding and channel bound are at least 1, the big pad at least twice
    /// the padding. The node size is raised to hold two big pads and more
    /// than twice the cache padding of a `max_channels` wide chunk, then
    /// rounded up to a power of two.
    pub fn constrained(self) -> Self {
        let wave_chunk_padding = self.wave_chunk_padding.max(1);
        let wave_chunk_big_pad = self.wave_chunk_big_pad.max(2 * wave_chunk_padding);
        let max_channels = self.max_channels.max(1);
        let node_size = self
            .node_size
            .max(2 * wave_chunk_big_pad + 2)
            .max(2 * (wave_chunk_padding + 1) * max_channels + 1)
            .max(MIN_NODE_SIZE)
            .next_power_of_two();
        Self {
            node_size,
            cache_memory: self.cache_memory.max(node_size * std::mem::size_of::<f32>()),
            wave_chunk_padding,
            wave_chunk_big_pad,
            max_channels,
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.node_size.is_power_of_two() || self.node_size < MIN_NODE_SIZE {
            return Err(Error::InvalidConfig(format!(
                "node_size must be a power of two >= {}, got {}",
                MIN_NODE_SIZE, self.node_size
            )));
        }
        if self.cache_memory == 0 {
            return Err(Error::InvalidConfig(
                "cache_memory must be greater than 0".to_string(),
            ));
        }
        if self.wave_chunk_padding == 0 {
            return Err(Error::InvalidConfig(
                "wave_chunk_padding must be at least 1".to_string(),
            ));
        }
        if self.wave_chunk_big_pad < 2 * self.wave_chunk_padding {
            return Err(Error::InvalidConfig(format!(
                "wave_chunk_big_pad ({}) must be at least twice wave_chunk_padding ({})",
                self.wave_chunk_big_pad, self.wave_chunk_padding
            )));
        }
        if self.max_channels == 0 {
            return Err(Error::InvalidConfig(
                "max_channels must be at least 1".to_string(),
            ));
        }
        let padding = self.chunk_cache_padding(self.max_channels);
        if 2 * padding >= self.node_size {
            return Err(Error::InvalidConfig(format!(
                "node_size {} cannot hold cache padding {} of a {} channel wave chunk",
                self.node_size, padding, self.max_channels
            )));
        }
        Ok(())
    }

    /// Bytes held by one node, padding excluded.
    pub fn node_bytes(&self) -> usize {
        self.node_size * std::mem::size_of::<f32>()
    }

    /// Big pad in frames, never below twice the padding.
    pub fn big_pad_frames(&self) -> usize {
        self.wave_chunk_big_pad.max(2 * self.wave_chunk_padding)
    }

    /// Cache padding (in values) a wave chunk with `n_channels` needs.
    ///
    /// Frames never straddle nodes when the node size is a multiple of the
    /// channel count; otherwise one extra frame of padding is required.
    pub fn chunk_cache_padding(&self, n_channels: usize) -> usize {
        let n_channels = n_channels.max(1);
        if self.node_size % n_channels == 0 {
            self.wave_chunk_padding * n_channels
        } else {
            (self.wave_chunk_padding + 1) * n_channels
        }
    }
}
