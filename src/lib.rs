//! # wavestream - Sample Streaming Core
//!
//! Turns arbitrarily large audio sources into bounded-memory, pre-padded
//! blocks a real-time renderer can walk forward or backward through
//! repeated or reflected loops.
//!
//! ## Architecture
//!
//! wavestream is an umbrella crate over:
//! - **wavestream-core** - Data handles (memory, WAV, reverse, cut, insert,
//!   loop, scale), padded buffers and the streaming configuration
//! - **wavestream-sampler** - Block cache with a shared memory budget and
//!   loop-aware wave chunks
//!
//! ## Quick Start
//!
//! ```
//! use wavestream::prelude::*;
//!
//! # fn main() -> wavestream::Result<()> {
//! let config = StreamConfig::with_node_size(256).wave_chunk_pads(4, 16);
//! let manager = CacheManager::new(config)?;
//!
//! let values: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.01).sin()).collect();
//! let handle = MemoryHandle::mono(values)?;
//! let cache = manager.create_cache(handle, config.chunk_cache_padding(1))?;
//!
//! let chunk = WaveChunk::new(cache, LoopSpec::ping_pong(200, 600, 2));
//! chunk.open()?;
//! let mut offset = 0;
//! while offset < chunk.wave_length() {
//!     let block = chunk.use_block(offset, PlayDirection::Forward);
//!     // render block.frames() frames, reading up to the padding around them
//!     offset = block.next_offset();
//!     chunk.unuse_block(block);
//! }
//! chunk.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - WAV support
//! - `wav` - WAV file handles via hound

/// Re-export of wavestream-core for direct access
pub use wavestream_core as core;

/// Re-export of wavestream-sampler for direct access
pub use wavestream_sampler as sampler;

// Handles
pub use wavestream_core::handle::{
    CutHandle, InsertHandle, LoopHandle, MemoryHandle, PeekBuffer, PeekDirection, ReverseHandle,
    ScaleHandle, XinfoHandle, Xinfos,
};
#[cfg(feature = "wav")]
pub use wavestream_core::handle::WaveFileHandle;
pub use wavestream_core::{DataHandle, DataSource, HandleSetup, PaddedBuffer, StreamConfig};

// Cache
pub use wavestream_sampler::cache::CacheMetricsSnapshot;
pub use wavestream_sampler::{CacheManager, CachedHandle, DataCache, LoadRequest, NodeRef};

// Wave chunks
pub use wavestream_sampler::{
    LoopSpec, LoopType, PlayDirection, SegmentKind, WaveBlock, WaveChunk,
};

mod error;
pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    // Sources
    pub use crate::{DataHandle, MemoryHandle, StreamConfig};

    #[cfg(feature = "wav")]
    pub use crate::WaveFileHandle;

    // Caching
    pub use crate::{CacheManager, DataCache, LoadRequest};

    // Playback
    pub use crate::{LoopSpec, LoopType, PlayDirection, WaveBlock, WaveChunk};
}
