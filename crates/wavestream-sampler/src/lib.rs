//! Cached, loop-aware sample streaming.
//!
//! - [`cache`]: padded block cache over data handles with a shared memory
//!   budget and round-robin eviction
//! - [`chunk`]: wave chunks that apply loops and hand out padded blocks in
//!   either play direction
//!
//! ```
//! use wavestream_core::handle::MemoryHandle;
//! use wavestream_core::StreamConfig;
//! use wavestream_sampler::{CacheManager, LoopSpec, PlayDirection, WaveChunk};
//!
//! let config = StreamConfig::with_node_size(64).wave_chunk_pads(2, 8);
//! let manager = CacheManager::new(config).unwrap();
//! let handle = MemoryHandle::mono((0..100).map(|i| i as f32).collect::<Vec<_>>()).unwrap();
//! let cache = manager.create_cache(handle, config.chunk_cache_padding(1)).unwrap();
//!
//! let chunk = WaveChunk::new(cache, LoopSpec::jump(10, 19, 2));
//! chunk.open().unwrap();
//! assert_eq!(chunk.wave_length(), 120);
//!
//! let block = chunk.use_block(20, PlayDirection::Forward);
//! assert_eq!(block.sample(0, 0), 10.0);
//! chunk.unuse_block(block);
//! chunk.close();
//! ```

pub mod cache;
pub mod chunk;
pub mod error;

pub use cache::{CacheManager, CachedHandle, DataCache, LoadRequest, NodeRef};
pub use chunk::{LoopSpec, LoopType, PlayDirection, SegmentKind, WaveBlock, WaveChunk};
pub use error::{Error, Result};
