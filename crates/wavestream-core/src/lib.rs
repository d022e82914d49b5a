//! Sample sources, padded buffers and configuration for wave streaming.
//!
//! [`DataHandle`] is the uniform contract over anything that yields
//! interleaved sample values: memory buffers, WAV files, and decorators
//! that reverse, cut, crop, splice, loop or scale another handle or edit
//! its metadata. Handles are shared through `Arc` and opened and closed
//! with a separate counter, so a format is only queried while somebody
//! holds the handle open.
//!
//! # Example
//!
//! ```
//! use wavestream_core::handle::{CutHandle, MemoryHandle, ReverseHandle};
//!
//! let values: Vec<f32> = (0..8).map(|i| i as f32).collect();
//! let memory = MemoryHandle::mono(values)?;
//! let handle = ReverseHandle::new(CutHandle::crop(memory, 2, 2)?);
//!
//! handle.open()?;
//! let mut buf = [0.0; 4];
//! handle.read(0, &mut buf)?;
//! assert_eq!(buf, [5.0, 4.0, 3.0, 2.0]);
//! handle.close();
//! # Ok::<(), wavestream_core::Error>(())
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod handle;

pub use buffer::PaddedBuffer;
pub use config::StreamConfig;
pub use error::{Error, OpenReason, Result};
pub use handle::{DataHandle, DataSource, HandleSetup, Xinfos};
