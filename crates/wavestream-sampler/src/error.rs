//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Handle or configuration error.
    #[error(transparent)]
    Core(#[from] wavestream_core::Error),

    /// Source holds less than one frame.
    #[error("File empty: {0}")]
    FileEmpty(String),

    /// Source longer than a wave chunk can address (e.g. an endless loop).
    #[error("\"{name}\" holds {n_values} values, too many for a wave chunk")]
    TooLong { name: String, n_values: i64 },

    /// Cache padding cannot serve the requested interpolation padding.
    #[error("Cache over \"{name}\" has padding {padding}, {required} required")]
    InsufficientPadding {
        name: String,
        padding: usize,
        required: usize,
    },

    /// Invalid cache parameters.
    #[error("Invalid cache: {0}")]
    InvalidCache(String),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
