//! Error types.

use thiserror::Error;

/// Why a handle refused to open.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpenReason {
    /// The backing resource could not be reached (missing file, I/O failure).
    #[error("resource unavailable: {0}")]
    Unavailable(String),

    /// The source reported a format it cannot serve, or its setup was insane.
    #[error("format invalid: {0}")]
    FormatInvalid(String),
}

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// A handle could not be opened.
    #[error("Failed to open \"{name}\": {reason}")]
    Open { name: String, reason: OpenReason },

    /// Mid-stream read failure.
    #[error("Read error in \"{name}\" at offset {offset}: {message}")]
    Read {
        name: String,
        offset: i64,
        message: String,
    },

    /// Read request starting outside the handle.
    #[error("Offset {offset} out of range for \"{name}\" (length {length})")]
    OutOfRange {
        name: String,
        offset: i64,
        length: i64,
    },

    /// Arguments that cannot describe a valid sample source.
    #[error("Invalid format: {0}")]
    Format(String),

    /// Invalid configuration.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn open(name: &str, reason: OpenReason) -> Self {
        Self::Open {
            name: name.to_string(),
            reason,
        }
    }

    pub(crate) fn read(name: &str, offset: i64, message: impl Into<String>) -> Self {
        Self::Read {
            name: name.to_string(),
            offset,
            message: message.into(),
        }
    }

    /// Whether this is an open failure caused by an insane format.
    pub fn is_format_invalid(&self) -> bool {
        matches!(
            self,
            Self::Open {
                reason: OpenReason::FormatInvalid(_),
                ..
            }
        )
    }
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
