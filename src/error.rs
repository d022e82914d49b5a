//! Centralized error type for the wavestream umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] wavestream_core::Error),

    #[error("Sampler: {0}")]
    Sampler(#[from] wavestream_sampler::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
