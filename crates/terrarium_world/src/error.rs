//! # World Error Types

use terrarium_core::RegionCoord;
use thiserror::Error;

/// Errors raised by region storage.
#[derive(Error, Debug)]
pub enum WorldError {
    /// Persisted bytes could not be decoded.
    #[error("corrupt region data: {0}")]
    Corrupt(String),

    /// Filesystem failure.
    #[error("region i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The store could not produce the region.
    #[error("region {0} is unavailable")]
    RegionUnavailable(RegionCoord),
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
