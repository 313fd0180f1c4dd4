//! # Server Error Types
//!
//! All errors that can occur outside the tick path. Inside a tick every
//! failure is logged and absorbed.

use std::path::PathBuf;

use terrarium_core::{ObjectError, ObjectId, RegionCoord, Rejected};
use terrarium_world::WorldError;
use thiserror::Error;

/// Errors raised by lifecycle operations.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The registry refused the object. The instance is inside.
    #[error(transparent)]
    Rejected(#[from] Rejected),

    /// The region store failed.
    #[error(transparent)]
    World(#[from] WorldError),

    /// An object could not be serialized or revived.
    #[error(transparent)]
    Object(#[from] ObjectError),

    /// The target region's snapshot bag is full.
    #[error("region {0} holds too many snapshots")]
    RegionFull(RegionCoord),

    /// No live object has this id.
    #[error("no live object with id {0}")]
    UnknownObject(ObjectId),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors raised by the player list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// Another player already uses this peer id.
    #[error("peer id {0} already in use")]
    DuplicatePeer(u16),

    /// Another player already uses this name.
    #[error("player name {0:?} already in use")]
    DuplicateName(String),

    /// Names must be non-empty.
    #[error("player name must not be empty")]
    EmptyName,
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
