//! # Core Error Types

use thiserror::Error;

use crate::id::ObjectId;
use crate::object::{ActiveObject, ObjectKind};

/// Errors raised by object behaviour and reconstruction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    /// No constructor is registered for this kind.
    #[error("unknown object kind {0}")]
    UnknownKind(ObjectKind),

    /// The serialized state could not be decoded.
    #[error("malformed state for kind {kind}: {reason}")]
    Malformed {
        /// Kind whose decoder rejected the bytes.
        kind: ObjectKind,
        /// What was wrong.
        reason: String,
    },

    /// An object failed while stepping.
    #[error("step failed: {0}")]
    Step(String),
}

/// Why the registry refused an object.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// Every id in `[1, 65535]` is in use.
    #[error("no free object ids available")]
    ExhaustedIds,

    /// A caller-supplied id is already held by another live object.
    #[error("object id {0} is already in use")]
    IdCollision(ObjectId),

    /// A caller supplied the reserved null id.
    #[error("object id 0 is reserved")]
    NullId,
}

/// A failed registration. Hands the instance back so the caller decides how
/// to dispose of it.
pub struct Rejected {
    /// Why registration failed.
    pub error: RegistryError,
    /// The instance that was not registered.
    pub object: Box<dyn ActiveObject>,
}

impl std::fmt::Debug for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .field("kind", &self.object.kind())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (kind {})", self.error, self.object.kind())
    }
}

impl std::error::Error for Rejected {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Result type for object behaviour.
pub type ObjectResult<T> = Result<T, ObjectError>;
