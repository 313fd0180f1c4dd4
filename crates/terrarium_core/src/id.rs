//! # Object Identity
//!
//! Live objects are addressed by a dense 16-bit id. Id 0 is reserved and
//! never names a live object.

/// Unique identifier for a live object.
///
/// Only the registry hands these out. Remote observers refer to objects by
/// id alone, so an id must never be shared by two live objects at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ObjectId(u16);

impl ObjectId {
    /// Null/invalid object ID.
    pub const NULL: Self = Self(0);

    /// Smallest id the registry hands out.
    pub const MIN: Self = Self(1);

    /// Largest id the registry hands out.
    pub const MAX: Self = Self(u16::MAX);

    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Checks if this id is the reserved null id.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Converts into `Some(self)` unless null.
    #[inline]
    #[must_use]
    pub const fn non_null(self) -> Option<Self> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_id() {
        assert!(ObjectId::NULL.is_null());
        assert!(ObjectId::default().is_null());
        assert_eq!(ObjectId::NULL.non_null(), None);
        assert_eq!(ObjectId::new(7).non_null(), Some(ObjectId::new(7)));
    }
}
