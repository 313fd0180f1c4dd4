//! # Object Factory
//!
//! Maps each [`ObjectKind`] to the constructor that revives it from a
//! snapshot. Replaces per-type dispatch with a plain lookup table.

use std::collections::HashMap;

use crate::error::{ObjectError, ObjectResult};
use crate::math::WorldPoint;
use crate::object::{ActiveObject, ObjectKind};

/// Constructor for one kind: `(position, serialized state) -> instance`.
pub type ObjectConstructor = fn(WorldPoint, &[u8]) -> ObjectResult<Box<dyn ActiveObject>>;

/// Kind-keyed table of constructors.
#[derive(Clone, Default)]
pub struct ObjectFactory {
    constructors: HashMap<ObjectKind, ObjectConstructor>,
}

impl ObjectFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the constructor for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: ObjectKind, constructor: ObjectConstructor) -> &mut Self {
        if self.constructors.insert(kind, constructor).is_some() {
            tracing::warn!("constructor for object kind {} replaced", kind);
        }
        self
    }

    /// Whether a constructor is registered for `kind`.
    #[must_use]
    pub fn knows(&self, kind: ObjectKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Revives an object from its kind, position and serialized state.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKind` when nothing is registered for `kind`, or
    /// whatever the constructor reports for undecodable state.
    pub fn deserialize(
        &self,
        kind: ObjectKind,
        position: WorldPoint,
        state: &[u8],
    ) -> ObjectResult<Box<dyn ActiveObject>> {
        let constructor = self
            .constructors
            .get(&kind)
            .ok_or(ObjectError::UnknownKind(kind))?;
        constructor(position, state)
    }
}

impl std::fmt::Debug for ObjectFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.constructors.keys().copied().collect();
        kinds.sort_unstable();
        f.debug_struct("ObjectFactory").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::tests::Marker;

    fn build_marker(position: WorldPoint, state: &[u8]) -> ObjectResult<Box<dyn ActiveObject>> {
        if !state.is_empty() {
            return Err(ObjectError::Malformed {
                kind: ObjectKind(99),
                reason: "expected no state".to_string(),
            });
        }
        Ok(Box::new(Marker { position }))
    }

    #[test]
    fn test_unknown_kind() {
        let factory = ObjectFactory::new();
        let err = factory
            .deserialize(ObjectKind(5), WorldPoint::ZERO, &[])
            .err();
        assert_eq!(err, Some(ObjectError::UnknownKind(ObjectKind(5))));
    }

    #[test]
    fn test_registered_kind() {
        let mut factory = ObjectFactory::new();
        factory.register(ObjectKind(99), build_marker);
        assert!(factory.knows(ObjectKind(99)));

        let p = WorldPoint::new(1.0, 2.0, 3.0);
        let obj = factory.deserialize(ObjectKind(99), p, &[]).unwrap();
        assert_eq!(obj.position(), p);

        assert!(factory.deserialize(ObjectKind(99), p, &[1]).is_err());
    }
}
