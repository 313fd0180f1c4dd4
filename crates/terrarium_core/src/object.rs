//! # Active Objects
//!
//! Every simulated object implements [`ActiveObject`]. The registry stores
//! each one inside a [`LiveObject`], which adds the lifecycle flags that the
//! server uses to decide when an object may be persisted or destroyed.

use crate::error::ObjectResult;
use crate::math::{RegionCoord, WorldPoint};

/// Type tag of an object. Selects the constructor when a snapshot is revived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ObjectKind(pub u8);

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message an object wants delivered to remote observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMessage {
    /// Whether delivery must be reliable.
    pub reliable: bool,
    /// Opaque payload, interpreted by the client-side counterpart.
    pub data: Vec<u8>,
}

impl ObjectMessage {
    /// Creates an unreliable message (position updates and the like).
    #[must_use]
    pub fn unreliable(data: Vec<u8>) -> Self {
        Self { reliable: false, data }
    }

    /// Creates a reliable message.
    #[must_use]
    pub fn reliable(data: Vec<u8>) -> Self {
        Self { reliable: true, data }
    }
}

/// What an object asks for after a step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StepOutcome {
    /// Keep simulating.
    #[default]
    Continue,
    /// Mark this object removed; it will be purged once no observer knows it.
    Remove,
}

/// Behaviour contract of a simulated object.
pub trait ActiveObject: Send {
    /// Returns the object's kind.
    fn kind(&self) -> ObjectKind;

    /// Returns the object's current position.
    fn position(&self) -> WorldPoint;

    /// Serializes everything needed to revive this object later.
    ///
    /// The position is stored separately and handed back to the constructor.
    fn serialize_state(&self) -> Vec<u8>;

    /// Advances the object by `dtime` seconds.
    ///
    /// `send_recommended` is raised on ticks where objects should batch their
    /// periodic updates to observers.
    ///
    /// # Errors
    ///
    /// Returns an error if the object could not advance. The driver logs it
    /// and continues with the remaining objects.
    fn step(&mut self, dtime: f32, send_recommended: bool) -> ObjectResult<StepOutcome>;

    /// Takes every message queued since the last call.
    fn drain_messages(&mut self) -> Vec<ObjectMessage> {
        Vec::new()
    }

    /// Whether the object may exist when only peaceful mobs are allowed.
    fn is_peaceful(&self) -> bool {
        true
    }
}

/// A registered object plus its lifecycle bookkeeping.
pub struct LiveObject {
    object: Box<dyn ActiveObject>,
    /// Logically deleted; waiting to be purged.
    pub removed: bool,
    /// Already persisted; waiting for observers to let go before it is dropped.
    pub pending_deactivation: bool,
    /// Number of remote observers currently holding this object's id.
    pub known_by_count: u16,
    /// Region whose active bag holds this object's snapshot, if any.
    pub static_region: Option<RegionCoord>,
}

impl LiveObject {
    /// Wraps a fresh instance with cleared flags.
    #[must_use]
    pub fn new(object: Box<dyn ActiveObject>) -> Self {
        Self {
            object,
            removed: false,
            pending_deactivation: false,
            known_by_count: 0,
            static_region: None,
        }
    }

    /// Returns the instance.
    #[inline]
    #[must_use]
    pub fn object(&self) -> &dyn ActiveObject {
        self.object.as_ref()
    }

    /// Returns the instance mutably.
    #[inline]
    pub fn object_mut(&mut self) -> &mut dyn ActiveObject {
        self.object.as_mut()
    }

    /// Unwraps the instance, discarding the bookkeeping.
    #[must_use]
    pub fn into_object(self) -> Box<dyn ActiveObject> {
        self.object
    }

    /// Whether a snapshot of this object currently sits in some region.
    #[inline]
    #[must_use]
    pub const fn static_exists(&self) -> bool {
        self.static_region.is_some()
    }

    /// Removed or pending deactivation: not stepped, awaiting purge.
    #[inline]
    #[must_use]
    pub const fn is_retiring(&self) -> bool {
        self.removed || self.pending_deactivation
    }

    /// Whether the purge pass may destroy this object now.
    #[inline]
    #[must_use]
    pub const fn is_purgeable(&self) -> bool {
        self.is_retiring() && self.known_by_count == 0
    }

    /// Adjusts `known_by_count`, clamping at both ends.
    ///
    /// Returns the new count.
    pub fn apply_known_by_delta(&mut self, delta: i32) -> u16 {
        let raw = i32::from(self.known_by_count).saturating_add(delta);
        let next = raw.clamp(0, i32::from(u16::MAX));
        if raw < 0 {
            tracing::warn!(
                "known_by_count underflow (count {}, delta {}); clamping to 0",
                self.known_by_count,
                delta
            );
        }
        // Clamped into u16 range above.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let next = next as u16;
        self.known_by_count = next;
        next
    }
}

impl std::fmt::Debug for LiveObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveObject")
            .field("kind", &self.object.kind())
            .field("position", &self.object.position())
            .field("removed", &self.removed)
            .field("pending_deactivation", &self.pending_deactivation)
            .field("known_by_count", &self.known_by_count)
            .field("static_region", &self.static_region)
            .finish()
    }
}
