//! # Built-in Objects
//!
//! | Kind | Type          | Peaceful | State                                  |
//! |------|---------------|----------|----------------------------------------|
//! | 2    | [`DroppedItem`] | yes    | version, u16 length, UTF-8 item string |
//! | 3    | [`Rat`]         | yes    | version, f32 yaw                       |
//! | 4    | [`Oerkki`]      | no     | version, u8 hp, f32 age                |
//!
//! All integers and floats are little-endian.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use terrarium_core::{
    ActiveObject, ObjectError, ObjectFactory, ObjectKind, ObjectMessage, ObjectResult,
    StepOutcome, WorldPoint, NODE_SIZE,
};

/// Kind of [`DroppedItem`].
pub const KIND_ITEM: ObjectKind = ObjectKind(2);
/// Kind of [`Rat`].
pub const KIND_RAT: ObjectKind = ObjectKind(3);
/// Kind of [`Oerkki`].
pub const KIND_OERKKI: ObjectKind = ObjectKind(4);

const STATE_VERSION: u8 = 1;

/// Message command: position and heading follow.
const CMD_POSITION: u8 = 0;

/// Builds a factory knowing every built-in kind.
#[must_use]
pub fn builtin_factory() -> ObjectFactory {
    let mut factory = ObjectFactory::new();
    factory
        .register(KIND_ITEM, DroppedItem::create)
        .register(KIND_RAT, Rat::create)
        .register(KIND_OERKKI, Oerkki::create);
    factory
}

fn malformed(kind: ObjectKind, reason: &str) -> ObjectError {
    ObjectError::Malformed {
        kind,
        reason: reason.to_string(),
    }
}

fn check_version(kind: ObjectKind, state: &[u8]) -> ObjectResult<&[u8]> {
    match state.split_first() {
        Some((&STATE_VERSION, rest)) => Ok(rest),
        Some((v, _)) => Err(malformed(kind, &format!("unsupported version {v}"))),
        None => Err(malformed(kind, "empty state")),
    }
}

fn read_f32(kind: ObjectKind, bytes: &[u8]) -> ObjectResult<f32> {
    let raw: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| malformed(kind, "truncated float"))?;
    Ok(f32::from_le_bytes(raw))
}

/// Seeds per-object randomness from where the object was created.
fn rng_for(position: WorldPoint) -> ChaCha8Rng {
    let seed = (u64::from(position.x.to_bits()) << 32)
        ^ (u64::from(position.y.to_bits()) << 16)
        ^ u64::from(position.z.to_bits());
    ChaCha8Rng::seed_from_u64(seed)
}

fn position_message(position: WorldPoint, yaw: f32) -> ObjectMessage {
    let mut data = Vec::with_capacity(17);
    data.push(CMD_POSITION);
    for v in [position.x, position.y, position.z, yaw] {
        data.extend_from_slice(&v.to_le_bytes());
    }
    ObjectMessage::unreliable(data)
}

/// Walks straight along `yaw`, turning to a random heading every few
/// seconds.
#[derive(Debug)]
struct Wander {
    yaw: f32,
    turn_timer: f32,
    speed: f32,
    rng: ChaCha8Rng,
}

impl Wander {
    fn new(yaw: f32, speed: f32, position: WorldPoint) -> Self {
        Self {
            yaw,
            turn_timer: 0.0,
            speed,
            rng: rng_for(position),
        }
    }

    fn advance(&mut self, position: &mut WorldPoint, dtime: f32) {
        self.turn_timer -= dtime;
        if self.turn_timer <= 0.0 {
            self.yaw = self.rng.gen_range(0.0..std::f32::consts::TAU);
            self.turn_timer = self.rng.gen_range(1.0..4.0);
        }
        let step = self.speed * dtime;
        position.x += self.yaw.cos() * step;
        position.z += self.yaw.sin() * step;
    }
}

/// An item lying on the ground. Does nothing until picked up.
#[derive(Debug)]
pub struct DroppedItem {
    position: WorldPoint,
    item: String,
}

impl DroppedItem {
    /// Creates an item.
    #[must_use]
    pub fn new(position: WorldPoint, item: impl Into<String>) -> Self {
        Self {
            position,
            item: item.into(),
        }
    }

    /// The item string, e.g. `"stone 5"`.
    #[must_use]
    pub fn item(&self) -> &str {
        &self.item
    }

    /// Revives an item from its state.
    ///
    /// # Errors
    ///
    /// `Malformed` on a bad version, length or encoding.
    pub fn create(position: WorldPoint, state: &[u8]) -> ObjectResult<Box<dyn ActiveObject>> {
        let rest = check_version(KIND_ITEM, state)?;
        let (len, text) = match rest {
            [lo, hi, text @ ..] => (usize::from(u16::from_le_bytes([*lo, *hi])), text),
            _ => return Err(malformed(KIND_ITEM, "missing length")),
        };
        let text = text
            .get(..len)
            .ok_or_else(|| malformed(KIND_ITEM, "truncated item string"))?;
        let item = std::str::from_utf8(text).map_err(|e| malformed(KIND_ITEM, &e.to_string()))?;
        Ok(Box::new(Self::new(position, item)))
    }
}

impl ActiveObject for DroppedItem {
    fn kind(&self) -> ObjectKind {
        KIND_ITEM
    }

    fn position(&self) -> WorldPoint {
        self.position
    }

    fn serialize_state(&self) -> Vec<u8> {
        let mut end = self.item.len().min(usize::from(u16::MAX));
        while !self.item.is_char_boundary(end) {
            end -= 1;
        }
        let bytes = &self.item.as_bytes()[..end];
        let len = u16::try_from(bytes.len()).unwrap_or(u16::MAX);
        let mut out = Vec::with_capacity(3 + bytes.len());
        out.push(STATE_VERSION);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(bytes);
        out
    }

    fn step(&mut self, _dtime: f32, _send_recommended: bool) -> ObjectResult<StepOutcome> {
        Ok(StepOutcome::Continue)
    }
}

/// A small peaceful creature that wanders about.
#[derive(Debug)]
pub struct Rat {
    position: WorldPoint,
    wander: Wander,
    outbox: Vec<ObjectMessage>,
}

impl Rat {
    /// Walking speed in world units per second.
    pub const SPEED: f32 = 2.0 * NODE_SIZE;

    /// Creates a rat facing `yaw` radians.
    #[must_use]
    pub fn new(position: WorldPoint, yaw: f32) -> Self {
        Self {
            position,
            wander: Wander::new(yaw, Self::SPEED, position),
            outbox: Vec::new(),
        }
    }

    /// Revives a rat from its state.
    ///
    /// # Errors
    ///
    /// `Malformed` on a bad version or truncated heading.
    pub fn create(position: WorldPoint, state: &[u8]) -> ObjectResult<Box<dyn ActiveObject>> {
        let rest = check_version(KIND_RAT, state)?;
        let yaw = read_f32(KIND_RAT, rest)?;
        Ok(Box::new(Self::new(position, yaw)))
    }
}

impl ActiveObject for Rat {
    fn kind(&self) -> ObjectKind {
        KIND_RAT
    }

    fn position(&self) -> WorldPoint {
        self.position
    }

    fn serialize_state(&self) -> Vec<u8> {
        let mut out = vec![STATE_VERSION];
        out.extend_from_slice(&self.wander.yaw.to_le_bytes());
        out
    }

    fn step(&mut self, dtime: f32, send_recommended: bool) -> ObjectResult<StepOutcome> {
        self.wander.advance(&mut self.position, dtime);
        if send_recommended {
            self.outbox.push(position_message(self.position, self.wander.yaw));
        }
        Ok(StepOutcome::Continue)
    }

    fn drain_messages(&mut self) -> Vec<ObjectMessage> {
        std::mem::take(&mut self.outbox)
    }
}

/// A hostile creature. Gives up and vanishes after a while.
#[derive(Debug)]
pub struct Oerkki {
    position: WorldPoint,
    hp: u8,
    age: f32,
    wander: Wander,
    outbox: Vec<ObjectMessage>,
}

impl Oerkki {
    /// Seconds an oerkki lives.
    pub const LIFETIME: f32 = 120.0;
    /// Starting hit points.
    pub const MAX_HP: u8 = 20;
    /// Walking speed in world units per second.
    pub const SPEED: f32 = 1.5 * NODE_SIZE;

    /// Creates a fresh oerkki.
    #[must_use]
    pub fn new(position: WorldPoint) -> Self {
        Self {
            position,
            hp: Self::MAX_HP,
            age: 0.0,
            wander: Wander::new(0.0, Self::SPEED, position),
            outbox: Vec::new(),
        }
    }

    /// Current hit points.
    #[must_use]
    pub const fn hp(&self) -> u8 {
        self.hp
    }

    /// Revives an oerkki from its state.
    ///
    /// # Errors
    ///
    /// `Malformed` on a bad version or truncated fields.
    pub fn create(position: WorldPoint, state: &[u8]) -> ObjectResult<Box<dyn ActiveObject>> {
        let rest = check_version(KIND_OERKKI, state)?;
        let (&hp, rest) = rest
            .split_first()
            .ok_or_else(|| malformed(KIND_OERKKI, "missing hp"))?;
        let age = read_f32(KIND_OERKKI, rest)?;
        let mut oerkki = Self::new(position);
        oerkki.hp = hp;
        oerkki.age = age;
        Ok(Box::new(oerkki))
    }
}

impl ActiveObject for Oerkki {
    fn kind(&self) -> ObjectKind {
        KIND_OERKKI
    }

    fn position(&self) -> WorldPoint {
        self.position
    }

    fn serialize_state(&self) -> Vec<u8> {
        let mut out = vec![STATE_VERSION, self.hp];
        out.extend_from_slice(&self.age.to_le_bytes());
        out
    }

    fn step(&mut self, dtime: f32, send_recommended: bool) -> ObjectResult<StepOutcome> {
        self.age += dtime;
        if self.hp == 0 || self.age > Self::LIFETIME {
            return Ok(StepOutcome::Remove);
        }
        self.wander.advance(&mut self.position, dtime);
        if send_recommended {
            self.outbox.push(position_message(self.position, self.wander.yaw));
        }
        Ok(StepOutcome::Continue)
    }

    fn drain_messages(&mut self) -> Vec<ObjectMessage> {
        std::mem::take(&mut self.outbox)
    }

    fn is_peaceful(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn here() -> WorldPoint {
        WorldPoint::new(10.0, 20.0, 30.0)
    }

    #[test]
    fn test_factory_revives_every_kind() {
        let factory = builtin_factory();
        let originals: Vec<Box<dyn ActiveObject>> = vec![
            Box::new(DroppedItem::new(here(), "stone 5")),
            Box::new(Rat::new(here(), 1.25)),
            Box::new(Oerkki::new(here())),
        ];
        for original in originals {
            let revived = factory
                .deserialize(original.kind(), here(), &original.serialize_state())
                .unwrap();
            assert_eq!(revived.kind(), original.kind());
            assert_eq!(revived.serialize_state(), original.serialize_state());
        }
    }

    #[test]
    fn test_malformed_states() {
        assert!(DroppedItem::create(here(), &[]).is_err());
        assert!(DroppedItem::create(here(), &[STATE_VERSION, 9, 0, b'a']).is_err());
        assert!(DroppedItem::create(here(), &[STATE_VERSION, 2, 0, 0xFF, 0xFE]).is_err());
        assert!(Rat::create(here(), &[STATE_VERSION, 0]).is_err());
        assert!(Rat::create(here(), &[9, 0, 0, 0, 0]).is_err());
        assert!(Oerkki::create(here(), &[STATE_VERSION]).is_err());
    }

    #[test]
    fn test_oversized_item_name_cut_on_char_boundary() {
        let name = "é".repeat(32_768);
        let state = DroppedItem::new(here(), name).serialize_state();
        assert_eq!(state.len(), 3 + 65_534);

        let revived = DroppedItem::create(here(), &state).unwrap();
        assert_eq!(revived.serialize_state(), state);
    }

    #[test]
    fn test_rat_moves_and_reports() {
        let mut rat = Rat::new(here(), 0.0);
        rat.step(0.5, false).unwrap();
        assert!(rat.drain_messages().is_empty());
        assert_ne!(rat.position(), here());
        assert!((rat.position().y - here().y).abs() < f32::EPSILON);

        rat.step(0.1, true).unwrap();
        let messages = rat.drain_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data[0], CMD_POSITION);
        assert!(!messages[0].reliable);
        assert!(rat.is_peaceful());
    }

    #[test]
    fn test_oerkki_expires() {
        let mut oerkki = Oerkki::new(here());
        assert!(!oerkki.is_peaceful());
        assert_eq!(oerkki.step(1.0, false).unwrap(), StepOutcome::Continue);
        assert_eq!(
            oerkki.step(Oerkki::LIFETIME, false).unwrap(),
            StepOutcome::Remove
        );
    }
}
