//! Shared fixtures for the server integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use terrarium_core::{
    ActiveObject, ObjectError, ObjectFactory, ObjectKind, ObjectMessage, ObjectResult,
    StepOutcome, WorldPoint, NODE_SIZE, REGION_SIZE,
};
use terrarium_server::{Environment, SimulationConfig};
use terrarium_world::MemoryRegionStore;

/// Kind of [`Dummy`].
pub const KIND_DUMMY: ObjectKind = ObjectKind(200);

/// Test object whose behaviour is chosen by its state bytes.
///
/// - `b"bad"`: refuses to be revived
/// - `b"fail"`: every step errors
/// - `b"die"`: asks to be removed on its first step
/// - `b"hostile"`: not peaceful
/// - `b"drift"`: moves one region along +x every step
///
/// Every successful step emits one reliable message carrying the state.
pub struct Dummy {
    pub position: WorldPoint,
    pub state: Vec<u8>,
    pub steps: u32,
    outbox: Vec<ObjectMessage>,
}

impl Dummy {
    pub fn new(position: WorldPoint, state: &[u8]) -> Self {
        Self {
            position,
            state: state.to_vec(),
            steps: 0,
            outbox: Vec::new(),
        }
    }

    pub fn create(position: WorldPoint, state: &[u8]) -> ObjectResult<Box<dyn ActiveObject>> {
        if state == b"bad" {
            return Err(ObjectError::Malformed {
                kind: KIND_DUMMY,
                reason: "poisoned".to_string(),
            });
        }
        Ok(Box::new(Self::new(position, state)))
    }
}

impl ActiveObject for Dummy {
    fn kind(&self) -> ObjectKind {
        KIND_DUMMY
    }

    fn position(&self) -> WorldPoint {
        self.position
    }

    fn serialize_state(&self) -> Vec<u8> {
        self.state.clone()
    }

    fn step(&mut self, _dtime: f32, _send_recommended: bool) -> ObjectResult<StepOutcome> {
        if self.state == b"fail" {
            return Err(ObjectError::Step("told to fail".to_string()));
        }
        self.steps += 1;
        self.outbox.push(ObjectMessage::reliable(self.state.clone()));
        if self.state == b"die" {
            return Ok(StepOutcome::Remove);
        }
        if self.state == b"drift" {
            #[allow(clippy::cast_precision_loss)]
            let width = REGION_SIZE as f32 * NODE_SIZE;
            self.position.x += width;
        }
        Ok(StepOutcome::Continue)
    }

    fn drain_messages(&mut self) -> Vec<ObjectMessage> {
        std::mem::take(&mut self.outbox)
    }

    fn is_peaceful(&self) -> bool {
        self.state != b"hostile"
    }
}

pub fn dummy_factory() -> ObjectFactory {
    let mut factory = ObjectFactory::new();
    factory.register(KIND_DUMMY, Dummy::create);
    factory
}

pub fn dummy(position: WorldPoint, state: &[u8]) -> Box<dyn ActiveObject> {
    Box::new(Dummy::new(position, state))
}

/// A point a few nodes inside region (rx, ry, rz).
#[allow(clippy::cast_precision_loss)]
pub fn in_region(rx: i32, ry: i32, rz: i32) -> WorldPoint {
    let scale = REGION_SIZE as f32 * NODE_SIZE;
    WorldPoint::new(
        rx as f32 * scale + 4.0 * NODE_SIZE,
        ry as f32 * scale + 4.0 * NODE_SIZE,
        rz as f32 * scale + 4.0 * NODE_SIZE,
    )
}

/// Environment over an in-memory store with dummy objects only.
pub fn memory_env(config: SimulationConfig) -> Environment {
    Environment::new(config, Box::new(MemoryRegionStore::new()), dummy_factory())
}

/// Config with radius 0 so only anchor regions are live.
pub fn tight_config() -> SimulationConfig {
    SimulationConfig {
        active_region_radius: 0,
        ..SimulationConfig::default()
    }
}

/// A fresh directory under the system temp dir.
pub fn temp_dir(name: &str) -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "terrarium_server_{}_{}_{}",
        name,
        std::process::id(),
        n
    ))
}
