//! # Ambient Rules
//!
//! Slow, time-driven changes to live regions: soil turning over, creatures
//! appearing near trees and in caves. Each rule sees one region at a time
//! through a [`RuleContext`] and may queue objects to spawn; the driver
//! registers them after the rule returns.
//!
//! Nodes outside the region being processed read as air.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use terrarium_core::{ActiveObject, WorldPoint};
use terrarium_world::{Node, Region, REGION_EDGE};

use crate::objects::{Oerkki, Rat};

/// Chance denominator for mud turning into grass on a pass.
const GRASS_CHANCE: u32 = 20;

/// Chance denominator for a creature spawn attempt per candidate node.
const SPAWN_CHANCE: u32 = 200;

/// Absence, in seconds, after which exposed mud has all grown over.
const REGROWTH_SECONDS: u32 = 300;

/// Rats spawned together in a cave.
const RAT_PACK: usize = 3;

/// What a rule may look at and change while processing one region.
pub struct RuleContext<'a> {
    /// The region being processed.
    pub region: &'a mut Region,
    /// Shared deterministic randomness.
    pub rng: &'a mut ChaCha8Rng,
    /// Snapshots in this region and its 26 neighbours, plus anything spawned
    /// so far in this pass.
    pub nearby_objects: usize,
    spawned: Vec<Box<dyn ActiveObject>>,
}

impl<'a> RuleContext<'a> {
    /// Creates a context over `region`.
    pub fn new(region: &'a mut Region, rng: &'a mut ChaCha8Rng, nearby_objects: usize) -> Self {
        Self {
            region,
            rng,
            nearby_objects,
            spawned: Vec::new(),
        }
    }

    /// Reads a node by local coordinates, which may lie outside the region.
    #[must_use]
    pub fn node(&self, local: [i32; 3]) -> Node {
        match to_index(local) {
            Some([x, y, z]) => self.region.node(x, y, z),
            None => Node::AIR,
        }
    }

    /// Writes a node by local coordinates. Ignored outside the region.
    pub fn set_node(&mut self, local: [i32; 3], node: Node) {
        if let Some([x, y, z]) = to_index(local) {
            self.region.set_node(x, y, z, node);
        }
    }

    /// World position of the centre of a local node.
    #[must_use]
    pub fn world_position(&self, local: [i32; 3]) -> WorldPoint {
        let origin = self.region.coord().origin_node();
        WorldPoint::from_node([
            origin[0] + local[0],
            origin[1] + local[1],
            origin[2] + local[2],
        ])
    }

    /// Queues an object to be registered once the rule returns.
    pub fn spawn(&mut self, object: Box<dyn ActiveObject>) {
        self.nearby_objects += 1;
        self.spawned.push(object);
    }

    /// Takes everything queued by [`spawn`](Self::spawn).
    pub fn take_spawned(&mut self) -> Vec<Box<dyn ActiveObject>> {
        std::mem::take(&mut self.spawned)
    }
}

fn to_index(local: [i32; 3]) -> Option<[usize; 3]> {
    let mut out = [0usize; 3];
    for (slot, v) in out.iter_mut().zip(local) {
        let v = usize::try_from(v).ok()?;
        if v >= REGION_EDGE {
            return None;
        }
        *slot = v;
    }
    Some(out)
}

/// Every local node coordinate of a region.
fn local_nodes() -> impl Iterator<Item = [i32; 3]> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let edge = REGION_EDGE as i32;
    (0..edge).flat_map(move |y| (0..edge).flat_map(move |z| (0..edge).map(move |x| [x, y, z])))
}

fn above(p: [i32; 3], dy: i32) -> [i32; 3] {
    [p[0], p[1] + dy, p[2]]
}

/// A periodic change applied to live regions.
pub trait AmbientRule: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Runs one periodic pass over a live region.
    fn apply(&mut self, ctx: &mut RuleContext<'_>);

    /// Runs once when a region becomes live, `elapsed` seconds after it was
    /// last visited.
    fn catch_up(&mut self, _ctx: &mut RuleContext<'_>, _elapsed: u32) {}
}

/// Mud under open air grows grass; grass under anything else dies back.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoilRule;

impl AmbientRule for SoilRule {
    fn name(&self) -> &'static str {
        "soil"
    }

    fn apply(&mut self, ctx: &mut RuleContext<'_>) {
        for p in local_nodes() {
            let node = ctx.node(p);
            if node == Node::MUD {
                if ctx.rng.gen_range(0..GRASS_CHANCE) == 0 && ctx.node(above(p, 1)).is_air() {
                    ctx.set_node(p, Node::GRASS);
                }
            } else if node == Node::GRASS && !ctx.node(above(p, 1)).is_air() {
                ctx.set_node(p, Node::MUD);
            }
        }
    }

    fn catch_up(&mut self, ctx: &mut RuleContext<'_>, elapsed: u32) {
        if elapsed <= REGROWTH_SECONDS {
            return;
        }
        for p in local_nodes() {
            if ctx.node(p) == Node::MUD && ctx.node(above(p, 1)).is_air() {
                ctx.set_node(p, Node::GRASS);
            }
        }
    }
}

/// Rats around trees, mixed company on cave floors.
///
/// Only fires where the surrounding regions hold no objects at all, so a
/// spawn suppresses further spawns nearby until the creatures wander off.
#[derive(Clone, Copy, Debug, Default)]
pub struct CreatureSpawnRule;

impl CreatureSpawnRule {
    fn near_tree(ctx: &mut RuleContext<'_>, p: [i32; 3]) {
        let dx = ctx.rng.gen_range(-2..=2);
        let dz = ctx.rng.gen_range(-2..=2);
        let spot = [p[0] + dx, p[1], p[2] + dz];
        if ctx.node(spot).is_air() && ctx.node(above(spot, -1)) == Node::GRASS {
            let pos = ctx.world_position(spot);
            tracing::info!("a rat spawns at {}", pos);
            ctx.spawn(Box::new(Rat::new(pos, 0.0)));
        }
    }

    fn on_cave_floor(ctx: &mut RuleContext<'_>, p: [i32; 3]) {
        let spot = above(p, 1);
        if !(ctx.node(spot).is_air() && ctx.node(above(spot, 1)).is_air()) {
            return;
        }
        let pos = ctx.world_position(spot);
        if ctx.rng.gen_range(0..5) < 2 {
            tracing::info!("rats spawn at {}", pos);
            for _ in 0..RAT_PACK {
                ctx.spawn(Box::new(Rat::new(pos, 0.0)));
            }
        } else {
            tracing::info!("an oerkki spawns at {}", pos);
            ctx.spawn(Box::new(Oerkki::new(pos)));
        }
    }
}

impl AmbientRule for CreatureSpawnRule {
    fn name(&self) -> &'static str {
        "creature_spawn"
    }

    fn apply(&mut self, ctx: &mut RuleContext<'_>) {
        for p in local_nodes() {
            let node = ctx.node(p);
            if node != Node::TREE && node != Node::STONE {
                continue;
            }
            // Roll first so the RNG stream does not depend on crowding.
            let roll = ctx.rng.gen_range(0..SPAWN_CHANCE) == 0;
            if !roll || ctx.nearby_objects > 0 {
                continue;
            }
            if node == Node::TREE {
                Self::near_tree(ctx, p);
            } else {
                Self::on_cave_floor(ctx, p);
            }
        }
    }
}

/// The default rule set.
#[must_use]
pub fn builtin_rules() -> Vec<Box<dyn AmbientRule>> {
    vec![Box::new(SoilRule), Box::new(CreatureSpawnRule)]
}
