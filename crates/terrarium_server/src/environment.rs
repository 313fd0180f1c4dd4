//! # Simulation Environment
//!
//! The driver: owns the region store, the live set, the lifecycle manager
//! and the players, and advances all of them by one `dtime` per call to
//! [`Environment::step`].
//!
//! ## Cadences
//!
//! | Pass                 | Default | Work                                              |
//! |----------------------|---------|---------------------------------------------------|
//! | objects              | tick    | step live objects, collect outbound messages      |
//! | activation           | 2.0 s   | recompute live set, activate, deactivate, purge   |
//! | region maintenance   | 1.0 s   | refresh timestamps, unload idle regions           |
//! | ambient rules        | 10.0 s  | soil, creature spawns                             |
//! | object management    | 0.5 s   | purge retired objects                             |
//!
//! Nothing in a tick returns an error. Failures are logged and the pass
//! continues.

use std::collections::{HashSet, VecDeque};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use terrarium_core::{
    ActiveObject, LiveObject, ObjectFactory, ObjectId, ObjectMessage, RegionCoord, StepOutcome,
    WorldPoint,
};
use terrarium_world::{ActiveRegionSet, ModLevel, RegionStore, WorldError, WorldResult};

use crate::ambient::{AmbientRule, RuleContext};
use crate::config::SimulationConfig;
use crate::error::LifecycleResult;
use crate::interval::IntervalLimiter;
use crate::lifecycle::{ClearReport, LifecycleManager};
use crate::observer::{ObserverHandle, ObserverQueue};
use crate::players::PlayerList;

/// A message from a live object, waiting for dispatch to observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Object that produced it.
    pub id: ObjectId,
    /// The message itself.
    pub message: ObjectMessage,
}

/// Counters and gauges of a running environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnvironmentStats {
    /// Whole seconds of game time.
    pub game_time: u32,
    /// Objects in the registry, retiring ones included.
    pub live_objects: usize,
    /// Regions in the live set.
    pub live_regions: usize,
    /// Regions held by the store.
    pub loaded_regions: usize,
    /// Objects revived from snapshots so far.
    pub activated: u64,
    /// Objects persisted by deactivation so far.
    pub deactivated: u64,
    /// Objects destroyed by purges so far.
    pub purged: u64,
    /// Objects spawned by ambient rules so far.
    pub spawned: u64,
    /// Object steps that returned an error.
    pub step_failures: u64,
    /// Outbound messages not yet taken.
    pub outbound_queued: usize,
}

enum RulePass {
    Periodic,
    CatchUp(u32),
}

/// The simulation.
pub struct Environment {
    config: SimulationConfig,
    store: Box<dyn RegionStore>,
    live: ActiveRegionSet,
    lifecycle: LifecycleManager,
    players: PlayerList,
    rules: Vec<Box<dyn AmbientRule>>,
    rng: ChaCha8Rng,
    observers: ObserverQueue,
    outbound: VecDeque<OutboundMessage>,
    game_time: u32,
    game_time_fraction: f32,
    activation_interval: IntervalLimiter,
    maintenance_interval: IntervalLimiter,
    ambient_interval: IntervalLimiter,
    management_interval: IntervalLimiter,
    send_recommended_timer: f32,
    counters: EnvironmentStats,
    shut_down: bool,
}

impl Environment {
    /// Creates an environment with no players and no ambient rules.
    #[must_use]
    pub fn new(config: SimulationConfig, store: Box<dyn RegionStore>, factory: ObjectFactory) -> Self {
        let config = config.clamped();
        tracing::info!(
            "environment created: radius {}, seed {:#x}, peaceful only: {}",
            config.active_region_radius,
            config.rng_seed,
            config.only_peaceful_mobs
        );
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            config,
            store,
            live: ActiveRegionSet::new(),
            lifecycle: LifecycleManager::new(factory),
            players: PlayerList::new(),
            rules: Vec::new(),
            observers: ObserverQueue::new(),
            outbound: VecDeque::new(),
            game_time: 0,
            game_time_fraction: 0.0,
            activation_interval: IntervalLimiter::new(),
            maintenance_interval: IntervalLimiter::new(),
            ambient_interval: IntervalLimiter::new(),
            management_interval: IntervalLimiter::new(),
            send_recommended_timer: 0.0,
            counters: EnvironmentStats::default(),
            shut_down: false,
        }
    }

    /// Installs the ambient rules, replacing any present.
    #[must_use]
    pub fn with_rules(mut self, rules: Vec<Box<dyn AmbientRule>>) -> Self {
        self.rules = rules;
        self
    }

    /// Advances the simulation by `dtime` seconds.
    pub fn step(&mut self, dtime: f32) {
        if self.shut_down {
            tracing::warn!("step called after shutdown; ignored");
            return;
        }
        let dtime = if dtime.is_finite() && dtime >= 0.0 {
            dtime
        } else {
            tracing::warn!("ignoring invalid dtime {}", dtime);
            0.0
        };

        self.apply_observer_deltas();
        self.advance_game_time(dtime);

        if self
            .activation_interval
            .step(dtime, self.config.activation_interval)
        {
            self.activation_pass();
        }
        if self
            .maintenance_interval
            .step(dtime, self.config.region_maintenance_interval)
        {
            self.maintenance_pass();
        }
        if self
            .ambient_interval
            .step(dtime, self.config.ambient_rule_interval)
        {
            self.ambient_pass();
        }

        self.step_objects(dtime);

        if self
            .management_interval
            .step(dtime, self.config.object_management_interval)
        {
            self.purge();
        }
    }

    fn apply_observer_deltas(&mut self) {
        for delta in self.observers.drain() {
            if let Err(e) = self.lifecycle.apply_known_by_delta(delta.id, delta.delta) {
                tracing::debug!("dropped observer delta {:+}: {}", delta.delta, e);
            }
        }
    }

    fn advance_game_time(&mut self, dtime: f32) {
        self.game_time_fraction += dtime;
        let whole = self.game_time_fraction.floor();
        self.game_time_fraction -= whole;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let whole = whole as u32;
        self.game_time = self.game_time.saturating_add(whole);
    }

    fn activation_pass(&mut self) {
        let delta = self
            .live
            .recompute(self.players.anchors(), self.config.active_region_radius);

        for coord in &delta.removed {
            if let Some(region) = self.store.get_mut(*coord) {
                region.set_timestamp(self.game_time);
            }
        }

        let mut added: Vec<RegionCoord> = delta.added.into_iter().collect();
        added.sort_unstable();
        for coord in added {
            self.activate_region(coord);
        }

        let deactivated = self
            .lifecycle
            .deactivate_far_objects(self.store.as_mut(), &self.live, false);
        self.counters.deactivated += deactivated as u64;

        self.purge();
    }

    fn activate_region(&mut self, coord: RegionCoord) {
        let game_time = self.game_time;
        let region = match self.store.emerge(coord, true) {
            Ok(region) => region,
            Err(e) => {
                if matches!(e, WorldError::RegionUnavailable(_)) {
                    tracing::debug!("region {} unavailable; activation deferred", coord);
                } else {
                    tracing::warn!("cannot load region {}: {}; activation deferred", coord, e);
                }
                self.live.forget(coord);
                return;
            }
        };

        let elapsed = region
            .timestamp()
            .map_or(0, |stamp| game_time.saturating_sub(stamp));
        region.set_timestamp(game_time);

        match self.lifecycle.activate_objects(self.store.as_mut(), coord) {
            Ok(count) => self.counters.activated += count as u64,
            Err(e) => tracing::error!("activating objects in {} failed: {}", coord, e),
        }

        self.run_rules(coord, &RulePass::CatchUp(elapsed));
    }

    fn maintenance_pass(&mut self) {
        for coord in self.live.iter() {
            if let Some(region) = self.store.get_mut(coord) {
                region.reset_usage_timer();
                region.set_timestamp_no_flag(self.game_time);
            }
        }
        if let Err(e) = self.store.unload_idle(
            self.config.region_maintenance_interval,
            self.config.region_unload_timeout,
        ) {
            tracing::warn!("unloading idle regions failed: {}", e);
        }
    }

    fn ambient_pass(&mut self) {
        let mut coords: Vec<RegionCoord> = self.live.iter().collect();
        coords.sort_unstable();
        for coord in coords {
            if let Some(region) = self.store.get_mut(coord) {
                region.set_timestamp_no_flag(self.game_time);
            }
            self.run_rules(coord, &RulePass::Periodic);
        }
    }

    /// Snapshots in `coord` and its 26 neighbours, loaded regions only.
    fn count_nearby(&self, coord: RegionCoord) -> usize {
        coord
            .cube(1)
            .filter_map(|c| self.store.get(c))
            .map(|r| r.snapshots.stored_len() + r.snapshots.active_len())
            .sum()
    }

    fn run_rules(&mut self, coord: RegionCoord, pass: &RulePass) {
        if self.rules.is_empty() {
            return;
        }
        let nearby = self.count_nearby(coord);
        let Some(region) = self.store.get_mut(coord) else {
            return;
        };

        let mut ctx = RuleContext::new(region, &mut self.rng, nearby);
        for rule in &mut self.rules {
            match pass {
                RulePass::Periodic => rule.apply(&mut ctx),
                RulePass::CatchUp(elapsed) => rule.catch_up(&mut ctx, *elapsed),
            }
        }
        let spawned = ctx.take_spawned();

        for object in spawned {
            let kind = object.kind();
            match self.lifecycle.add_object(self.store.as_mut(), object) {
                Ok(_) => self.counters.spawned += 1,
                Err(e) => tracing::warn!("could not spawn kind {} in {}: {}", kind, coord, e),
            }
        }
    }

    fn step_objects(&mut self, dtime: f32) {
        self.send_recommended_timer += dtime;
        let send_recommended = self.send_recommended_timer > self.config.send_recommended_interval;
        if send_recommended {
            self.send_recommended_timer = 0.0;
        }
        let only_peaceful = self.config.only_peaceful_mobs;

        for (id, obj) in self.lifecycle.registry_mut().iter_mut() {
            if obj.is_retiring() {
                continue;
            }
            if only_peaceful && !obj.object().is_peaceful() {
                tracing::debug!("removing hostile object {} (peaceful mode)", id);
                obj.removed = true;
                continue;
            }

            match obj.object_mut().step(dtime, send_recommended) {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Remove) => obj.removed = true,
                Err(e) => {
                    self.counters.step_failures += 1;
                    tracing::warn!("object {} failed to step: {}", id, e);
                }
            }

            self.outbound.extend(
                obj.object_mut()
                    .drain_messages()
                    .into_iter()
                    .map(|message| OutboundMessage { id, message }),
            );
        }
    }

    fn purge(&mut self) {
        let report = self
            .lifecycle
            .remove_removed_objects(self.store.as_mut(), &self.live);
        self.counters.purged += report.destroyed as u64;
        self.counters.activated += report.revived as u64;
    }

    /// Takes the oldest undispatched object message.
    pub fn get_outbound_message(&mut self) -> Option<OutboundMessage> {
        self.outbound.pop_front()
    }

    /// Queues an observer count change, applied at the start of the next
    /// step.
    pub fn set_known_by_count(&self, id: ObjectId, delta: i32) {
        self.observers.push(id, delta);
    }

    /// A handle for reporting observer changes from other threads.
    #[must_use]
    pub fn observer_handle(&self) -> ObserverHandle {
        self.observers.handle()
    }

    /// Spawns a live object.
    ///
    /// # Errors
    ///
    /// `Rejected` if no id is free.
    pub fn add_object(&mut self, object: Box<dyn ActiveObject>) -> LifecycleResult<ObjectId> {
        self.lifecycle.add_object(self.store.as_mut(), object)
    }

    /// Spawns a live object under a chosen id.
    ///
    /// # Errors
    ///
    /// `Rejected` if the id is null or taken.
    pub fn add_object_with_id(
        &mut self,
        object: Box<dyn ActiveObject>,
        id: ObjectId,
    ) -> LifecycleResult<ObjectId> {
        self.lifecycle
            .add_object_with_id(self.store.as_mut(), object, id)
    }

    /// Stores an object as a dormant snapshot. If its region is already
    /// live the snapshot is revived right away.
    ///
    /// # Errors
    ///
    /// Fails if the region cannot be produced or is full.
    pub fn add_object_as_static(&mut self, object: Box<dyn ActiveObject>) -> LifecycleResult<RegionCoord> {
        let coord = self
            .lifecycle
            .add_object_as_static(self.store.as_mut(), object)?;
        if self.live.contains(coord) {
            let count = self.lifecycle.activate_objects(self.store.as_mut(), coord)?;
            self.counters.activated += count as u64;
        }
        Ok(coord)
    }

    /// Deletes every object, live and dormant.
    ///
    /// # Errors
    ///
    /// Fails if persisted regions cannot be listed.
    pub fn clear_all_objects(&mut self) -> LifecycleResult<ClearReport> {
        self.lifecycle.clear_all_objects(self.store.as_mut())
    }

    /// Live objects near an observer that it does not know yet.
    #[must_use]
    pub fn added_objects_near(
        &self,
        pos: WorldPoint,
        radius: f32,
        current: &HashSet<ObjectId>,
    ) -> Vec<ObjectId> {
        self.lifecycle.added_objects_near(pos, radius, current)
    }

    /// Known objects an observer should forget.
    #[must_use]
    pub fn removed_objects_near(
        &self,
        pos: WorldPoint,
        radius: f32,
        current: &HashSet<ObjectId>,
    ) -> Vec<ObjectId> {
        self.lifecycle.removed_objects_near(pos, radius, current)
    }

    /// Looks up a live object.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&LiveObject> {
        self.lifecycle.registry().get(id)
    }

    /// Looks up a live object mutably.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut LiveObject> {
        self.lifecycle.registry_mut().get_mut(id)
    }

    /// The lifecycle manager.
    #[must_use]
    pub const fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    /// Players.
    #[must_use]
    pub const fn players(&self) -> &PlayerList {
        &self.players
    }

    /// Players, mutably. Position changes take effect on the next
    /// activation pass.
    pub fn players_mut(&mut self) -> &mut PlayerList {
        &mut self.players
    }

    /// Regions currently live.
    #[must_use]
    pub const fn live_regions(&self) -> &ActiveRegionSet {
        &self.live
    }

    /// The region store.
    #[must_use]
    pub fn store(&self) -> &dyn RegionStore {
        self.store.as_ref()
    }

    /// The region store, mutably.
    pub fn store_mut(&mut self) -> &mut dyn RegionStore {
        self.store.as_mut()
    }

    /// The configuration in effect, after clamping.
    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Whole seconds of game time elapsed.
    #[must_use]
    pub const fn game_time(&self) -> u32 {
        self.game_time
    }

    /// Restores game time, e.g. from saved world metadata.
    pub fn set_game_time(&mut self, game_time: u32) {
        self.game_time = game_time;
        self.game_time_fraction = 0.0;
    }

    /// Current counters and gauges.
    #[must_use]
    pub fn stats(&self) -> EnvironmentStats {
        EnvironmentStats {
            game_time: self.game_time,
            live_objects: self.lifecycle.registry().len(),
            live_regions: self.live.len(),
            loaded_regions: self.store.loaded().len(),
            outbound_queued: self.outbound.len(),
            ..self.counters
        }
    }

    /// Writes back regions at or above `level`.
    ///
    /// # Errors
    ///
    /// Returns the first write error.
    pub fn flush(&mut self, level: ModLevel) -> WorldResult<usize> {
        self.store.flush(level)
    }

    /// Persists every live object and writes every modified region.
    ///
    /// Observed objects are persisted too. Runs once; later calls return
    /// `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Returns the first write error of the final flush.
    pub fn shutdown(&mut self) -> WorldResult<usize> {
        if self.shut_down {
            return Ok(0);
        }
        self.shut_down = true;
        tracing::info!(
            "shutting down environment: {} live objects",
            self.lifecycle.registry().len()
        );

        for coord in self.live.clear() {
            if let Some(region) = self.store.get_mut(coord) {
                region.set_timestamp(self.game_time);
            }
        }
        let persisted = self
            .lifecycle
            .deactivate_far_objects(self.store.as_mut(), &self.live, true);
        self.counters.deactivated += persisted as u64;

        let written = self.store.flush(ModLevel::WriteAtUnload)?;
        tracing::info!("persisted {} objects, wrote {} regions", persisted, written);
        Ok(written)
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub const fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("environment shutdown failed: {}", e);
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("game_time", &self.game_time)
            .field("live_regions", &self.live.len())
            .field("live_objects", &self.lifecycle.registry().len())
            .field("players", &self.players.len())
            .field("shut_down", &self.shut_down)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::builtin_factory;
    use terrarium_world::MemoryRegionStore;

    fn environment() -> Environment {
        Environment::new(
            SimulationConfig::default(),
            Box::new(MemoryRegionStore::new()),
            builtin_factory(),
        )
    }

    #[test]
    fn test_game_time_accumulates_fractions() {
        let mut env = environment();
        for _ in 0..25 {
            env.step(0.1);
        }
        assert_eq!(env.game_time(), 2);
        env.step(f32::NAN);
        env.step(-3.0);
        assert_eq!(env.game_time(), 2);
    }

    #[test]
    fn test_step_after_shutdown_is_ignored() {
        let mut env = environment();
        assert_eq!(env.shutdown().unwrap(), 0);
        env.step(10.0);
        assert_eq!(env.game_time(), 0);
        assert!(env.is_shut_down());
        assert_eq!(env.shutdown().unwrap(), 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let env = environment();
        let stats = env.stats();
        assert_eq!(stats, EnvironmentStats::default());
    }
}
