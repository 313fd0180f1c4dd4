//! # TERRARIUM Server
//!
//! The simulation side of the world: which objects are alive, where the
//! dormant ones sleep, and how time moves them between the two.
//!
//! ## Architecture
//!
//! ```text
//!   players ──anchors──► ActiveRegionSet ──delta──► LifecycleManager
//!                                                    │  activate / deactivate / purge
//!   net threads ──KnownByDelta──► ObserverQueue       ▼
//!                                 (tick start)      RegionStore (snapshot bags)
//!                                                    ▲
//!   Environment::step ── objects, rules, cadences ───┘
//! ```
//!
//! Everything runs on one thread. Other threads talk to the simulation only
//! through an [`ObserverHandle`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use terrarium_server::{builtin_factory, builtin_rules, Environment, SimulationConfig};
//! use terrarium_world::MemoryRegionStore;
//!
//! let mut env = Environment::new(
//!     SimulationConfig::default(),
//!     Box::new(MemoryRegionStore::new()),
//!     builtin_factory(),
//! )
//! .with_rules(builtin_rules());
//! env.step(0.05);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod ambient;
pub mod config;
pub mod environment;
pub mod error;
pub mod interval;
pub mod lifecycle;
pub mod objects;
pub mod observer;
pub mod players;
pub mod tick;

pub use ambient::{builtin_rules, AmbientRule, CreatureSpawnRule, RuleContext, SoilRule};
pub use config::SimulationConfig;
pub use environment::{Environment, EnvironmentStats, OutboundMessage};
pub use error::{ConfigError, LifecycleError, LifecycleResult, PlayerError};
pub use interval::IntervalLimiter;
pub use lifecycle::{ClearReport, LifecycleManager, PurgeReport};
pub use objects::{builtin_factory, DroppedItem, Oerkki, Rat, KIND_ITEM, KIND_OERKKI, KIND_RAT};
pub use observer::{KnownByDelta, ObserverHandle, ObserverQueue};
pub use players::{Player, PlayerList, DISCONNECTED};
pub use tick::{TickLoop, TickStats};
