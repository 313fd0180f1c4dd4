//! # Terrarium Server
//!
//! Headless simulation host. Runs the world against a region directory with
//! one wandering demo player keeping regions live.
//!
//! ## Usage
//!
//! ```bash
//! terrarium_server --world ./world --config terrarium.toml --duration 60
//! RUST_LOG=terrarium_server=debug terrarium_server
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use terrarium_core::WorldPoint;
use terrarium_server::{
    builtin_factory, builtin_rules, Environment, Player, SimulationConfig, TickLoop,
};
use terrarium_world::{FileRegionStore, ModLevel};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Seconds between status reports and periodic flushes.
const STATUS_INTERVAL_SECS: u64 = 10;

/// Radius of the demo player's walk, in world units.
const WALK_RADIUS: f32 = 600.0;

/// Radians per second along the walk.
const WALK_SPEED: f32 = 0.05;

struct Args {
    config: Option<PathBuf>,
    world: PathBuf,
    duration_secs: Option<u64>,
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config: None,
        world: PathBuf::from("terrarium_world"),
        duration_secs: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--world" | "-w" => {
                if i + 1 < args.len() {
                    parsed.world = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--duration" | "-d" => {
                if i + 1 < args.len() {
                    parsed.duration_secs = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: terrarium_server [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>     TOML simulation config (default: built-in)");
                println!("  -w, --world <DIR>       Region directory (default: ./terrarium_world)");
                println!("  -d, --duration <SECS>   Run for N seconds then exit");
                println!("  -h, --help              Show this help");
                return None;
            }
            other => eprintln!("ignoring unknown argument {other:?}"),
        }
        i += 1;
    }
    Some(parsed)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

fn main() -> ExitCode {
    let Some(args) = parse_args() else {
        return ExitCode::SUCCESS;
    };
    init_logging();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         TERRARIUM SERVER                                         ║");
    println!("║         ACTIVE OBJECTS & LIVE REGIONS                            ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let config = match &args.config {
        Some(path) => match SimulationConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => SimulationConfig::default(),
    };

    let store = match FileRegionStore::open(&args.world) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("cannot open world {}: {}", args.world.display(), e);
            return ExitCode::FAILURE;
        }
    };

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ World:              {}", args.world.display());
    println!("│ Tick Rate:          {} Hz", config.tick_rate);
    println!("│ Active Radius:      {} regions", config.active_region_radius);
    println!("│ Peaceful Only:      {}", config.only_peaceful_mobs);
    match args.duration_secs {
        Some(d) => println!("│ Duration:           {d} seconds"),
        None => println!("│ Duration:           infinite"),
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let tick_rate = config.tick_rate;
    let mut env = Environment::new(config, Box::new(store), builtin_factory())
        .with_rules(builtin_rules());
    if let Err(e) = env
        .players_mut()
        .add(Player::new(1, "wanderer", WorldPoint::new(WALK_RADIUS, 15.0, 0.0)))
    {
        tracing::error!("cannot add demo player: {}", e);
        return ExitCode::FAILURE;
    }

    let mut tick_loop = TickLoop::new(tick_rate);
    let dtime = tick_loop.dtime();
    let start = Instant::now();
    let mut last_status = 0u64;
    let mut angle = 0.0f32;

    loop {
        if let Some(duration) = args.duration_secs {
            if start.elapsed().as_secs() >= duration {
                break;
            }
        }

        tick_loop.wait_for_next_tick();

        tick_loop.run_due(|| {
            angle += WALK_SPEED * dtime;
            if let Some(player) = env.players_mut().by_name_mut("wanderer") {
                player.position.x = angle.cos() * WALK_RADIUS;
                player.position.z = angle.sin() * WALK_RADIUS;
            }
            env.step(dtime);
            // No network layer: drop what would be sent to clients.
            while env.get_outbound_message().is_some() {}
        });

        let uptime = start.elapsed().as_secs();
        if uptime >= last_status + STATUS_INTERVAL_SECS {
            last_status = uptime;
            if let Err(e) = env.flush(ModLevel::WriteNeeded) {
                tracing::warn!("periodic flush failed: {}", e);
            }

            let stats = env.stats();
            let ticks = tick_loop.stats();
            println!("┌─ SERVER STATUS (Tick {}) ────────────────────────────────────", tick_loop.tick_count());
            println!("│ Uptime:             {uptime}s");
            println!("│ Game Time:          {}s", stats.game_time);
            println!("│ Live Regions:       {} ({} loaded)", stats.live_regions, stats.loaded_regions);
            println!("│ Live Objects:       {}", stats.live_objects);
            println!("│ Activated/Stored:   {}/{}", stats.activated, stats.deactivated);
            println!("│ Spawned/Purged:     {}/{}", stats.spawned, stats.purged);
            println!("│ Avg Tick Time:      {} μs", ticks.avg_tick_us);
            println!("│ Late/Dropped Ticks: {}/{}", ticks.late_ticks, ticks.dropped_ticks);
            println!("└──────────────────────────────────────────────────────────────────");
        }
    }

    println!();
    println!("Shutting down...");
    match env.shutdown() {
        Ok(written) => {
            tracing::info!("wrote {} regions on shutdown", written);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("shutdown failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
