//! # Simulation Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file (or no file) is a valid configuration.
//!
//! ```toml
//! active_region_radius = 2
//! activation_interval = 2.0
//! only_peaceful_mobs = true
//! rng_seed = 12345
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Largest activation radius accepted, in regions.
const MAX_RADIUS: i16 = 16;

/// Shortest interval accepted for any cadence, in seconds.
const MIN_INTERVAL: f32 = 0.01;

/// Tunables of the simulation driver.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Regions within this Chebyshev distance of a player are live.
    pub active_region_radius: i16,
    /// Seconds between live-set recomputes (activate, deactivate, purge).
    pub activation_interval: f32,
    /// Seconds between purges of removed objects.
    pub object_management_interval: f32,
    /// Seconds between timestamp refreshes of live regions.
    pub region_maintenance_interval: f32,
    /// Seconds between ambient rule passes.
    pub ambient_rule_interval: f32,
    /// Seconds between ticks on which objects are told to send updates.
    pub send_recommended_interval: f32,
    /// Seconds a region may sit unused before it is unloaded.
    pub region_unload_timeout: f32,
    /// Non-peaceful objects are removed as soon as they are stepped.
    pub only_peaceful_mobs: bool,
    /// Seed for the ambient rule RNG.
    pub rng_seed: u64,
    /// Ticks per second, for drivers running a fixed-rate loop.
    pub tick_rate: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            active_region_radius: 2,
            activation_interval: 2.0,
            object_management_interval: 0.5,
            region_maintenance_interval: 1.0,
            ambient_rule_interval: 10.0,
            send_recommended_interval: 0.1,
            region_unload_timeout: 60.0,
            only_peaceful_mobs: false,
            rng_seed: 0x7E44_A41C,
            tick_rate: 20,
        }
    }
}

impl SimulationConfig {
    /// Parses a TOML document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if the document is not valid for this schema.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let parsed: Self = toml::from_str(text)?;
        Ok(parsed.clamped())
    }

    /// Loads a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `Parse` if it is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Pulls out-of-range values back into range.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.active_region_radius = self.active_region_radius.clamp(0, MAX_RADIUS);
        for interval in [
            &mut self.activation_interval,
            &mut self.object_management_interval,
            &mut self.region_maintenance_interval,
            &mut self.ambient_rule_interval,
            &mut self.send_recommended_interval,
        ] {
            if !interval.is_finite() || *interval < MIN_INTERVAL {
                *interval = MIN_INTERVAL;
            }
        }
        // An active region is touched every maintenance pass; it must
        // never look idle in between.
        let min_timeout = self.region_maintenance_interval * 2.0;
        if !self.region_unload_timeout.is_finite() || self.region_unload_timeout < min_timeout {
            self.region_unload_timeout = min_timeout;
        }
        self.tick_rate = self.tick_rate.clamp(1, 1000);
        self
    }
}
