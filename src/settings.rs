//! Analyzer settings loaded from an optional YAML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock behaviour.
//!
//! ```yaml
//! topology:
//!   default_bandwidth_kbps: 100000
//!   include_shutdown_interfaces: false
//! traffic:
//!   overload_threshold: 0.8
//! simulation:
//!   tick: "100ms"
//!   update_interval: "30s"
//!   duration: "60s"
//! ```

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub topology: TopologySettings,
    pub validation: ValidationSettings,
    pub traffic: TrafficSettings,
    pub simulation: SimulationSettings,
}

/// Link inference and hierarchy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySettings {
    /// Bandwidth assumed for interfaces without a `bandwidth` statement
    pub default_bandwidth_kbps: u64,
    /// Consider `shutdown` interfaces when inferring links
    pub include_shutdown_interfaces: bool,
    /// Infer links from interface descriptions naming another device
    pub use_description_hints: bool,
    /// Share of devices (by degree) classified as core
    pub core_fraction: f64,
    /// Cumulative share of devices classified as core or distribution
    pub distribution_fraction: f64,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            default_bandwidth_kbps: 100_000,
            include_shutdown_interfaces: false,
            use_description_hints: true,
            core_fraction: 0.2,
            distribution_fraction: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub max_reported_loops: usize,
    /// Networks larger than this without BGP get a scalability hint
    pub large_network_devices: usize,
    /// Networks this small running BGP get a simplification hint
    pub small_network_devices: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_reported_loops: 5,
            large_network_devices: 10,
            small_network_devices: 5,
        }
    }
}

/// Traffic assumptions for the load estimate, in kbps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficSettings {
    pub base_demand_kbps: u64,
    pub router_demand_kbps: u64,
    pub core_demand_kbps: u64,
    pub overload_threshold: f64,
    /// Paths requested when looking for load-balancing alternatives
    pub alternative_paths: usize,
    pub upgrade_factor: f64,
}

impl Default for TrafficSettings {
    fn default() -> Self {
        Self {
            base_demand_kbps: 10_000,
            router_demand_kbps: 20_000,
            core_demand_kbps: 30_000,
            overload_threshold: 0.8,
            alternative_paths: 3,
            upgrade_factor: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Simulated time per tick
    #[serde(with = "humantime_serde")]
    pub tick: Duration,
    /// Interval between routing table advertisements
    #[serde(with = "humantime_serde")]
    pub update_interval: Duration,
    /// Total simulated time
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Probability that a delivered message is dropped
    pub loss_rate: f64,
    pub seed: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            update_interval: Duration::from_secs(30),
            duration: Duration::from_secs(60),
            loss_rate: 0.0,
            seed: 42,
        }
    }
}

impl SimulationSettings {
    /// Number of ticks between routing updates (at least one)
    pub fn update_every_ticks(&self) -> u64 {
        ticks_in(self.update_interval, self.tick).max(1)
    }

    /// Number of ticks covering `duration`
    pub fn total_ticks(&self) -> u64 {
        ticks_in(self.duration, self.tick)
    }
}

fn ticks_in(span: Duration, tick: Duration) -> u64 {
    if tick.is_zero() {
        return 0;
    }
    (span.as_nanos() / tick.as_nanos()) as u64
}

/// Errors found while validating settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid topology settings: {0}")]
    InvalidTopology(String),
    #[error("Invalid traffic settings: {0}")]
    InvalidTraffic(String),
    #[error("Invalid simulation settings: {0}")]
    InvalidSimulation(String),
}

impl Settings {
    /// Validate value ranges
    pub fn validate(&self) -> Result<(), SettingsError> {
        let t = &self.topology;
        if t.default_bandwidth_kbps == 0 {
            return Err(SettingsError::InvalidTopology(
                "default_bandwidth_kbps must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&t.core_fraction)
            || !(0.0..=1.0).contains(&t.distribution_fraction)
            || t.core_fraction > t.distribution_fraction
        {
            return Err(SettingsError::InvalidTopology(format!(
                "hierarchy fractions must satisfy 0 <= core ({}) <= distribution ({}) <= 1",
                t.core_fraction, t.distribution_fraction
            )));
        }

        let tr = &self.traffic;
        if tr.overload_threshold <= 0.0 {
            return Err(SettingsError::InvalidTraffic(
                "overload_threshold must be positive".to_string(),
            ));
        }
        if tr.alternative_paths == 0 {
            return Err(SettingsError::InvalidTraffic(
                "alternative_paths must be at least 1".to_string(),
            ));
        }

        let s = &self.simulation;
        if s.tick.is_zero() {
            return Err(SettingsError::InvalidSimulation("tick cannot be zero".to_string()));
        }
        if !(0.0..=1.0).contains(&s.loss_rate) {
            return Err(SettingsError::InvalidSimulation(format!(
                "loss_rate {} must be between 0 and 1",
                s.loss_rate
            )));
        }

        Ok(())
    }
}

/// Load and validate settings from a YAML file
pub fn load_settings(path: &Path) -> Result<Settings> {
    info!("Loading settings from: {:?}", path);

    let file = File::open(path)
        .wrap_err_with(|| format!("Failed to open settings file '{}'", path.display()))?;

    // An empty document deserializes to null rather than an empty mapping
    let value: serde_yaml::Value = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse settings file '{}'", path.display()))?;
    let settings: Settings = if value.is_null() {
        Settings::default()
    } else {
        serde_yaml::from_value(value)?
    };

    settings.validate()?;
    Ok(settings)
}
