use anyhow::Result;
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Side;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("power_scale_threshold must be in [0, 1), got {0}")]
    ThresholdOutOfRange(f64),
    #[error("simulation.tick_millis must be at least 1")]
    ZeroTickInterval,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub protocols: ProtocolSettings,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Per-network constants shared by every energy network in a registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Joules of storage each member cable contributes
    pub cable_capacity: f64,
    /// Simulation steps per second, used to turn per-tick transfer into power
    pub ticks_per_second: f64,
    /// Smallest power-scale change that triggers a transfer event
    pub power_scale_threshold: f64,
    pub side: Side,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            cable_capacity: 10_000.0,
            ticks_per_second: 20.0,
            power_scale_threshold: 0.01,
            side: Side::Authoritative,
        }
    }
}

/// Conversion factors between joules and the foreign protocol units.
///
/// Each `to_*` factor converts joules into the protocol's unit; the inverse
/// converts back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSettings {
    /// Whether request-based (MJ) receivers are fed at all
    pub mj_enabled: bool,
    pub to_flux: f64,
    pub to_eu: f64,
    pub to_mj: f64,
    pub to_ue: f64,
    /// Voltage used when packing watts for UE receivers
    pub ue_voltage: f64,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            mj_enabled: true,
            to_flux: 0.4,
            to_eu: 0.1,
            to_mj: 0.04,
            to_ue: 0.01,
            ue_voltage: 120.0,
        }
    }
}

impl ProtocolSettings {
    pub fn from_flux(&self) -> f64 {
        1.0 / self.to_flux
    }

    pub fn from_eu(&self) -> f64 {
        1.0 / self.to_eu
    }

    pub fn from_mj(&self) -> f64 {
        1.0 / self.to_mj
    }

    pub fn from_ue(&self) -> f64 {
        1.0 / self.to_ue
    }
}

/// Parameters of the demo world driven by the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub tick_millis: u64,
    /// Number of cables laid in the demo line
    pub line_length: u32,
    /// Number of consumer blocks attached along the line
    pub consumers: u32,
    pub consumer_capacity: f64,
    /// Energy injected into the network every tick
    pub source_joules_per_tick: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_millis: 50,
            line_length: 8,
            consumers: 4,
            consumer_capacity: 40_000.0,
            source_joules_per_tick: 2_000.0,
        }
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { field, value });
    }
    if value <= 0.0 {
        return Err(ConfigError::NotPositive { field, value });
    }
    Ok(())
}

impl NetworkSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("network.cable_capacity", self.cable_capacity)?;
        check_positive("network.ticks_per_second", self.ticks_per_second)?;
        if !self.power_scale_threshold.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "network.power_scale_threshold",
                value: self.power_scale_threshold,
            });
        }
        if !(0.0..1.0).contains(&self.power_scale_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.power_scale_threshold));
        }
        Ok(())
    }
}

impl ProtocolSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("protocols.to_flux", self.to_flux)?;
        check_positive("protocols.to_eu", self.to_eu)?;
        check_positive("protocols.to_mj", self.to_mj)?;
        check_positive("protocols.to_ue", self.to_ue)?;
        check_positive("protocols.ue_voltage", self.ue_voltage)?;
        Ok(())
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_millis == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        check_positive("simulation.consumer_capacity", self.consumer_capacity)?;
        if !self.source_joules_per_tick.is_finite() || self.source_joules_per_tick < 0.0 {
            return Err(ConfigError::NotFinite {
                field: "simulation.source_joules_per_tick",
                value: self.source_joules_per_tick,
            });
        }
        Ok(())
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("CABLE_GRID__").split("__"));
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()?;
        self.protocols.validate()?;
        self.simulation.validate()?;
        Ok(())
    }
}
