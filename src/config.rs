//! Run configuration loaded from TOML.
//!
//! Every key is optional; a missing file section falls back to the defaults
//! below. Keys are kebab-case:
//!
//! ```toml
//! node-count = 12
//! width = 900.0
//! height = 520.0
//! spreading-factor = 9
//! symbol-duration-ms = 80.0
//! noise = 0.25
//! topology = "mesh"
//! frame-ms = 16.0
//! frames = 3600
//! traffic-probability = 0.06
//! seed = 42
//!
//! [dashboard]
//! sensors = 4
//! max-hops = 3
//!
//! [tradeoff]
//! spreading-factor = 9
//! bandwidth-level = 3
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::simulation::tradeoff::TradeoffInputs;
use crate::simulation::types::{NetworkParameters, Topology};

const MAX_NODES: usize = 10_000;

/// Error type for configuration loading failures.
#[derive(Debug)]
pub enum ConfigError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileReadError(msg) => write!(f, "Failed to read config file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config file: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Sensor dashboard section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DashboardConfig {
    pub sensors: usize,
    pub max_hops: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig { sensors: 4, max_hops: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SimulatorConfig {
    /// Non-gateway nodes in the generated network.
    pub node_count: usize,
    /// Canvas width in world units.
    pub width: f64,
    /// Canvas height in world units.
    pub height: f64,
    pub spreading_factor: u8,
    pub symbol_duration_ms: f64,
    pub noise: f64,
    pub topology: Topology,
    /// Simulated time advanced per frame (ms).
    pub frame_ms: f64,
    pub frames: u64,
    /// Per-frame chance of scheduling a background send.
    pub traffic_probability: f64,
    /// Seed for every random draw of the run. Entropy when absent.
    pub seed: Option<u64>,
    pub dashboard: Option<DashboardConfig>,
    pub tradeoff: Option<TradeoffInputs>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        let params = NetworkParameters::default();
        SimulatorConfig {
            node_count: 12,
            width: 900.0,
            height: 520.0,
            spreading_factor: params.spreading_factor,
            symbol_duration_ms: params.symbol_duration_ms,
            noise: params.noise,
            topology: params.topology,
            frame_ms: 16.0,
            frames: 3_600,
            traffic_probability: 0.06,
            seed: None,
            dashboard: None,
            tradeoff: None,
        }
    }
}

impl SimulatorConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("{}", config_path.display()))
            .map_err(|e| ConfigError::FileReadError(format!("{:#}", e)))?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimulatorConfig = toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate().map_err(ConfigError::ValidationError)?;
        Ok(config)
    }

    /// The live network parameters described by this configuration.
    pub fn network_parameters(&self) -> NetworkParameters {
        NetworkParameters {
            spreading_factor: self.spreading_factor,
            symbol_duration_ms: self.symbol_duration_ms,
            noise: self.noise,
            topology: self.topology,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.node_count > MAX_NODES {
            return Err(format!("Node count {} exceeds maximum of {}", self.node_count, MAX_NODES));
        }
        if !(self.width.is_finite() && self.width > 0.0 && self.height.is_finite() && self.height > 0.0) {
            return Err(format!("Canvas {}x{} must have positive dimensions", self.width, self.height));
        }
        self.network_parameters().validate().map_err(|e| e.to_string())?;
        if !self.frame_ms.is_finite() || self.frame_ms <= 0.0 {
            return Err(format!("Invalid frame-ms {}, must be positive", self.frame_ms));
        }
        if !(0.0..=1.0).contains(&self.traffic_probability) {
            return Err(format!("Invalid traffic-probability {}, must be 0-1", self.traffic_probability));
        }
        if let Some(dashboard) = &self.dashboard {
            if dashboard.max_hops == 0 {
                return Err("Dashboard max-hops must be at least 1".to_string());
            }
        }
        if let Some(tradeoff) = &self.tradeoff {
            tradeoff.validate().map_err(|e| format!("Trade-off inputs: {}", e))?;
        }
        Ok(())
    }
}
