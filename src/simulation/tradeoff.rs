//! Closed-form trade-off estimator.
//!
//! Maps a handful of radio settings to four headline outcomes (success rate,
//! latency, throughput, relative energy cost) using simple monotone rules.
//! Nothing here is RF modelling; the point is that the outcomes pull against
//! each other the way real LoRa-style settings do.

use serde::{Deserialize, Serialize};

use super::errors::NetworkError;

/// Payload assumed per send when estimating throughput (bytes).
const PAYLOAD_BYTES: f64 = 16.0;
/// Symbol time at SF7 and medium bandwidth (ms).
const BASE_SYMBOL_MS: f64 = 40.0;

/// Chart normalisation: latency at or above this scores zero.
const LATENCY_CHART_CEILING_MS: f64 = 2_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TradeoffInputs {
    /// 7..=12
    pub spreading_factor: u8,
    /// 1 (narrow) ..= 5 (wide)
    pub bandwidth_level: u8,
    /// Seconds between sends per node.
    pub send_interval_s: f64,
    /// 0..=1
    pub noise: f64,
    pub node_count: u32,
    /// Maximum relay depth, at least 1.
    pub mesh_depth: u32,
}

impl Default for TradeoffInputs {
    fn default() -> Self {
        TradeoffInputs {
            spreading_factor: 9,
            bandwidth_level: 3,
            send_interval_s: 10.0,
            noise: 0.2,
            node_count: 50,
            mesh_depth: 2,
        }
    }
}

impl TradeoffInputs {
    pub fn validate(&self) -> Result<(), NetworkError> {
        if !(7..=12).contains(&self.spreading_factor) {
            return Err(NetworkError::InvalidParameter(format!(
                "spreading factor {} must be within 7..12",
                self.spreading_factor
            )));
        }
        if !(1..=5).contains(&self.bandwidth_level) {
            return Err(NetworkError::InvalidParameter(format!(
                "bandwidth level {} must be within 1..5",
                self.bandwidth_level
            )));
        }
        if !self.send_interval_s.is_finite() || self.send_interval_s <= 0.0 {
            return Err(NetworkError::InvalidParameter(format!(
                "send interval {} must be a positive number of seconds",
                self.send_interval_s
            )));
        }
        if !(0.0..=1.0).contains(&self.noise) {
            return Err(NetworkError::InvalidParameter(format!("noise {} must be within 0..1", self.noise)));
        }
        if self.mesh_depth == 0 {
            return Err(NetworkError::InvalidParameter("mesh depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradeoffOutcome {
    /// Fraction of packets delivered, 0.1..=0.99.
    pub success: f64,
    /// 50..=5000 ms
    pub latency_ms: f64,
    /// 0.01..=50 kbps
    pub throughput_kbps: f64,
    /// Relative airtime cost per delivered packet, 0.5..=20.
    pub energy_cost: f64,
}

/// Outcomes rescaled to 0..100 where higher is always better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartScores {
    pub success: f64,
    pub latency: f64,
    pub throughput: f64,
    pub energy: f64,
}

/// Estimate outcomes for `inputs`.
pub fn estimate(inputs: &TradeoffInputs) -> Result<TradeoffOutcome, NetworkError> {
    inputs.validate()?;

    let sf_steps = inputs.spreading_factor as f64 - 7.0;
    let bw_offset = inputs.bandwidth_level as f64 - 3.0;
    let depth_steps = inputs.mesh_depth as f64 - 1.0;
    let nodes = inputs.node_count as f64;
    let noise = inputs.noise;

    // Higher SF and mesh paths help; noise, crowding, wide bandwidth and extra hops hurt.
    let range_boost = sf_steps * 0.12;
    let bw_penalty = bw_offset * 0.06;
    let noise_penalty = noise * 0.7;
    let crowding_penalty = ((nodes - 50.0) / 150.0).max(0.0);
    let depth_boost = depth_steps * 0.05;
    let depth_penalty = depth_steps * 0.03;
    let success = (0.85 + range_boost - bw_penalty - noise_penalty - crowding_penalty + depth_boost - depth_penalty)
        .clamp(0.1, 0.99);

    let symbol_ms = BASE_SYMBOL_MS + sf_steps * 25.0 - bw_offset * 8.0;
    let hops = 1.0 + inputs.mesh_depth as f64 * 0.7;
    let latency_ms = (symbol_ms * hops * (1.0 + noise * 1.2) * (1.0 + nodes / 200.0)).clamp(50.0, 5_000.0);

    let per_node_bytes_per_s = (PAYLOAD_BYTES / inputs.send_interval_s) * (1.0 + bw_offset * 0.3);
    let throughput_kbps = (per_node_bytes_per_s * nodes * success * 8.0 / 1_000.0).clamp(0.01, 50.0);

    let airtime_factor = (symbol_ms / BASE_SYMBOL_MS) * hops;
    let energy_cost = (airtime_factor / success).clamp(0.5, 20.0);

    Ok(TradeoffOutcome { success, latency_ms, throughput_kbps, energy_cost })
}

impl TradeoffOutcome {
    pub fn chart_scores(&self) -> ChartScores {
        ChartScores {
            success: self.success * 100.0,
            latency: 100.0 - (self.latency_ms / LATENCY_CHART_CEILING_MS * 100.0).min(100.0),
            throughput: self.throughput_kbps / 50.0 * 100.0,
            energy: 100.0 - (self.energy_cost / 20.0 * 100.0).min(100.0),
        }
    }
}
