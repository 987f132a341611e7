//! Background traffic: random sends from non-gateway nodes.
//!
//! Called once per frame by the driver. With a fixed per-frame probability a
//! random non-gateway node is picked and a send is scheduled a short,
//! jittered delay ahead of the engine clock.

use rand::Rng;
use rand::seq::SliceRandom;

use super::engine::SimulationEngine;
use super::errors::{NetworkError, SimulationError};
use super::event::EventId;
use super::network::NetworkState;
use super::types::NodeId;

/// Per-frame chance of scheduling a send.
pub const DEFAULT_SEND_PROBABILITY: f64 = 0.06;
/// Fixed part of the scheduling horizon (ms).
pub const MIN_SEND_DELAY_MS: f64 = 200.0;
/// Uniform jitter added on top of `MIN_SEND_DELAY_MS` (ms).
pub const SEND_DELAY_JITTER_MS: f64 = 800.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TrafficGenerator {
    probability: f64,
    min_delay_ms: f64,
    jitter_ms: f64,
}

impl Default for TrafficGenerator {
    fn default() -> Self {
        TrafficGenerator {
            probability: DEFAULT_SEND_PROBABILITY,
            min_delay_ms: MIN_SEND_DELAY_MS,
            jitter_ms: SEND_DELAY_JITTER_MS,
        }
    }
}

impl TrafficGenerator {
    /// Generator with a custom per-frame probability and the default horizon.
    pub fn new(probability: f64) -> Result<Self, NetworkError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(NetworkError::InvalidParameter(format!(
                "traffic probability {} must be within 0..1",
                probability
            )));
        }
        Ok(TrafficGenerator { probability, ..Self::default() })
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Roll for this frame and schedule at most one send.
    ///
    /// Returns the scheduled event, or `None` when the roll failed or the
    /// network has no non-gateway nodes. Draws come from the engine's
    /// entropy source.
    pub fn tick(&self, engine: &mut SimulationEngine, state: &NetworkState) -> Result<Option<EventId>, SimulationError> {
        let now = engine.now_ms();
        let (origin, at_ms) = {
            let rng = engine.rng_mut();
            if !rng.gen_bool(self.probability) {
                return Ok(None);
            }
            let candidates: Vec<NodeId> = state.non_gateway_nodes().map(|n| n.id).collect();
            let Some(&origin) = candidates.choose(&mut *rng) else {
                return Ok(None);
            };
            let jitter = if self.jitter_ms > 0.0 { rng.gen_range(0.0..self.jitter_ms) } else { 0.0 };
            (origin, now + self.min_delay_ms + jitter)
        };
        engine.schedule_send(at_ms, origin).map(Some)
    }
}
