//! Type definitions for the simulation.
//!
//! Contains all data structures used across the simulation including:
//! - Node identity, roles and positions
//! - Links with their derived quality
//! - Packets and per-packet delivery outcomes
//! - Live network parameters and cumulative statistics
//!
//! The aggregate root, `NetworkState`, lives in `network.rs`.

use serde::{Deserialize, Serialize};

use super::errors::NetworkError;

/// Radio range in world units. Node pairs farther apart than this never get a link.
pub const MAX_RADIO_RANGE: f64 = 320.0;

/// Number of symbols a single hop occupies in the latency model.
pub const SYMBOLS_PER_HOP: f64 = 4.0;

/// Accepted spreading factor range for live parameter changes.
pub const MIN_SPREADING_FACTOR: u8 = 5;
pub const MAX_SPREADING_FACTOR: u8 = 12;

/// Unique identifier for a node. The gateway is always `NodeId::GATEWAY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const GATEWAY: NodeId = NodeId(0);

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == NodeId::GATEWAY { write!(f, "GW") } else { write!(f, "N{}", self.0) }
    }
}

/// Simple 2D point in world (canvas) units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    EndDevice,
    Relay,
    Gateway,
}

/// A radio node placed in the world.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub position: Point,
    pub role: NodeRole,
    /// Relative battery level in 0..1. Informational only.
    pub battery: f64,
}

impl Node {
    pub fn new(id: NodeId, position: Point, role: NodeRole) -> Self {
        Node { id, position, role, battery: 1.0 }
    }

    pub fn is_gateway(&self) -> bool {
        self.role == NodeRole::Gateway
    }
}

/// Undirected radio link between two present nodes.
///
/// Links are a cached projection of nodes + parameters and are regenerated
/// wholesale; never hold on to a link index across a recomputation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
    /// Derived quality in [0, 1].
    pub quality: f64,
    /// Simulated time (ms) of the most recent hop failure, for visual feedback.
    pub last_failure_at: Option<f64>,
}

impl Link {
    pub fn connects(&self, x: NodeId, y: NodeId) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }

    /// The endpoint opposite to `id`, if `id` is an endpoint at all.
    pub fn other(&self, id: NodeId) -> Option<NodeId> {
        if self.a == id {
            Some(self.b)
        } else if self.b == id {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Monotonic packet identifier, never reused within a `NetworkState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PacketId(pub u64);

impl std::fmt::Display for PacketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P#{}", self.0)
    }
}

/// A single attempted delivery towards the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Packet {
    pub id: PacketId,
    pub origin: NodeId,
    /// Simulated time (ms) at which the send was processed.
    pub created_at: f64,
    /// Resolved hop path, origin first.
    pub hops: Vec<NodeId>,
}

/// Routing policy used when resolving a packet's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// Multi-hop via relays, cheapest path by link quality.
    #[default]
    Mesh,
    /// Only a direct origin to gateway link counts.
    Star,
}

/// Live parameters feeding the link-quality formula and the latency model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkParameters {
    pub spreading_factor: u8,
    pub symbol_duration_ms: f64,
    /// Noise as a fraction in [0, 1].
    pub noise: f64,
    pub topology: Topology,
}

impl Default for NetworkParameters {
    fn default() -> Self {
        NetworkParameters {
            spreading_factor: 9,
            symbol_duration_ms: 80.0,
            noise: 0.25,
            topology: Topology::Mesh,
        }
    }
}

impl NetworkParameters {
    /// Reject parameter sets the formulas cannot make sense of.
    pub fn validate(&self) -> Result<(), NetworkError> {
        if !(MIN_SPREADING_FACTOR..=MAX_SPREADING_FACTOR).contains(&self.spreading_factor) {
            return Err(NetworkError::InvalidParameter(format!(
                "spreading_factor {} must be {}-{}",
                self.spreading_factor, MIN_SPREADING_FACTOR, MAX_SPREADING_FACTOR
            )));
        }
        if !self.symbol_duration_ms.is_finite() || self.symbol_duration_ms <= 0.0 {
            return Err(NetworkError::InvalidParameter(format!(
                "symbol_duration_ms {} must be a positive number",
                self.symbol_duration_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.noise) {
            return Err(NetworkError::InvalidParameter(format!("noise {} must be within 0..1", self.noise)));
        }
        Ok(())
    }
}

/// Cumulative delivery statistics. Monotonically increasing until `reset`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_delivered: u64,
    pub total_hops: u64,
    pub total_latency_ms: f64,
}

impl NetworkStats {
    pub fn reset(&mut self) {
        *self = NetworkStats::default();
    }

    /// Average hop count per delivered packet (0 when nothing was delivered).
    pub fn average_hops(&self) -> f64 {
        self.total_hops as f64 / self.packets_delivered.max(1) as f64
    }

    pub fn average_latency_ms(&self) -> f64 {
        self.total_latency_ms / self.packets_delivered.max(1) as f64
    }

    pub fn delivery_ratio(&self) -> f64 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        self.packets_delivered as f64 / self.packets_sent as f64
    }
}

/// How a single send ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum DeliveryStatus {
    Delivered,
    /// The hop at `hop_index` (zero-based) failed its success draw.
    FailedAtHop { hop_index: usize },
    /// No path to the gateway under the active topology.
    Unreachable,
}

/// Result of one `send_packet`, also handed to the registered observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketOutcome {
    pub packet: Packet,
    pub status: DeliveryStatus,
    pub success: bool,
    pub latency_ms: f64,
    /// Hops attempted, including the failing one.
    pub hop_count: usize,
    pub path: Vec<NodeId>,
    /// Snapshot of the links along the path, taken after failure stamping.
    pub links: Vec<Link>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display_marks_gateway() {
        assert_eq!(NodeId::GATEWAY.to_string(), "GW");
        assert_eq!(NodeId(7).to_string(), "N7");
    }

    #[test]
    fn link_other_endpoint() {
        let link = Link { a: NodeId(1), b: NodeId(2), quality: 0.5, last_failure_at: None };
        assert_eq!(link.other(NodeId(1)), Some(NodeId(2)));
        assert_eq!(link.other(NodeId(2)), Some(NodeId(1)));
        assert_eq!(link.other(NodeId(3)), None);
        assert!(link.connects(NodeId(2), NodeId(1)));
    }

    #[test]
    fn parameter_validation_bounds() {
        assert!(NetworkParameters::default().validate().is_ok());

        let mut p = NetworkParameters::default();
        p.spreading_factor = 13;
        assert!(p.validate().is_err());

        let mut p = NetworkParameters::default();
        p.noise = 1.5;
        assert!(p.validate().is_err());

        let mut p = NetworkParameters::default();
        p.symbol_duration_ms = 0.0;
        assert!(p.validate().is_err());

        let mut p = NetworkParameters::default();
        p.symbol_duration_ms = f64::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn stats_averages_divide_by_at_least_one() {
        let mut s = NetworkStats::default();
        assert_eq!(s.average_hops(), 0.0);
        assert_eq!(s.average_latency_ms(), 0.0);
        assert_eq!(s.delivery_ratio(), 0.0);

        s.packets_sent = 4;
        s.packets_delivered = 2;
        s.total_hops = 5;
        s.total_latency_ms = 640.0;
        assert_eq!(s.average_hops(), 2.5);
        assert_eq!(s.average_latency_ms(), 320.0);
        assert_eq!(s.delivery_ratio(), 0.5);

        s.reset();
        assert_eq!(s, NetworkStats::default());
    }
}
