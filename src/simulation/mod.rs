//! Packet-delivery simulation core.
//!
//! This module provides the complete simulation infrastructure for a small
//! LoRa-style sensor network. It integrates:
//! - A topology model with a derived, fully regenerated link list
//! - Mesh (cheapest path) and star (direct link) routing to the gateway
//! - A discrete-event engine with per-hop success draws and cumulative stats
//! - Supporting models driven by the same parameters (traffic, animation
//!   feed, trade-off estimator, sensor dashboard)
//!
//! ## Module Organization
//!
//! - `types`: Core data structures (nodes, links, packets, parameters, stats)
//! - `errors`: Error enums for parameter changes, routing and the engine
//! - `geometry`: Distance, range and ring placement helpers
//! - `signal_calculations`: Link quality, success probability and latency
//! - `network`: `NetworkState`, network generation and node set editing
//! - `routing`: Mesh and star path resolution
//! - `event`: Time-ordered event queue
//! - `engine`: `SimulationEngine` and the `PacketObserver` seam
//! - `traffic`: Random background sends
//! - `feed`: Per-packet animation entries
//! - `tradeoff`: Closed-form settings explorer
//! - `dashboard`: Sensor reporting model
//!
//! ## Public API
//!
//! A driver owns one `NetworkState` and one `SimulationEngine`, calls
//! `SimulationEngine::step` once per frame and reads `NetworkState::stats`.
//! Parameter and node set changes go through `NetworkState` and always
//! recompute links before returning.

pub mod dashboard;
pub mod engine;
pub mod errors;
pub mod event;
pub mod feed;
pub mod geometry;
pub mod network;
pub mod routing;
pub mod signal_calculations;
pub mod tradeoff;
pub mod traffic;
pub mod types;

pub use engine::{PacketObserver, SimulationEngine};
pub use errors::{NetworkError, RoutingError, SimulationError};
pub use event::{EventId, EventKind};
pub use feed::{ActivePacket, PacketFeed};
pub use network::{NetworkState, create_random_network, recompute_links};
pub use routing::{Route, resolve_route};
pub use traffic::TrafficGenerator;
pub use types::{
    DeliveryStatus, Link, NetworkParameters, NetworkStats, Node, NodeId, NodeRole, Packet, PacketId, PacketOutcome,
    Point, Topology,
};
