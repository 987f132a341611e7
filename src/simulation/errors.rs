//! Error types for the simulation core.
//!
//! Unreachable gateways and failed hops are normal outcomes and never show up
//! here. These errors cover rejected configuration changes and internal
//! inconsistencies between the link list and the router.

use super::types::NodeId;

/// Errors raised by topology and parameter changes.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// A live parameter is outside the range the formulas accept.
    InvalidParameter(String),
    /// The gateway can never be removed from the node list.
    GatewayRemoval,
    /// A node ID was referenced but is not present.
    NodeNotFound(NodeId),
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            NetworkError::GatewayRemoval => write!(f, "The gateway cannot be removed"),
            NetworkError::NodeNotFound(id) => write!(f, "Node {} not found", id),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Internal routing defects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// A reconstructed hop pair has no backing link in the current link list.
    MissingLink { from: NodeId, to: NodeId },
}

impl std::fmt::Display for RoutingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingError::MissingLink { from, to } => {
                write!(f, "Reconstructed hop {} -> {} has no backing link", from, to)
            }
        }
    }
}

impl std::error::Error for RoutingError {}

/// Top-level error for engine operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    Network(NetworkError),
    Routing(RoutingError),
    /// A scheduled time or step length was negative or not finite.
    InvalidTime(f64),
}

impl std::fmt::Display for SimulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationError::Network(e) => write!(f, "Network error: {}", e),
            SimulationError::Routing(e) => write!(f, "Routing error: {}", e),
            SimulationError::InvalidTime(t) => write!(f, "Invalid simulation time: {}", t),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Network(e) => Some(e),
            SimulationError::Routing(e) => Some(e),
            SimulationError::InvalidTime(_) => None,
        }
    }
}

impl From<NetworkError> for SimulationError {
    fn from(e: NetworkError) -> Self {
        SimulationError::Network(e)
    }
}

impl From<RoutingError> for SimulationError {
    fn from(e: RoutingError) -> Self {
        SimulationError::Routing(e)
    }
}
