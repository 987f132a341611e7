//! Path resolution from an origin node to the gateway.
//!
//! Two policies:
//! - **Mesh**: Dijkstra over the adjacency index, with edge cost
//!   `1 / max(0.15, quality)` so high-quality links are preferred.
//! - **Star**: only a direct origin to gateway link counts.
//!
//! Both return a `Route`. An unreachable gateway is not an error: the route
//! then holds just the origin and no links. The only error is an internal
//! inconsistency where a reconstructed hop has no backing link.
//!
//! Tie-break: among frontier nodes with equal tentative distance the lowest
//! `NodeId` is settled first, and a neighbor is only relaxed on a strictly
//! smaller distance, so the first predecessor found is kept.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use super::errors::RoutingError;
use super::network::NetworkState;
use super::types::{NodeId, Topology};

/// Floor applied to link quality before inverting it into a cost.
pub const MIN_COST_QUALITY: f64 = 0.15;

/// A resolved path. Links are indices into the state's current link list and
/// are only valid until the next link recomputation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    /// Nodes from origin to gateway (or just the origin when unreachable).
    pub nodes: Vec<NodeId>,
    /// One link index per consecutive node pair.
    pub links: Vec<usize>,
}

impl Route {
    /// The "no path" result: stay at the origin.
    pub fn no_path(origin: NodeId) -> Self {
        Route { nodes: vec![origin], links: Vec::new() }
    }

    /// Whether the route ends at the gateway (a zero-hop gateway route counts).
    pub fn reaches_gateway(&self) -> bool {
        self.nodes.last() == Some(&NodeId::GATEWAY)
    }

    pub fn hop_count(&self) -> usize {
        self.links.len()
    }
}

/// Cost of traversing a link of the given quality.
pub fn edge_cost(quality: f64) -> f64 {
    1.0 / quality.max(MIN_COST_QUALITY)
}

/// Resolve a route for `origin` under `topology`.
pub fn resolve_route(state: &NetworkState, origin: NodeId, topology: Topology) -> Result<Route, RoutingError> {
    match topology {
        Topology::Mesh => mesh_route(state, origin),
        Topology::Star => Ok(star_route(state, origin)),
    }
}

/// Frontier entry for the shortest-path search.
///
/// `BinaryHeap` is a max-heap, so the ordering is reversed to pop the
/// smallest `(cost, node)` first.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f64,
    node: NodeId,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost).then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

/// Cheapest multi-hop route from `origin` to the gateway.
///
/// # Returns
///
/// * `Ok(route)` ending at the gateway when reachable
/// * `Ok(Route::no_path(origin))` when the gateway is unreachable or the origin is unknown
/// * `Err(RoutingError::MissingLink)` if a reconstructed hop pair has no link
pub fn mesh_route(state: &NetworkState, origin: NodeId) -> Result<Route, RoutingError> {
    let gateway = NodeId::GATEWAY;
    if !state.contains(origin) {
        return Ok(Route::no_path(origin));
    }
    if origin == gateway {
        return Ok(Route { nodes: vec![gateway], links: Vec::new() });
    }

    let mut dist: BTreeMap<NodeId, f64> = BTreeMap::new();
    let mut prev: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    let mut settled: BTreeSet<NodeId> = BTreeSet::new();
    let mut frontier = BinaryHeap::new();

    dist.insert(origin, 0.0);
    frontier.push(Frontier { cost: 0.0, node: origin });

    while let Some(Frontier { cost, node }) = frontier.pop() {
        if !settled.insert(node) {
            continue;
        }
        if node == gateway {
            break;
        }

        for adj in state.neighbors(node) {
            if settled.contains(&adj.neighbor) {
                continue;
            }
            let Some(link) = state.link(adj.link) else {
                continue;
            };
            let alt = cost + edge_cost(link.quality);
            if alt < dist.get(&adj.neighbor).copied().unwrap_or(f64::INFINITY) {
                dist.insert(adj.neighbor, alt);
                prev.insert(adj.neighbor, node);
                frontier.push(Frontier { cost: alt, node: adj.neighbor });
            }
        }
    }

    if !settled.contains(&gateway) {
        log::debug!("Gateway unreachable from {} under mesh routing", origin);
        return Ok(Route::no_path(origin));
    }

    let mut nodes = vec![gateway];
    let mut current = gateway;
    while let Some(&p) = prev.get(&current) {
        nodes.push(p);
        current = p;
    }
    nodes.reverse();

    let links = path_links(state, &nodes)?;
    Ok(Route { nodes, links })
}

/// Direct single-hop route, or no path when origin and gateway are not linked.
pub fn star_route(state: &NetworkState, origin: NodeId) -> Route {
    let gateway = NodeId::GATEWAY;
    if origin == gateway {
        return Route { nodes: vec![gateway], links: Vec::new() };
    }
    match state.link_between(origin, gateway) {
        Some(link) => Route { nodes: vec![origin, gateway], links: vec![link] },
        None => Route::no_path(origin),
    }
}

/// Map consecutive node pairs back to their link indices.
pub(crate) fn path_links(state: &NetworkState, nodes: &[NodeId]) -> Result<Vec<usize>, RoutingError> {
    nodes
        .windows(2)
        .map(|pair| {
            state.link_between(pair[0], pair[1]).ok_or_else(|| {
                log::error!("Route hop {} -> {} has no backing link", pair[0], pair[1]);
                RoutingError::MissingLink { from: pair[0], to: pair[1] }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::network::create_random_network;
    use crate::simulation::types::{NodeRole, Point};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn state_with(nodes: &[(f64, f64, NodeRole)]) -> (NetworkState, Vec<NodeId>) {
        let mut state = NetworkState::new(Point::new(0.0, 0.0));
        let ids = nodes.iter().map(|&(x, y, role)| state.add_node_at(Point::new(x, y), role).unwrap()).collect();
        (state, ids)
    }

    fn assert_route_is_linked(state: &NetworkState, route: &Route) {
        assert_eq!(route.links.len(), route.nodes.len() - 1);
        for (pair, &link) in route.nodes.windows(2).zip(&route.links) {
            assert!(state.links()[link].connects(pair[0], pair[1]));
        }
    }

    #[test]
    fn edge_cost_floors_low_quality() {
        assert_eq!(edge_cost(1.0), 1.0);
        assert_eq!(edge_cost(0.5), 2.0);
        assert_eq!(edge_cost(0.0), 1.0 / MIN_COST_QUALITY);
        assert_eq!(edge_cost(0.1), edge_cost(0.15));
    }

    #[test]
    fn mesh_relays_through_intermediate_node() {
        let (state, ids) = state_with(&[(250.0, 0.0, NodeRole::Relay), (500.0, 0.0, NodeRole::EndDevice)]);
        let route = mesh_route(&state, ids[1]).unwrap();
        assert_eq!(route.nodes, vec![ids[1], ids[0], NodeId::GATEWAY]);
        assert!(route.reaches_gateway());
        assert_eq!(route.hop_count(), 2);
        assert_route_is_linked(&state, &route);
    }

    #[test]
    fn mesh_prefers_two_strong_links_over_one_weak_link() {
        // Direct: d=300 -> q=0.2625, cost ~3.81. Via relay: 2 × d=150 -> q=0.54375, cost ~3.68.
        let (state, ids) = state_with(&[(150.0, 0.0, NodeRole::Relay), (300.0, 0.0, NodeRole::EndDevice)]);
        assert!(state.link_between(ids[1], NodeId::GATEWAY).is_some());

        let route = mesh_route(&state, ids[1]).unwrap();
        assert_eq!(route.nodes, vec![ids[1], ids[0], NodeId::GATEWAY]);

        let star = star_route(&state, ids[1]);
        assert_eq!(star.nodes, vec![ids[1], NodeId::GATEWAY]);
        assert_route_is_linked(&state, &star);
    }

    #[test]
    fn equal_cost_paths_pick_lowest_id_relay() {
        let (state, ids) = state_with(&[
            (200.0, 100.0, NodeRole::Relay),
            (200.0, -100.0, NodeRole::Relay),
            (400.0, 0.0, NodeRole::EndDevice),
        ]);
        for _ in 0..5 {
            let route = mesh_route(&state, ids[2]).unwrap();
            assert_eq!(route.nodes, vec![ids[2], ids[0], NodeId::GATEWAY]);
        }
    }

    #[test]
    fn isolated_node_has_no_path() {
        let (state, ids) = state_with(&[(1000.0, 1000.0, NodeRole::EndDevice)]);
        let mesh = mesh_route(&state, ids[0]).unwrap();
        assert_eq!(mesh, Route::no_path(ids[0]));
        assert!(!mesh.reaches_gateway());
        assert_eq!(star_route(&state, ids[0]), Route::no_path(ids[0]));
    }

    #[test]
    fn star_ignores_multi_hop_reachability() {
        let (state, ids) = state_with(&[(250.0, 0.0, NodeRole::Relay), (500.0, 0.0, NodeRole::EndDevice)]);
        let star = resolve_route(&state, ids[1], Topology::Star).unwrap();
        assert_eq!(star.nodes, vec![ids[1]]);
        assert!(star.links.is_empty());

        let mesh = resolve_route(&state, ids[1], Topology::Mesh).unwrap();
        assert!(mesh.reaches_gateway());
    }

    #[test]
    fn gateway_origin_is_a_trivial_route() {
        let (state, _) = state_with(&[(100.0, 0.0, NodeRole::EndDevice)]);
        for topology in [Topology::Mesh, Topology::Star] {
            let route = resolve_route(&state, NodeId::GATEWAY, topology).unwrap();
            assert_eq!(route.nodes, vec![NodeId::GATEWAY]);
            assert_eq!(route.hop_count(), 0);
            assert!(route.reaches_gateway());
        }
    }

    #[test]
    fn unknown_origin_has_no_path() {
        let (state, _) = state_with(&[(100.0, 0.0, NodeRole::EndDevice)]);
        assert_eq!(mesh_route(&state, NodeId(99)).unwrap(), Route::no_path(NodeId(99)));
        assert_eq!(star_route(&state, NodeId(99)), Route::no_path(NodeId(99)));
    }

    #[test]
    fn missing_link_is_reported() {
        let (state, ids) = state_with(&[(1000.0, 0.0, NodeRole::EndDevice)]);
        let err = path_links(&state, &[ids[0], NodeId::GATEWAY]).unwrap_err();
        assert_eq!(err, RoutingError::MissingLink { from: ids[0], to: NodeId::GATEWAY });
    }

    #[test]
    fn random_networks_route_along_existing_links() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let state = create_random_network(15, 900.0, 520.0, &mut rng);
            for node in state.non_gateway_nodes() {
                let route = mesh_route(&state, node.id).unwrap();
                assert_eq!(route.nodes[0], node.id);
                if route.reaches_gateway() {
                    assert_route_is_linked(&state, &route);
                } else {
                    assert_eq!(route, Route::no_path(node.id));
                }

                let star = star_route(&state, node.id);
                let direct = state.link_between(node.id, NodeId::GATEWAY).is_some();
                assert_eq!(star.nodes.len() == 2, direct);
            }
        }
    }
}
