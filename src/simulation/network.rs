//! Network state: the aggregate root of the simulation.
//!
//! `NetworkState` owns the node list, the derived link list with its adjacency
//! index, the packet-id counter, cumulative statistics and the live
//! parameters. It is mutated in place (node-count changes, parameter changes,
//! resets) so a driver can hold on to a single instance for a whole session.
//!
//! Invariants kept by every mutating operation:
//! - exactly one node has the `Gateway` role and it is never removed
//! - node ids are unique and never reused
//! - links (and the adjacency index) only reference nodes currently present;
//!   link recomputation always runs after the node set changes

use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::f64::consts::PI;

use super::errors::NetworkError;
use super::geometry::{distance_from_d2, distance2, point_on_ring, within_radio_range};
use super::signal_calculations::calculate_link_quality;
use super::types::{Link, NetworkParameters, NetworkStats, Node, NodeId, NodeRole, PacketId, Point};

/// Jitter applied to the ring radius of generated networks, in world units (total span).
const RING_JITTER: f64 = 40.0;

/// Share of nodes added through node-count changes that become relays.
const RELAY_PROBABILITY: f64 = 0.25;

/// One entry of the adjacency index: a neighbor and the index of the link reaching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjacent {
    pub neighbor: NodeId,
    pub link: usize,
}

/// The single live network of a simulation session.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkState {
    nodes: Vec<Node>,
    links: Vec<Link>,
    /// Node id -> neighbors, rebuilt together with `links`.
    #[serde(skip)]
    adjacency: BTreeMap<NodeId, Vec<Adjacent>>,
    #[serde(skip)]
    next_packet_id: u64,
    #[serde(skip)]
    next_node_number: u32,
    stats: NetworkStats,
    params: NetworkParameters,
}

/// Build a new network with a gateway near the top center and `node_count`
/// nodes on a jittered ring around the center of a `width` × `height` area.
///
/// Every fourth generated node is a relay, the rest are end devices. Links
/// are computed with the default parameters before returning.
///
/// # Parameters
///
/// * `node_count` - Number of non-gateway nodes
/// * `width`, `height` - Size of the world (canvas) area
/// * `rng` - Entropy for the ring jitter; results are not reproducible unless the caller seeds it
///
/// # Returns
///
/// A fully linked `NetworkState` with zeroed statistics.
pub fn create_random_network<R: Rng + ?Sized>(node_count: usize, width: f64, height: f64, rng: &mut R) -> NetworkState {
    let mut state = NetworkState::new(gateway_position(width, height));
    state.nodes.extend(generate_ring_nodes(node_count, width, height, 1, rng));
    state.next_node_number = node_count as u32 + 1;
    state.recompute_links();
    log::info!("Generated network with {} nodes and {} links", state.nodes.len(), state.links.len());
    state
}

/// Recompute the full link list of `state` from its nodes and parameters.
pub fn recompute_links(state: &mut NetworkState) {
    state.recompute_links();
}

fn gateway_position(width: f64, height: f64) -> Point {
    Point::new(width / 2.0, height * 0.15)
}

fn generate_ring_nodes<R: Rng + ?Sized>(node_count: usize, width: f64, height: f64, first_number: u32, rng: &mut R) -> Vec<Node> {
    let center = Point::new(width / 2.0, height / 2.0);
    let base_radius = width.min(height) * 0.35;

    (0..node_count)
        .map(|i| {
            let angle = (i as f64 / node_count.max(1) as f64) * PI * 2.0;
            let radius = base_radius + rng.gen_range(-0.5..0.5) * RING_JITTER;
            let role = if i % 4 == 0 { NodeRole::Relay } else { NodeRole::EndDevice };
            Node::new(NodeId(first_number + i as u32), point_on_ring(&center, radius, angle), role)
        })
        .collect()
}

impl NetworkState {
    /// An empty network holding only the gateway, with default parameters.
    pub fn new(gateway_position: Point) -> Self {
        let mut state = NetworkState {
            nodes: vec![Node::new(NodeId::GATEWAY, gateway_position, NodeRole::Gateway)],
            links: Vec::new(),
            adjacency: BTreeMap::new(),
            next_packet_id: 1,
            next_node_number: 1,
            stats: NetworkStats::default(),
            params: NetworkParameters::default(),
        };
        state.recompute_links();
        state
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, index: usize) -> Option<&Link> {
        self.links.get(index)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.adjacency.contains_key(&id)
    }

    pub fn gateway(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_gateway())
    }

    /// Non-gateway nodes, in node-list order.
    pub fn non_gateway_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| !n.is_gateway())
    }

    /// Neighbors of `id` from the adjacency index. Empty for unknown nodes.
    pub fn neighbors(&self, id: NodeId) -> &[Adjacent] {
        self.adjacency.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Index of the link between `a` and `b`, if they are directly connected.
    pub fn link_between(&self, a: NodeId, b: NodeId) -> Option<usize> {
        self.neighbors(a).iter().find(|adj| adj.neighbor == b).map(|adj| adj.link)
    }

    pub fn parameters(&self) -> &NetworkParameters {
        &self.params
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    /// Replace the live parameters and recompute every link.
    ///
    /// Invalid parameter sets are rejected and leave the state untouched.
    pub fn set_parameters(&mut self, params: NetworkParameters) -> Result<(), NetworkError> {
        if let Err(e) = params.validate() {
            log::warn!("Rejected parameter change: {}", e);
            return Err(e);
        }
        self.params = params;
        self.recompute_links();
        Ok(())
    }

    /// Zero the four cumulative counters. Nodes, links and parameters are untouched.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub(crate) fn stats_mut(&mut self) -> &mut NetworkStats {
        &mut self.stats
    }

    pub(crate) fn allocate_packet_id(&mut self) -> PacketId {
        let id = PacketId(self.next_packet_id);
        self.next_packet_id += 1;
        id
    }

    pub(crate) fn mark_link_failure(&mut self, index: usize, now_ms: f64) {
        if let Some(link) = self.links.get_mut(index) {
            link.last_failure_at = Some(now_ms);
        }
    }

    /// Add a node at an explicit position and recompute links. Returns its id.
    ///
    /// `NodeRole::Gateway` is not accepted here; the gateway is created with the network.
    pub fn add_node_at(&mut self, position: Point, role: NodeRole) -> Result<NodeId, NetworkError> {
        if role == NodeRole::Gateway {
            return Err(NetworkError::InvalidParameter("a network has exactly one gateway".to_string()));
        }
        let id = self.push_node(position, role);
        self.recompute_links();
        Ok(id)
    }

    /// Add a randomly placed node (25% relays) and recompute links. Returns its id.
    pub fn add_node<R: Rng + ?Sized>(&mut self, width: f64, height: f64, rng: &mut R) -> NodeId {
        let id = self.push_random_node(width, height, rng);
        self.recompute_links();
        id
    }

    /// Remove a non-gateway node and recompute links.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, NetworkError> {
        let index = self.nodes.iter().position(|n| n.id == id).ok_or(NetworkError::NodeNotFound(id))?;
        if self.nodes[index].is_gateway() {
            return Err(NetworkError::GatewayRemoval);
        }
        let removed = self.nodes.remove(index);
        self.recompute_links();
        Ok(removed)
    }

    /// Grow or shrink the non-gateway node set to `target` (at least one node).
    ///
    /// Growing appends randomly placed nodes with fresh ids; shrinking keeps the
    /// gateway plus the first `target` non-gateway nodes in list order.
    pub fn sync_node_count<R: Rng + ?Sized>(&mut self, target: usize, width: f64, height: f64, rng: &mut R) {
        let needed = target.max(1);
        let current = self.non_gateway_nodes().count();

        if needed > current {
            for _ in current..needed {
                self.push_random_node(width, height, rng);
            }
        } else if needed < current {
            let mut kept = 0;
            self.nodes.retain(|n| {
                if n.is_gateway() {
                    return true;
                }
                kept += 1;
                kept <= needed
            });
        }

        log::debug!("Node count synced from {} to {}", current, needed);
        self.recompute_links();
    }

    /// Regenerate all nodes in place (fresh ring layout) and zero the statistics.
    ///
    /// Parameters and the packet-id counter survive so ids are never reused.
    pub fn reset_network<R: Rng + ?Sized>(&mut self, node_count: usize, width: f64, height: f64, rng: &mut R) {
        let first_number = self.next_node_number;
        let mut nodes = vec![Node::new(NodeId::GATEWAY, gateway_position(width, height), NodeRole::Gateway)];
        nodes.extend(generate_ring_nodes(node_count, width, height, first_number, rng));

        self.nodes = nodes;
        self.next_node_number = first_number + node_count as u32;
        self.stats.reset();
        self.recompute_links();
        log::info!("Network reset with {} nodes and {} links", self.nodes.len(), self.links.len());
    }

    fn push_node(&mut self, position: Point, role: NodeRole) -> NodeId {
        let id = NodeId(self.next_node_number);
        self.next_node_number += 1;
        self.nodes.push(Node::new(id, position, role));
        id
    }

    fn push_random_node<R: Rng + ?Sized>(&mut self, width: f64, height: f64, rng: &mut R) -> NodeId {
        let center = Point::new(width / 2.0, height / 2.0);
        let angle = rng.gen_range(0.0..PI * 2.0);
        let radius = width.min(height) * (0.25 + rng.gen_range(0.0..0.3));
        let role = if rng.gen_bool(RELAY_PROBABILITY) { NodeRole::Relay } else { NodeRole::EndDevice };
        self.push_node(point_on_ring(&center, radius, angle), role)
    }

    /// Replace the whole link list and rebuild the adjacency index.
    ///
    /// Every node pair within the radio range gets exactly one link; pairs
    /// beyond range get none.
    pub fn recompute_links(&mut self) {
        let mut links = Vec::new();
        let mut adjacency: BTreeMap<NodeId, Vec<Adjacent>> = self.nodes.iter().map(|n| (n.id, Vec::new())).collect();

        for (i, a) in self.nodes.iter().enumerate() {
            for b in &self.nodes[i + 1..] {
                if !within_radio_range(&a.position, &b.position) {
                    continue;
                }
                let distance = distance_from_d2(distance2(&a.position, &b.position));
                let index = links.len();
                links.push(Link {
                    a: a.id,
                    b: b.id,
                    quality: calculate_link_quality(distance, &self.params),
                    last_failure_at: None,
                });
                adjacency.entry(a.id).or_default().push(Adjacent { neighbor: b.id, link: index });
                adjacency.entry(b.id).or_default().push(Adjacent { neighbor: a.id, link: index });
            }
        }

        log::debug!("Recomputed {} links for {} nodes", links.len(), self.nodes.len());
        self.links = links;
        self.adjacency = adjacency;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::{MAX_RADIO_RANGE, Topology};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn gateway_count(state: &NetworkState) -> usize {
        state.nodes().iter().filter(|n| n.is_gateway()).count()
    }

    fn assert_links_consistent(state: &NetworkState) {
        let present: HashSet<NodeId> = state.nodes().iter().map(|n| n.id).collect();
        for (index, link) in state.links().iter().enumerate() {
            assert!(present.contains(&link.a) && present.contains(&link.b), "dangling link {:?}", link);
            assert!((0.0..=1.0).contains(&link.quality));
            let a = state.node(link.a).unwrap();
            let b = state.node(link.b).unwrap();
            assert!(distance2(&a.position, &b.position) <= MAX_RADIO_RANGE * MAX_RADIO_RANGE);
            assert_eq!(state.link_between(link.a, link.b), Some(index));
            assert_eq!(state.link_between(link.b, link.a), Some(index));
        }
    }

    #[test]
    fn generated_network_has_one_gateway_and_unique_ids() {
        let mut rng = StdRng::seed_from_u64(7);
        let state = create_random_network(12, 900.0, 520.0, &mut rng);
        assert_eq!(state.nodes().len(), 13);
        assert_eq!(gateway_count(&state), 1);
        let ids: HashSet<NodeId> = state.nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids.len(), 13);
        assert_links_consistent(&state);
    }

    #[test]
    fn generated_network_layout() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = create_random_network(8, 800.0, 600.0, &mut rng);
        let gw = state.gateway().unwrap();
        assert_eq!(gw.position, Point::new(400.0, 90.0));

        let center = Point::new(400.0, 300.0);
        for node in state.non_gateway_nodes() {
            let r = distance_from_d2(distance2(&center, &node.position));
            assert!((190.0..=230.0).contains(&r), "radius {} outside jittered ring", r);
            assert_eq!(node.battery, 1.0);
        }

        let relays: Vec<u32> = state.non_gateway_nodes().filter(|n| n.role == NodeRole::Relay).map(|n| n.id.raw()).collect();
        assert_eq!(relays, vec![1, 5]);
    }

    #[test]
    fn zero_node_network_holds_only_the_gateway() {
        let mut rng = StdRng::seed_from_u64(3);
        let state = create_random_network(0, 400.0, 400.0, &mut rng);
        assert_eq!(state.nodes().len(), 1);
        assert!(state.links().is_empty());
    }

    #[test]
    fn pairs_beyond_range_get_no_link() {
        let mut state = NetworkState::new(Point::new(0.0, 0.0));
        let near = state.add_node_at(Point::new(100.0, 0.0), NodeRole::EndDevice).unwrap();
        let far = state.add_node_at(Point::new(1000.0, 0.0), NodeRole::EndDevice).unwrap();

        assert!(state.link_between(NodeId::GATEWAY, near).is_some());
        assert!(state.link_between(NodeId::GATEWAY, far).is_none());
        assert!(state.link_between(near, far).is_none());
        assert!(state.neighbors(far).is_empty());
        assert_links_consistent(&state);
    }

    #[test]
    fn parameter_change_recomputes_quality() {
        let mut state = NetworkState::new(Point::new(0.0, 0.0));
        state.add_node_at(Point::new(160.0, 0.0), NodeRole::EndDevice).unwrap();
        let before = state.links()[0].quality;

        let mut params = state.parameters().clone();
        params.spreading_factor = 12;
        params.noise = 0.0;
        state.set_parameters(params).unwrap();
        assert!(state.links()[0].quality > before);

        let mut bad = state.parameters().clone();
        bad.noise = -0.1;
        assert!(state.set_parameters(bad).is_err());
        assert_eq!(state.parameters().noise, 0.0);
    }

    #[test]
    fn topology_switch_keeps_links() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut state = create_random_network(6, 600.0, 600.0, &mut rng);
        let links_before = state.links().to_vec();
        let mut params = state.parameters().clone();
        params.topology = Topology::Star;
        state.set_parameters(params).unwrap();
        assert_eq!(state.links(), links_before.as_slice());
    }

    #[test]
    fn shrinking_preserves_gateway_and_drops_dangling_links() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = create_random_network(10, 700.0, 500.0, &mut rng);
        state.sync_node_count(3, 700.0, 500.0, &mut rng);

        assert_eq!(gateway_count(&state), 1);
        let kept: Vec<u32> = state.non_gateway_nodes().map(|n| n.id.raw()).collect();
        assert_eq!(kept, vec![1, 2, 3]);
        assert_links_consistent(&state);

        state.sync_node_count(0, 700.0, 500.0, &mut rng);
        assert_eq!(state.non_gateway_nodes().count(), 1);
        assert_eq!(gateway_count(&state), 1);
    }

    #[test]
    fn growing_uses_fresh_ids() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut state = create_random_network(4, 700.0, 500.0, &mut rng);
        state.sync_node_count(2, 700.0, 500.0, &mut rng);
        state.sync_node_count(5, 700.0, 500.0, &mut rng);

        let ids: Vec<u32> = state.non_gateway_nodes().map(|n| n.id.raw()).collect();
        assert_eq!(ids, vec![1, 2, 5, 6, 7]);
        assert_eq!(gateway_count(&state), 1);
        assert_links_consistent(&state);
    }

    #[test]
    fn gateway_cannot_be_removed_or_added() {
        let mut state = NetworkState::new(Point::new(0.0, 0.0));
        assert_eq!(state.remove_node(NodeId::GATEWAY), Err(NetworkError::GatewayRemoval));
        assert_eq!(state.remove_node(NodeId(42)), Err(NetworkError::NodeNotFound(NodeId(42))));
        assert!(state.add_node_at(Point::new(1.0, 1.0), NodeRole::Gateway).is_err());
        assert_eq!(gateway_count(&state), 1);
    }

    #[test]
    fn removing_a_node_drops_its_links() {
        let mut state = NetworkState::new(Point::new(0.0, 0.0));
        let relay = state.add_node_at(Point::new(100.0, 0.0), NodeRole::Relay).unwrap();
        let leaf = state.add_node_at(Point::new(200.0, 0.0), NodeRole::EndDevice).unwrap();
        assert_eq!(state.links().len(), 3);

        let removed = state.remove_node(relay).unwrap();
        assert_eq!(removed.id, relay);
        assert_eq!(state.links().len(), 1);
        assert!(!state.contains(relay));
        assert!(state.link_between(NodeId::GATEWAY, leaf).is_some());
        assert_links_consistent(&state);
    }

    #[test]
    fn reset_network_regenerates_in_place() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut state = create_random_network(5, 600.0, 400.0, &mut rng);
        let mut params = state.parameters().clone();
        params.spreading_factor = 11;
        state.set_parameters(params).unwrap();
        state.stats_mut().packets_sent = 3;
        let first_packet = state.allocate_packet_id();

        state.reset_network(7, 600.0, 400.0, &mut rng);

        assert_eq!(state.non_gateway_nodes().count(), 7);
        assert_eq!(gateway_count(&state), 1);
        assert_eq!(state.stats(), &NetworkStats::default());
        assert_eq!(state.parameters().spreading_factor, 11);
        assert!(state.allocate_packet_id() > first_packet);
        assert!(state.non_gateway_nodes().all(|n| n.id.raw() > 5));
        assert_links_consistent(&state);
    }

    #[test]
    fn reset_stats_leaves_topology_alone() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut state = create_random_network(6, 600.0, 600.0, &mut rng);
        let nodes = state.nodes().to_vec();
        let links = state.links().to_vec();
        {
            let stats = state.stats_mut();
            stats.packets_sent = 10;
            stats.packets_delivered = 4;
            stats.total_hops = 9;
            stats.total_latency_ms = 1200.0;
        }

        state.reset_stats();

        assert_eq!(state.stats(), &NetworkStats::default());
        assert_eq!(state.nodes(), nodes.as_slice());
        assert_eq!(state.links(), links.as_slice());
    }
}
