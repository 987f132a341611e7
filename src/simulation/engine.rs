//! Discrete-event packet engine.
//!
//! The engine owns simulated time, the pending event queue, the entropy
//! source used for per-hop success draws and an optional packet observer.
//! It does not own the network: every call borrows the `NetworkState` it
//! operates on, so the caller can mutate topology and parameters between
//! steps.
//!
//! Lifecycle of one packet:
//! 1. a `SendPacket` event becomes due during `step` (or `send_packet` is
//!    called directly)
//! 2. a route is resolved under the active topology
//! 3. each hop draws against `quality²`; the first failing draw stamps the
//!    link's `last_failure_at` and ends the attempt
//! 4. cumulative statistics are updated (deliveries only add hops and latency)
//! 5. the observer is notified; its faults are logged and otherwise ignored

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::panic::{AssertUnwindSafe, catch_unwind};

use super::errors::SimulationError;
use super::event::{EventId, EventKind, EventQueue};
use super::network::NetworkState;
use super::routing::resolve_route;
use super::signal_calculations::{calculate_hop_latency, link_success_probability};
use super::types::{DeliveryStatus, NodeId, Packet, PacketOutcome};

/// Receives the outcome of every processed send.
///
/// Returning an error (or panicking) never affects the simulation; the fault
/// is logged and counted.
pub trait PacketObserver {
    fn on_packet_result(&mut self, outcome: &PacketOutcome) -> anyhow::Result<()>;
}

impl<F> PacketObserver for F
where
    F: FnMut(&PacketOutcome) -> anyhow::Result<()>,
{
    fn on_packet_result(&mut self, outcome: &PacketOutcome) -> anyhow::Result<()> {
        self(outcome)
    }
}

pub struct SimulationEngine {
    now_ms: f64,
    queue: EventQueue,
    rng: Box<dyn RngCore>,
    observer: Option<Box<dyn PacketObserver>>,
    observer_faults: u64,
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationEngine {
    /// Engine at time zero with an entropy-seeded generator.
    pub fn new() -> Self {
        Self::with_rng(Box::new(StdRng::from_entropy()))
    }

    /// Engine at time zero drawing from `rng`. Use a seeded or scripted
    /// generator for reproducible runs.
    pub fn with_rng(rng: Box<dyn RngCore>) -> Self {
        SimulationEngine {
            now_ms: 0.0,
            queue: EventQueue::new(),
            rng,
            observer: None,
            observer_faults: 0,
        }
    }

    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Time of the earliest pending event, if any.
    pub fn next_event_at(&self) -> Option<f64> {
        self.queue.peek().map(|e| e.at_ms)
    }

    /// Number of observer calls that returned an error or panicked.
    pub fn observer_faults(&self) -> u64 {
        self.observer_faults
    }

    /// Shared entropy source, also used by traffic generation so a single
    /// seed drives the whole run.
    pub fn rng_mut(&mut self) -> &mut dyn RngCore {
        self.rng.as_mut()
    }

    /// Register the observer, replacing any previous one.
    pub fn set_observer(&mut self, observer: impl PacketObserver + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Queue an event at absolute time `at_ms`.
    ///
    /// Times in the past are allowed and fire on the next `step`.
    pub fn schedule(&mut self, at_ms: f64, kind: EventKind) -> Result<EventId, SimulationError> {
        if !at_ms.is_finite() {
            return Err(SimulationError::InvalidTime(at_ms));
        }
        let id = self.queue.schedule(at_ms, kind);
        log::trace!("Scheduled {} at {:.1} ms", id, at_ms);
        Ok(id)
    }

    /// Shorthand for scheduling a `SendPacket` event.
    pub fn schedule_send(&mut self, at_ms: f64, origin: NodeId) -> Result<EventId, SimulationError> {
        self.schedule(at_ms, EventKind::SendPacket { origin })
    }

    /// Advance time by `delta_ms` and process every event now due, in
    /// `(time, insertion)` order.
    ///
    /// Events scheduled while processing are seen in the same step when they
    /// are already due. On error the failing event is consumed and later
    /// events stay queued. Outcomes produced earlier in the same call are not
    /// returned, but their statistics and observer notifications have already
    /// happened, so an observer is the only complete record of such a step.
    ///
    /// The error path needs a route whose hops are missing from the link list.
    /// `recompute_links` rebuilds links and adjacency together, so any state
    /// edited through `NetworkState` keeps every due event's outcome.
    pub fn step(&mut self, state: &mut NetworkState, delta_ms: f64) -> Result<Vec<PacketOutcome>, SimulationError> {
        if !delta_ms.is_finite() || delta_ms < 0.0 {
            return Err(SimulationError::InvalidTime(delta_ms));
        }
        self.now_ms += delta_ms;

        let mut outcomes = Vec::new();
        while let Some(event) = self.queue.pop_due(self.now_ms) {
            log::trace!("Dispatching {} {} (due {:.1} ms)", event.id, event.kind, event.at_ms);
            match event.kind {
                EventKind::SendPacket { origin } => outcomes.push(self.send_packet(state, origin)?),
            }
        }
        Ok(outcomes)
    }

    /// Run one send from `origin` at the current time.
    ///
    /// A route without links produces an `Unreachable` outcome and counts as
    /// sent only. That covers ids no longer in the network and the gateway
    /// itself. Only an internal routing inconsistency is an error; the sent
    /// counter is then left untouched.
    pub fn send_packet(&mut self, state: &mut NetworkState, origin: NodeId) -> Result<PacketOutcome, SimulationError> {
        let now = self.now_ms;
        let id = state.allocate_packet_id();
        let topology = state.parameters().topology;
        let symbol_duration_ms = state.parameters().symbol_duration_ms;

        let route = resolve_route(state, origin, topology)?;
        state.stats_mut().packets_sent += 1;

        let packet = Packet { id, origin, created_at: now, hops: route.nodes.clone() };

        if route.links.is_empty() {
            log::debug!("{} from {} has no link towards the gateway", id, origin);
            let outcome = PacketOutcome {
                packet,
                status: DeliveryStatus::Unreachable,
                success: false,
                latency_ms: 0.0,
                hop_count: 0,
                path: route.nodes,
                links: Vec::new(),
            };
            self.notify(&outcome);
            return Ok(outcome);
        }

        let mut status = DeliveryStatus::Delivered;
        let mut hops_attempted = 0;
        for (hop_index, &link_index) in route.links.iter().enumerate() {
            hops_attempted += 1;
            let probability = state.link(link_index).map(link_success_probability).unwrap_or(0.0);
            if !self.rng.gen_bool(probability.clamp(0.0, 1.0)) {
                state.mark_link_failure(link_index, now);
                status = DeliveryStatus::FailedAtHop { hop_index };
                break;
            }
        }

        let success = status == DeliveryStatus::Delivered;
        let latency_ms = calculate_hop_latency(hops_attempted, symbol_duration_ms);
        if success {
            let stats = state.stats_mut();
            stats.packets_delivered += 1;
            stats.total_hops += hops_attempted as u64;
            stats.total_latency_ms += latency_ms;
            log::debug!("{} from {} delivered in {} hops ({:.0} ms)", id, origin, hops_attempted, latency_ms);
        } else {
            log::debug!("{} from {} lost: {:?}", id, origin, status);
        }

        let links = route.links.iter().filter_map(|&i| state.link(i).cloned()).collect();
        let outcome = PacketOutcome {
            packet,
            status,
            success,
            latency_ms,
            hop_count: hops_attempted,
            path: route.nodes,
            links,
        };
        self.notify(&outcome);
        Ok(outcome)
    }

    fn notify(&mut self, outcome: &PacketOutcome) {
        let Some(observer) = self.observer.as_mut() else {
            return;
        };
        match catch_unwind(AssertUnwindSafe(|| observer.on_packet_result(outcome))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.observer_faults += 1;
                log::warn!("Packet observer failed for {}: {:#}", outcome.packet.id, e);
            }
            Err(_) => {
                self.observer_faults += 1;
                log::warn!("Packet observer panicked for {}", outcome.packet.id);
            }
        }
    }
}
