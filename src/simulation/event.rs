//! Time-ordered event queue for the packet simulation.
//!
//! Events are immutable records placed on a min-heap keyed by
//! `(at_ms, sequence)`. Equal times are dispatched in insertion order.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::types::NodeId;

/// Insertion sequence number of a scheduled event. Strictly increasing per queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EventId(u64);

impl EventId {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

/// What a scheduled event does when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EventKind {
    /// Send one packet from `origin` towards the gateway.
    SendPacket { origin: NodeId },
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::SendPacket { origin } => write!(f, "SendPacket({})", origin),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub id: EventId,
    /// Simulated time (ms) at which the event becomes due.
    pub at_ms: f64,
    pub kind: EventKind,
}

/// Reversed ordering so that `BinaryHeap` pops the smallest `(at_ms, id)` first.
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other.at_ms.total_cmp(&self.at_ms).then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for ScheduledEvent {}

/// Pending events of one simulation instance. Events are processed once and
/// discarded; there is no cancellation.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    heap: BinaryHeap<ScheduledEvent>,
    next_id: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at_ms: f64, kind: EventKind) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.heap.push(ScheduledEvent { id, at_ms, kind });
        id
    }

    /// Pop the earliest event if it is due at `now_ms`.
    pub fn pop_due(&mut self, now_ms: f64) -> Option<ScheduledEvent> {
        if self.heap.peek()?.at_ms <= now_ms { self.heap.pop() } else { None }
    }

    pub fn peek(&self) -> Option<&ScheduledEvent> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(n: u32) -> EventKind {
        EventKind::SendPacket { origin: NodeId(n) }
    }

    #[test]
    fn same_time_events_keep_insertion_order() {
        let mut q = EventQueue::new();
        q.schedule(10.0, send(1));
        q.schedule(10.0, send(2));
        q.schedule(10.0, send(3));

        let order: Vec<EventKind> = std::iter::from_fn(|| q.pop_due(10.0)).map(|e| e.kind).collect();
        assert_eq!(order, vec![send(1), send(2), send(3)]);
    }

    #[test]
    fn events_pop_in_time_order() {
        let mut q = EventQueue::new();
        q.schedule(30.0, send(3));
        q.schedule(10.0, send(1));
        q.schedule(20.5, send(2));

        let times: Vec<f64> = std::iter::from_fn(|| q.pop_due(100.0)).map(|e| e.at_ms).collect();
        assert_eq!(times, vec![10.0, 20.5, 30.0]);
        assert!(q.is_empty());
    }

    #[test]
    fn future_events_stay_queued() {
        let mut q = EventQueue::new();
        q.schedule(5.0, send(1));
        q.schedule(50.0, send(2));

        assert_eq!(q.pop_due(5.0).map(|e| e.kind), Some(send(1)));
        assert!(q.pop_due(49.9).is_none());
        assert_eq!(q.len(), 1);
        assert_eq!(q.peek().map(|e| e.at_ms), Some(50.0));
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let mut q = EventQueue::new();
        let a = q.schedule(1.0, send(1));
        let b = q.schedule(0.5, send(1));
        assert!(a < b);
        assert_eq!(format!("{}", b), "E#1");
        assert_eq!(format!("{}", send(4)), "SendPacket(N4)");
    }
}
