//! Per-packet outcome feed for animation.
//!
//! `PacketFeed` is a `PacketObserver` that turns every outcome into an
//! `ActivePacket`: a path, a start time and a travel duration. A renderer
//! polls `active()` each frame and places a dot with `ActivePacket::position`.
//! Entries are pruned a fixed time after they arrive.

use serde::Serialize;

use super::engine::PacketObserver;
use super::network::NetworkState;
use super::types::{Link, NodeId, PacketOutcome, Point, SYMBOLS_PER_HOP};

/// How long a finished packet stays in the feed after arrival (ms).
pub const PACKET_LINGER_MS: f64 = 1_500.0;
/// How long a failed link stays highlighted (ms).
pub const FAILURE_HIGHLIGHT_MS: f64 = 1_500.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivePacket {
    pub path: Vec<NodeId>,
    pub created_at: f64,
    pub duration_ms: f64,
    pub success: bool,
}

impl ActivePacket {
    /// Animation progress in `[0, 1]`, or `None` before the packet starts.
    pub fn progress(&self, now_ms: f64) -> Option<f64> {
        let elapsed = now_ms - self.created_at;
        if elapsed < 0.0 || self.duration_ms <= 0.0 {
            return None;
        }
        Some((elapsed / self.duration_ms).min(1.0))
    }

    /// Interpolated position along the path at `now_ms`.
    ///
    /// `None` before start, or when a node on the current segment has since
    /// been removed from `state`.
    pub fn position(&self, now_ms: f64, state: &NetworkState) -> Option<Point> {
        let t = self.progress(now_ms)?;
        let segments = self.path.len().saturating_sub(1).max(1);
        let seg_float = t * segments as f64;
        let seg_index = (seg_float.floor() as usize).min(segments - 1);
        let seg_t = seg_float - seg_index as f64;

        let from = state.node(*self.path.get(seg_index)?)?.position;
        let to = match self.path.get(seg_index + 1) {
            Some(&id) => state.node(id)?.position,
            None => from,
        };
        Some(Point::new(from.x + (to.x - from.x) * seg_t, from.y + (to.y - from.y) * seg_t))
    }

    fn age_after_arrival(&self, now_ms: f64) -> f64 {
        now_ms - self.created_at - self.duration_ms
    }
}

#[derive(Debug, Clone)]
pub struct PacketFeed {
    entries: Vec<ActivePacket>,
    symbol_duration_ms: f64,
}

impl PacketFeed {
    pub fn new(symbol_duration_ms: f64) -> Self {
        PacketFeed { entries: Vec::new(), symbol_duration_ms }
    }

    /// Keep the fallback travel time in step with the live parameters.
    pub fn set_symbol_duration(&mut self, symbol_duration_ms: f64) {
        self.symbol_duration_ms = symbol_duration_ms;
    }

    pub fn active(&self) -> &[ActivePacket] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry for `outcome`.
    ///
    /// Travel time is the reported latency; zero-latency outcomes (unreachable
    /// or gateway-local) still animate for at least one hop's airtime.
    pub fn record(&mut self, outcome: &PacketOutcome) {
        let duration_ms = if outcome.latency_ms > 0.0 {
            outcome.latency_ms
        } else {
            outcome.hop_count.max(1) as f64 * self.symbol_duration_ms * SYMBOLS_PER_HOP
        };
        self.entries.push(ActivePacket {
            path: outcome.path.clone(),
            created_at: outcome.packet.created_at,
            duration_ms,
            success: outcome.success,
        });
    }

    /// Drop entries that arrived more than `PACKET_LINGER_MS` ago. Returns how many were dropped.
    pub fn prune(&mut self, now_ms: f64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|p| p.age_after_arrival(now_ms) <= PACKET_LINGER_MS);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl PacketObserver for PacketFeed {
    fn on_packet_result(&mut self, outcome: &PacketOutcome) -> anyhow::Result<()> {
        self.record(outcome);
        Ok(())
    }
}

/// Highlight strength for a recently failed link: 1 at the failure, fading to
/// 0 over `FAILURE_HIGHLIGHT_MS`. `None` if the link never failed or the
/// highlight has expired.
pub fn failure_highlight(link: &Link, now_ms: f64) -> Option<f64> {
    let elapsed = now_ms - link.last_failure_at?;
    if !(0.0..FAILURE_HIGHLIGHT_MS).contains(&elapsed) {
        return None;
    }
    Some(1.0 - elapsed / FAILURE_HIGHLIGHT_MS)
}
