//! Headless frame loop.
//!
//! Builds the network, engine, traffic generator and packet feed described by
//! a `SimulatorConfig`, advances them frame by frame and collects a
//! serializable summary. The optional dashboard and trade-off sections are
//! evaluated alongside.

use anyhow::Context;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

use crate::config::SimulatorConfig;
use crate::simulation::dashboard::{Dashboard, LATENCY_BUCKET_LABELS, LinkConditions};
use crate::simulation::feed::PacketFeed;
use crate::simulation::network::{NetworkState, create_random_network};
use crate::simulation::tradeoff::{ChartScores, TradeoffInputs, TradeoffOutcome, estimate};
use crate::simulation::{
    DeliveryStatus, NetworkStats, PacketObserver, PacketOutcome, SimulationEngine, TrafficGenerator,
};

/// Frames between periodic statistics lines.
const REPORT_EVERY_FRAMES: u64 = 600;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub seed: Option<u64>,
    pub frames: u64,
    pub simulated_ms: f64,
    pub nodes: usize,
    pub links: usize,
    pub stats: NetworkStats,
    pub delivery_ratio: f64,
    pub average_hops: f64,
    pub average_latency_ms: f64,
    pub unreachable: u64,
    pub failed_in_flight: u64,
    pub observer_faults: u64,
    pub pending_events: usize,
    pub packets_animating: usize,
    pub dashboard: Option<DashboardSummary>,
    pub tradeoff: Option<TradeoffSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorSummary {
    pub name: String,
    pub interval_s: u32,
    pub payload_bytes: u32,
    pub reliability: f64,
    pub latest_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub sensors: Vec<SensorSummary>,
    /// Latest averaged loss ratio (0..1).
    pub current_loss: f64,
    pub latency_histogram: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeoffSummary {
    pub outcome: TradeoffOutcome,
    pub scores: ChartScores,
}

/// SplitMix64 finalizer.
fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Seed of stream `stream` under run seed `seed`. Neighbouring run seeds
/// never share a stream.
fn stream_seed(seed: u64, stream: u64) -> u64 {
    mix64(seed ^ mix64(stream))
}

/// Seeded generator for one independent stream of the run.
fn stream_rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(stream_seed(seed, stream)),
        None => StdRng::from_entropy(),
    }
}

/// Run the whole simulation described by `config`.
pub fn run(config: &SimulatorConfig) -> anyhow::Result<RunSummary> {
    config.validate().map_err(anyhow::Error::msg).context("Invalid configuration")?;
    let started_at = chrono::Utc::now().to_rfc3339();

    let mut network_rng = stream_rng(config.seed, 0);
    let mut state = create_random_network(config.node_count, config.width, config.height, &mut network_rng);
    state.set_parameters(config.network_parameters()).context("Rejected network parameters")?;

    let engine_rng: Box<dyn RngCore> = Box::new(stream_rng(config.seed, 1));
    let mut engine = SimulationEngine::with_rng(engine_rng);
    let traffic = TrafficGenerator::new(config.traffic_probability).context("Invalid traffic probability")?;

    let feed = Rc::new(RefCell::new(PacketFeed::new(config.symbol_duration_ms)));
    let tally = Rc::new(RefCell::new(OutcomeTally::default()));
    {
        let feed = Rc::clone(&feed);
        let tally = Rc::clone(&tally);
        engine.set_observer(move |outcome: &PacketOutcome| -> anyhow::Result<()> {
            tally.try_borrow_mut().map_err(|_| anyhow::anyhow!("outcome tally is busy"))?.record(outcome);
            feed.try_borrow_mut()
                .map_err(|_| anyhow::anyhow!("packet feed is busy"))?
                .on_packet_result(outcome)
        });
    }

    let mut dashboard_rng = stream_rng(config.seed, 2);
    let mut dashboard =
        config.dashboard.as_ref().map(|d| (Dashboard::with_sensors(d.sensors, &mut dashboard_rng), d.max_hops));

    info!(
        "Running {} frames of {} ms over {} nodes and {} links ({:?})",
        config.frames,
        config.frame_ms,
        state.nodes().len(),
        state.links().len(),
        config.topology
    );

    for frame in 1..=config.frames {
        traffic.tick(&mut engine, &state).context("Failed to schedule traffic")?;
        engine
            .step(&mut state, config.frame_ms)
            .with_context(|| format!("Simulation step failed at frame {}", frame))?;
        let pruned = feed.borrow_mut().prune(engine.now_ms());
        if pruned > 0 {
            debug!("Pruned {} finished packets at {:.0} ms", pruned, engine.now_ms());
        }

        if let Some((dashboard, max_hops)) = dashboard.as_mut() {
            let conditions = LinkConditions {
                symbol_duration_ms: state.parameters().symbol_duration_ms,
                noise: state.parameters().noise,
                max_hops: *max_hops,
            };
            dashboard.tick(config.frame_ms / 1_000.0, &conditions, &mut dashboard_rng);
        }

        if frame % REPORT_EVERY_FRAMES == 0 {
            log_stats(&state, engine.now_ms());
        }
    }
    log_stats(&state, engine.now_ms());

    let tally = *tally.borrow();
    let stats = state.stats().clone();
    Ok(RunSummary {
        started_at,
        seed: config.seed,
        frames: config.frames,
        simulated_ms: engine.now_ms(),
        nodes: state.nodes().len(),
        links: state.links().len(),
        delivery_ratio: stats.delivery_ratio(),
        average_hops: stats.average_hops(),
        average_latency_ms: stats.average_latency_ms(),
        stats,
        unreachable: tally.unreachable,
        failed_in_flight: tally.failed,
        observer_faults: engine.observer_faults(),
        pending_events: engine.pending_events(),
        packets_animating: feed.borrow().len(),
        dashboard: dashboard.map(|(d, _)| summarize_dashboard(&d)),
        tradeoff: config.tradeoff.as_ref().map(summarize_tradeoff).transpose()?,
    })
}

#[derive(Debug, Clone, Copy, Default)]
struct OutcomeTally {
    unreachable: u64,
    failed: u64,
}

impl OutcomeTally {
    fn record(&mut self, outcome: &PacketOutcome) {
        match outcome.status {
            DeliveryStatus::Delivered => {}
            DeliveryStatus::FailedAtHop { .. } => self.failed += 1,
            DeliveryStatus::Unreachable => self.unreachable += 1,
        }
    }
}

fn log_stats(state: &NetworkState, now_ms: f64) {
    let stats = state.stats();
    info!(
        "t={:.1}s sent={} delivered={} ({:.0}%) avg hops={:.1} avg latency={:.0} ms",
        now_ms / 1_000.0,
        stats.packets_sent,
        stats.packets_delivered,
        stats.delivery_ratio() * 100.0,
        stats.average_hops(),
        stats.average_latency_ms()
    );
}

fn summarize_dashboard(dashboard: &Dashboard) -> DashboardSummary {
    let sensors = dashboard
        .sensors()
        .iter()
        .map(|s| SensorSummary {
            name: s.name.clone(),
            interval_s: s.interval_s,
            payload_bytes: s.payload_bytes,
            reliability: s.reliability,
            latest_value: s.latest_value(),
        })
        .collect();
    let latency_histogram = LATENCY_BUCKET_LABELS
        .iter()
        .zip(dashboard.latency_histogram())
        .map(|(label, pct)| (label.to_string(), pct))
        .collect();
    DashboardSummary {
        sensors,
        current_loss: dashboard.combined_loss_series().last().copied().unwrap_or(0.0),
        latency_histogram,
    }
}

fn summarize_tradeoff(inputs: &TradeoffInputs) -> anyhow::Result<TradeoffSummary> {
    let outcome = estimate(inputs).context("Invalid trade-off inputs")?;
    Ok(TradeoffSummary { outcome, scores: outcome.chart_scores() })
}
