//! Sensor dashboard model.
//!
//! A set of sensors reporting a slowly varying value at their own interval.
//! Each report crosses a random number of hops and is lost with a probability
//! that grows with hop count and noise. Sensors keep rolling windows of
//! values (lost readings are `None`), loss ratios and delivery latencies, from
//! which the dashboard derives an averaged loss series and a latency
//! histogram.

use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;

/// Sensor value window length.
pub const VALUE_WINDOW: usize = 60;
/// Loss ratio window length.
pub const LOSS_WINDOW: usize = 60;
/// Latency sample window length.
pub const LATENCY_WINDOW: usize = 100;
/// Readings generated when a sensor is created.
pub const SEED_READINGS: usize = 12;
/// Loss probability of the seeded history.
pub const SEED_LOSS_PROBABILITY: f64 = 0.15;

/// Upper edges of the latency histogram buckets (ms). The last bucket is open.
pub const LATENCY_BUCKET_EDGES_MS: [f64; 3] = [200.0, 400.0, 800.0];
pub const LATENCY_BUCKET_LABELS: [&str; 4] = ["<200", "200-400", "400-800", ">800"];

/// Live settings applied on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkConditions {
    pub symbol_duration_ms: f64,
    /// 0..=1
    pub noise: f64,
    /// Reports cross 1..=max_hops hops (treated as at least 1).
    pub max_hops: u32,
}

impl Default for LinkConditions {
    fn default() -> Self {
        LinkConditions { symbol_duration_ms: 80.0, noise: 0.2, max_hops: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sensor {
    pub id: u32,
    pub name: String,
    pub interval_s: u32,
    pub payload_bytes: u32,
    /// 1 minus the loss ratio of the current value window.
    pub reliability: f64,
    pub last_sent_at: f64,
    pub values: VecDeque<Option<f64>>,
    pub loss_history: VecDeque<f64>,
    pub latency_samples: VecDeque<f64>,
}

impl Sensor {
    fn new<R: Rng + ?Sized>(id: u32, rng: &mut R) -> Self {
        let mut sensor = Sensor {
            id,
            name: format!("Sensor {}", id),
            interval_s: rng.gen_range(5..25),
            payload_bytes: rng.gen_range(8..32),
            reliability: 1.0,
            last_sent_at: 0.0,
            values: VecDeque::with_capacity(VALUE_WINDOW + 1),
            loss_history: VecDeque::with_capacity(LOSS_WINDOW + 1),
            latency_samples: VecDeque::with_capacity(LATENCY_WINDOW + 1),
        };

        for t in 0..SEED_READINGS {
            if rng.gen_bool(SEED_LOSS_PROBABILITY) {
                sensor.values.push_back(None);
            } else {
                let value = sensor.reading_at(t as f64, rng);
                sensor.values.push_back(Some(value));
                let hops = rng.gen_range(1..=3) as f64;
                sensor.latency_samples.push_back(hops * rng.gen_range(80.0..140.0));
            }
            sensor.loss_history.push_back(sensor.loss_ratio());
        }
        sensor.reliability = 1.0 - sensor.loss_ratio();
        sensor
    }

    /// Fraction of lost readings in the value window (0 when empty).
    pub fn loss_ratio(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().filter(|v| v.is_none()).count() as f64 / self.values.len() as f64
    }

    pub fn latest_value(&self) -> Option<f64> {
        self.values.back().copied().flatten()
    }

    /// Smooth per-sensor wave plus up to ±1 of jitter.
    fn reading_at<R: Rng + ?Sized>(&self, t: f64, rng: &mut R) -> f64 {
        20.0 + 5.0 * (t / 15.0 + self.id as f64).sin() + rng.gen_range(-1.0..1.0)
    }

    fn report<R: Rng + ?Sized>(&mut self, now_s: f64, conditions: &LinkConditions, rng: &mut R) -> bool {
        self.last_sent_at = now_s;
        let value = self.reading_at(now_s, rng);

        let hops = rng.gen_range(1..=conditions.max_hops.max(1));
        let success = rng.gen_bool(report_success_probability(hops, conditions.noise));
        if success {
            self.values.push_back(Some(value));
            self.latency_samples.push_back(report_latency_ms(hops, conditions));
        } else {
            self.values.push_back(None);
        }
        trim(&mut self.values, VALUE_WINDOW);
        trim(&mut self.latency_samples, LATENCY_WINDOW);

        let loss = self.loss_ratio();
        self.reliability = 1.0 - loss;
        self.loss_history.push_back(loss);
        trim(&mut self.loss_history, LOSS_WINDOW);
        success
    }
}

fn trim<T>(window: &mut VecDeque<T>, max_len: usize) {
    while window.len() > max_len {
        window.pop_front();
    }
}

/// `clamp(0.95 - 0.08 × (hops - 1) - 0.4 × noise, 0.05, 0.99)`
pub fn report_success_probability(hops: u32, noise: f64) -> f64 {
    (0.95 - 0.08 * (hops as f64 - 1.0) - 0.4 * noise).clamp(0.05, 0.99)
}

/// `hops × symbol × (3 + 4 × noise)`: noise stands in for extra retries.
pub fn report_latency_ms(hops: u32, conditions: &LinkConditions) -> f64 {
    hops as f64 * conditions.symbol_duration_ms * (3.0 + 4.0 * conditions.noise)
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    sensors: Vec<Sensor>,
    next_sensor_id: u32,
    time_s: f64,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Dashboard { sensors: Vec::new(), next_sensor_id: 1, time_s: 0.0 }
    }

    /// Dashboard pre-populated with `count` sensors.
    pub fn with_sensors<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Self {
        let mut dashboard = Self::new();
        for _ in 0..count {
            dashboard.add_sensor(rng);
        }
        dashboard
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn time_s(&self) -> f64 {
        self.time_s
    }

    /// Create a sensor with random interval and payload and a seeded history. Returns its id.
    pub fn add_sensor<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u32 {
        let id = self.next_sensor_id;
        self.next_sensor_id += 1;
        let sensor = Sensor::new(id, rng);
        log::debug!(
            "Added {} (every {} s, {} B, reliability {:.2})",
            sensor.name,
            sensor.interval_s,
            sensor.payload_bytes,
            sensor.reliability
        );
        self.sensors.push(sensor);
        id
    }

    /// Advance the dashboard clock; every sensor whose interval has elapsed reports once.
    /// Returns the number of reports sent.
    pub fn tick<R: Rng + ?Sized>(&mut self, delta_s: f64, conditions: &LinkConditions, rng: &mut R) -> usize {
        self.time_s += delta_s;
        let now = self.time_s;
        let mut reports = 0;
        for sensor in &mut self.sensors {
            if now - sensor.last_sent_at >= sensor.interval_s as f64 {
                sensor.report(now, conditions, rng);
                reports += 1;
            }
        }
        reports
    }

    /// Loss ratio averaged across sensors, index by index over their loss histories.
    pub fn combined_loss_series(&self) -> Vec<f64> {
        let longest = self.sensors.iter().map(|s| s.loss_history.len()).max().unwrap_or(0);
        (0..longest)
            .map(|i| {
                let samples: Vec<f64> = self.sensors.iter().filter_map(|s| s.loss_history.get(i).copied()).collect();
                if samples.is_empty() { 0.0 } else { samples.iter().sum::<f64>() / samples.len() as f64 }
            })
            .collect()
    }

    /// Percentage of all latency samples falling in each bucket of `LATENCY_BUCKET_LABELS`.
    pub fn latency_histogram(&self) -> [f64; 4] {
        let mut counts = [0usize; 4];
        let mut total = 0usize;
        for ms in self.sensors.iter().flat_map(|s| s.latency_samples.iter()) {
            let bucket = LATENCY_BUCKET_EDGES_MS.iter().position(|&edge| *ms < edge).unwrap_or(3);
            counts[bucket] += 1;
            total += 1;
        }
        if total == 0 {
            return [0.0; 4];
        }
        counts.map(|c| c as f64 / total as f64 * 100.0)
    }
}
