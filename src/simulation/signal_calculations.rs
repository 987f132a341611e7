//! Link quality and timing calculations.
//!
//! Contains helpers for:
//! - The link quality formula (distance, spreading factor and noise terms)
//! - The per-hop success probability derived from quality
//! - The fixed per-hop airtime used as the latency model
//!
//! None of this is RF physics. The weights are chosen so that distance
//! dominates, spreading factor is a secondary mitigant and noise is a minor
//! global penalty.
//!
//! Units:
//! - Distance: world (canvas) units
//! - Time: milliseconds (f64)

use super::types::{Link, MAX_RADIO_RANGE, NetworkParameters, SYMBOLS_PER_HOP};

/// Weight of the distance term in the quality formula.
pub const DISTANCE_WEIGHT: f64 = 0.6;
/// Weight of the spreading factor term.
pub const SPREADING_FACTOR_WEIGHT: f64 = 0.3;
/// Weight of the noise term.
pub const NOISE_WEIGHT: f64 = 0.1;

/// Distance term: 1 at zero distance, 0 at the edge of the radio range.
///
/// Callers must gate pairs beyond `MAX_RADIO_RANGE` first; this function does
/// not clamp so the gate stays the single connectivity rule.
pub fn distance_factor(distance: f64) -> f64 {
    1.0 - distance / MAX_RADIO_RANGE
}

/// Spreading factor term. SF7..SF12 maps to roughly 0.16..1.0.
pub fn spreading_factor_factor(spreading_factor: u8) -> f64 {
    (spreading_factor as f64 - 6.0) / 6.0
}

/// Noise term: 1 with no noise, 0 with full noise.
pub fn noise_factor(noise: f64) -> f64 {
    1.0 - noise
}

/// Calculate the quality of a link of length `distance` under `params`.
///
/// # Formula
///
/// ```text
/// quality = clamp(0.6 × dist + 0.3 × sf + 0.1 × noise, 0, 1)
/// ```
///
/// The weighted terms are summed smallest weight first, so perfect inputs
/// (zero distance, SF12, no noise) land on exactly 1.0.
pub fn calculate_link_quality(distance: f64, params: &NetworkParameters) -> f64 {
    let quality = NOISE_WEIGHT * noise_factor(params.noise)
        + SPREADING_FACTOR_WEIGHT * spreading_factor_factor(params.spreading_factor)
        + DISTANCE_WEIGHT * distance_factor(distance);
    quality.clamp(0.0, 1.0)
}

/// Probability that a packet crosses a link of the given quality.
///
/// A deliberately nonlinear curve: weak links fail disproportionately often.
pub fn success_probability(quality: f64) -> f64 {
    quality * quality
}

/// Probability that a packet crosses `link`. The only per-hop reliability model used by the engine.
pub fn link_success_probability(link: &Link) -> f64 {
    success_probability(link.quality)
}

/// Airtime for a packet that crossed `hops` hops: `hops × symbol_duration × 4`.
pub fn calculate_hop_latency(hops: usize, symbol_duration_ms: f64) -> f64 {
    hops as f64 * symbol_duration_ms * SYMBOLS_PER_HOP
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::{NodeId, Topology};

    fn params(sf: u8, noise: f64) -> NetworkParameters {
        NetworkParameters {
            spreading_factor: sf,
            symbol_duration_ms: 80.0,
            noise,
            topology: Topology::Mesh,
        }
    }

    #[test]
    fn perfect_inputs_give_exact_unit_quality() {
        assert_eq!(calculate_link_quality(0.0, &params(12, 0.0)), 1.0);
        assert_eq!(success_probability(1.0), 1.0);
    }

    #[test]
    fn quality_matches_weighted_formula() {
        let p = params(9, 0.25);
        let d = 160.0;
        let expected = 0.6 * 0.5 + 0.3 * 0.5 + 0.1 * 0.75;
        assert!((calculate_link_quality(d, &p) - expected).abs() < 1e-12);
    }

    #[test]
    fn quality_is_clamped_into_unit_interval() {
        // SF5 gives a negative SF term; at the range edge with full noise the raw sum is negative.
        let q = calculate_link_quality(MAX_RADIO_RANGE, &params(5, 1.0));
        assert_eq!(q, 0.0);
        for sf in 5..=12 {
            for step in 0..=10 {
                let noise = step as f64 / 10.0;
                for d in [0.0, 50.0, 160.0, 319.0, MAX_RADIO_RANGE] {
                    let q = calculate_link_quality(d, &params(sf, noise));
                    assert!((0.0..=1.0).contains(&q), "quality {} out of range", q);
                }
            }
        }
    }

    #[test]
    fn quality_decreases_with_distance_and_noise() {
        let p = params(9, 0.25);
        assert!(calculate_link_quality(10.0, &p) > calculate_link_quality(200.0, &p));
        assert!(calculate_link_quality(100.0, &params(9, 0.1)) > calculate_link_quality(100.0, &params(9, 0.9)));
        assert!(calculate_link_quality(100.0, &params(12, 0.5)) > calculate_link_quality(100.0, &params(7, 0.5)));
    }

    #[test]
    fn success_probability_is_quality_squared_and_monotonic() {
        let mut previous = -1.0;
        for step in 0..=100 {
            let q = step as f64 / 100.0;
            let link = Link { a: NodeId(1), b: NodeId(2), quality: q, last_failure_at: None };
            let prob = link_success_probability(&link);
            assert_eq!(prob, q * q);
            assert!(prob >= previous);
            previous = prob;
        }
    }

    #[test]
    fn hop_latency_is_four_symbols_per_hop() {
        assert_eq!(calculate_hop_latency(0, 80.0), 0.0);
        assert_eq!(calculate_hop_latency(1, 80.0), 320.0);
        assert_eq!(calculate_hop_latency(3, 50.0), 600.0);
    }
}
