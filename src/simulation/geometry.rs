//! Geometry helpers for node placement and range checks.
//!
//! Contains helper functions for:
//! - Distance calculations (squared distance to avoid sqrt in hot paths)
//! - Radio range tests
//! - Placement of nodes on a ring around a center point

use super::types::{MAX_RADIO_RANGE, Point};

/// Squared Euclidean distance in world units (avoids a sqrt in hot paths).
///
/// Link recomputation compares every node pair against the radio range; the
/// comparison is done on squared values and the root is only taken for pairs
/// that actually get a link.
pub fn distance2(a: &Point, b: &Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

/// Convert squared distance back to distance (only when needed for the quality formula).
pub fn distance_from_d2(d2: f64) -> f64 {
    d2.sqrt()
}

pub fn distance(a: &Point, b: &Point) -> f64 {
    distance_from_d2(distance2(a, b))
}

/// Inclusive range check against `MAX_RADIO_RANGE`.
pub fn within_radio_range(a: &Point, b: &Point) -> bool {
    distance2(a, b) <= MAX_RADIO_RANGE * MAX_RADIO_RANGE
}

/// Point at `angle` radians and `radius` units from `center`.
pub fn point_on_ring(center: &Point, radius: f64, angle: f64) -> Point {
    Point {
        x: center.x + radius * angle.cos(),
        y: center.y + radius * angle.sin(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn p(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    #[test]
    fn distances_match_pythagoras() {
        assert_eq!(distance2(&p(0.0, 0.0), &p(3.0, 4.0)), 25.0);
        assert_eq!(distance(&p(0.0, 0.0), &p(3.0, 4.0)), 5.0);
        assert_eq!(distance(&p(2.0, 2.0), &p(2.0, 2.0)), 0.0);
    }

    #[test]
    fn range_boundary_is_inclusive() {
        assert!(within_radio_range(&p(0.0, 0.0), &p(MAX_RADIO_RANGE, 0.0)));
        assert!(!within_radio_range(&p(0.0, 0.0), &p(MAX_RADIO_RANGE + 0.001, 0.0)));
    }

    #[test]
    fn ring_points_keep_their_radius() {
        let center = p(100.0, 50.0);
        for i in 0..8 {
            let angle = i as f64 / 8.0 * 2.0 * PI;
            let q = point_on_ring(&center, 40.0, angle);
            assert!((distance(&center, &q) - 40.0).abs() < 1e-9);
        }
    }
}
