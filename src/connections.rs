//! Connection lines between nearby particles.
//!
//! Pairs are enumerated in record order (`i < j`) and accepted first come,
//! first served until a cap is hit. The search is a plain O(n²) sweep: fields
//! that connect are small, and a spatial index would change which pairs win
//! once the cap is reached.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// An unordered pair of particle indices, stored with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connection {
    pub a: usize,
    pub b: usize,
    pub distance: f32,
    /// `(1 - distance / max_distance) * opacity`.
    pub opacity: f32,
}

/// Thresholds and caps for connection finding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionLimits {
    /// Pairs at or beyond this distance are never connected.
    pub max_distance: f32,
    /// Stop after this many connections in total.
    pub max_total: usize,
    /// Each particle starts at most this many connections with later records.
    pub max_per_particle: Option<usize>,
    /// Opacity scale at zero distance.
    pub opacity: f32,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_distance: 200.0,
            max_total: usize::MAX,
            max_per_particle: None,
            opacity: 1.0,
        }
    }
}

/// All pairs closer than `limits.max_distance`, honoring both caps.
pub fn find_connections(points: &[Vec3], limits: &ConnectionLimits) -> Vec<Connection> {
    let mut out = Vec::new();
    if limits.max_distance <= 0.0 || limits.max_total == 0 {
        return out;
    }
    let max_sq = limits.max_distance * limits.max_distance;
    let per_particle = limits.max_per_particle.unwrap_or(usize::MAX);

    'outer: for (i, p1) in points.iter().enumerate() {
        let mut started = 0;
        for (j, p2) in points.iter().enumerate().skip(i + 1) {
            if started >= per_particle {
                break;
            }
            let dist_sq = p1.distance_squared(*p2);
            if dist_sq >= max_sq {
                continue;
            }
            let distance = dist_sq.sqrt();
            out.push(Connection {
                a: i,
                b: j,
                distance,
                opacity: (1.0 - distance / limits.max_distance) * limits.opacity,
            });
            started += 1;
            if out.len() >= limits.max_total {
                break 'outer;
            }
        }
    }
    out
}
