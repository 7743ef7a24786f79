//! Seeded generator of synthetic path segments
//!
//! Stands in for the transport loop in tests and in the demo: segments are
//! drawn inside a given cell with isotropic directions and log-uniform
//! frequencies, and packet numbers occasionally repeat to model a packet
//! re-entering a cell.

use super::segment::{PhotonId, PhotonOrigin, Segment};
use crate::core_types::Vec3;
use crate::grid::WindCell;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Chance that the next segment continues the previous packet
const REENTRY_PROBABILITY: f64 = 0.3;

/// Deterministic segment source
#[derive(Debug, Clone)]
pub struct SegmentSampler {
    rng: StdRng,
    freq_min: f64,
    freq_max: f64,
    next_packet: u64,
    last: Option<(PhotonId, PhotonOrigin, u32)>,
}

impl SegmentSampler {
    /// Create a sampler drawing frequencies from `[freq_min, freq_max)`
    ///
    /// # Arguments
    /// * `seed` - RNG seed; equal seeds give equal segment streams
    /// * `freq_min` - Lowest frequency (Hz), must be positive
    /// * `freq_max` - Highest frequency (Hz)
    pub fn new(seed: u64, freq_min: f64, freq_max: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            freq_min,
            freq_max,
            next_packet: 0,
            last: None,
        }
    }

    /// Uniformly distributed unit vector
    pub fn isotropic_direction(&mut self) -> Vec3 {
        let cos_theta: f64 = self.rng.random_range(-1.0..=1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let phi = self.rng.random_range(0.0..2.0 * PI);
        Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
    }

    /// Frequency uniform in `log(freq)`
    pub fn log_uniform_frequency(&mut self) -> f64 {
        if self.freq_max <= self.freq_min {
            return self.freq_min;
        }
        let (lo, hi) = (self.freq_min.ln(), self.freq_max.ln());
        self.rng.random_range(lo..hi).exp()
    }

    /// Draw one segment inside `cell`
    ///
    /// The start position is jittered around the cell centroid by up to a
    /// quarter of the cell's radial extent, and the path length never exceeds
    /// that extent.
    pub fn sample(&mut self, cell: &WindCell) -> Segment {
        let extent = if cell.dr > 0.0 { cell.dr } else { 1.0 };

        let (id, origin, scatters) = match self.last {
            Some(previous) if self.rng.random_bool(REENTRY_PROBABILITY) => previous,
            _ => {
                let id = PhotonId::new(cell.plasma_index, self.next_packet);
                self.next_packet += 1;
                let origin =
                    PhotonOrigin::ALL[self.rng.random_range(0..PhotonOrigin::ALL.len())];
                (id, origin, self.rng.random_range(0..=3))
            }
        };
        self.last = Some((id, origin, scatters));

        let jitter = Vec3::new(
            self.rng.random_range(-0.25..=0.25),
            self.rng.random_range(-0.25..=0.25),
            self.rng.random_range(-0.25..=0.25),
        ) * extent;

        Segment {
            freq: self.log_uniform_frequency(),
            weight: self.rng.random_range(0.5..1.5),
            ds: extent * self.rng.random_range(0.01..=1.0),
            direction: self.isotropic_direction(),
            position: cell.centroid + jitter,
            scatters,
            id,
            origin,
        }
    }
}
