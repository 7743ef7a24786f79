//! Photon identity and path segments

use crate::core_types::Vec3;
use serde::{Deserialize, Serialize};

/// Identity of a photon packet for distinct-photon counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhotonId {
    /// Plasma cell the packet was launched from or last assigned to
    pub plasma: usize,
    /// Packet number within the current pass
    pub packet: u64,
}

impl PhotonId {
    /// Create an identity
    pub const fn new(plasma: usize, packet: u64) -> Self {
        Self { plasma, packet }
    }
}

/// Where a photon packet was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhotonOrigin {
    /// Central star
    Star,
    /// Boundary layer
    BoundaryLayer,
    /// Accretion disk
    Disk,
    /// The wind itself
    Wind,
    /// Central AGN power law
    Agn,
}

impl PhotonOrigin {
    /// All origins in counter order
    pub const ALL: [Self; 5] = [
        Self::Star,
        Self::BoundaryLayer,
        Self::Disk,
        Self::Wind,
        Self::Agn,
    ];
}

/// One straight step of a photon packet inside a single cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Frequency in the rest frame (Hz)
    pub freq: f64,
    /// Packet weight for this step, attenuated or raw at the caller's choice
    pub weight: f64,
    /// Path length (cm)
    pub ds: f64,
    /// Unit direction of travel
    pub direction: Vec3,
    /// Position at the start of the step (cm)
    pub position: Vec3,
    /// Scatterings the packet has undergone
    pub scatters: u32,
    /// Packet identity
    pub id: PhotonId,
    /// Emission origin
    pub origin: PhotonOrigin,
}

impl Segment {
    /// Weighted path length `w·ds`, the unit every estimator accumulates
    #[inline]
    pub fn weighted_length(&self) -> f64 {
        self.weight * self.ds
    }

    /// Direction rescaled to unit length; zero for a degenerate direction
    #[inline]
    pub fn unit_direction(&self) -> Vec3 {
        self.direction.try_normalize(0.0).unwrap_or_else(Vec3::zeros)
    }

    /// Position halfway along the step
    #[inline]
    pub fn midpoint(&self) -> Vec3 {
        self.position + self.unit_direction() * (0.5 * self.ds)
    }

    /// Whether the packet arrived without scattering
    #[inline]
    pub fn is_direct(&self) -> bool {
        self.scatters == 0
    }
}
