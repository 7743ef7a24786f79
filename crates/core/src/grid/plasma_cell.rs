//! Per-cell radiation estimators
//!
//! A `PlasmaCell` accompanies each grid cell and holds the running sums the
//! spectral estimator accumulator adds to. Sums only grow during a pass;
//! [`PlasmaCell::reset_estimators`] starts a new one.

use crate::bands::{CellBands, FluxBand};
use crate::core_types::{Vec3, MAX_BANDS};
use crate::photon::{PhotonId, PhotonOrigin};

/// Directional flux in one fixed band
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FluxAccumulator {
    /// Sum of projected flux vectors (ρ, φ, z), or (r, 0, 0) in spherical domains
    pub vector: Vec3,
    /// Sum of the vector lengths
    pub magnitude: f64,
}

/// Estimators of one configurable frequency band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandEstimator {
    /// Sum of `f·w·ds`
    pub freq_sum: f64,
    /// Sum of `f²·w·ds`
    pub freq_sq_sum: f64,
    /// Sum of `w·ds`
    pub intensity: f64,
    /// Segments seen in the band
    pub count: u64,
    /// Lowest frequency seen (Hz)
    pub f_min: f64,
    /// Highest frequency seen (Hz)
    pub f_max: f64,
}

impl Default for BandEstimator {
    fn default() -> Self {
        Self {
            freq_sum: 0.0,
            freq_sq_sum: 0.0,
            intensity: 0.0,
            count: 0,
            f_min: f64::INFINITY,
            f_max: 0.0,
        }
    }
}

impl BandEstimator {
    /// Intensity-weighted mean frequency, if anything was seen
    pub fn mean_frequency(&self) -> Option<f64> {
        (self.intensity > 0.0).then(|| self.freq_sum / self.intensity)
    }

    /// Intensity-weighted standard deviation of the frequency
    pub fn frequency_spread(&self) -> Option<f64> {
        let mean = self.mean_frequency()?;
        let variance = self.freq_sq_sum / self.intensity - mean * mean;
        Some(variance.max(0.0).sqrt())
    }
}

/// Distinct photons seen, split by emission origin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvenanceCounts {
    /// From the central star
    pub star: u64,
    /// From the boundary layer
    pub boundary_layer: u64,
    /// From the disk
    pub disk: u64,
    /// From the wind
    pub wind: u64,
    /// From the AGN
    pub agn: u64,
    /// All distinct photons
    pub total: u64,
}

impl ProvenanceCounts {
    /// Count one new photon
    pub fn record(&mut self, origin: PhotonOrigin) {
        self.total += 1;
        *self.counter_mut(origin) += 1;
    }

    /// Count for one origin
    pub fn count(&self, origin: PhotonOrigin) -> u64 {
        match origin {
            PhotonOrigin::Star => self.star,
            PhotonOrigin::BoundaryLayer => self.boundary_layer,
            PhotonOrigin::Disk => self.disk,
            PhotonOrigin::Wind => self.wind,
            PhotonOrigin::Agn => self.agn,
        }
    }

    fn counter_mut(&mut self, origin: PhotonOrigin) -> &mut u64 {
        match origin {
            PhotonOrigin::Star => &mut self.star,
            PhotonOrigin::BoundaryLayer => &mut self.boundary_layer,
            PhotonOrigin::Disk => &mut self.disk,
            PhotonOrigin::Wind => &mut self.wind,
            PhotonOrigin::Agn => &mut self.agn,
        }
    }
}

/// Radiation-field estimators of one grid cell
#[derive(Debug, Clone, PartialEq)]
pub struct PlasmaCell {
    /// Index of this plasma cell
    pub index: usize,
    /// Index of the grid cell it describes
    pub wind_index: usize,

    /// Mean intensity estimator, sum of `w·ds`
    pub j: f64,
    /// Part of `j` from unscattered packets
    pub j_direct: f64,
    /// Part of `j` from scattered packets
    pub j_scattered: f64,
    /// Sum of path lengths (cm)
    pub path_length_sum: f64,
    /// Segments accumulated
    pub segment_count: u64,
    /// Sum of `f·w·ds`
    pub freq_weighted_sum: f64,

    /// Directional flux per fixed band, indexed by [`FluxBand::index`]
    pub flux: [FluxAccumulator; 3],

    /// Banding copied from the band registry
    pub bands: CellBands,
    /// Per-band estimators, `bands.count` in use
    pub band_estimators: [BandEstimator; MAX_BANDS],

    /// Ionizing photon number estimator, sum of `w·ds/(h·f)`
    pub ip: f64,
    /// Part of `ip` from unscattered packets
    pub ip_direct: f64,
    /// Part of `ip` from scattered packets
    pub ip_scattered: f64,
    /// Ionization parameter proxy, `w·ds` between 13.6 eV and 13.6 keV
    pub xi: f64,

    /// Distinct photons by origin
    pub provenance: ProvenanceCounts,
    /// Distinct ionizing photons
    pub ionizing_photons: u64,

    /// Most recent photon seen in this cell
    pub last_photon: Option<PhotonId>,
    /// Most recent ionizing photon seen in this cell
    pub last_ionizing_photon: Option<PhotonId>,
}

impl PlasmaCell {
    /// Create a plasma cell with empty estimators and no bands
    pub fn new(index: usize, wind_index: usize) -> Self {
        Self {
            index,
            wind_index,
            j: 0.0,
            j_direct: 0.0,
            j_scattered: 0.0,
            path_length_sum: 0.0,
            segment_count: 0,
            freq_weighted_sum: 0.0,
            flux: [FluxAccumulator::default(); 3],
            bands: CellBands::default(),
            band_estimators: [BandEstimator::default(); MAX_BANDS],
            ip: 0.0,
            ip_direct: 0.0,
            ip_scattered: 0.0,
            xi: 0.0,
            provenance: ProvenanceCounts::default(),
            ionizing_photons: 0,
            last_photon: None,
            last_ionizing_photon: None,
        }
    }

    /// Clear every estimator and both markers, keeping indices and bands
    pub fn reset_estimators(&mut self) {
        let bands = self.bands;
        *self = Self {
            bands,
            ..Self::new(self.index, self.wind_index)
        };
    }

    /// Flux accumulator of one fixed band
    pub fn flux_in(&self, band: FluxBand) -> &FluxAccumulator {
        &self.flux[band.index()]
    }

    /// Estimators of the populated bands
    pub fn active_bands(&self) -> &[BandEstimator] {
        &self.band_estimators[..self.bands.count]
    }

    /// Intensity-weighted mean frequency over all segments
    pub fn mean_frequency(&self) -> Option<f64> {
        (self.j > 0.0).then(|| self.freq_weighted_sum / self.j)
    }

    /// Mean path length per segment (cm)
    pub fn mean_path_length(&self) -> Option<f64> {
        (self.segment_count > 0).then(|| self.path_length_sum / self.segment_count as f64)
    }
}
