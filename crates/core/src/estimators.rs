//! Spectral estimator accumulation
//!
//! Every photon-path segment traversed inside a cell adds to the cell's
//! running estimators: mean intensity, directional flux in three fixed bands,
//! per-band spectral moments, ionizing photon number and the ionization
//! parameter proxy. Distinct photons are counted once per cell through the
//! markers the cell keeps.
//!
//! Accumulation needs `&mut PlasmaCell`, so different cells may be filled
//! concurrently while a single cell never is.

use crate::bands::FluxBand;
use crate::core_types::{photon_energy_ev, Vec3, H_IONIZATION_EV, PLANCK, XI_UPPER_EV};
use crate::geometry::{project_from_xyz_cyl, CoordSystem};
use crate::grid::PlasmaCell;
use crate::photon::Segment;

/// What one call to [`accumulate`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOutcome {
    /// Fixed flux band the segment was added to
    pub flux_band: FluxBand,
    /// First configurable band containing the frequency, if any
    pub spectral_band: Option<usize>,
    /// Whether the segment belonged to a photon not seen last in this cell
    pub new_photon: bool,
    /// Whether it was a newly seen ionizing photon
    pub new_ionizing_photon: bool,
}

/// Whether a photon of frequency `freq` (Hz) ionizes hydrogen
///
/// Strictly above 13.6 eV.
#[inline]
pub fn is_ionizing(freq: f64) -> bool {
    photon_energy_ev(freq) > H_IONIZATION_EV
}

/// Flux contribution of a segment, before band assignment
///
/// The direction is rescaled to length `w·ds` and projected to cylindrical
/// components at the segment midpoint; a photon starting below the disk plane
/// has its z component mirrored. Spherical domains keep only the radial
/// component.
pub fn segment_flux(segment: &Segment, coord_system: CoordSystem) -> Vec3 {
    let flux = segment.unit_direction() * segment.weighted_length();
    let midpoint = segment.midpoint();

    if coord_system.is_spherical() {
        let r = midpoint.norm();
        let radial = if r > 0.0 {
            flux.dot(&midpoint) / r
        } else {
            0.0
        };
        return Vec3::new(radial, 0.0, 0.0);
    }

    let mut projected = project_from_xyz_cyl(&midpoint, &flux);
    if segment.position.z < 0.0 {
        projected.z = -projected.z;
    }
    projected
}

/// Add one segment to a cell's estimators
///
/// # Arguments
/// * `cell` - Estimators of the cell the segment lies in
/// * `segment` - The path step; its weight is used as given
/// * `coord_system` - Coordinate system of the cell's domain
///
/// # Returns
/// Which bands were hit and whether the photon was new to the cell
pub fn accumulate(
    cell: &mut PlasmaCell,
    segment: &Segment,
    coord_system: CoordSystem,
) -> SegmentOutcome {
    let freq = segment.freq;
    let wds = segment.weighted_length();

    cell.j += wds;
    if segment.is_direct() {
        cell.j_direct += wds;
    } else {
        cell.j_scattered += wds;
    }
    cell.path_length_sum += segment.ds;
    cell.segment_count += 1;
    cell.freq_weighted_sum += freq * wds;

    let flux = segment_flux(segment, coord_system);
    let flux_band = FluxBand::classify(freq);
    let slot = &mut cell.flux[flux_band.index()];
    slot.vector += flux;
    slot.magnitude += flux.norm();

    // Bands may overlap, so every matching band is filled
    let mut spectral_band = None;
    for i in cell.bands.matching(freq) {
        let band = &mut cell.band_estimators[i];
        band.freq_sum += freq * wds;
        band.freq_sq_sum += freq * freq * wds;
        band.intensity += wds;
        band.count += 1;
        band.f_min = band.f_min.min(freq);
        band.f_max = band.f_max.max(freq);
        spectral_band.get_or_insert(i);
    }

    let new_photon = cell.last_photon != Some(segment.id);
    if new_photon {
        cell.provenance.record(segment.origin);
        cell.last_photon = Some(segment.id);
    }

    let mut new_ionizing_photon = false;
    if is_ionizing(freq) {
        if cell.last_ionizing_photon != Some(segment.id) {
            cell.ionizing_photons += 1;
            cell.last_ionizing_photon = Some(segment.id);
            new_ionizing_photon = true;
        }

        let photons = wds / (PLANCK * freq);
        cell.ip += photons;
        if segment.is_direct() {
            cell.ip_direct += photons;
        } else {
            cell.ip_scattered += photons;
        }

        if photon_energy_ev(freq) < XI_UPPER_EV {
            cell.xi += wds;
        }
    }

    SegmentOutcome {
        flux_band,
        spectral_band,
        new_photon,
        new_ionizing_photon,
    }
}
