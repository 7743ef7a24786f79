//! Physical constants and fixed band cutoffs (CGS units)

/// Speed of light (cm/s)
pub const C: f64 = 2.997925e10;

/// Planck constant (erg·s)
pub const PLANCK: f64 = 6.6262e-27;

/// Planck constant in electron-volt seconds, so `HEV * freq` is a photon energy in eV
pub const HEV: f64 = 4.13620e-15;

/// Lower edge of the fixed UV flux band (Hz); below it a segment counts as visible
pub const UV_LOW: f64 = 7.4e14;

/// Upper edge of the fixed UV flux band (Hz); above it a segment counts as X-ray
pub const UV_HIGH: f64 = 3e16;

/// Hydrogen ionization edge (eV)
pub const H_IONIZATION_EV: f64 = 13.6;

/// Upper integration limit of the ionization parameter proxy: 1000 Rydberg (eV)
pub const XI_UPPER_EV: f64 = 13600.0;

/// Maximum number of configurable frequency bands per set
pub const MAX_BANDS: usize = 20;

/// Photon energy in eV for a frequency in Hz
#[inline]
pub fn photon_energy_ev(freq: f64) -> f64 {
    HEV * freq
}
