//! Frequency banding shared by photon generation and per-cell spectra
//!
//! A [`BandSet`] is built once during initialization. Its frequency edges are
//! then copied into every plasma cell with [`copy_bands`] so the estimator
//! accumulator can bucket segments by frequency without touching shared state.

use crate::core_types::{MAX_BANDS, UV_HIGH, UV_LOW};
use crate::grid::PlasmaCell;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors raised while building a band set
#[derive(Debug, Error, PartialEq)]
pub enum BandError {
    /// Fewer than two edges, so no band at all
    #[error("at least two band edges are required, got {0}")]
    TooFewEdges(usize),

    /// More bands than a plasma cell can hold
    #[error("{count} bands requested but at most {max} are supported")]
    TooManyBands {
        /// Requested band count
        count: usize,
        /// Capacity of a plasma cell
        max: usize,
    },

    /// Edges must be positive and finite
    #[error("band edge {index} is {value}, edges must be positive and finite")]
    InvalidEdge {
        /// Position of the edge
        index: usize,
        /// Offending value
        value: f64,
    },

    /// Edges must increase strictly
    #[error("band edges must increase: edge {index} ({upper}) is not above {lower}")]
    NotIncreasing {
        /// Position of the upper edge
        index: usize,
        /// Previous edge
        lower: f64,
        /// Offending edge
        upper: f64,
    },
}

/// One frequency band with its photon-generation bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    /// Lower frequency bound (Hz), exclusive when bucketing
    pub f1: f64,
    /// Upper frequency bound (Hz), inclusive when bucketing
    pub f2: f64,
    /// Minimum fraction of generated photons in this band
    pub min_fraction: f64,
    /// Fraction of the source luminosity naturally in this band
    pub nat_fraction: f64,
    /// Fraction of photons actually generated in this band
    pub used_fraction: f64,
    /// Luminosity accumulated in the band
    pub flux: f64,
    /// Photon weight used for the band
    pub weight: f64,
    /// Photons generated in the band
    pub nphot: u64,
}

impl Band {
    fn new(f1: f64, f2: f64, min_fraction: f64) -> Self {
        Self {
            f1,
            f2,
            min_fraction,
            nat_fraction: 0.0,
            used_fraction: 0.0,
            flux: 0.0,
            weight: 0.0,
            nphot: 0,
        }
    }

    /// Whether `freq` falls in `(f1, f2]`
    #[inline]
    pub fn contains(&self, freq: f64) -> bool {
        self.f1 < freq && freq <= self.f2
    }
}

/// Ordered set of at most [`MAX_BANDS`] frequency bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandSet {
    bands: Vec<Band>,
}

impl BandSet {
    /// Build contiguous bands from increasing edges
    ///
    /// `n + 1` edges give `n` bands. Every band gets the same minimum
    /// fraction, and an equal natural share of the luminosity until
    /// [`BandSet::set_natural_fractions`] says otherwise.
    ///
    /// # Errors
    /// Returns a [`BandError`] if there are fewer than two edges, more than
    /// [`MAX_BANDS`] bands, or the edges are not positive and strictly increasing
    pub fn from_edges(edges: &[f64], min_fraction: f64) -> Result<Self, BandError> {
        if edges.len() < 2 {
            return Err(BandError::TooFewEdges(edges.len()));
        }
        let count = edges.len() - 1;
        if count > MAX_BANDS {
            return Err(BandError::TooManyBands {
                count,
                max: MAX_BANDS,
            });
        }

        for (index, &value) in edges.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(BandError::InvalidEdge { index, value });
            }
        }
        for (index, pair) in edges.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(BandError::NotIncreasing {
                    index: index + 1,
                    lower: pair[0],
                    upper: pair[1],
                });
            }
        }

        let share = 1.0 / count as f64;
        let bands = edges
            .windows(2)
            .map(|pair| {
                let mut band = Band::new(pair[0], pair[1], min_fraction);
                band.nat_fraction = share;
                band.used_fraction = share.max(min_fraction);
                band
            })
            .collect();

        let mut set = Self { bands };
        set.normalize_used_fractions();
        debug!("Built {} frequency bands", count);
        Ok(set)
    }

    /// `count` bands with logarithmically spaced edges from `f_min` to `f_max`
    ///
    /// # Errors
    /// Returns a [`BandError`] under the same conditions as [`BandSet::from_edges`]
    pub fn log_uniform(f_min: f64, f_max: f64, count: usize) -> Result<Self, BandError> {
        if count == 0 {
            return Err(BandError::TooFewEdges(1));
        }
        let (log_min, log_max) = (f_min.log10(), f_max.log10());
        let step = (log_max - log_min) / count as f64;
        let mut edges: Vec<f64> = (0..=count)
            .map(|i| 10f64.powf(log_min + step * i as f64))
            .collect();
        // Keep the requested end points exact
        edges[0] = f_min;
        edges[count] = f_max;
        Self::from_edges(&edges, 0.0)
    }

    /// Bands in increasing frequency order
    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Mutable access for photon-generation bookkeeping
    pub fn bands_mut(&mut self) -> &mut [Band] {
        &mut self.bands
    }

    /// Number of bands
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// Whether the set has no bands
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Lowest and highest frequency covered
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((self.bands.first()?.f1, self.bands.last()?.f2))
    }

    /// Replace the natural luminosity fractions and recompute used fractions
    ///
    /// Fractions are normalized to sum to one; a used fraction never drops
    /// below the band's minimum.
    pub fn set_natural_fractions(&mut self, fractions: &[f64]) {
        let total: f64 = fractions.iter().take(self.bands.len()).sum();
        if total <= 0.0 {
            return;
        }
        for (band, &fraction) in self.bands.iter_mut().zip(fractions) {
            band.nat_fraction = fraction / total;
            band.used_fraction = band.nat_fraction.max(band.min_fraction);
        }
        self.normalize_used_fractions();
    }

    fn normalize_used_fractions(&mut self) {
        let total: f64 = self.bands.iter().map(|b| b.used_fraction).sum();
        if total > 0.0 {
            for band in &mut self.bands {
                band.used_fraction /= total;
            }
        }
    }
}

/// Frequency edges of a band set as held by one plasma cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBands {
    /// Number of populated bands
    pub count: usize,
    /// Lower bounds, `count` populated
    pub f1: [f64; MAX_BANDS],
    /// Upper bounds, `count` populated
    pub f2: [f64; MAX_BANDS],
}

impl Default for CellBands {
    fn default() -> Self {
        Self {
            count: 0,
            f1: [0.0; MAX_BANDS],
            f2: [0.0; MAX_BANDS],
        }
    }
}

impl From<&BandSet> for CellBands {
    fn from(set: &BandSet) -> Self {
        let mut cell = Self {
            count: set.len(),
            ..Self::default()
        };
        for (i, band) in set.bands().iter().enumerate() {
            cell.f1[i] = band.f1;
            cell.f2[i] = band.f2;
        }
        cell
    }
}

impl CellBands {
    /// Indices of every band with `f1 < freq <= f2`
    pub fn matching(&self, freq: f64) -> impl Iterator<Item = usize> + '_ {
        (0..self.count).filter(move |&i| self.f1[i] < freq && freq <= self.f2[i])
    }
}

/// Fixed bands used for the directional flux estimators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FluxBand {
    /// Below [`UV_LOW`]
    Visible,
    /// From [`UV_LOW`] to [`UV_HIGH`]
    Uv,
    /// Above [`UV_HIGH`]
    Xray,
}

impl FluxBand {
    /// All bands in accumulator order
    pub const ALL: [Self; 3] = [Self::Visible, Self::Uv, Self::Xray];

    /// Band a frequency belongs to
    #[inline]
    pub fn classify(freq: f64) -> Self {
        if freq < UV_LOW {
            Self::Visible
        } else if freq > UV_HIGH {
            Self::Xray
        } else {
            Self::Uv
        }
    }

    /// Slot of this band in a plasma cell's flux array
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Visible => 0,
            Self::Uv => 1,
            Self::Xray => 2,
        }
    }
}

/// How to build the band set from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandPreset {
    /// Explicit edges in Hz
    Edges {
        /// `n + 1` increasing edges
        edges: Vec<f64>,
        /// Minimum fraction per band
        min_fraction: f64,
    },
    /// Logarithmically spaced bands
    LogUniform {
        /// Lowest edge (Hz)
        f_min: f64,
        /// Highest edge (Hz)
        f_max: f64,
        /// Number of bands
        count: usize,
    },
}

impl Default for BandPreset {
    fn default() -> Self {
        Self::LogUniform {
            f_min: 1.0e14,
            f_max: 1.0e18,
            count: 10,
        }
    }
}

impl BandPreset {
    /// Build the band set this preset describes
    ///
    /// # Errors
    /// Returns a [`BandError`] if the edges are invalid
    pub fn build(&self) -> Result<BandSet, BandError> {
        match self {
            Self::Edges {
                edges,
                min_fraction,
            } => BandSet::from_edges(edges, *min_fraction),
            Self::LogUniform {
                f_min,
                f_max,
                count,
            } => BandSet::log_uniform(*f_min, *f_max, *count),
        }
    }
}

/// Copy the band edges into every plasma cell
///
/// Overwrites each cell's band count and edges; the rest of the cell is left
/// alone. Copying twice is the same as copying once.
pub fn copy_bands(bands: &BandSet, plasma_cells: &mut [PlasmaCell]) {
    let edges = CellBands::from(bands);
    plasma_cells
        .par_iter_mut()
        .for_each(|cell| cell.bands = edges);
    debug!(
        "Copied {} bands into {} plasma cells",
        edges.count,
        plasma_cells.len()
    );
}
