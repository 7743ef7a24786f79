//! Run configuration
//!
//! Everything a run needs beyond the grid itself: the worker count, the
//! domain layout, the banding scheme and the synthetic photon source.

use crate::bands::{BandError, BandPreset, BandSet};
use crate::geometry::{GeometryError, GridLayout};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors raised while loading or checking a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("cannot read configuration {path}: {source}")]
    Io {
        /// File that failed
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid JSON for a [`RunConfig`]
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The banding scheme is invalid
    #[error(transparent)]
    Bands(#[from] BandError),

    /// The grid layout is invalid
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// A scalar setting is out of range
    #[error("invalid setting '{name}': {reason}")]
    Invalid {
        /// Setting name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Settings of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of workers
    pub workers: usize,
    /// Domain geometry
    pub layout: GridLayout,
    /// Frequency banding
    pub bands: BandPreset,
    /// Segments sampled per owned cell
    pub photons_per_cell: usize,
    /// Seed of the segment sampler
    pub seed: u64,
    /// Lowest sampled frequency (Hz)
    pub freq_min: f64,
    /// Highest sampled frequency (Hz)
    pub freq_max: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            layout: GridLayout::default(),
            bands: BandPreset::default(),
            photons_per_cell: 100,
            seed: 42,
            freq_min: 1.0e14,
            freq_max: 1.0e18,
        }
    }
}

impl RunConfig {
    /// Read a configuration from a JSON file; missing keys take defaults
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`] if the file cannot
    /// be read or parsed, or any validation error
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a JSON configuration
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed JSON, or any validation error
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] if serialization fails
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every setting
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                name: "workers",
                reason: "at least one worker is required".to_string(),
            });
        }
        if !(self.freq_min > 0.0 && self.freq_max > self.freq_min) {
            return Err(ConfigError::Invalid {
                name: "freq_min",
                reason: format!(
                    "need 0 < freq_min < freq_max, got {} and {}",
                    self.freq_min, self.freq_max
                ),
            });
        }
        self.layout.validate()?;
        self.bands.build()?;
        Ok(())
    }

    /// Build the band set
    ///
    /// # Errors
    /// Returns [`ConfigError::Bands`] if the preset is invalid
    pub fn band_set(&self) -> Result<BandSet, ConfigError> {
        Ok(self.bands.build()?)
    }
}
