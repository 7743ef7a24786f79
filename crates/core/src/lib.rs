//! Radiative Transfer Core Library
//!
//! Grid-state synchronization and spectral estimator accumulation for a Monte
//! Carlo radiative-transfer simulation. Photon packets are tracked through a
//! spatial grid whose cells are split across a fixed group of workers.
//!
//! ## Components
//!
//! - `bands`: frequency banding and its copy into every plasma cell
//! - `estimators`: per-segment accumulation of intensity, flux, spectral
//!   moments and ionization estimators
//! - `comm`: schema-driven packing, pluggable transports and the
//!   broadcast-and-merge protocol that gives every worker the full grid
//! - `geometry` and `grid`: cell geometry, plasma cells and the per-worker grid
//! - `photon`: segments, photon identities and a seeded segment sampler
//! - `config`: run configuration loaded from JSON

// Core types and utilities
pub mod core_types;

pub mod bands;
pub mod comm;
pub mod config;
pub mod estimators;
pub mod geometry;
pub mod grid;
pub mod photon;
pub mod profiler;

// Re-export core types
pub use core_types::{Tensor3, Vec3};

// Re-export main API
pub use bands::{copy_bands, Band, BandError, BandPreset, BandSet, CellBands, FluxBand};
pub use comm::{
    max_cells_per_rank, synchronize, CommError, PartitionPlan, SoloTransport, SyncReport,
    ThreadTransport, Transport, WorkerGroup,
};
pub use config::{ConfigError, RunConfig};
pub use estimators::{accumulate, is_ionizing, SegmentOutcome};
pub use geometry::{CoordSystem, GeometryError, GridLayout};
pub use grid::{InWind, PlasmaCell, WindCell, WindGrid};
pub use photon::{PhotonId, PhotonOrigin, Segment, SegmentSampler};
pub use profiler::ProfilerScope;
