//! Grid cells, plasma cells and the per-worker grid

pub mod plasma_cell;
pub mod wind_cell;
pub mod wind_grid;

// Re-export main types
pub use plasma_cell::{BandEstimator, FluxAccumulator, PlasmaCell, ProvenanceCounts};
pub use wind_cell::{wind_cell_schema, ConeBoundary, InWind, WindCell, CONE_BOUNDARY_LAYOUT};
pub use wind_grid::{Domain, WindGrid};
