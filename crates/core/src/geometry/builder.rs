//! Simple grid geometry for one domain
//!
//! Builds either logarithmically spaced spherical shells or a linear
//! cylindrical mesh, filled with a homologous velocity law
//! `v = v0 · x / r0`. Each worker calls [`define_cells`] on its own range only;
//! the synchronizer then shares the result.

use super::CoordSystem;
use crate::core_types::{Tensor3, Vec3, C};
use crate::grid::{ConeBoundary, InWind, WindCell};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::Range;
use thiserror::Error;

/// Errors raised by an inconsistent grid layout
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    /// A layout parameter is out of range
    #[error("invalid grid layout: {0}")]
    InvalidLayout(String),

    /// The range passed to [`define_cells`] does not fit the domain
    #[error("cell range {start}..{end} is outside a domain of {cells} cells")]
    RangeOutOfBounds {
        /// Range start
        start: usize,
        /// Range end
        end: usize,
        /// Cells in the domain
        cells: usize,
    },
}

/// Geometry of one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridLayout {
    /// Coordinate system
    pub coord_system: CoordSystem,
    /// Radial shells (spherical) or cylindrical-radius columns
    pub n_x: usize,
    /// Height rows; ignored for spherical domains
    pub n_z: usize,
    /// Inner edge of the domain (cm)
    pub r_min: f64,
    /// Outer edge of the domain (cm); also the top of a cylindrical mesh
    pub r_max: f64,
    /// Speed at the reference radius (cm/s)
    pub v0: f64,
    /// Reference radius of the velocity law (cm)
    pub r0: f64,
    /// Fudge distance as a fraction of the smallest cell extent
    pub fudge_fraction: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            coord_system: CoordSystem::Cylindrical,
            n_x: 10,
            n_z: 10,
            r_min: 1.0e9,
            r_max: 1.0e11,
            v0: 1.0e7,
            r0: 1.0e10,
            fudge_fraction: 1.0e-3,
        }
    }
}

impl GridLayout {
    /// Spherical shells with the default velocity law
    pub fn spherical(n_shells: usize, r_min: f64, r_max: f64) -> Self {
        Self {
            coord_system: CoordSystem::Spherical,
            n_x: n_shells,
            n_z: 1,
            r_min,
            r_max,
            ..Self::default()
        }
    }

    /// Cylindrical mesh with the default velocity law
    pub fn cylindrical(n_x: usize, n_z: usize, r_min: f64, r_max: f64) -> Self {
        Self {
            coord_system: CoordSystem::Cylindrical,
            n_x,
            n_z,
            r_min,
            r_max,
            ..Self::default()
        }
    }

    /// Number of cells in the domain
    pub fn cell_count(&self) -> usize {
        match self.coord_system {
            CoordSystem::Spherical => self.n_x,
            CoordSystem::Cylindrical => self.n_x * self.n_z,
        }
    }

    /// Check dimensions, edges and that the flow stays subluminal
    ///
    /// # Errors
    /// Returns [`GeometryError::InvalidLayout`] naming the offending parameter
    pub fn validate(&self) -> Result<(), GeometryError> {
        let invalid = |msg: String| Err(GeometryError::InvalidLayout(msg));

        if self.n_x == 0 || (self.coord_system == CoordSystem::Cylindrical && self.n_z == 0) {
            return invalid(format!("empty mesh {}x{}", self.n_x, self.n_z));
        }
        if !(self.r_min > 0.0 && self.r_max > self.r_min) {
            return invalid(format!(
                "edges must satisfy 0 < r_min < r_max, got {} and {}",
                self.r_min, self.r_max
            ));
        }
        if self.r0 <= 0.0 {
            return invalid(format!("reference radius must be positive, got {}", self.r0));
        }
        if !(0.0..1.0).contains(&self.fudge_fraction) {
            return invalid(format!(
                "fudge fraction must lie in [0, 1), got {}",
                self.fudge_fraction
            ));
        }

        // Fastest point is the far corner of the domain
        let far = match self.coord_system {
            CoordSystem::Spherical => self.r_max,
            CoordSystem::Cylindrical => self.r_max * std::f64::consts::SQRT_2,
        };
        let v_max = (self.v0 * far / self.r0).abs();
        if v_max >= C {
            return invalid(format!("velocity law reaches {v_max:.3e} cm/s at the edge"));
        }
        Ok(())
    }

    fn velocity_at(&self, x: &Vec3) -> Vec3 {
        *x * (self.v0 / self.r0)
    }

    fn shell_edge(&self, i: usize) -> f64 {
        let fraction = i as f64 / self.n_x as f64;
        self.r_min * (self.r_max / self.r_min).powf(fraction)
    }

    fn rho_edge(&self, i: usize) -> f64 {
        self.r_min + (self.r_max - self.r_min) * i as f64 / self.n_x as f64
    }

    fn z_edge(&self, k: usize) -> f64 {
        self.r_max * k as f64 / self.n_z as f64
    }

    fn fill_kinematics(&self, cell: &mut WindCell) {
        let rate = self.v0 / self.r0;
        cell.velocity = self.velocity_at(&cell.position);
        cell.velocity_gradient = Tensor3::identity() * rate;
        cell.velocity_divergence = 3.0 * rate;
        cell.dvds_ave = rate.abs();
        cell.dvds_max = rate.abs();
        cell.gamma = lorentz_factor(&cell.velocity);
        cell.gamma_center = lorentz_factor(&self.velocity_at(&cell.centroid));
    }

    fn define_shell(&self, cell: &mut WindCell, i: usize) {
        let (r_in, r_out) = (self.shell_edge(i), self.shell_edge(i + 1));
        let r_mid = 0.5 * (r_in + r_out);

        cell.position = Vec3::new(r_in, 0.0, 0.0);
        cell.centroid = Vec3::new(r_mid, 0.0, 0.0);
        cell.r = r_in;
        cell.r_center = r_mid;
        cell.theta = 0.0;
        cell.theta_center = 0.0;
        cell.dtheta = 0.0;
        cell.dr = r_out - r_in;
        cell.cone = ConeBoundary::default();
        cell.volume = 4.0 / 3.0 * PI * (r_out.powi(3) - r_in.powi(3));
        cell.fudge_distance = self.fudge_fraction * cell.dr;
        self.fill_kinematics(cell);
    }

    fn define_column_cell(&self, cell: &mut WindCell, n: usize) {
        let (i, k) = (n / self.n_z, n % self.n_z);
        let (rho_in, rho_out) = (self.rho_edge(i), self.rho_edge(i + 1));
        let (z_in, z_out) = (self.z_edge(k), self.z_edge(k + 1));

        cell.position = Vec3::new(rho_in, 0.0, z_in);
        cell.centroid = Vec3::new(0.5 * (rho_in + rho_out), 0.0, 0.5 * (z_in + z_out));
        cell.r = cell.position.norm();
        cell.r_center = cell.centroid.norm();
        cell.theta = polar_angle_deg(rho_in, z_in);
        cell.theta_center = polar_angle_deg(cell.centroid.x, cell.centroid.z);
        cell.dtheta = (polar_angle_deg(rho_out, z_in) - polar_angle_deg(rho_in, z_out)).abs();
        cell.dr = rho_out - rho_in;
        // Cone through the origin and the inner corner
        cell.cone = ConeBoundary {
            offset: 0.0,
            slope: z_in / rho_in,
        };
        // Annulus above and below the disk plane
        cell.volume = 2.0 * PI * (rho_out * rho_out - rho_in * rho_in) * (z_out - z_in);
        cell.fudge_distance = self.fudge_fraction * cell.dr.min(z_out - z_in);
        self.fill_kinematics(cell);
    }
}

fn lorentz_factor(v: &Vec3) -> f64 {
    let beta2 = v.norm_squared() / (C * C);
    1.0 / (1.0 - beta2).sqrt()
}

fn polar_angle_deg(rho: f64, z: f64) -> f64 {
    rho.atan2(z).to_degrees()
}

/// Write geometry and kinematics for cells `range` of one domain
///
/// `cells` is the domain's slice of the grid; cells outside `range` are not
/// touched. Indices already stored in the cells are kept.
///
/// # Errors
/// Returns [`GeometryError::InvalidLayout`] for an inconsistent layout, or
/// [`GeometryError::RangeOutOfBounds`] if `range` does not fit the domain
pub fn define_cells(
    cells: &mut [WindCell],
    range: Range<usize>,
    layout: &GridLayout,
) -> Result<(), GeometryError> {
    layout.validate()?;
    let count = layout.cell_count().min(cells.len());
    if range.start > range.end || range.end > count {
        return Err(GeometryError::RangeOutOfBounds {
            start: range.start,
            end: range.end,
            cells: count,
        });
    }

    for n in range {
        let cell = &mut cells[n];
        match layout.coord_system {
            CoordSystem::Spherical => layout.define_shell(cell, n),
            CoordSystem::Cylindrical => layout.define_column_cell(cell, n),
        }
        cell.in_wind = InWind::All;
    }
    Ok(())
}
