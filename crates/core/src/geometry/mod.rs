//! Coordinate systems and vector projections

pub mod builder;

pub use builder::{define_cells, GeometryError, GridLayout};

use crate::core_types::Vec3;
use serde::{Deserialize, Serialize};

/// Coordinate system of a domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordSystem {
    /// Concentric shells; only the radial coordinate varies
    Spherical,
    /// Rectangular mesh in cylindrical radius and height
    #[default]
    Cylindrical,
}

impl CoordSystem {
    /// Whether the domain is spherically symmetric
    pub const fn is_spherical(self) -> bool {
        matches!(self, Self::Spherical)
    }
}

/// Project a Cartesian vector into cylindrical components at `position`
///
/// Returns `(ρ̂·v, φ̂·v, v_z)` with `ρ̂ = (x, y, 0)/ρ` and `φ̂ = (-ρ̂_y, ρ̂_x, 0)`.
/// On the axis, where `ρ̂` is undefined, the x axis is used.
pub fn project_from_xyz_cyl(position: &Vec3, vector: &Vec3) -> Vec3 {
    let rho = position.x.hypot(position.y);
    let (cos_phi, sin_phi) = if rho > 0.0 {
        (position.x / rho, position.y / rho)
    } else {
        (1.0, 0.0)
    };

    Vec3::new(
        cos_phi * vector.x + sin_phi * vector.y,
        -sin_phi * vector.x + cos_phi * vector.y,
        vector.z,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_projection_on_x_axis_is_identity() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let projected = project_from_xyz_cyl(&Vec3::new(5.0, 0.0, -2.0), &v);
        assert_relative_eq!(projected, v, epsilon = 1e-12);
    }

    #[test]
    fn test_projection_on_y_axis() {
        // ρ̂ = ŷ, φ̂ = -x̂
        let projected =
            project_from_xyz_cyl(&Vec3::new(0.0, 4.0, 0.0), &Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(projected, Vec3::new(2.0, -1.0, 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_projection_preserves_length() {
        let v = Vec3::new(-0.3, 0.7, 0.2);
        let projected = project_from_xyz_cyl(&Vec3::new(1.0, 1.0, 1.0), &v);
        assert_relative_eq!(projected.norm(), v.norm(), epsilon = 1e-12);
    }

    #[test]
    fn test_projection_on_axis_falls_back_to_x() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let projected = project_from_xyz_cyl(&Vec3::new(0.0, 0.0, 7.0), &v);
        assert_relative_eq!(projected, v, epsilon = 1e-12);
    }
}
