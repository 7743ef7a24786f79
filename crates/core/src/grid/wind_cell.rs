//! Geometric and kinematic description of one grid cell
//!
//! `WindCell` is the part of the grid that the synchronizer replicates across
//! workers. Its wire layout is declared once, in [`wind_cell_schema`].

use crate::comm::schema::{
    CompositeLayout, CompositeMember, CompositeValue, FieldSpec, Scalar, ScalarKind, Schema,
};
use crate::comm::CommError;
use crate::core_types::{Tensor3, Vec3};
use serde::{Deserialize, Serialize};
use std::mem::{offset_of, size_of};

/// Cone bounding a cell in polar-style domains: `z = offset + slope * rho`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConeBoundary {
    /// Height of the cone where it crosses the axis
    pub offset: f64,
    /// Slope `dz/drho`
    pub slope: f64,
}

/// Layout of [`ConeBoundary`], derived from the struct definition
pub static CONE_BOUNDARY_LAYOUT: CompositeLayout = CompositeLayout {
    name: "cone_boundary",
    members: &[
        CompositeMember {
            name: "offset",
            kind: ScalarKind::Double,
            offset: offset_of!(ConeBoundary, offset),
        },
        CompositeMember {
            name: "slope",
            kind: ScalarKind::Double,
            offset: offset_of!(ConeBoundary, slope),
        },
    ],
    extent: size_of::<ConeBoundary>(),
};

impl CompositeValue for ConeBoundary {
    fn layout(&self) -> &'static CompositeLayout {
        &CONE_BOUNDARY_LAYOUT
    }

    fn member(&self, index: usize) -> Scalar {
        match index {
            0 => Scalar::Double(self.offset),
            _ => Scalar::Double(self.slope),
        }
    }

    fn set_member(&mut self, index: usize, value: Scalar) -> Result<(), CommError> {
        match index {
            0 => self.offset = value.as_double("offset")?,
            1 => self.slope = value.as_double("slope")?,
            _ => {
                return Err(CommError::InvalidField {
                    field: "cone_boundary",
                    reason: format!("no member at index {index}"),
                })
            }
        }
        Ok(())
    }
}

/// How much of a cell lies inside the wind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InWind {
    /// Entirely inside the wind
    All,
    /// Partly inside the wind
    Partial,
    /// Entirely outside the wind
    Outside,
    /// Excluded from transport
    Ignored,
    /// Not yet classified
    #[default]
    Unassigned,
    /// Any other code, kept as received
    Other(i32),
}

impl InWind {
    /// Integer code carried on the wire
    pub const fn code(self) -> i32 {
        match self {
            Self::All => 0,
            Self::Partial => 1,
            Self::Outside => -1,
            Self::Ignored => -2,
            Self::Unassigned => -999,
            Self::Other(code) => code,
        }
    }

    /// Decode a wire code; unrecognized codes are carried as [`InWind::Other`]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::All,
            1 => Self::Partial,
            -1 => Self::Outside,
            -2 => Self::Ignored,
            -999 => Self::Unassigned,
            other => Self::Other(other),
        }
    }

    /// Whether photons are transported through this cell
    pub const fn is_active(self) -> bool {
        matches!(self, Self::All | Self::Partial)
    }
}

/// One spatial zone of the simulation domain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindCell {
    /// Domain this cell belongs to
    pub domain: usize,
    /// Index of the cell inside its domain
    pub domain_index: usize,
    /// Index of the matching plasma cell
    pub plasma_index: usize,
    /// Inner corner of the cell (cm)
    pub position: Vec3,
    /// Cell centroid (cm)
    pub centroid: Vec3,
    /// Inner radius (cm)
    pub r: f64,
    /// Radius at the centre (cm)
    pub r_center: f64,
    /// Inner polar angle (degrees)
    pub theta: f64,
    /// Polar angle at the centre (degrees)
    pub theta_center: f64,
    /// Angular extent (degrees)
    pub dtheta: f64,
    /// Radial extent (cm)
    pub dr: f64,
    /// Bounding cone
    pub cone: ConeBoundary,
    /// Velocity at the inner corner (cm/s)
    pub velocity: Vec3,
    /// Velocity gradient tensor (1/s)
    pub velocity_gradient: Tensor3,
    /// Divergence of the velocity field (1/s)
    pub velocity_divergence: f64,
    /// Direction-averaged `dv/ds` (1/s)
    pub dvds_ave: f64,
    /// Maximum `dv/ds` over directions (1/s)
    pub dvds_max: f64,
    /// Volume inside the wind (cm³)
    pub volume: f64,
    /// Lorentz factor at the inner corner
    pub gamma: f64,
    /// Lorentz factor at the centre
    pub gamma_center: f64,
    /// Step length pushing photons across boundaries (cm)
    pub fudge_distance: f64,
    /// In-wind classification
    pub in_wind: InWind,
}

impl WindCell {
    /// Create an unclassified cell with the given indices and zeroed geometry
    pub fn new(domain: usize, domain_index: usize, plasma_index: usize) -> Self {
        Self {
            domain,
            domain_index,
            plasma_index,
            ..Self::default()
        }
    }
}

/// Wire layout of [`WindCell`], in transmission order
///
/// Integer identifiers first, then positions and extents, the cone boundary,
/// kinematics, volume and gamma factors, the fudge distance, and finally the
/// in-wind flag.
pub fn wind_cell_schema() -> Schema<WindCell> {
    type F = FieldSpec<WindCell>;

    Schema::new(
        "wind_cell",
        vec![
            F::index("domain", |c| c.domain, |c, v| c.domain = v),
            F::index("domain_index", |c| c.domain_index, |c, v| c.domain_index = v),
            F::index("plasma_index", |c| c.plasma_index, |c, v| c.plasma_index = v),
            F::doubles(
                "position",
                3,
                |c| c.position.as_slice(),
                |c| c.position.as_mut_slice(),
            ),
            F::doubles(
                "centroid",
                3,
                |c| c.centroid.as_slice(),
                |c| c.centroid.as_mut_slice(),
            ),
            F::double("r", |c| c.r, |c, v| c.r = v),
            F::double("r_center", |c| c.r_center, |c, v| c.r_center = v),
            F::double("theta", |c| c.theta, |c, v| c.theta = v),
            F::double("theta_center", |c| c.theta_center, |c, v| c.theta_center = v),
            F::double("dtheta", |c| c.dtheta, |c, v| c.dtheta = v),
            F::double("dr", |c| c.dr, |c, v| c.dr = v),
            F::composite("cone", &CONE_BOUNDARY_LAYOUT, |c| &c.cone, |c| &mut c.cone),
            F::doubles(
                "velocity",
                3,
                |c| c.velocity.as_slice(),
                |c| c.velocity.as_mut_slice(),
            ),
            F::doubles(
                "velocity_gradient",
                9,
                |c| c.velocity_gradient.as_slice(),
                |c| c.velocity_gradient.as_mut_slice(),
            ),
            F::double(
                "velocity_divergence",
                |c| c.velocity_divergence,
                |c, v| c.velocity_divergence = v,
            ),
            F::double("dvds_ave", |c| c.dvds_ave, |c, v| c.dvds_ave = v),
            F::double("dvds_max", |c| c.dvds_max, |c, v| c.dvds_max = v),
            F::double("volume", |c| c.volume, |c, v| c.volume = v),
            F::double("gamma", |c| c.gamma, |c, v| c.gamma = v),
            F::double("gamma_center", |c| c.gamma_center, |c, v| c.gamma_center = v),
            F::double("fudge_distance", |c| c.fudge_distance, |c, v| c.fudge_distance = v),
            F::int(
                "in_wind",
                |c| c.in_wind.code(),
                |c, code| {
                    c.in_wind = InWind::from_code(code);
                    Ok(())
                },
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::schema::FieldKind;
    use crate::comm::CommBuffer;

    fn sample_cell() -> WindCell {
        WindCell {
            domain: 1,
            domain_index: 12,
            plasma_index: 9,
            position: Vec3::new(1.0e10, 0.0, 2.0e9),
            centroid: Vec3::new(1.5e10, 0.0, 2.5e9),
            r: 1.0e10,
            r_center: 1.5e10,
            theta: 10.0,
            theta_center: 12.5,
            dtheta: 5.0,
            dr: 1.0e10,
            cone: ConeBoundary {
                offset: 3.0e9,
                slope: 0.25,
            },
            velocity: Vec3::new(1.0e7, 2.0e6, -3.0e5),
            velocity_gradient: Tensor3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0),
            velocity_divergence: 15.0,
            dvds_ave: 4.0,
            dvds_max: 8.0,
            volume: 1.0e30,
            gamma: 1.0001,
            gamma_center: 1.0002,
            fudge_distance: 1.0e5,
            in_wind: InWind::Partial,
        }
    }

    #[test]
    fn test_schema_shape() {
        let schema = wind_cell_schema();
        // 3 ids + in_wind; 3+3 vectors, 6 extents, 3 velocity, 9 gradient, 7 scalars
        assert_eq!(schema.scalar_counts(), (4, 31));
        assert_eq!(schema.composite_layouts(), vec![&CONE_BOUNDARY_LAYOUT]);
        assert_eq!(schema.record_bytes(), 4 * 4 + 31 * 8 + 16);

        let names: Vec<&str> = schema.fields().iter().map(FieldSpec::name).collect();
        assert_eq!(names.first(), Some(&"domain"));
        assert_eq!(names.last(), Some(&"in_wind"));
        assert_eq!(
            schema.fields()[11].kind(),
            FieldKind::Composite(&CONE_BOUNDARY_LAYOUT)
        );
    }

    #[test]
    fn test_cell_survives_pack_and_unpack() {
        let schema = wind_cell_schema();
        let original = sample_cell();

        let mut buffer = CommBuffer::allocate(schema.record_bytes()).unwrap();
        schema.pack(&original, &mut buffer).unwrap();
        buffer.rewind();

        let mut copy = WindCell::default();
        schema.unpack(&mut copy, &mut buffer).unwrap();
        assert_eq!(copy, original);
    }

    #[test]
    fn test_cone_layout_valid() {
        CONE_BOUNDARY_LAYOUT.validate().unwrap();
        assert_eq!(CONE_BOUNDARY_LAYOUT.member_bytes(), 16);
        assert!(CONE_BOUNDARY_LAYOUT.extent >= 16);
    }

    #[test]
    fn test_unknown_in_wind_code_carried_through() {
        let schema = wind_cell_schema();
        let mut buffer = CommBuffer::allocate(schema.record_bytes()).unwrap();
        schema.pack(&sample_cell(), &mut buffer).unwrap();

        // The flag is the final 4 bytes
        let len = buffer.capacity();
        buffer.as_mut_bytes()[len - 4..].copy_from_slice(&42i32.to_le_bytes());
        buffer.rewind();

        let mut copy = WindCell::default();
        schema.unpack(&mut copy, &mut buffer).unwrap();
        assert_eq!(copy.in_wind, InWind::Other(42));
        assert_eq!(copy.in_wind.code(), 42);
        assert!(!copy.in_wind.is_active());
        assert_eq!(copy.volume, sample_cell().volume);
    }

    #[test]
    fn test_in_wind_codes_round_trip() {
        for flag in [
            InWind::All,
            InWind::Partial,
            InWind::Outside,
            InWind::Ignored,
            InWind::Unassigned,
        ] {
            assert_eq!(InWind::from_code(flag.code()), flag);
        }
        assert!(InWind::All.is_active());
        assert!(!InWind::Ignored.is_active());
    }
}
