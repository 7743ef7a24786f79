//! Vector and tensor aliases for 3D positions, directions and gradients.

use nalgebra::{Matrix3, Vector3};

/// 3D vector type for positions, velocities, directions and flux elements.
///
/// Double precision throughout: frequencies sit near 1e15 Hz and the
/// ionization numerator divides by `h·ν` near 1e-11 erg.
pub type Vec3 = Vector3<f64>;

/// 3×3 tensor type used for velocity gradients.
pub type Tensor3 = Matrix3<f64>;
