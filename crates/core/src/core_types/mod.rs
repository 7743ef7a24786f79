//! Core types and utilities

pub mod constants;
pub mod vec3;

pub use constants::*;
pub use vec3::{Tensor3, Vec3};
