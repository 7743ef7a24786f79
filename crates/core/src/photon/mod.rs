//! Photon packets as seen by the estimators: identities, origins and path segments

pub mod sampler;
pub mod segment;

pub use sampler::SegmentSampler;
pub use segment::{PhotonId, PhotonOrigin, Segment};
