//! Collective communication of grid state
//!
//! - `schema`: declarative field lists for packed records
//! - `buffer`: the flat pack/unpack buffer
//! - `transport`: the `Transport` trait and the single-worker backend
//! - `threaded`: an in-process worker group built on a rayon pool
//! - `partition`: contiguous domain decomposition
//! - `sync`: the broadcast-and-merge protocol itself

pub mod buffer;
pub mod error;
pub mod partition;
pub mod schema;
pub mod sync;
pub mod threaded;
pub mod transport;

pub use buffer::CommBuffer;
pub use error::CommError;
pub use partition::{max_cells_per_rank, Partition, PartitionPlan};
pub use schema::{
    CompositeLayout, CompositeMember, CompositeValue, FieldKind, FieldSpec, Scalar, ScalarKind,
    Schema,
};
pub use sync::{buffer_capacity, synchronize, SyncReport};
pub use threaded::{ThreadTransport, WorkerGroup};
pub use transport::{SoloTransport, Transport, TypeHandle, TypeRegistry};
