//! Errors raised by the communication layer

use thiserror::Error;

/// Errors that can occur while packing, broadcasting or merging grid state
#[derive(Debug, Error)]
pub enum CommError {
    /// A pack or unpack would run past the end of the buffer
    #[error(
        "communication buffer of {capacity} bytes cannot fit {requested} more bytes at offset {position}"
    )]
    BufferOverflow {
        /// Total buffer size in bytes
        capacity: usize,
        /// Cursor position when the access was attempted
        position: usize,
        /// Bytes the access needed
        requested: usize,
    },

    /// The communication buffer could not be allocated
    #[error("unable to allocate {bytes} bytes for the communication buffer")]
    AllocationFailed {
        /// Requested buffer size in bytes
        bytes: usize,
    },

    /// Workers disagreed on the buffer size of a collective call
    #[error("broadcast from rank {root} expected {expected} bytes but received {actual}")]
    SizeMismatch {
        /// Source rank of the round
        root: usize,
        /// Local buffer size
        expected: usize,
        /// Size published by the source
        actual: usize,
    },

    /// A rank outside the worker group was named
    #[error("rank {rank} is outside a group of {size} workers")]
    InvalidRank {
        /// Offending rank
        rank: usize,
        /// Number of workers in the group
        size: usize,
    },

    /// A transmitted record addressed a cell that does not exist locally
    #[error("cell index {index} is outside the local grid of {cells} cells")]
    CellIndexOutOfRange {
        /// Transmitted global index
        index: i64,
        /// Local grid size
        cells: usize,
    },

    /// The source of a round failed to pack its partition and sent nothing
    #[error("rank {root} aborted its broadcast round")]
    RoundAborted {
        /// Source rank of the round
        root: usize,
    },

    /// A field value cannot be carried on the wire or decoded from it
    #[error("field '{field}' cannot be transferred: {reason}")]
    InvalidField {
        /// Schema field name
        field: &'static str,
        /// What went wrong
        reason: String,
    },

    /// A composite layout failed registration checks
    #[error("composite type '{name}' has an invalid layout: {reason}")]
    InvalidLayout {
        /// Composite type name
        name: &'static str,
        /// What went wrong
        reason: String,
    },

    /// A composite type handle was used without being registered
    #[error("composite type handle {0} is not registered with the transport")]
    UnknownType(u32),

    /// A partition plan is not disjoint and exhaustive
    #[error("invalid partition plan: {0}")]
    Partition(String),

    /// The in-process worker pool could not be created
    #[error("worker group could not be started: {0}")]
    WorkerGroup(String),

    /// A worker panicked while holding the collective hub
    #[error("collective hub was poisoned by a panicking worker")]
    Poisoned,
}
