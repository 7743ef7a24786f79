//! Transport trait definition
//!
//! This module defines the `Transport` trait, the backend-agnostic interface
//! the grid synchronizer uses for collective communication. Every worker holds
//! one transport endpoint; all endpoints of a group must enter each collective
//! call in the same order or the group deadlocks.

use super::schema::{CompositeLayout, ScalarKind};
use super::CommError;
use rustc_hash::FxHashMap;

/// Handle to a composite type registered with a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle(u32);

impl TypeHandle {
    /// Raw handle value
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Backend-agnostic collective communication
///
/// Implementations must make [`Transport::broadcast`] blocking: no worker
/// returns from a round until every worker of the group has entered it.
pub trait Transport {
    /// Rank of this worker, `0..size()`
    fn rank(&self) -> usize;

    /// Number of workers in the group
    fn size(&self) -> usize;

    /// Blocking one-to-all broadcast of `buffer` from `root`
    ///
    /// On the root the buffer is read; on every other worker it is overwritten
    /// byte for byte.
    ///
    /// # Errors
    /// Returns [`CommError::InvalidRank`] for an unknown root, or
    /// [`CommError::SizeMismatch`] if workers disagree on the buffer size
    fn broadcast(&mut self, buffer: &mut [u8], root: usize) -> Result<(), CommError>;

    /// Register a composite type so it can be sized and packed
    ///
    /// # Errors
    /// Returns [`CommError::InvalidLayout`] if the layout fails validation
    fn register_composite(
        &mut self,
        layout: &'static CompositeLayout,
    ) -> Result<TypeHandle, CommError>;

    /// Release a registered composite type
    ///
    /// # Errors
    /// Returns [`CommError::UnknownType`] if the handle is not registered
    fn free_composite(&mut self, handle: TypeHandle) -> Result<(), CommError>;

    /// Packed size in bytes of `count` instances of a registered composite type
    ///
    /// # Errors
    /// Returns [`CommError::UnknownType`] if the handle is not registered
    fn composite_pack_size(&self, count: usize, handle: TypeHandle) -> Result<usize, CommError>;

    /// Packed size in bytes of `count` scalars of one kind
    fn scalar_pack_size(&self, count: usize, kind: ScalarKind) -> usize {
        count * kind.size()
    }
}

/// Composite types registered with one transport endpoint
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: FxHashMap<TypeHandle, &'static CompositeLayout>,
    next_id: u32,
}

impl TypeRegistry {
    /// Validate and register a layout
    ///
    /// # Errors
    /// Returns [`CommError::InvalidLayout`] if the layout fails validation
    pub fn register(&mut self, layout: &'static CompositeLayout) -> Result<TypeHandle, CommError> {
        layout.validate()?;
        let handle = TypeHandle(self.next_id);
        self.next_id += 1;
        self.types.insert(handle, layout);
        Ok(handle)
    }

    /// Remove a registration
    ///
    /// # Errors
    /// Returns [`CommError::UnknownType`] if the handle is not registered
    pub fn free(&mut self, handle: TypeHandle) -> Result<(), CommError> {
        self.types
            .remove(&handle)
            .map(|_| ())
            .ok_or(CommError::UnknownType(handle.0))
    }

    /// Look up a registered layout
    ///
    /// # Errors
    /// Returns [`CommError::UnknownType`] if the handle is not registered
    pub fn layout(&self, handle: TypeHandle) -> Result<&'static CompositeLayout, CommError> {
        self.types
            .get(&handle)
            .copied()
            .ok_or(CommError::UnknownType(handle.0))
    }

    /// Packed size of `count` instances; members are packed without padding
    ///
    /// # Errors
    /// Returns [`CommError::UnknownType`] if the handle is not registered
    pub fn pack_size(&self, count: usize, handle: TypeHandle) -> Result<usize, CommError> {
        Ok(count * self.layout(handle)?.member_bytes())
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Transport for a group of exactly one worker
///
/// Broadcasts are no-ops; useful for serial runs and for tests of the packing
/// path without threads.
#[derive(Debug, Default)]
pub struct SoloTransport {
    registry: TypeRegistry,
}

impl SoloTransport {
    /// Create a single-worker transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered composite types
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }
}

impl Transport for SoloTransport {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast(&mut self, _buffer: &mut [u8], root: usize) -> Result<(), CommError> {
        if root == 0 {
            Ok(())
        } else {
            Err(CommError::InvalidRank {
                rank: root,
                size: 1,
            })
        }
    }

    fn register_composite(
        &mut self,
        layout: &'static CompositeLayout,
    ) -> Result<TypeHandle, CommError> {
        self.registry.register(layout)
    }

    fn free_composite(&mut self, handle: TypeHandle) -> Result<(), CommError> {
        self.registry.free(handle)
    }

    fn composite_pack_size(&self, count: usize, handle: TypeHandle) -> Result<usize, CommError> {
        self.registry.pack_size(count, handle)
    }
}
