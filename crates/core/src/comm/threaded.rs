//! In-process worker group
//!
//! Runs N workers as the N threads of a dedicated rayon pool, one endpoint per
//! thread. The broadcast hub is a shared slot guarded by a mutex plus a
//! barrier, which gives the same blocking semantics as a message-passing
//! collective: nobody leaves a round until everybody has entered it.

use super::schema::CompositeLayout;
use super::transport::{Transport, TypeHandle, TypeRegistry};
use super::CommError;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::{Arc, Barrier, Mutex};
use tracing::debug;

struct Hub {
    size: usize,
    barrier: Barrier,
    slot: Mutex<Vec<u8>>,
}

impl Hub {
    fn new(size: usize) -> Self {
        Self {
            size,
            barrier: Barrier::new(size),
            slot: Mutex::new(Vec::new()),
        }
    }
}

/// Transport endpoint of one worker in a [`WorkerGroup`]
pub struct ThreadTransport {
    hub: Arc<Hub>,
    rank: usize,
    registry: TypeRegistry,
}

impl ThreadTransport {
    fn new(hub: Arc<Hub>, rank: usize) -> Self {
        Self {
            hub,
            rank,
            registry: TypeRegistry::default(),
        }
    }

    fn publish(&self, buffer: &[u8]) -> Result<(), CommError> {
        let mut slot = self.hub.slot.lock().map_err(|_| CommError::Poisoned)?;
        slot.clear();
        slot.extend_from_slice(buffer);
        Ok(())
    }

    fn receive(&self, buffer: &mut [u8], root: usize) -> Result<(), CommError> {
        let slot = self.hub.slot.lock().map_err(|_| CommError::Poisoned)?;
        if slot.len() != buffer.len() {
            return Err(CommError::SizeMismatch {
                root,
                expected: buffer.len(),
                actual: slot.len(),
            });
        }
        buffer.copy_from_slice(&slot);
        Ok(())
    }
}

impl Transport for ThreadTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.hub.size
    }

    fn broadcast(&mut self, buffer: &mut [u8], root: usize) -> Result<(), CommError> {
        if root >= self.hub.size {
            return Err(CommError::InvalidRank {
                rank: root,
                size: self.hub.size,
            });
        }

        // Both barriers are always reached so a local failure never strands
        // the rest of the group.
        let published = if self.rank == root {
            self.publish(buffer)
        } else {
            Ok(())
        };
        self.hub.barrier.wait();

        let received = if self.rank == root {
            Ok(())
        } else {
            self.receive(buffer, root)
        };
        self.hub.barrier.wait();

        published.and(received)
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

/// A fixed group of SPMD workers sharing one process
pub struct WorkerGroup {
    pool: ThreadPool,
    size: usize,
}

impl WorkerGroup {
    /// Start a pool with exactly one thread per worker
    ///
    /// # Errors
    /// Returns [`CommError::WorkerGroup`] for an empty group or if the thread
    /// pool cannot be built
    pub fn new(size: usize) -> Result<Self, CommError> {
        if size == 0 {
            return Err(CommError::WorkerGroup(
                "a worker group needs at least one worker".to_string(),
            ));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|index| format!("worker-{index}"))
            .build()
            .map_err(|e| CommError::WorkerGroup(e.to_string()))?;

        debug!("Started worker group with {} workers", size);
        Ok(Self { pool, size })
    }

    /// Number of workers
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `op` once on every worker and collect the results in rank order
    ///
    /// Each invocation receives its own [`ThreadTransport`]; collective calls
    /// made inside `op` block until every worker reaches them.
    pub fn run<F, R>(&self, op: F) -> Vec<R>
    where
        F: Fn(ThreadTransport) -> R + Sync,
        R: Send,
    {
        let hub = Arc::new(Hub::new(self.size));
        self.pool
            .broadcast(|ctx| op(ThreadTransport::new(Arc::clone(&hub), ctx.index())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_root_reaches_every_worker() {
        let group = WorkerGroup::new(4).unwrap();
        let results = group.run(|mut transport| {
            let mut seen = Vec::new();
            for root in 0..transport.size() {
                let mut bytes = if transport.rank() == root {
                    [root as u8; 8]
                } else {
                    [0xff; 8]
                };
                transport.broadcast(&mut bytes, root).unwrap();
                seen.push(bytes[0]);
            }
            (transport.rank(), seen)
        });

        assert_eq!(results.len(), 4);
        for (index, (rank, seen)) in results.iter().enumerate() {
            assert_eq!(*rank, index);
            assert_eq!(seen, &vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn test_size_mismatch_reported_without_deadlock() {
        let group = WorkerGroup::new(2).unwrap();
        let results = group.run(|mut transport| {
            let mut bytes = vec![7u8; 4 + transport.rank()];
            transport.broadcast(&mut bytes, 0)
        });

        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(CommError::SizeMismatch {
                root: 0,
                expected: 5,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_invalid_root_rejected() {
        let group = WorkerGroup::new(2).unwrap();
        let results = group.run(|mut transport| transport.broadcast(&mut [0u8; 2], 5));
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(CommError::InvalidRank { rank: 5, size: 2 }))));
    }

    #[test]
    fn test_empty_group_rejected() {
        assert!(matches!(
            WorkerGroup::new(0),
            Err(CommError::WorkerGroup(_))
        ));
    }
}
