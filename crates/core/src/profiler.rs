//! Timing helpers for the collective and accumulation phases.
//!
//! Provides an RAII scope that reports its elapsed time through `tracing`.

use std::time::Instant;
use tracing::debug;

/// A profiling scope that measures elapsed time using RAII.
///
/// The elapsed time is emitted as a `debug` event when the scope is dropped.
pub struct ProfilerScope {
    start: Instant,
    name: &'static str,
}

impl ProfilerScope {
    /// Creates a new profiling scope.
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    /// Gets elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Name the scope reports under.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for ProfilerScope {
    fn drop(&mut self) {
        debug!("{} took {:.3} ms", self.name, self.elapsed_ms());
    }
}
