use crate::error::ServerError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 1;

/// Bounds the number of analyses running at once.
///
/// Admission never waits: when every permit is taken the caller is turned away
/// with [`ServerError::Busy`].
#[derive(Clone, Debug)]
pub struct AnalysisGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// Admission token of one running analysis, released on drop.
#[derive(Debug)]
pub struct AnalysisPermit {
    _permit: OwnedSemaphorePermit,
}

impl Default for AnalysisGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_JOBS)
    }
}

impl AnalysisGate {
    /// Construct a gate admitting `max_concurrent_jobs` analyses (at least one).
    pub fn new(max_concurrent_jobs: usize) -> Self {
        let capacity = max_concurrent_jobs.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn try_enter(&self) -> Result<AnalysisPermit, ServerError> {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| ServerError::Busy)?;

        debug!(in_flight = self.in_flight(), capacity = self.capacity, "analysis admitted");
        Ok(AnalysisPermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }
}
