//! Semaphore-based branch pool for sub-agent concurrency control.
//!
//! The [`BranchPool`] limits how many sub-agent runs are in flight at once
//! across every dispatch of one manager. Each run holds a [`BranchPermit`]
//! for its whole duration.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::info;

use screenpilot_core::MAX_PARALLEL_SLOTS;

/// Default maximum number of concurrent sub-agent runs.
const DEFAULT_MAX_CONCURRENCY: usize = MAX_PARALLEL_SLOTS;

/// A permit granting the right to run one sub-agent.
///
/// When dropped, the permit is automatically returned to the pool.
pub struct BranchPermit {
    _permit: OwnedSemaphorePermit,
}

/// Semaphore-based concurrency pool shared by all branches.
///
/// Clones share the same permits.
#[derive(Debug, Clone)]
pub struct BranchPool {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
}

impl BranchPool {
    /// Create a new pool with the given concurrency limit (0 = default).
    pub fn new(max_concurrency: usize) -> Self {
        let limit = if max_concurrency == 0 {
            DEFAULT_MAX_CONCURRENCY
        } else {
            max_concurrency
        };

        info!(max_concurrency = limit, "BranchPool created");

        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            max_concurrency: limit,
        }
    }

    /// Acquire a permit, waiting until one becomes available.
    pub async fn acquire(&self) -> Result<BranchPermit, PoolError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        Ok(BranchPermit { _permit: permit })
    }

    /// Stop handing out permits. Waiters and later acquires fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

impl Default for BranchPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

/// Errors from the branch pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The semaphore was closed (pool shut down).
    #[error("Branch pool has been closed")]
    Closed,
}
