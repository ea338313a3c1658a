//! Counted semaphore limiting concurrent downstream execution (spec.md §4.3).

use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// A permit pool backed by [`tokio::sync::Semaphore`].
///
/// `acquire` is cancel-safe by construction: dropping the future before it
/// resolves (e.g. because the client disconnected) simply cancels the wait
/// without ever having taken a permit — this is what spec.md §4.3 means by
/// "`acquire` must be cancellable ... so a request being aborted does not
/// hold the dispatcher hostage". Every successful acquire returns an
/// [`OwnedSemaphorePermit`] guard that releases on drop, so "release on
/// every return path including panics" falls out of normal RAII rather
/// than needing a manual `finally`.
pub struct PermitPool {
    semaphore: Arc<Semaphore>,
    max: usize,
}

impl PermitPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max: max_concurrent,
        }
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.semaphore.clone().acquire_owned().await
    }

    /// Number of requests currently executing downstream.
    pub fn in_flight(&self) -> usize {
        self.max.saturating_sub(self.semaphore.available_permits())
    }

    pub fn max_concurrent(&self) -> usize {
        self.max
    }

    /// Unblocks any pending `acquire` calls with `AcquireError` (spec.md §5
    /// shutdown).
    pub fn close(&self) {
        self.semaphore.close();
    }
}
