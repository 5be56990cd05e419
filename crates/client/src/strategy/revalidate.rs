//! Background revalidation tasks.
//!
//! Each revalidation is its own tokio task, detached from the request that
//! triggered it: the requester never awaits it, and cancelling the request
//! leaves it running. Tasks stay abortable through the owning worker.

use std::future::{Future, poll_fn};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::task::{AbortHandle, JoinSet};

/// Tracks the revalidations spawned by one worker.
#[derive(Default)]
pub struct Revalidator {
    tasks: Mutex<JoinSet<()>>,
}

impl Revalidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn a revalidation on the current runtime.
    pub fn spawn<F>(&self, task: F) -> AbortHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task)
    }

    /// Number of revalidations not yet reaped.
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Wait until no revalidation is left.
    ///
    /// Tasks stay in the set while waiting, so `abort_all` still reaches them.
    pub async fn settle(&self) {
        while let Some(result) = poll_fn(|cx| self.tasks().poll_join_next(cx)).await {
            if let Err(e) = result
                && e.is_panic()
            {
                tracing::warn!(error = %e, "revalidation task panicked");
            }
        }
    }

    /// Cancel every outstanding revalidation.
    pub fn abort_all(&self) {
        self.tasks().abort_all();
    }
}
