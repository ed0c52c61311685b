//! Bounded pool for part upload tasks

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::error::{FdsError, FdsResult};

/// `max_concurrent` tasks run at once and up to `queue_capacity` more wait.
///
/// A part takes a [`PartSlot`] before its payload is read, so at most
/// `max_concurrent + queue_capacity` part buffers are alive at any time.
/// [`PartPool::reserve`] waits while every slot is taken.
pub(crate) struct PartPool {
    workers: Arc<Semaphore>,
    slots: Arc<Semaphore>,
}

/// Reserved room for one part, released when its task finishes
pub(crate) struct PartSlot {
    slot: OwnedSemaphorePermit,
    workers: Arc<Semaphore>,
}

impl PartPool {
    pub fn new(max_concurrent: usize, queue_capacity: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            workers: Arc::new(Semaphore::new(max_concurrent)),
            slots: Arc::new(Semaphore::new(max_concurrent + queue_capacity)),
        }
    }

    pub async fn reserve(&self, part_number: u32) -> FdsResult<PartSlot> {
        let slot = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| FdsError::TaskFailed {
                part_number,
                reason: e.to_string(),
            })?;
        Ok(PartSlot {
            slot,
            workers: self.workers.clone(),
        })
    }
}

impl PartSlot {
    /// Run `task` once a worker is free. The slot is held until it ends.
    pub fn spawn<F, T>(self, task: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let PartSlot { slot, workers } = self;
        tokio::spawn(async move {
            let _slot = slot;
            // The pool never closes its semaphores
            let _permit = workers.acquire_owned().await.ok();
            task.await
        })
    }
}
