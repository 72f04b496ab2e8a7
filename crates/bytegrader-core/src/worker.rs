//! Fixed-size worker pool consuming the Queue, grounded on
//! `riptide-workers::worker::WorkerPool`'s semaphore-gated task spawning,
//! adapted to drive the Dispatcher instead of a scrape pipeline.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::queue::Queue;

/// Spawns the long-lived task that pops job ids off `queue` and runs one
/// `Dispatcher::dispatch` per id, bounded by a semaphore of size
/// `max_concurrent_jobs`. Must be called exactly once, at boot (it takes
/// ownership of the queue's receiver half).
pub fn spawn_worker_pool(
    queue: Arc<Queue>,
    dispatcher: Arc<Dispatcher>,
    max_concurrent_jobs: usize,
) -> tokio::task::JoinHandle<()> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent_jobs));

    tokio::spawn(async move {
        let mut receiver = match queue.take_receiver().await {
            Some(r) => r,
            None => {
                warn!("worker pool started with no queue receiver available");
                return;
            }
        };

        info!(max_concurrent_jobs, "worker pool started");

        while let Some(job_id) = receiver.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break, // semaphore closed, shutting down
            };
            let queue = queue.clone();
            let dispatcher = dispatcher.clone();

            tokio::spawn(async move {
                queue.inc_active();
                dispatcher.dispatch(&job_id).await;
                queue.dec_active();
                drop(permit);
            });
        }

        info!("worker pool queue closed, draining in-flight jobs");
    })
}
