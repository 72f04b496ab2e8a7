//! Bounded FIFO queue of job ids feeding a fixed-size worker pool, plus the
//! active-job counter the `/queue` endpoint reports. Grounded on
//! `riptide-workers::worker::Worker`'s semaphore-gated concurrency, adapted
//! from a polling Redis consumer to a bounded `tokio::mpsc` channel per
//! spec §4.5/§9 ("prefer a non-blocking send with explicit 503").

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Error returned when the queue cannot accept a new job immediately.
#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("queue is full")]
    QueueFull,
}

/// Bounded producer side of the queue, plus the live counter of jobs
/// currently being processed by the worker pool.
pub struct Queue {
    sender: mpsc::Sender<String>,
    receiver: tokio::sync::Mutex<Option<mpsc::Receiver<String>>>,
    capacity: usize,
    active_jobs: AtomicUsize,
}

impl Queue {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(capacity);
        Arc::new(Self {
            sender,
            receiver: tokio::sync::Mutex::new(Some(receiver)),
            capacity,
            active_jobs: AtomicUsize::new(0),
        })
    }

    /// Non-blocking enqueue. Returns `QueueFull` immediately if the bounded
    /// channel has no free slot, rather than stalling the HTTP handler
    /// (the policy this spec resolves §9's "submission under back-pressure"
    /// open question toward).
    pub fn enqueue(&self, job_id: String) -> Result<(), EnqueueError> {
        self.sender
            .try_send(job_id)
            .map_err(|_| EnqueueError::QueueFull)
    }

    /// Number of ids currently buffered in the channel (not yet picked up
    /// by a worker).
    pub fn queue_length(&self) -> usize {
        self.capacity.saturating_sub(self.sender.capacity())
    }

    pub fn max_queue_size(&self) -> usize {
        self.capacity
    }

    pub fn active_jobs(&self) -> usize {
        self.active_jobs.load(Ordering::SeqCst)
    }

    /// Take ownership of the receiving half. Must be called exactly once,
    /// by the worker pool at boot.
    pub async fn take_receiver(&self) -> Option<mpsc::Receiver<String>> {
        self.receiver.lock().await.take()
    }

    pub(crate) fn inc_active(&self) {
        self.active_jobs.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn dec_active(&self) {
        self.active_jobs.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_respects_capacity() {
        let queue = Queue::new(2);
        assert!(queue.enqueue("a".into()).is_ok());
        assert!(queue.enqueue("b".into()).is_ok());
        assert!(matches!(
            queue.enqueue("c".into()),
            Err(EnqueueError::QueueFull)
        ));
    }

    #[test]
    fn queue_length_tracks_buffered_ids() {
        let queue = Queue::new(5);
        assert_eq!(queue.queue_length(), 0);
        queue.enqueue("a".into()).unwrap();
        queue.enqueue("b".into()).unwrap();
        assert_eq!(queue.queue_length(), 2);
    }

    #[tokio::test]
    async fn take_receiver_is_one_shot() {
        let queue = Queue::new(1);
        assert!(queue.take_receiver().await.is_some());
        assert!(queue.take_receiver().await.is_none());
    }

    #[test]
    fn active_jobs_counter_tracks_inc_dec() {
        let queue = Queue::new(1);
        assert_eq!(queue.active_jobs(), 0);
        queue.inc_active();
        assert_eq!(queue.active_jobs(), 1);
        queue.dec_active();
        assert_eq!(queue.active_jobs(), 0);
    }
}
