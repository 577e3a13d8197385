//! Bounded worker pool for fire-and-forget side effects.
//!
//! Submissions never block and never grow without bound: when the queue
//! is full the oldest pending job is dropped and counted. Job errors
//! are the job's own problem — they log, they never surface.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// WorkerPool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct WorkerPool {
    queue: Arc<Mutex<VecDeque<Job>>>,
    notify: Arc<Notify>,
    capacity: usize,
    dropped: AtomicU64,
}

impl WorkerPool {
    /// Start `workers` consumer tasks over a queue of `capacity` jobs.
    pub fn start(capacity: usize, workers: usize) -> Arc<Self> {
        let pool = Arc::new(Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        });

        for _ in 0..workers.max(1) {
            let queue = pool.queue.clone();
            let notify = pool.notify.clone();
            tokio::spawn(async move {
                loop {
                    let job = queue.lock().pop_front();
                    match job {
                        Some(job) => job.await,
                        None => notify.notified().await,
                    }
                }
            });
        }

        pool
    }

    /// Enqueue a job; drops the oldest pending job when full.
    pub fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                queue.pop_front();
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(dropped_total = dropped, "worker pool full, dropped oldest job");
            }
            queue.push_back(Box::pin(job));
        }
        self.notify.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn jobs_run() {
        let pool = WorkerPool::start(16, 2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let counter = counter.clone();
            pool.submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn overflow_drops_oldest() {
        // No workers draining: pause them by using a tiny capacity and
        // submitting before yielding.
        let pool = WorkerPool::start(2, 1);
        let ran = Arc::new(Mutex::new(Vec::new()));
        for i in 0..4 {
            let ran = ran.clone();
            pool.submit(async move {
                ran.lock().push(i);
            });
        }
        assert!(pool.dropped_total() >= 1);
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let ran = ran.lock();
        // The newest submissions survive.
        assert!(ran.contains(&3));
    }
}
