//! Bounded-concurrency FIFO queue for fetch jobs.
//!
//! Jobs start in submission order and each running job holds one semaphore permit. When a
//! job finishes, its permit goes to the next job in the backlog. Queued work only starts
//! when a job finishes, so every job has to finish on its own (the controller wraps each
//! fetch in a timeout).

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error};

type Job = BoxFuture<'static, ()>;

struct Inner {
    cap: u32,
    permits: Arc<Semaphore>,
    backlog: Mutex<VecDeque<Job>>,
}

#[derive(Clone)]
pub struct FetchQueue {
    inner: Arc<Inner>,
}

impl FetchQueue {
    pub fn new(cap: usize) -> Self {
        let cap = cap.clamp(1, Semaphore::MAX_PERMITS.min(u32::MAX as usize));
        Self {
            inner: Arc::new(Inner {
                cap: cap as u32,
                permits: Arc::new(Semaphore::new(cap)),
                backlog: Mutex::new(VecDeque::new()),
            }),
        }
    }

    pub fn cap(&self) -> usize {
        self.inner.cap as usize
    }

    /// Must be called from within a tokio runtime.
    pub fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.lock().push_back(job.boxed());
        self.inner.dispatch();
    }

    pub fn running(&self) -> usize {
        self.cap() - self.inner.permits.available_permits()
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_idle(&self) -> bool {
        let backlog = self.inner.lock();
        backlog.is_empty() && self.inner.permits.available_permits() == self.cap()
    }

    /// Resolves once nothing is queued or running.
    pub async fn wait_idle(&self) {
        loop {
            match self.inner.permits.acquire_many(self.inner.cap).await {
                Ok(all) => drop(all),
                Err(_) => return,
            }
            // Anything submitted while we held every permit is still waiting.
            self.inner.dispatch();
            if self.is_idle() {
                return;
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.backlog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(self: &Arc<Self>) {
        let mut backlog = self.lock();

        while !backlog.is_empty() {
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                break;
            };
            let Some(job) = backlog.pop_front() else {
                break;
            };
            debug!(
                "Dispatching job ({} free slots, {} queued)",
                self.permits.available_permits(),
                backlog.len()
            );

            tokio::spawn(Arc::clone(self).drive(job, permit));
        }
    }

    async fn drive(self: Arc<Self>, job: Job, permit: OwnedSemaphorePermit) {
        let mut current = Some((job, permit));
        while let Some((job, permit)) = current {
            if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                error!("Queued job panicked");
            }
            current = self.next_job(permit);
        }
    }

    /// Hands the permit to the next queued job, or releases it if the backlog is empty.
    fn next_job(&self, permit: OwnedSemaphorePermit) -> Option<(Job, OwnedSemaphorePermit)> {
        let mut backlog = self.lock();
        match backlog.pop_front() {
            Some(job) => Some((job, permit)),
            None => {
                // Released under the backlog lock so a concurrent submit sees the free slot.
                drop(permit);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_cap_and_runs_everything_once() {
        let queue = FetchQueue::new(3);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let current = current.clone();
            let peak = peak.clone();
            let done = done.clone();
            queue.submit(async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
            });
            assert!(queue.running() <= 3);
        }

        queue.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(queue.running(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn starts_jobs_in_submission_order() {
        let queue = FetchQueue::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = order.clone();
            queue.submit(async move {
                order.lock().unwrap().push(i);
                tokio::task::yield_now().await;
            });
        }

        queue.wait_idle().await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn backlog_waits_for_a_free_slot() {
        let queue = FetchQueue::new(2);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = Arc::new(tokio::sync::Mutex::new(Some(rx)));

        for _ in 0..2 {
            let rx = rx.clone();
            queue.submit(async move {
                let taken = rx.lock().await.take();
                if let Some(rx) = taken {
                    let _ = rx.await;
                } else {
                    futures::future::pending::<()>().await;
                }
            });
        }
        queue.submit(async {});

        assert_eq!(queue.running(), 2);
        assert_eq!(queue.pending(), 1);
        drop(tx);

        // One blocker finishes, freeing a slot for the queued job; the other never does.
        tokio::time::timeout(Duration::from_secs(2), async {
            while queue.pending() > 0 || queue.running() > 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(queue.running(), 1);
    }

    #[tokio::test]
    async fn panicking_job_releases_its_slot() {
        let queue = FetchQueue::new(1);
        let ran = Arc::new(AtomicUsize::new(0));

        queue.submit(async {
            panic!("boom");
        });
        let counter = ran.clone();
        queue.submit(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        queue.wait_idle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wait_idle_covers_jobs_submitted_while_waiting() {
        let queue = FetchQueue::new(1);
        let done = Arc::new(AtomicUsize::new(0));

        let counter = done.clone();
        queue.submit(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.wait_idle().await })
        };
        tokio::task::yield_now().await;

        let counter = done.clone();
        queue.submit(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(queue.pending(), 1);

        waiter.await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 2);
        assert!(queue.is_idle());
    }

    #[test]
    fn idle_queue_resolves_immediately() {
        let queue = FetchQueue::new(3);
        tokio_test::block_on(queue.wait_idle());
        assert!(queue.is_idle());
    }

    #[test]
    fn zero_cap_is_clamped() {
        assert_eq!(FetchQueue::new(0).cap(), 1);
    }
}
