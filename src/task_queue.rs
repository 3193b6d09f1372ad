//! Bounded-concurrency task runner for background work.
//!
//! A fixed set of worker threads drains a channel of boxed jobs; at most
//! that many run at once. A job's error or panic is logged by the worker
//! and never reaches the enqueuer. Dropping the queue closes the channel
//! and joins the workers.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use anyhow::Result;
use crossbeam_channel::{Sender, unbounded};
use log::{debug, error, warn};

type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

pub struct TaskQueue {
    sender: Option<Sender<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    pending: Arc<AtomicUsize>,
}

impl TaskQueue {
    /// Default concurrency for background decode work.
    pub const DEFAULT_CONCURRENCY: usize = 2;

    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let (tx, rx) = unbounded::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(max_concurrent);

        for worker_id in 0..max_concurrent {
            let rx = rx.clone();
            let pending = Arc::clone(&pending);

            let handle = thread::Builder::new()
                .name(format!("wavecache-worker-{worker_id}"))
                .spawn(move || {
                    debug!("worker {worker_id} started");
                    while let Ok(job) = rx.recv() {
                        match catch_unwind(AssertUnwindSafe(job)) {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => warn!("worker {worker_id}: task failed: {e:#}"),
                            Err(_) => error!("worker {worker_id}: task panicked"),
                        }
                        pending.fetch_sub(1, Ordering::Release);
                    }
                    debug!("worker {worker_id} stopped");
                })
                .expect("failed to spawn task queue worker");

            handles.push(handle);
        }

        Self {
            sender: Some(tx),
            handles,
            pending,
        }
    }

    /// Enqueue a deferred unit of work. Fire-and-forget: a failing task is
    /// logged by its worker, nothing comes back here.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return;
        };
        self.pending.fetch_add(1, Ordering::Acquire);
        if sender.send(Box::new(f)).is_err() {
            self.pending.fetch_sub(1, Ordering::Release);
            error!("task queue closed, job dropped");
        }
    }

    /// Jobs enqueued or currently running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        // Closing the channel lets workers drain remaining jobs and exit
        self.sender.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::Mutex;
    use std::time::Duration;

    fn wait_idle(queue: &TaskQueue) {
        for _ in 0..500 {
            if queue.pending() == 0 {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("queue did not drain");
    }

    #[test]
    fn test_single_worker_runs_in_order() {
        let queue = TaskQueue::new(1);
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let log = Arc::clone(&log);
            queue.execute(move || {
                log.lock().unwrap().push(i);
                Ok(())
            });
        }
        wait_idle(&queue);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_two_workers_run_concurrently() {
        let queue = TaskQueue::new(2);
        // Both tasks must be in flight at once for the barrier to open
        let barrier = Arc::new(Barrier::new(2));
        for _ in 0..2 {
            let barrier = Arc::clone(&barrier);
            queue.execute(move || {
                barrier.wait();
                Ok(())
            });
        }
        wait_idle(&queue);
    }

    #[test]
    fn test_failure_and_panic_do_not_kill_workers() {
        let queue = TaskQueue::new(1);
        let ran = Arc::new(AtomicUsize::new(0));

        queue.execute(|| Err(anyhow::anyhow!("expected failure")));
        queue.execute(|| panic!("expected panic"));
        let ran2 = Arc::clone(&ran);
        queue.execute(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        wait_idle(&queue);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_joins_after_drain() {
        let queue = TaskQueue::new(2);
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let ran = Arc::clone(&ran);
            queue.execute(move || {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        drop(queue);
        assert_eq!(ran.load(Ordering::SeqCst), 8);
    }
}
