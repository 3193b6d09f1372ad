//! Scoped-acquisition ledger for timers, temp files, and teardown callbacks.
//!
//! A UI surface (or any owner with a lifecycle) registers resources as it
//! creates them and releases everything with one `cleanup()` call when it
//! goes away, including mid-operation. Each release is independently
//! guarded, so one failing callback cannot leak the rest.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

type Teardown = Box<dyn FnOnce() + Send + 'static>;

struct TimerHandle {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

#[derive(Default)]
pub struct CleanupRegistry {
    callbacks: Vec<Teardown>,
    timers: Vec<TimerHandle>,
    temp_paths: Vec<PathBuf>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an arbitrary teardown callback, run once on cleanup.
    pub fn add_cleanup<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.callbacks.push(Box::new(f));
    }

    /// Register a file to remove on cleanup.
    pub fn add_temp_path(&mut self, path: impl Into<PathBuf>) {
        self.temp_paths.push(path.into());
    }

    /// Spawn a repeating timer owned by the registry; it stops and is
    /// joined on cleanup.
    pub fn spawn_interval<F>(&mut self, period: Duration, mut f: F)
    where
        F: FnMut() + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            loop {
                if sleep_until(Instant::now() + period, &flag) {
                    return;
                }
                f();
            }
        });
        self.timers.push(TimerHandle { stop, handle });
    }

    /// Spawn a one-shot timer. The callback never fires if cleanup happens
    /// before the delay elapses.
    pub fn spawn_timeout<F>(&mut self, delay: Duration, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            if !sleep_until(Instant::now() + delay, &flag) {
                f();
            }
        });
        self.timers.push(TimerHandle { stop, handle });
    }

    /// Release everything registered so far: stop and join timers, remove
    /// temp files, run teardown callbacks. Safe to call repeatedly; a
    /// second call with nothing registered is a no-op.
    pub fn cleanup(&mut self) {
        if self.timers.is_empty() && self.temp_paths.is_empty() && self.callbacks.is_empty() {
            return;
        }

        for timer in self.timers.drain(..) {
            timer.stop.store(true, Ordering::Relaxed);
            timer.handle.thread().unpark();
            if timer.handle.join().is_err() {
                warn!("timer thread panicked during cleanup");
            }
        }

        for path in self.temp_paths.drain(..) {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to remove {}: {e}", path.display());
                }
            }
        }

        for callback in self.callbacks.drain(..) {
            if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                warn!("cleanup callback panicked");
            }
        }

        debug!("cleanup registry released");
    }
}

impl Drop for CleanupRegistry {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Park until `deadline` or until `stop` is raised. Returns true if stopped.
fn sleep_until(deadline: Instant, stop: &AtomicBool) -> bool {
    loop {
        if stop.load(Ordering::Relaxed) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        // Spurious wakeups loop back around
        thread::park_timeout(deadline - now);
    }
}
