//! Marshaling of work onto native context threads
//!
//! GPU resource calls must run on the thread where the owning native context
//! is current. `ContextExecutor` is the seam the swapchain halves use to get
//! there: the consumer host typically drives a `QueueExecutor` from its frame
//! callback, while producer-side work runs inline on the render thread.
//! `Completion` carries the "done" signal back to the submitting side.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Job submitted to a context thread
pub type ContextJob = Box<dyn FnOnce() + Send>;

/// Executes jobs on the thread owning a native context
pub trait ContextExecutor: Send + Sync {
    /// Queue `job` for execution on the context thread
    ///
    /// Never blocks on the job itself; ordering between submitted jobs is
    /// preserved.
    fn submit(&self, job: ContextJob);
}

/// Executor that runs jobs immediately on the calling thread
///
/// Used when the calling thread already has the context current (the
/// producer's render loop) and in unit tests.
pub struct InlineExecutor;

impl ContextExecutor for InlineExecutor {
    fn submit(&self, job: ContextJob) {
        job();
    }
}

/// Executor that queues jobs until the context thread drains them
///
/// The host's per-frame callback calls `run_pending` before touching the
/// swapchain, so consumer-side resource work happens with the right context
/// bound.
pub struct QueueExecutor {
    jobs: Mutex<VecDeque<ContextJob>>,
}

impl QueueExecutor {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
        }
    }

    /// Run all queued jobs on the calling thread
    ///
    /// Jobs submitted while draining are run in the same call. Returns the
    /// number of jobs executed.
    pub fn run_pending(&self) -> usize {
        let mut executed = 0;
        loop {
            // Pop one job at a time so a running job can submit without
            // deadlocking on the queue lock.
            let job = self.jobs.lock().unwrap().pop_front();
            match job {
                Some(job) => {
                    job();
                    executed += 1;
                }
                None => break,
            }
        }
        executed
    }

    /// Number of jobs waiting to run
    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

impl Default for QueueExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextExecutor for QueueExecutor {
    fn submit(&self, job: ContextJob) {
        self.jobs.lock().unwrap().push_back(job);
    }
}

/// One-shot completion signal carrying a value across threads
///
/// Cloned handles share the same slot. `complete` stores the value and
/// wakes waiters; `wait` consumes it, so exactly one waiter observes the
/// result.
pub struct Completion<T> {
    inner: Arc<(Mutex<Option<T>>, Condvar)>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Completion<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(None), Condvar::new())),
        }
    }

    /// Store the result and wake all waiters
    ///
    /// A second call is ignored; the first value wins.
    pub fn complete(&self, value: T) {
        let (slot, condvar) = &*self.inner;
        let mut guard = slot.lock().unwrap();
        if guard.is_none() {
            *guard = Some(value);
            condvar.notify_all();
        }
    }

    /// Block until the value arrives, then take it
    pub fn wait(&self) -> T {
        let (slot, condvar) = &*self.inner;
        let mut guard = slot.lock().unwrap();
        loop {
            match guard.take() {
                Some(value) => return value,
                None => guard = condvar.wait(guard).unwrap(),
            }
        }
    }

    /// Block up to `timeout` for the value
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let (slot, condvar) = &*self.inner;
        let deadline = std::time::Instant::now() + timeout;
        let mut guard = slot.lock().unwrap();
        loop {
            if let Some(value) = guard.take() {
                return Some(value);
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return None;
            }
            let (next, result) = condvar.wait_timeout(guard, deadline - now).unwrap();
            guard = next;
            if result.timed_out() && guard.is_none() {
                return None;
            }
        }
    }

    /// Whether a value is waiting to be taken
    pub fn is_complete(&self) -> bool {
        self.inner.0.lock().unwrap().is_some()
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
