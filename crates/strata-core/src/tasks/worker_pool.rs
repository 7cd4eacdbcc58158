// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A fixed-size pool of worker threads for decode and staging jobs.

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct JobCounters {
    submitted: AtomicUsize,
    completed: AtomicUsize,
    panicked: AtomicUsize,
    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl JobCounters {
    fn pending(&self) -> usize {
        let completed = self.completed.load(Ordering::Acquire);
        self.submitted.load(Ordering::Acquire).saturating_sub(completed)
    }

    fn complete(&self) {
        // Taking the lock orders the notification after a waiter's check.
        let _guard = self.idle_lock.lock().unwrap();
        self.completed.fetch_add(1, Ordering::AcqRel);
        self.idle.notify_all();
    }
}

/// A bounded set of worker threads executing jobs on a rayon pool.
///
/// Jobs never propagate failures across the thread boundary: a panicking job
/// is logged and counted, and the pool keeps serving.
pub struct WorkerPool {
    pool: ThreadPool,
    counters: Arc<JobCounters>,
}

impl WorkerPool {
    /// Builds a pool of `threads` workers (at least one).
    ///
    /// ## Errors
    /// Fails when the worker threads cannot be spawned.
    pub fn new(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|index| format!("strata-worker-{index}"))
            .build()?;
        log::info!("WorkerPool started with {} threads.", pool.current_num_threads());
        Ok(Self {
            pool,
            counters: Arc::default(),
        })
    }

    /// Number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queues a job for execution on a worker thread.
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.counters.submitted.fetch_add(1, Ordering::AcqRel);
        let counters = Arc::clone(&self.counters);
        self.pool.spawn(move || {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "Worker job panicked on {}.",
                    std::thread::current().name().unwrap_or("a worker")
                );
            }
            counters.complete();
        });
    }

    /// Number of jobs queued or running.
    pub fn pending(&self) -> usize {
        self.counters.pending()
    }

    /// Number of jobs that panicked so far.
    pub fn panicked(&self) -> usize {
        self.counters.panicked.load(Ordering::Relaxed)
    }

    /// Blocks until every queued job has finished or `timeout` elapses.
    ///
    /// Returns `true` if the pool became idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let guard = self.counters.idle_lock.lock().unwrap();
        let (_guard, _) = self
            .counters
            .idle
            .wait_timeout_while(guard, timeout, |_| self.counters.pending() > 0)
            .unwrap();
        self.counters.pending() == 0
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.thread_count())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_every_job() {
        let pool = WorkerPool::new(3).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..64 {
            let counter = Arc::clone(&counter);
            pool.spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 64);
        assert_eq!(pool.pending(), 0);
    }

    #[test]
    fn panicking_job_does_not_kill_the_pool() {
        let pool = WorkerPool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        pool.spawn(|| panic!("decode failure"));
        let c = Arc::clone(&counter);
        pool.spawn(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(pool.panicked(), 1);
    }

    #[test]
    fn wait_idle_times_out_on_blocked_jobs() {
        let pool = WorkerPool::new(1).unwrap();
        let (release, blocked) = flume::bounded::<()>(0);
        pool.spawn(move || {
            let _ = blocked.recv();
        });
        assert!(!pool.wait_idle(Duration::from_millis(20)));
        assert_eq!(pool.pending(), 1);
        release.send(()).unwrap();
        assert!(pool.wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn zero_threads_is_clamped_to_one() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.thread_count(), 1);
    }
}
