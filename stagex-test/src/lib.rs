//! Executors and helpers for internal use in stagex tests and benchmarks.
//!
//! This crate is not meant for public use and offers no stability guarantees.

#![cfg(not(tarpaulin_include))]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use stagex::{Executor, Inline, Job, RejectedExecution};

/// Forwards jobs to an inner executor and counts submissions.
pub struct CountingExecutor {
    inner: Arc<dyn Executor>,
    submitted: AtomicUsize,
}

impl CountingExecutor {
    /// Counts, then runs every job inline.
    pub fn inline() -> Arc<Self> {
        Self::wrapping(Arc::new(Inline))
    }

    pub fn wrapping(inner: Arc<dyn Executor>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            submitted: AtomicUsize::new(0),
        })
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

impl Executor for CountingExecutor {
    fn execute(&self, job: Job) -> Result<(), RejectedExecution> {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(job)
    }
}

/// Rejects every job.
pub struct RejectingExecutor {
    rejected: AtomicUsize,
}

impl RejectingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rejected: AtomicUsize::new(0),
        })
    }

    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

impl Executor for RejectingExecutor {
    fn execute(&self, _job: Job) -> Result<(), RejectedExecution> {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        Err(RejectedExecution::new("test executor rejects everything"))
    }
}

/// Queues jobs until the test runs them.
#[derive(Default)]
pub struct ManualExecutor {
    queue: Mutex<VecDeque<Job>>,
}

impl ManualExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run the oldest queued job. Returns `false` if there was none.
    pub fn run_next(&self) -> bool {
        // Release the lock first; the job may submit more jobs
        let job = self.queue.lock().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run queued jobs, including those they submit, until the queue is empty.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl Executor for ManualExecutor {
    fn execute(&self, job: Job) -> Result<(), RejectedExecution> {
        self.queue.lock().push_back(job);
        Ok(())
    }
}

/// A labelled error for failing nodes in tests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("test error: {0}")]
pub struct TestError(pub &'static str);

/// Shared invocation counter for stage actions.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
