//! Executors and the dispatch policy of a stage.
//!
//! The crate never schedules work itself. Asynchronous stages hand a [`Job`] to an
//! [`Executor`], which may run it on another thread, run it inline, or reject it. Any
//! `Fn(Job) -> Result<(), RejectedExecution>` closure is an executor, so adapting a runtime
//! takes one line:
//!
//! ```
//! use std::sync::Arc;
//! use stagex::{Executor, Job, Node, RejectedExecution};
//!
//! let spawn = |job: Job| -> Result<(), RejectedExecution> {
//!     std::thread::spawn(job);
//!     Ok(())
//! };
//! let executor: Arc<dyn Executor> = Arc::new(spawn);
//!
//! let doubled = Node::completed(21).then_apply_async_on(executor, |x| x * 2);
//! assert_eq!(doubled.join().unwrap(), 42);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use parking_lot::Mutex;

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::error::RejectedExecution;
use crate::node::Node;
use crate::outcome::Failure;

/// A unit of work submitted to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Capability to run jobs.
///
/// Implementations must either run the job (now or later, on any thread) and return `Ok`, or
/// drop it unrun and return `Err`. A rejected job must never also run. An accepted job that is
/// later dropped unrun, say by a runtime shutting down, fails its stage with a
/// [`RejectedExecution`].
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job) -> Result<(), RejectedExecution>;
}

impl<F> Executor for F
where
    F: Fn(Job) -> Result<(), RejectedExecution> + Send + Sync,
{
    fn execute(&self, job: Job) -> Result<(), RejectedExecution> {
        self(job)
    }
}

/// Runs every job immediately on the submitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Executor for Inline {
    fn execute(&self, job: Job) -> Result<(), RejectedExecution> {
        job();
        Ok(())
    }
}

/// Runs every job on a freshly spawned, named thread.
///
/// This is the process-wide default executor. A failure to spawn a thread is reported as a
/// rejection.
#[derive(Debug)]
pub struct ThreadPerTask {
    name_prefix: String,
    stack_size: Option<usize>,
    spawned: AtomicUsize,
}

impl Default for ThreadPerTask {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadPerTask {
    /// Threads are named `stagex-async-<n>`.
    pub fn new() -> Self {
        Self {
            name_prefix: "stagex-async".to_string(),
            stack_size: None,
            spawned: AtomicUsize::new(0),
        }
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Number of threads spawned so far.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl Executor for ThreadPerTask {
    fn execute(&self, job: Job) -> Result<(), RejectedExecution> {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        let mut builder = thread::Builder::new().name(format!("{}-{}", self.name_prefix, n));
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        builder
            .spawn(job)
            .map(drop)
            .map_err(|e| RejectedExecution::new(e.to_string()))
    }
}

#[cfg(feature = "tokio")]
impl Executor for tokio::runtime::Handle {
    fn execute(&self, job: Job) -> Result<(), RejectedExecution> {
        // Jobs are synchronous and may block, so keep them off the async workers. After
        // shutdown the runtime drops the job, which fails the stage.
        drop(self.spawn_blocking(job));
        Ok(())
    }
}

/// The shared executor used by `*_async` operations on nodes that were not given one.
pub fn default_executor() -> Arc<dyn Executor> {
    static DEFAULT: OnceLock<Arc<dyn Executor>> = OnceLock::new();
    Arc::clone(DEFAULT.get_or_init(|| Arc::new(ThreadPerTask::new())))
}

/// Where a stage's action runs.
#[derive(Clone)]
pub(crate) enum Dispatch {
    /// On whichever thread discovers that the stage can fire.
    Inline,
    /// Submitted to an executor.
    Async(Arc<dyn Executor>),
}

/// Reason recorded when an executor accepts a job and then drops it unrun.
const DROPPED_UNRUN: &str = "executor dropped the job without running it";

/// Target slot shared between a submitted job and the submitting thread.
struct Handoff<U> {
    target: Option<Node<U>>,
    /// Set while `execute` has not returned yet.
    submitting: bool,
    /// The job was dropped unrun while `submitting` was set.
    dropped: bool,
}

/// A stage job in the hands of an executor.
///
/// Whoever ends up owning the target settles it: the job when it runs, the drop glue when the
/// executor discards the job, or the submitting thread when `execute` reports a rejection.
struct Submitted<U: Send + Sync + 'static, J> {
    handoff: Arc<Mutex<Handoff<U>>>,
    job: Option<J>,
}

impl<U, J> Submitted<U, J>
where
    U: Send + Sync + 'static,
    J: FnOnce(Node<U>),
{
    fn run(mut self) {
        let job = self.job.take();
        let target = self.handoff.lock().target.take();
        if let (Some(job), Some(target)) = (job, target) {
            job(target);
        }
    }
}

impl<U: Send + Sync + 'static, J> Drop for Submitted<U, J> {
    fn drop(&mut self) {
        if self.job.is_none() {
            return;
        }
        let mut handoff = self.handoff.lock();
        if handoff.submitting {
            // The submitting thread decides once `execute` returns
            handoff.dropped = true;
            return;
        }
        let target = handoff.target.take();
        drop(handoff);
        if let Some(target) = target {
            reject(target, RejectedExecution::new(DROPPED_UNRUN));
        }
    }
}

fn reject<U: Send + Sync + 'static>(target: Node<U>, rejected: RejectedExecution) {
    #[cfg(feature = "tracing")]
    debug!(
        node = target.id().0,
        reason = %rejected.reason,
        "executor rejected stage"
    );

    target.settle(Err(Failure::wrapped(rejected.into())));
}

impl Dispatch {
    /// Run `job` under this policy.
    ///
    /// If the executor rejects the job, or accepts it and drops it unrun, `target` completes
    /// exceptionally with a [`RejectedExecution`] instead.
    pub(crate) fn run<U, J>(self, target: Node<U>, job: J)
    where
        U: Send + Sync + 'static,
        J: FnOnce(Node<U>) + Send + 'static,
    {
        match self {
            Dispatch::Inline => job(target),
            Dispatch::Async(executor) => {
                let handoff = Arc::new(Mutex::new(Handoff {
                    target: Some(target),
                    submitting: true,
                    dropped: false,
                }));
                let submitted = Submitted {
                    handoff: Arc::clone(&handoff),
                    job: Some(job),
                };
                let result = executor.execute(Box::new(move || submitted.run()));

                let mut state = handoff.lock();
                state.submitting = false;
                let rejected = match result {
                    Err(rejected) => rejected,
                    Ok(()) if state.dropped => RejectedExecution::new(DROPPED_UNRUN),
                    Ok(()) => return,
                };
                let target = state.target.take();
                drop(state);
                if let Some(target) = target {
                    reject(target, rejected);
                }
            }
        }
    }
}
