//! Delays and timeouts.
//!
//! All delayed work runs on a single scheduler thread, started on first use. The thread
//! sleeps on a condition variable until the earliest deadline in its heap, then runs the
//! due jobs in deadline order. Jobs run there must be short: a timeout only completes a
//! node, and a [`DelayedExecutor`] only hands its job on to the real executor.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::error::{RejectedExecution, TimeoutError};
use crate::executor::{Executor, Job};
use crate::node::Node;

/// A job waiting for its deadline; cancelling drops the job without running it.
struct DelayedTask {
    job: Mutex<Option<Job>>,
    /// The scheduler whose heap holds this task, if it was queued at all.
    delayer: Option<Arc<Delayer>>,
}

impl DelayedTask {
    fn cancel(&self) {
        let job = self.job.lock().take();
        if let (Some(_), Some(delayer)) = (&job, &self.delayer) {
            delayer.forget_one();
        }
    }

    fn is_pending(&self) -> bool {
        self.job.lock().is_some()
    }
}

struct Entry {
    deadline: Instant,
    seq: u64,
    task: Arc<DelayedTask>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

#[derive(Default)]
struct Schedule {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
    /// Entries still in the heap whose task was cancelled.
    cancelled: usize,
}

#[derive(Default)]
struct Delayer {
    schedule: Mutex<Schedule>,
    wake: Condvar,
}

impl Delayer {
    fn shared() -> Result<Arc<Delayer>, RejectedExecution> {
        static DELAYER: OnceLock<Result<Arc<Delayer>, RejectedExecution>> = OnceLock::new();
        DELAYER
            .get_or_init(|| {
                let delayer = Arc::new(Delayer::default());
                let worker = Arc::clone(&delayer);
                thread::Builder::new()
                    .name("stagex-delay".to_string())
                    .spawn(move || worker.run())
                    .map(|_| delayer)
                    .map_err(|e| RejectedExecution::new(e.to_string()))
            })
            .clone()
    }

    fn push(&self, deadline: Instant, task: Arc<DelayedTask>) {
        let mut schedule = self.schedule.lock();
        let seq = schedule.next_seq;
        schedule.next_seq += 1;
        let earliest = schedule
            .heap
            .peek()
            .map_or(true, |Reverse(first)| deadline < first.deadline);
        schedule.heap.push(Reverse(Entry {
            deadline,
            seq,
            task,
        }));
        if earliest {
            self.wake.notify_one();
        }
    }

    /// Account for one cancelled entry. Once cancelled entries make up half the heap they
    /// are all removed, so timeouts discarded early do not pile up until their deadline.
    fn forget_one(&self) {
        let mut schedule = self.schedule.lock();
        schedule.cancelled += 1;
        if schedule.cancelled * 2 >= schedule.heap.len() {
            schedule.heap.retain(|Reverse(entry)| entry.task.is_pending());
            schedule.cancelled = 0;
        }
    }

    fn run(&self) {
        let mut schedule = self.schedule.lock();
        loop {
            let next = schedule.heap.peek().map(|Reverse(entry)| entry.deadline);
            match next {
                None => self.wake.wait(&mut schedule),
                Some(deadline) if deadline > Instant::now() => {
                    self.wake.wait_until(&mut schedule, deadline);
                }
                Some(_) => {
                    let Some(Reverse(entry)) = schedule.heap.pop() else {
                        continue;
                    };
                    let job = entry.task.job.lock().take();
                    match job {
                        Some(job) => MutexGuard::unlocked(&mut schedule, || run_job(job)),
                        None => schedule.cancelled = schedule.cancelled.saturating_sub(1),
                    }
                }
            }
        }
    }
}

// Keeps the scheduler thread alive whatever a job does
fn run_job(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        #[cfg(feature = "tracing")]
        debug!("delayed job panicked");
    }
}

/// Run `job` on the scheduler thread after `delay`.
///
/// A delay too large to represent never elapses.
fn schedule(delay: Duration, job: Job) -> Result<Arc<DelayedTask>, RejectedExecution> {
    let Some(deadline) = Instant::now().checked_add(delay) else {
        return Ok(Arc::new(DelayedTask {
            job: Mutex::new(None),
            delayer: None,
        }));
    };
    let delayer = Delayer::shared()?;
    let task = Arc::new(DelayedTask {
        job: Mutex::new(Some(job)),
        delayer: Some(Arc::clone(&delayer)),
    });
    delayer.push(deadline, Arc::clone(&task));
    Ok(task)
}

/// An [`Executor`] that submits each job to another executor after a fixed delay.
///
/// Created by [`delayed_executor`].
#[derive(Clone)]
pub struct DelayedExecutor {
    delay: Duration,
    executor: Arc<dyn Executor>,
}

impl DelayedExecutor {
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl std::fmt::Debug for DelayedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedExecutor")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl Executor for DelayedExecutor {
    /// Rejects only if the scheduler thread cannot be started. A rejection by the target
    /// executor once the delay has elapsed drops the job, and a stage submitted this way
    /// fails with a [`RejectedExecution`].
    fn execute(&self, job: Job) -> Result<(), RejectedExecution> {
        let executor = Arc::clone(&self.executor);
        schedule(
            self.delay,
            Box::new(move || {
                if let Err(_rejected) = executor.execute(job) {
                    #[cfg(feature = "tracing")]
                    debug!(reason = %_rejected.reason, "delayed job rejected");
                }
            }),
        )
        .map(drop)
    }
}

/// An executor that hands each job to `executor` once `delay` has elapsed.
///
/// ```
/// use std::time::{Duration, Instant};
/// use stagex::{default_executor, delayed_executor, Node};
///
/// let later = delayed_executor(Duration::from_millis(20), default_executor());
/// let started = Instant::now();
/// let node = Node::supply_async_on(std::sync::Arc::new(later), || "late");
/// assert_eq!(node.join().unwrap(), "late");
/// assert!(started.elapsed() >= Duration::from_millis(20));
/// ```
pub fn delayed_executor(delay: Duration, executor: Arc<dyn Executor>) -> DelayedExecutor {
    DelayedExecutor { delay, executor }
}

impl<T: Send + Sync + 'static> Node<T> {
    /// Complete exceptionally with a [`TimeoutError`] unless complete within `timeout`.
    ///
    /// Returns this node. The pending timeout is discarded as soon as the node completes.
    pub fn or_timeout(&self, timeout: Duration) -> Self {
        if !self.is_done() {
            let node = self.clone();
            self.arm(
                timeout,
                Box::new(move || {
                    if node.complete_exceptionally(TimeoutError { waited: timeout }) {
                        #[cfg(feature = "tracing")]
                        debug!(node = node.id().0, ?timeout, "node timed out");
                    }
                }),
            );
        }
        self.clone()
    }

    /// Complete with `value` unless complete within `timeout`.
    ///
    /// Returns this node. The pending timeout, and `value` with it, is discarded as soon as
    /// the node completes.
    pub fn complete_on_timeout(&self, value: T, timeout: Duration) -> Self {
        if !self.is_done() {
            let node = self.clone();
            self.arm(
                timeout,
                Box::new(move || {
                    if node.complete(value) {
                        #[cfg(feature = "tracing")]
                        debug!(node = node.id().0, ?timeout, "node completed on timeout");
                    }
                }),
            );
        }
        self.clone()
    }

    fn arm(&self, timeout: Duration, job: Job) {
        match schedule(timeout, job) {
            Ok(task) => self.on_settle(move |_| task.cancel()),
            Err(rejected) => {
                self.complete_exceptionally(rejected);
            }
        }
    }
}

/// Number of entries in the scheduler heap, cancelled ones included.
#[cfg(test)]
fn queued() -> usize {
    Delayer::shared().map_or(0, |delayer| delayer.schedule.lock().heap.len())
}
