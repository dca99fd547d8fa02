//! The completion node: a single-assignment cell plus the stages waiting on it.
//!
//! - **Node\<T\>**: public, cloneable handle; clones refer to the same node
//! - **Dependent\<T\>**: a registered unit of work fired once when the node completes
//! - **AnyNode**: type-erased view used by aggregates over heterogeneous nodes
//!
//! Each node guards its state with its own short-lived lock. The transition out of
//! `Pending` happens under that lock, so exactly one completer wins, and registration checks
//! terminality and appends in the same critical section, so a dependent registered
//! concurrently with completion is either drained by the completer or fired by the
//! registering thread itself. User code never runs while a node lock is held.

use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::error::{Cause, GetError, JoinError, TimeoutError};
use crate::executor::{default_executor, Executor};
use crate::outcome::{Failure, Outcome, Settled};
use crate::propagate;
use crate::types::NodeId;

/// Registrations on a pending node are swept for dead entries when the list reaches this
/// size, and again at every following power of two.
const SWEEP_THRESHOLD: usize = 16;

/// Internal trait for work waiting on a node.
///
/// `fire` consumes the dependent, so it runs at most once and everything it captured is
/// released as soon as it has run.
pub(crate) trait Dependent<T>: Send {
    fn fire(self: Box<Self>, outcome: &Settled<T>);

    /// Whether firing could still have an effect. Dead dependents are purged from pending
    /// nodes so a never-completing node does not accumulate them.
    fn is_live(&self) -> bool {
        true
    }
}

/// A closure run with the node's outcome.
pub(crate) struct OnSettle<F>(pub(crate) F);

impl<T, F> Dependent<T> for OnSettle<F>
where
    F: FnOnce(&Settled<T>) + Send,
{
    fn fire(self: Box<Self>, outcome: &Settled<T>) {
        (self.0)(outcome)
    }
}

/// Type-erased dependent, notified only of success or failure.
pub(crate) trait Watch: Send {
    fn notify(self: Box<Self>, outcome: Result<(), &Failure>);

    fn is_live(&self) -> bool {
        true
    }
}

struct Erased(Box<dyn Watch>);

impl<T> Dependent<T> for Erased {
    fn fire(self: Box<Self>, outcome: &Settled<T>) {
        self.0.notify(outcome.as_ref().map(|_| ()))
    }

    fn is_live(&self) -> bool {
        self.0.is_live()
    }
}

/// Operations available on a node without knowing its value type.
pub(crate) trait Watchable: Send + Sync {
    fn id(&self) -> NodeId;
    fn watch(&self, watcher: Box<dyn Watch>);
    fn purge(&self);
    fn is_done(&self) -> bool;
}

enum State<T> {
    Pending(Vec<Box<dyn Dependent<T>>>),
    Settled(Settled<T>),
}

pub(crate) struct Inner<T> {
    id: NodeId,
    state: Mutex<State<T>>,
    settled: Condvar,
    executor: Arc<dyn Executor>,
}

impl<T: Send + Sync + 'static> Inner<T> {
    fn attach(&self, dependent: Box<dyn Dependent<T>>) {
        let mut state = self.state.lock();
        let outcome = match &mut *state {
            State::Pending(dependents) => {
                if dependents.len() >= SWEEP_THRESHOLD && dependents.len().is_power_of_two() {
                    dependents.retain(|d| d.is_live());
                }
                dependents.push(dependent);

                #[cfg(feature = "tracing")]
                trace!(node = self.id.0, dependents = dependents.len(), "registered dependent");

                return;
            }
            State::Settled(outcome) => outcome.clone(),
        };
        drop(state);

        #[cfg(feature = "tracing")]
        trace!(node = self.id.0, "node already complete, firing dependent");

        dependent.fire(&outcome);
    }

    fn purge_dead(&self) {
        if let State::Pending(dependents) = &mut *self.state.lock() {
            dependents.retain(|d| d.is_live());
        }
    }

    fn is_settled(&self) -> bool {
        matches!(*self.state.lock(), State::Settled(_))
    }
}

impl<T: Send + Sync + 'static> Watchable for Inner<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn watch(&self, watcher: Box<dyn Watch>) {
        self.attach(Box::new(Erased(watcher)))
    }

    fn purge(&self) {
        self.purge_dead()
    }

    fn is_done(&self) -> bool {
        self.is_settled()
    }
}

fn fire_all<T>(dependents: Vec<Box<dyn Dependent<T>>>, outcome: &Settled<T>) {
    for dependent in dependents {
        dependent.fire(outcome);
    }
}

/// A single-assignment future whose completion pushes into dependent stages.
///
/// A `Node` is completed exactly once, normally ([`Node::complete`]), exceptionally
/// ([`Node::complete_exceptionally`]) or by cancellation ([`Node::cancel`]). Stages registered
/// with the combinators (`then_apply`, `then_combine`, `handle`, ...) fire when it completes,
/// whether they were registered before or after completion. Each stage is itself a `Node`.
///
/// Cloning a `Node` yields another handle to the same node; compare handles with
/// [`Node::ptr_eq`].
///
/// # Examples
///
/// ```
/// use stagex::Node;
///
/// let source: Node<i32> = Node::new();
/// let doubled = source.then_apply(|x| x * 2);
/// let described = doubled.then_apply(|x| format!("value = {x}"));
///
/// assert!(!described.is_done());
/// assert!(source.complete(21));
/// assert_eq!(described.join().unwrap(), "value = 42");
/// ```
pub struct Node<T> {
    pub(crate) inner: Arc<Inner<T>>,
}

impl<T> Clone for Node<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Default for Node<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Node<T> {
    /// Create a pending node using the process-wide default executor for async stages.
    pub fn new() -> Self {
        Self::with_executor(default_executor())
    }

    /// Create a pending node whose async stages, and those of every node derived from it,
    /// run on `executor` unless an executor is given explicitly.
    pub fn with_executor(executor: Arc<dyn Executor>) -> Self {
        Self::from_state(State::Pending(Vec::new()), executor)
    }

    /// Create a node already completed with `value`.
    pub fn completed(value: T) -> Self {
        Self::from_state(State::Settled(Ok(Arc::new(value))), default_executor())
    }

    /// Create a node already completed exceptionally with `cause`.
    pub fn failed(cause: impl Into<Cause>) -> Self {
        Self::from_state(
            State::Settled(Err(Failure::raw(cause.into()))),
            default_executor(),
        )
    }

    fn from_state(state: State<T>, executor: Arc<dyn Executor>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NodeId::next(),
                state: Mutex::new(state),
                settled: Condvar::new(),
                executor,
            }),
        }
    }

    /// A new pending node sharing this node's default executor.
    pub fn new_incomplete<U: Send + Sync + 'static>(&self) -> Node<U> {
        Node::with_executor(self.default_executor())
    }

    /// The executor used by this node's `*_async` operations.
    pub fn default_executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.inner.executor)
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Node<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Complete with `value` if still pending.
    ///
    /// Returns `true` if this call completed the node. Among any number of racing
    /// `complete`, `complete_exceptionally` and `cancel` calls exactly one returns `true`.
    pub fn complete(&self, value: T) -> bool {
        self.settle_now(Ok(Arc::new(value)))
    }

    /// Complete exceptionally with the raw `cause` if still pending.
    ///
    /// Returns `true` if this call completed the node.
    pub fn complete_exceptionally(&self, cause: impl Into<Cause>) -> bool {
        self.settle_now(Err(Failure::raw(cause.into())))
    }

    /// Complete with a [`CancellationError`](crate::CancellationError) if still pending.
    ///
    /// Returns `true` if the node is cancelled after this call, whether this call or an
    /// earlier one cancelled it. Dependents observe the cancellation as a failure.
    /// `may_interrupt` has no effect: no computation is bound to the node itself.
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        let _ = may_interrupt;
        let cancelled = self.settle_now(Err(Failure::cancellation()));
        cancelled || self.is_cancelled()
    }

    /// Forcibly set the value, whether or not the node already completed.
    ///
    /// This bypasses single assignment and is meant for error recovery only. If the node was
    /// pending its dependents fire as usual. If it had already completed, its dependents have
    /// already fired with the earlier outcome and do not fire again; only later observers
    /// see the new value.
    pub fn obtrude_value(&self, value: T) {
        self.overwrite(Ok(Arc::new(value)))
    }

    /// Forcibly set a failure, whether or not the node already completed.
    ///
    /// Same caveats as [`Node::obtrude_value`].
    pub fn obtrude_exception(&self, cause: impl Into<Cause>) {
        self.overwrite(Err(Failure::raw(cause.into())))
    }

    /// Whether the node completed in any fashion.
    pub fn is_done(&self) -> bool {
        self.inner.is_settled()
    }

    /// Whether the node itself was cancelled.
    ///
    /// A dependent of a cancelled node is completed exceptionally but not cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(&*self.inner.state.lock(), State::Settled(Err(f)) if f.is_cancellation())
    }

    /// Whether the node completed exceptionally, including by cancellation.
    pub fn is_completed_exceptionally(&self) -> bool {
        matches!(&*self.inner.state.lock(), State::Settled(Err(_)))
    }

    /// Snapshot of the current state, without blocking.
    pub fn peek(&self) -> Outcome<Arc<T>> {
        match &*self.inner.state.lock() {
            State::Pending(_) => Outcome::Pending,
            State::Settled(outcome) => Outcome::from_settled(outcome),
        }
    }

    /// Approximate number of registered dependents that have not fired yet.
    pub fn dependent_count(&self) -> usize {
        match &*self.inner.state.lock() {
            State::Pending(dependents) => dependents.iter().filter(|d| d.is_live()).count(),
            State::Settled(_) => 0,
        }
    }

    /// Block until the node completes.
    pub fn wait(&self) {
        let mut state = self.inner.state.lock();
        while matches!(*state, State::Pending(_)) {
            self.inner.settled.wait(&mut state);
        }
    }

    /// Block until the node completes or `timeout` elapses.
    ///
    /// A timeout leaves the node pending.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), TimeoutError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return Ok(());
        };
        let mut state = self.inner.state.lock();
        while matches!(*state, State::Pending(_)) {
            if self
                .inner
                .settled
                .wait_until(&mut state, deadline)
                .timed_out()
                && matches!(*state, State::Pending(_))
            {
                return Err(TimeoutError { waited: timeout });
            }
        }
        Ok(())
    }

    /// The current outcome, if complete.
    pub(crate) fn settled(&self) -> Option<Settled<T>> {
        match &*self.inner.state.lock() {
            State::Pending(_) => None,
            State::Settled(outcome) => Some(outcome.clone()),
        }
    }

    fn settled_blocking(&self) -> Settled<T> {
        let mut state = self.inner.state.lock();
        loop {
            match &*state {
                State::Settled(outcome) => return outcome.clone(),
                State::Pending(_) => self.inner.settled.wait(&mut state),
            }
        }
    }

    /// Store `outcome` if still pending; dependents fire as part of the propagation drain
    /// running on this thread, if any.
    pub(crate) fn settle(&self, outcome: Settled<T>) -> bool {
        match self.transition(outcome) {
            Some((dependents, outcome)) => {
                if !dependents.is_empty() {
                    propagate::defer(move || fire_all(dependents, &outcome));
                }
                true
            }
            None => false,
        }
    }

    /// Store `outcome` if still pending and finish all resulting propagation before returning.
    fn settle_now(&self, outcome: Settled<T>) -> bool {
        match self.transition(outcome) {
            Some((dependents, outcome)) => {
                if !dependents.is_empty() {
                    propagate::drain(move || fire_all(dependents, &outcome));
                }
                true
            }
            None => false,
        }
    }

    #[allow(clippy::type_complexity)]
    fn transition(&self, outcome: Settled<T>) -> Option<(Vec<Box<dyn Dependent<T>>>, Settled<T>)> {
        let mut state = self.inner.state.lock();
        let State::Pending(dependents) = &mut *state else {
            return None;
        };
        let dependents = mem::take(dependents);
        *state = State::Settled(outcome.clone());
        drop(state);
        self.inner.settled.notify_all();

        #[cfg(feature = "tracing")]
        debug!(
            node = self.inner.id.0,
            exceptional = outcome.is_err(),
            dependents = dependents.len(),
            "node completed"
        );

        Some((dependents, outcome))
    }

    fn overwrite(&self, outcome: Settled<T>) {
        let previous = mem::replace(
            &mut *self.inner.state.lock(),
            State::Settled(outcome.clone()),
        );

        #[cfg(feature = "tracing")]
        debug!(
            node = self.inner.id.0,
            exceptional = outcome.is_err(),
            was_pending = matches!(previous, State::Pending(_)),
            "outcome obtruded"
        );

        if let State::Pending(dependents) = previous {
            self.inner.settled.notify_all();
            if !dependents.is_empty() {
                propagate::drain(move || fire_all(dependents, &outcome));
            }
        }
    }

    /// Fire `dependent` with the outcome once complete (immediately if already complete).
    pub(crate) fn attach(&self, dependent: Box<dyn Dependent<T>>) {
        self.inner.attach(dependent)
    }

    /// Run `f` with the outcome once complete.
    pub(crate) fn on_settle<F>(&self, f: F)
    where
        F: FnOnce(&Settled<T>) + Send + 'static,
    {
        self.attach(Box::new(OnSettle(f)))
    }

    /// Drop registrations that can no longer have an effect.
    pub(crate) fn purge(&self) {
        self.inner.purge_dead()
    }

    pub(crate) fn downgrade(&self) -> Weak<dyn Watchable> {
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        weak
    }

    /// A type-erased handle to this node.
    pub fn erase(&self) -> AnyNode {
        AnyNode {
            inner: Arc::clone(&self.inner) as Arc<dyn Watchable>,
        }
    }
}

pub(crate) fn report_join<T>(outcome: Settled<T>) -> Result<Arc<T>, JoinError> {
    match outcome {
        Ok(value) => Ok(value),
        Err(failure) if failure.is_cancellation() => {
            Err(JoinError::Cancelled(failure.cause().clone()))
        }
        Err(failure) => Err(JoinError::Completion(failure.cause().clone())),
    }
}

fn report_get<T>(outcome: Settled<T>) -> Result<Arc<T>, GetError> {
    match outcome {
        Ok(value) => Ok(value),
        Err(failure) if failure.is_cancellation() => {
            Err(GetError::Cancelled(failure.cause().clone()))
        }
        Err(failure) => Err(GetError::Execution(failure.cause().clone())),
    }
}

impl<T: Clone + Send + Sync + 'static> Node<T> {
    /// Block until complete and return the value.
    ///
    /// # Errors
    ///
    /// [`JoinError::Cancelled`] if this node was cancelled, otherwise
    /// [`JoinError::Completion`] carrying the raw cause.
    pub fn join(&self) -> Result<T, JoinError> {
        report_join(self.settled_blocking()).map(|value| T::clone(&value))
    }

    /// Block until complete and return the value.
    ///
    /// # Errors
    ///
    /// [`GetError::Cancelled`] if this node was cancelled, otherwise [`GetError::Execution`]
    /// carrying the raw cause.
    pub fn get(&self) -> Result<T, GetError> {
        report_get(self.settled_blocking()).map(|value| T::clone(&value))
    }

    /// Like [`Node::get`], giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Additionally [`GetError::Timeout`] if the node is still pending after `timeout`; the
    /// node itself is unaffected.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, GetError> {
        self.wait_timeout(timeout).map_err(GetError::Timeout)?;
        self.get()
    }

    /// The value if complete, `value_if_absent` if still pending.
    ///
    /// # Errors
    ///
    /// Same as [`Node::join`] when the node completed exceptionally.
    pub fn get_now(&self, value_if_absent: T) -> Result<T, JoinError> {
        match self.settled() {
            Some(outcome) => report_join(outcome).map(|value| T::clone(&value)),
            None => Ok(value_if_absent),
        }
    }
}

impl<T> fmt::Display for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node{}", self.inner.id)?;
        match &*self.inner.state.lock() {
            State::Pending(dependents) => match dependents.iter().filter(|d| d.is_live()).count() {
                0 => write!(f, "[Not completed]"),
                live => write!(f, "[Not completed, {live} dependents]"),
            },
            State::Settled(Ok(_)) => write!(f, "[Completed normally]"),
            State::Settled(Err(failure)) => {
                write!(f, "[Completed exceptionally: {}]", failure.cause())
            }
        }
    }
}

impl<T> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.inner.state.lock() {
            State::Pending(_) => "pending",
            State::Settled(Ok(_)) => "completed",
            State::Settled(Err(_)) => "failed",
        };
        f.debug_struct("Node")
            .field("id", &self.inner.id)
            .field("state", &state)
            .finish()
    }
}

/// A node with its value type erased, for aggregates over heterogeneous nodes.
///
/// ```
/// use stagex::{all_of, Node};
///
/// let number: Node<i32> = Node::new();
/// let text: Node<String> = Node::new();
/// let both = all_of([number.erase(), text.erase()]);
///
/// number.complete(1);
/// text.complete("one".to_string());
/// assert!(both.join().is_ok());
/// ```
#[derive(Clone)]
pub struct AnyNode {
    pub(crate) inner: Arc<dyn Watchable>,
}

impl AnyNode {
    pub fn id(&self) -> NodeId {
        self.inner.id()
    }

    pub fn is_done(&self) -> bool {
        self.inner.is_done()
    }
}

impl fmt::Debug for AnyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyNode")
            .field("id", &self.inner.id())
            .field("done", &self.inner.is_done())
            .finish()
    }
}

impl<T: Send + Sync + 'static> From<Node<T>> for AnyNode {
    fn from(node: Node<T>) -> Self {
        node.erase()
    }
}

impl<T: Send + Sync + 'static> From<&Node<T>> for AnyNode {
    fn from(node: &Node<T>) -> Self {
        node.erase()
    }
}
