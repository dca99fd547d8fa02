//! Single-source stages.
//!
//! Every combinator creates a target node, registers a dependent on the source, and returns
//! the target. Each comes in three dispatch forms:
//!
//! - `then_apply(f)`: runs `f` on whichever thread discovers that the source completed
//! - `then_apply_async(f)`: submits `f` to the source node's default executor
//! - `then_apply_async_on(executor, f)`: submits `f` to `executor`
//!
//! # Failure propagation
//!
//! When the source fails, `then_apply`, `then_accept`, `then_run`, `then_compose` and `copy`
//! skip their action and fail with the source's failure, wrapped once. `handle`,
//! `when_complete`, `exceptionally` and `exceptionally_compose` receive the raw cause.
//!
//! # Panics in actions
//!
//! A panicking action never unwinds into the thread that happened to run it. The panic is
//! caught and the stage fails with a [`Panicked`] cause. This matches what async runtimes do
//! with panicking tasks, so an action behaves the same whether it runs inline or on an
//! executor.
//!
//! # Fallible actions
//!
//! `try_then_apply`, `try_handle`, `try_when_complete` and `try_exceptionally` take actions
//! returning `Result<_, Cause>`. An `Err` fails the stage with exactly that cause, wrapped
//! once, the same way an upstream failure would reach it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::error;

use crate::error::{Cause, Panicked};
use crate::executor::{default_executor, Dispatch, Executor};
use crate::node::Node;
use crate::outcome::{Failure, Settled};

/// Run a user action, converting a panic into a wrapped [`Panicked`] failure.
pub(crate) fn guarded<R>(action: impl FnOnce() -> R) -> Result<R, Failure> {
    panic::catch_unwind(AssertUnwindSafe(action)).map_err(|payload| {
        let panicked = Panicked::from_payload(payload);

        #[cfg(feature = "tracing")]
        error!(panic_message = %panicked.message, "stage action panicked");

        Failure::wrapped(Cause::new(panicked))
    })
}

/// Run a fallible user action; a returned error fails with that very cause.
pub(crate) fn attempt<R>(action: impl FnOnce() -> Result<R, Cause>) -> Result<R, Failure> {
    guarded(action).and_then(|result| result.map_err(Failure::wrapped))
}

/// Borrow a settled outcome the way handle-family actions see it.
fn view<T>(outcome: &Settled<T>) -> Result<&T, &Cause> {
    outcome.as_ref().map(|value| &**value).map_err(Failure::cause)
}

/// Complete `target` with whatever `source` completes with, wrapping failures.
pub(crate) fn relay<U: Send + Sync + 'static>(source: &Node<U>, target: Node<U>) {
    source.on_settle(move |outcome| {
        target.settle(outcome.clone().map_err(|failure| failure.propagated()));
    });
}

impl<T: Send + Sync + 'static> Node<T> {
    pub(crate) fn async_dispatch(&self) -> Dispatch {
        Dispatch::Async(self.default_executor())
    }

    fn uni_apply<U, F>(&self, dispatch: Dispatch, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Result<U, Cause> + Send + 'static,
    {
        let target = self.new_incomplete();
        let stage = target.clone();
        self.on_settle(move |outcome| match outcome {
            Err(failure) => {
                stage.settle(Err(failure.propagated()));
            }
            Ok(value) => {
                let value = Arc::clone(value);
                dispatch.run(stage, move |stage| {
                    stage.settle(attempt(|| f(&value)).map(Arc::new));
                });
            }
        });
        target
    }

    fn uni_compose<U, F>(&self, dispatch: Dispatch, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Node<U> + Send + 'static,
    {
        let target = self.new_incomplete();
        let stage = target.clone();
        self.on_settle(move |outcome| match outcome {
            Err(failure) => {
                stage.settle(Err(failure.propagated()));
            }
            Ok(value) => {
                let value = Arc::clone(value);
                dispatch.run(stage, move |stage| match guarded(|| f(&value)) {
                    Ok(next) => relay(&next, stage),
                    Err(failure) => {
                        stage.settle(Err(failure));
                    }
                });
            }
        });
        target
    }

    fn uni_handle<U, F>(&self, dispatch: Dispatch, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(Result<&T, &Cause>) -> Result<U, Cause> + Send + 'static,
    {
        let target = self.new_incomplete();
        let stage = target.clone();
        self.on_settle(move |outcome| {
            let outcome = outcome.clone();
            dispatch.run(stage, move |stage| {
                stage.settle(attempt(|| f(view(&outcome))).map(Arc::new));
            });
        });
        target
    }

    fn uni_when_complete<F>(&self, dispatch: Dispatch, f: F) -> Node<T>
    where
        F: FnOnce(Result<&T, &Cause>) -> Result<(), Cause> + Send + 'static,
    {
        let target = self.new_incomplete();
        let stage = target.clone();
        self.on_settle(move |outcome| {
            let outcome = outcome.clone();
            dispatch.run(stage, move |stage| {
                let acted = attempt(|| f(view(&outcome)));
                let result = match (outcome, acted) {
                    (Ok(value), Ok(())) => Ok(value),
                    (Ok(_), Err(own)) => Err(own),
                    (Err(failure), Ok(())) => Err(failure.propagated()),
                    // The source failure takes precedence over the action's own
                    (Err(failure), Err(own)) => {
                        Err(failure.propagated().with_suppressed(own.cause().clone()))
                    }
                };
                stage.settle(result);
            });
        });
        target
    }

    fn uni_exceptionally<F>(&self, dispatch: Dispatch, f: F) -> Node<T>
    where
        F: FnOnce(&Cause) -> Result<T, Cause> + Send + 'static,
    {
        let target = self.new_incomplete();
        let stage = target.clone();
        self.on_settle(move |outcome| match outcome {
            Ok(value) => {
                stage.settle(Ok(Arc::clone(value)));
            }
            Err(failure) => {
                let cause = failure.cause().clone();
                dispatch.run(stage, move |stage| {
                    stage.settle(attempt(|| f(&cause)).map(Arc::new));
                });
            }
        });
        target
    }

    fn uni_exceptionally_compose<F>(&self, dispatch: Dispatch, f: F) -> Node<T>
    where
        F: FnOnce(&Cause) -> Node<T> + Send + 'static,
    {
        let target = self.new_incomplete();
        let stage = target.clone();
        self.on_settle(move |outcome| match outcome {
            Ok(value) => {
                stage.settle(Ok(Arc::clone(value)));
            }
            Err(failure) => {
                let cause = failure.cause().clone();
                dispatch.run(stage, move |stage| match guarded(|| f(&cause)) {
                    Ok(next) => relay(&next, stage),
                    Err(failure) => {
                        stage.settle(Err(failure));
                    }
                });
            }
        });
        target
    }

    /// A node completed by `supplier`, run on the default executor.
    ///
    /// ```
    /// use stagex::Node;
    ///
    /// let answer = Node::supply_async(|| 6 * 7);
    /// assert_eq!(answer.join().unwrap(), 42);
    /// ```
    pub fn supply_async<F>(supplier: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::supply_async_on(default_executor(), supplier)
    }

    /// A node completed by `supplier`, run on `executor`.
    ///
    /// If `executor` rejects the job the node completes exceptionally with the rejection.
    pub fn supply_async_on<F>(executor: Arc<dyn Executor>, supplier: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let node = Self::new();
        Dispatch::Async(executor).run(node.clone(), move |node| {
            node.settle(guarded(supplier).map(Arc::new));
        });
        node
    }

    /// Complete this node with the result of `supplier`, run on the default executor.
    ///
    /// Returns this node.
    pub fn complete_async<F>(&self, supplier: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.complete_async_on(self.default_executor(), supplier)
    }

    /// Complete this node with the result of `supplier`, run on `executor`.
    ///
    /// Returns this node. A rejection completes it exceptionally.
    pub fn complete_async_on<F>(&self, executor: Arc<dyn Executor>, supplier: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Dispatch::Async(executor).run(self.clone(), move |node| {
            node.settle(guarded(supplier).map(Arc::new));
        });
        self.clone()
    }

    /// A new node completed with this node's outcome; failures arrive wrapped.
    ///
    /// Completing the copy does not affect this node.
    pub fn copy(&self) -> Self {
        let target = self.new_incomplete();
        relay(self, target.clone());
        target
    }

    /// Transform the value with `f`.
    pub fn then_apply<U, F>(&self, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        self.uni_apply(Dispatch::Inline, move |value| Ok(f(value)))
    }

    pub fn then_apply_async<U, F>(&self, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        self.uni_apply(self.async_dispatch(), move |value| Ok(f(value)))
    }

    pub fn then_apply_async_on<U, F>(&self, executor: Arc<dyn Executor>, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        self.uni_apply(Dispatch::Async(executor), move |value| Ok(f(value)))
    }

    /// Consume the value with `f`.
    pub fn then_accept<F>(&self, f: F) -> Node<()>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.uni_apply(Dispatch::Inline, move |value| Ok(f(value)))
    }

    pub fn then_accept_async<F>(&self, f: F) -> Node<()>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.uni_apply(self.async_dispatch(), move |value| Ok(f(value)))
    }

    pub fn then_accept_async_on<F>(&self, executor: Arc<dyn Executor>, f: F) -> Node<()>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.uni_apply(Dispatch::Async(executor), move |value| Ok(f(value)))
    }

    /// Run `f` after normal completion.
    pub fn then_run<F>(&self, f: F) -> Node<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.uni_apply(Dispatch::Inline, move |_| Ok(f()))
    }

    pub fn then_run_async<F>(&self, f: F) -> Node<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.uni_apply(self.async_dispatch(), move |_| Ok(f()))
    }

    pub fn then_run_async_on<F>(&self, executor: Arc<dyn Executor>, f: F) -> Node<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.uni_apply(Dispatch::Async(executor), move |_| Ok(f()))
    }

    /// Continue with the node returned by `f`.
    ///
    /// The returned stage completes with the outcome of the node `f` returns, once that node
    /// completes.
    ///
    /// ```
    /// use stagex::Node;
    ///
    /// let f: Node<i32> = Node::new();
    /// let g = f.then_compose(|x| Node::completed(x + 1));
    /// f.complete(5);
    /// assert_eq!(g.join().unwrap(), 6);
    /// ```
    pub fn then_compose<U, F>(&self, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Node<U> + Send + 'static,
    {
        self.uni_compose(Dispatch::Inline, f)
    }

    pub fn then_compose_async<U, F>(&self, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Node<U> + Send + 'static,
    {
        self.uni_compose(self.async_dispatch(), f)
    }

    pub fn then_compose_async_on<U, F>(&self, executor: Arc<dyn Executor>, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Node<U> + Send + 'static,
    {
        self.uni_compose(Dispatch::Async(executor), f)
    }

    /// Map either outcome with `f`, which receives the value or the raw cause.
    ///
    /// ```
    /// use std::io;
    /// use stagex::Node;
    ///
    /// let failed: Node<i32> = Node::failed(io::Error::other("offline"));
    /// let recovered = failed.handle(|result| match result {
    ///     Ok(value) => *value,
    ///     Err(_) => -1,
    /// });
    /// assert_eq!(recovered.join().unwrap(), -1);
    /// ```
    pub fn handle<U, F>(&self, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(Result<&T, &Cause>) -> U + Send + 'static,
    {
        self.uni_handle(Dispatch::Inline, move |result| Ok(f(result)))
    }

    pub fn handle_async<U, F>(&self, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(Result<&T, &Cause>) -> U + Send + 'static,
    {
        self.uni_handle(self.async_dispatch(), move |result| Ok(f(result)))
    }

    pub fn handle_async_on<U, F>(&self, executor: Arc<dyn Executor>, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(Result<&T, &Cause>) -> U + Send + 'static,
    {
        self.uni_handle(Dispatch::Async(executor), move |result| Ok(f(result)))
    }

    /// Observe the outcome with `f` and pass it through.
    ///
    /// If `f` panics after a normal completion, the returned stage fails with the panic. If
    /// the source failed, its failure wins and the panic is recorded as suppressed.
    pub fn when_complete<F>(&self, f: F) -> Node<T>
    where
        F: FnOnce(Result<&T, &Cause>) + Send + 'static,
    {
        self.uni_when_complete(Dispatch::Inline, move |result| Ok(f(result)))
    }

    pub fn when_complete_async<F>(&self, f: F) -> Node<T>
    where
        F: FnOnce(Result<&T, &Cause>) + Send + 'static,
    {
        self.uni_when_complete(self.async_dispatch(), move |result| Ok(f(result)))
    }

    pub fn when_complete_async_on<F>(&self, executor: Arc<dyn Executor>, f: F) -> Node<T>
    where
        F: FnOnce(Result<&T, &Cause>) + Send + 'static,
    {
        self.uni_when_complete(Dispatch::Async(executor), move |result| Ok(f(result)))
    }

    /// Recover from a failure with `f`; values pass through untouched.
    pub fn exceptionally<F>(&self, f: F) -> Node<T>
    where
        F: FnOnce(&Cause) -> T + Send + 'static,
    {
        self.uni_exceptionally(Dispatch::Inline, move |cause| Ok(f(cause)))
    }

    pub fn exceptionally_async<F>(&self, f: F) -> Node<T>
    where
        F: FnOnce(&Cause) -> T + Send + 'static,
    {
        self.uni_exceptionally(self.async_dispatch(), move |cause| Ok(f(cause)))
    }

    pub fn exceptionally_async_on<F>(&self, executor: Arc<dyn Executor>, f: F) -> Node<T>
    where
        F: FnOnce(&Cause) -> T + Send + 'static,
    {
        self.uni_exceptionally(Dispatch::Async(executor), move |cause| Ok(f(cause)))
    }

    /// Recover from a failure with the node returned by `f`; values pass through untouched.
    pub fn exceptionally_compose<F>(&self, f: F) -> Node<T>
    where
        F: FnOnce(&Cause) -> Node<T> + Send + 'static,
    {
        self.uni_exceptionally_compose(Dispatch::Inline, f)
    }

    pub fn exceptionally_compose_async<F>(&self, f: F) -> Node<T>
    where
        F: FnOnce(&Cause) -> Node<T> + Send + 'static,
    {
        self.uni_exceptionally_compose(self.async_dispatch(), f)
    }

    pub fn exceptionally_compose_async_on<F>(&self, executor: Arc<dyn Executor>, f: F) -> Node<T>
    where
        F: FnOnce(&Cause) -> Node<T> + Send + 'static,
    {
        self.uni_exceptionally_compose(Dispatch::Async(executor), f)
    }
}

/// Stages whose actions report failure through their return value.
impl<T: Send + Sync + 'static> Node<T> {
    /// Like [`Node::then_apply`], failing the stage with the cause `f` returns.
    ///
    /// ```
    /// use stagex::{Cause, Node};
    ///
    /// let raw: Node<&str> = Node::completed("forty-two");
    /// let parsed = raw.try_then_apply(|s| s.parse::<u32>().map_err(Cause::new));
    /// let cause = parsed.join().unwrap_err().cause();
    /// assert!(cause.is::<std::num::ParseIntError>());
    /// ```
    pub fn try_then_apply<U, F>(&self, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Result<U, Cause> + Send + 'static,
    {
        self.uni_apply(Dispatch::Inline, f)
    }

    pub fn try_then_apply_async<U, F>(&self, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Result<U, Cause> + Send + 'static,
    {
        self.uni_apply(self.async_dispatch(), f)
    }

    pub fn try_then_apply_async_on<U, F>(&self, executor: Arc<dyn Executor>, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Result<U, Cause> + Send + 'static,
    {
        self.uni_apply(Dispatch::Async(executor), f)
    }

    /// Like [`Node::handle`], failing the stage with the cause `f` returns.
    pub fn try_handle<U, F>(&self, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(Result<&T, &Cause>) -> Result<U, Cause> + Send + 'static,
    {
        self.uni_handle(Dispatch::Inline, f)
    }

    pub fn try_handle_async<U, F>(&self, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(Result<&T, &Cause>) -> Result<U, Cause> + Send + 'static,
    {
        self.uni_handle(self.async_dispatch(), f)
    }

    pub fn try_handle_async_on<U, F>(&self, executor: Arc<dyn Executor>, f: F) -> Node<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(Result<&T, &Cause>) -> Result<U, Cause> + Send + 'static,
    {
        self.uni_handle(Dispatch::Async(executor), f)
    }

    /// Like [`Node::when_complete`]; an `Err` from `f` counts like a panic would.
    pub fn try_when_complete<F>(&self, f: F) -> Node<T>
    where
        F: FnOnce(Result<&T, &Cause>) -> Result<(), Cause> + Send + 'static,
    {
        self.uni_when_complete(Dispatch::Inline, f)
    }

    pub fn try_when_complete_async<F>(&self, f: F) -> Node<T>
    where
        F: FnOnce(Result<&T, &Cause>) -> Result<(), Cause> + Send + 'static,
    {
        self.uni_when_complete(self.async_dispatch(), f)
    }

    pub fn try_when_complete_async_on<F>(&self, executor: Arc<dyn Executor>, f: F) -> Node<T>
    where
        F: FnOnce(Result<&T, &Cause>) -> Result<(), Cause> + Send + 'static,
    {
        self.uni_when_complete(Dispatch::Async(executor), f)
    }

    /// Like [`Node::exceptionally`]; `f` may give up with a cause of its own.
    pub fn try_exceptionally<F>(&self, f: F) -> Node<T>
    where
        F: FnOnce(&Cause) -> Result<T, Cause> + Send + 'static,
    {
        self.uni_exceptionally(Dispatch::Inline, f)
    }

    pub fn try_exceptionally_async<F>(&self, f: F) -> Node<T>
    where
        F: FnOnce(&Cause) -> Result<T, Cause> + Send + 'static,
    {
        self.uni_exceptionally(self.async_dispatch(), f)
    }

    pub fn try_exceptionally_async_on<F>(&self, executor: Arc<dyn Executor>, f: F) -> Node<T>
    where
        F: FnOnce(&Cause) -> Result<T, Cause> + Send + 'static,
    {
        self.uni_exceptionally(Dispatch::Async(executor), f)
    }
}

impl Node<()> {
    /// A node completed once `action` has run on the default executor.
    pub fn run_async<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::supply_async_on(default_executor(), action)
    }

    /// A node completed once `action` has run on `executor`.
    pub fn run_async_on<F>(executor: Arc<dyn Executor>, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::supply_async_on(executor, action)
    }
}
