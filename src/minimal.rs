//! Read-only view of a node.
//!
//! A [`MinimalNode`] can be handed to code that should build on a result without being able
//! to decide it: it registers stages and observes the outcome, but has no `complete`,
//! `cancel` or `obtrude` operations. Every stage derived from it is minimal too.
//! [`MinimalNode::to_node`] gives an independent node that can be completed freely.
//!
//! ```
//! use stagex::{MinimalNode, Node};
//!
//! fn publish(source: &Node<u32>) -> MinimalNode<u32> {
//!     source.minimal()
//! }
//!
//! let source: Node<u32> = Node::new();
//! let view = publish(&source);
//! let label = view.then_apply(|n| format!("#{n}"));
//! source.complete(7);
//! assert_eq!(label.join().unwrap(), "#7");
//! ```

use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Cause, JoinError, TimeoutError};
use crate::executor::Executor;
use crate::future::StageFuture;
use crate::node::{AnyNode, Node};
use crate::outcome::Outcome;
use crate::types::NodeId;

/// A node that can be built on and observed, but not completed.
pub struct MinimalNode<T> {
    node: Node<T>,
}

impl<T> Clone for MinimalNode<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Node<T> {
    /// A read-only view of this node.
    pub fn minimal(&self) -> MinimalNode<T> {
        MinimalNode { node: self.clone() }
    }

    /// A read-only node already completed with `value`.
    pub fn completed_stage(value: T) -> MinimalNode<T> {
        MinimalNode {
            node: Node::completed(value),
        }
    }

    /// A read-only node already completed exceptionally with `cause`.
    pub fn failed_stage(cause: impl Into<Cause>) -> MinimalNode<T> {
        MinimalNode {
            node: Node::failed(cause),
        }
    }
}

// Forwards each stage to the underlying node and wraps the stage it returns
macro_rules! forward_stages {
    ($(
        fn $name:ident<$($g:ident),+>($($arg:ident: $ty:ty),+ $(,)?) -> $out:ty
        where { $($bound:tt)+ };
    )+) => {
        $(
            pub fn $name<$($g),+>(&self, $($arg: $ty),+) -> MinimalNode<$out>
            where
                $($bound)+
            {
                MinimalNode {
                    node: self.node.$name($($arg),+),
                }
            }
        )+
    };
}

impl<T: Send + Sync + 'static> MinimalNode<T> {
    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    pub fn is_done(&self) -> bool {
        self.node.is_done()
    }

    pub fn is_cancelled(&self) -> bool {
        self.node.is_cancelled()
    }

    pub fn is_completed_exceptionally(&self) -> bool {
        self.node.is_completed_exceptionally()
    }

    pub fn peek(&self) -> Outcome<Arc<T>> {
        self.node.peek()
    }

    pub fn dependent_count(&self) -> usize {
        self.node.dependent_count()
    }

    pub fn wait(&self) {
        self.node.wait()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), TimeoutError> {
        self.node.wait_timeout(timeout)
    }

    pub fn to_future(&self) -> StageFuture<T> {
        self.node.to_future()
    }

    pub fn erase(&self) -> AnyNode {
        self.node.erase()
    }

    /// A new, completable node that completes with this node's outcome (failures wrapped).
    ///
    /// Completing the returned node does not affect this one.
    pub fn to_node(&self) -> Node<T> {
        self.node.copy()
    }

    /// A new minimal node completed with this node's outcome; failures arrive wrapped.
    pub fn copy(&self) -> MinimalNode<T> {
        MinimalNode {
            node: self.node.copy(),
        }
    }

    forward_stages! {
        // Single-source stages
        fn then_apply<U, F>(f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(&T) -> U + Send + 'static,
        };
        fn then_apply_async<U, F>(f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(&T) -> U + Send + 'static,
        };
        fn then_apply_async_on<U, F>(executor: Arc<dyn Executor>, f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(&T) -> U + Send + 'static,
        };
        fn then_accept<F>(f: F) -> () where {
            F: FnOnce(&T) + Send + 'static,
        };
        fn then_accept_async<F>(f: F) -> () where {
            F: FnOnce(&T) + Send + 'static,
        };
        fn then_accept_async_on<F>(executor: Arc<dyn Executor>, f: F) -> () where {
            F: FnOnce(&T) + Send + 'static,
        };
        fn then_run<F>(f: F) -> () where {
            F: FnOnce() + Send + 'static,
        };
        fn then_run_async<F>(f: F) -> () where {
            F: FnOnce() + Send + 'static,
        };
        fn then_run_async_on<F>(executor: Arc<dyn Executor>, f: F) -> () where {
            F: FnOnce() + Send + 'static,
        };
        fn then_compose<U, F>(f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(&T) -> Node<U> + Send + 'static,
        };
        fn then_compose_async<U, F>(f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(&T) -> Node<U> + Send + 'static,
        };
        fn then_compose_async_on<U, F>(executor: Arc<dyn Executor>, f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(&T) -> Node<U> + Send + 'static,
        };
        fn handle<U, F>(f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(Result<&T, &Cause>) -> U + Send + 'static,
        };
        fn handle_async<U, F>(f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(Result<&T, &Cause>) -> U + Send + 'static,
        };
        fn handle_async_on<U, F>(executor: Arc<dyn Executor>, f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(Result<&T, &Cause>) -> U + Send + 'static,
        };
        fn when_complete<F>(f: F) -> T where {
            F: FnOnce(Result<&T, &Cause>) + Send + 'static,
        };
        fn when_complete_async<F>(f: F) -> T where {
            F: FnOnce(Result<&T, &Cause>) + Send + 'static,
        };
        fn when_complete_async_on<F>(executor: Arc<dyn Executor>, f: F) -> T where {
            F: FnOnce(Result<&T, &Cause>) + Send + 'static,
        };
        fn exceptionally<F>(f: F) -> T where {
            F: FnOnce(&Cause) -> T + Send + 'static,
        };
        fn exceptionally_async<F>(f: F) -> T where {
            F: FnOnce(&Cause) -> T + Send + 'static,
        };
        fn exceptionally_async_on<F>(executor: Arc<dyn Executor>, f: F) -> T where {
            F: FnOnce(&Cause) -> T + Send + 'static,
        };
        fn exceptionally_compose<F>(f: F) -> T where {
            F: FnOnce(&Cause) -> Node<T> + Send + 'static,
        };
        fn exceptionally_compose_async<F>(f: F) -> T where {
            F: FnOnce(&Cause) -> Node<T> + Send + 'static,
        };
        fn exceptionally_compose_async_on<F>(executor: Arc<dyn Executor>, f: F) -> T where {
            F: FnOnce(&Cause) -> Node<T> + Send + 'static,
        };

        // Fallible single-source stages
        fn try_then_apply<U, F>(f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(&T) -> Result<U, Cause> + Send + 'static,
        };
        fn try_then_apply_async<U, F>(f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(&T) -> Result<U, Cause> + Send + 'static,
        };
        fn try_then_apply_async_on<U, F>(executor: Arc<dyn Executor>, f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(&T) -> Result<U, Cause> + Send + 'static,
        };
        fn try_handle<U, F>(f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(Result<&T, &Cause>) -> Result<U, Cause> + Send + 'static,
        };
        fn try_handle_async<U, F>(f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(Result<&T, &Cause>) -> Result<U, Cause> + Send + 'static,
        };
        fn try_handle_async_on<U, F>(executor: Arc<dyn Executor>, f: F) -> U where {
            U: Send + Sync + 'static,
            F: FnOnce(Result<&T, &Cause>) -> Result<U, Cause> + Send + 'static,
        };
        fn try_when_complete<F>(f: F) -> T where {
            F: FnOnce(Result<&T, &Cause>) -> Result<(), Cause> + Send + 'static,
        };
        fn try_when_complete_async<F>(f: F) -> T where {
            F: FnOnce(Result<&T, &Cause>) -> Result<(), Cause> + Send + 'static,
        };
        fn try_when_complete_async_on<F>(executor: Arc<dyn Executor>, f: F) -> T where {
            F: FnOnce(Result<&T, &Cause>) -> Result<(), Cause> + Send + 'static,
        };
        fn try_exceptionally<F>(f: F) -> T where {
            F: FnOnce(&Cause) -> Result<T, Cause> + Send + 'static,
        };
        fn try_exceptionally_async<F>(f: F) -> T where {
            F: FnOnce(&Cause) -> Result<T, Cause> + Send + 'static,
        };
        fn try_exceptionally_async_on<F>(executor: Arc<dyn Executor>, f: F) -> T where {
            F: FnOnce(&Cause) -> Result<T, Cause> + Send + 'static,
        };

        // Two-source stages
        fn then_combine<U, V, F>(other: &Node<U>, f: F) -> V where {
            U: Send + Sync + 'static,
            V: Send + Sync + 'static,
            F: FnOnce(&T, &U) -> V + Send + 'static,
        };
        fn then_combine_async<U, V, F>(other: &Node<U>, f: F) -> V where {
            U: Send + Sync + 'static,
            V: Send + Sync + 'static,
            F: FnOnce(&T, &U) -> V + Send + 'static,
        };
        fn then_combine_async_on<U, V, F>(
            other: &Node<U>,
            executor: Arc<dyn Executor>,
            f: F,
        ) -> V where {
            U: Send + Sync + 'static,
            V: Send + Sync + 'static,
            F: FnOnce(&T, &U) -> V + Send + 'static,
        };
        fn then_accept_both<U, F>(other: &Node<U>, f: F) -> () where {
            U: Send + Sync + 'static,
            F: FnOnce(&T, &U) + Send + 'static,
        };
        fn then_accept_both_async<U, F>(other: &Node<U>, f: F) -> () where {
            U: Send + Sync + 'static,
            F: FnOnce(&T, &U) + Send + 'static,
        };
        fn then_accept_both_async_on<U, F>(
            other: &Node<U>,
            executor: Arc<dyn Executor>,
            f: F,
        ) -> () where {
            U: Send + Sync + 'static,
            F: FnOnce(&T, &U) + Send + 'static,
        };
        fn run_after_both<U, F>(other: &Node<U>, f: F) -> () where {
            U: Send + Sync + 'static,
            F: FnOnce() + Send + 'static,
        };
        fn run_after_both_async<U, F>(other: &Node<U>, f: F) -> () where {
            U: Send + Sync + 'static,
            F: FnOnce() + Send + 'static,
        };
        fn run_after_both_async_on<U, F>(
            other: &Node<U>,
            executor: Arc<dyn Executor>,
            f: F,
        ) -> () where {
            U: Send + Sync + 'static,
            F: FnOnce() + Send + 'static,
        };
        fn apply_to_either<V, F>(other: &Node<T>, f: F) -> V where {
            V: Send + Sync + 'static,
            F: FnOnce(&T) -> V + Send + 'static,
        };
        fn apply_to_either_async<V, F>(other: &Node<T>, f: F) -> V where {
            V: Send + Sync + 'static,
            F: FnOnce(&T) -> V + Send + 'static,
        };
        fn apply_to_either_async_on<V, F>(
            other: &Node<T>,
            executor: Arc<dyn Executor>,
            f: F,
        ) -> V where {
            V: Send + Sync + 'static,
            F: FnOnce(&T) -> V + Send + 'static,
        };
        fn accept_either<F>(other: &Node<T>, f: F) -> () where {
            F: FnOnce(&T) + Send + 'static,
        };
        fn accept_either_async<F>(other: &Node<T>, f: F) -> () where {
            F: FnOnce(&T) + Send + 'static,
        };
        fn accept_either_async_on<F>(
            other: &Node<T>,
            executor: Arc<dyn Executor>,
            f: F,
        ) -> () where {
            F: FnOnce(&T) + Send + 'static,
        };
        fn run_after_either<U, F>(other: &Node<U>, f: F) -> () where {
            U: Send + Sync + 'static,
            F: FnOnce() + Send + 'static,
        };
        fn run_after_either_async<U, F>(other: &Node<U>, f: F) -> () where {
            U: Send + Sync + 'static,
            F: FnOnce() + Send + 'static,
        };
        fn run_after_either_async_on<U, F>(
            other: &Node<U>,
            executor: Arc<dyn Executor>,
            f: F,
        ) -> () where {
            U: Send + Sync + 'static,
            F: FnOnce() + Send + 'static,
        };
    }
}

impl<T: Clone + Send + Sync + 'static> MinimalNode<T> {
    /// See [`Node::join`].
    pub fn join(&self) -> Result<T, JoinError> {
        self.node.join()
    }

    /// See [`Node::get_now`].
    pub fn get_now(&self, value_if_absent: T) -> Result<T, JoinError> {
        self.node.get_now(value_if_absent)
    }
}

impl<T: Send + Sync + 'static> IntoFuture for MinimalNode<T> {
    type Output = Result<Arc<T>, JoinError>;
    type IntoFuture = StageFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.node.to_future()
    }
}

impl<T: Send + Sync + 'static> From<&MinimalNode<T>> for AnyNode {
    fn from(node: &MinimalNode<T>) -> Self {
        node.erase()
    }
}

impl<T> fmt::Display for MinimalNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.node, f)
    }
}

impl<T> fmt::Debug for MinimalNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MinimalNode").field(&self.node).finish()
    }
}
