//! Composable completion stages
//!
//! A push-based, single-assignment future with a graph of dependent computations. A
//! [`Node`] is completed exactly once, by any thread, with a value, a failure, or a
//! cancellation. Stages registered on it (transforms, consumers, combiners, recovery
//! handlers, aggregates) are themselves nodes, and fire when the nodes they depend on
//! complete.
//!
//! # Features
//!
//! - **Single assignment**: among racing completers exactly one wins
//! - **Push-based propagation**: completing a node runs its dependents, which complete theirs,
//!   iteratively, so chains of any depth never grow the stack
//! - **Explicit dispatch**: every stage runs inline, on the node's default executor, or on an
//!   executor you pass in; the crate never spawns work of its own accord
//! - **Failure propagation with identity**: a failure travels downstream wrapped once, and
//!   always carries the original [`Cause`] object
//! - **Panics become failures**: a panicking action fails its stage instead of unwinding into
//!   whichever thread happened to run it
//! - **Runtime-agnostic**: any `Fn(Job) -> Result<(), RejectedExecution>` is an [`Executor`],
//!   and any node can be `.await`ed
//!
//! # Quick Start
//!
//! ```
//! use stagex::{all_of, Node};
//!
//! let price: Node<u32> = Node::new();
//! let quantity: Node<u32> = Node::new();
//!
//! let total = price.then_combine(&quantity, |p, q| p * q);
//! let receipt = total
//!     .then_apply(|t| format!("total: {t}"))
//!     .exceptionally(|cause| format!("no total: {cause}"));
//! let everything = all_of([price.erase(), quantity.erase()]);
//!
//! price.complete(3);
//! quantity.complete(4);
//!
//! assert_eq!(receipt.join().unwrap(), "total: 12");
//! assert!(everything.is_done());
//! ```
//!
//! # Core Concepts
//!
//! ## Completion
//!
//! [`Node::complete`], [`Node::complete_exceptionally`] and [`Node::cancel`] each try to move
//! a pending node to its terminal state and report whether they did. A completed node never
//! changes again, except through the explicit overrides [`Node::obtrude_value`] and
//! [`Node::obtrude_exception`], which do not re-fire dependents that already ran.
//!
//! ## Stages
//!
//! Single-source stages (`then_apply`, `then_accept`, `then_run`, `then_compose`, `handle`,
//! `when_complete`, `exceptionally`, `exceptionally_compose`), two-source stages
//! (`then_combine`, `then_accept_both`, `run_after_both`, `apply_to_either`,
//! `accept_either`, `run_after_either`) and the aggregates [`all_of`] and [`any_of`]. Each
//! stage also has `_async` and `_async_on` forms.
//!
//! ## Failures
//!
//! A failed node holds a [`Failure`]: the raw [`Cause`], whether it was wrapped by
//! propagation, and any suppressed causes. Stages that only consume values skip their action
//! and fail with the upstream failure. `handle`, `when_complete` and the `exceptionally`
//! family receive the raw cause. The `try_` forms of `then_apply`, `handle`,
//! `when_complete` and `exceptionally` take actions returning `Result<_, Cause>`, and an `Err`
//! fails the stage with that cause. [`Node::join`] and [`Node::get`] report the raw cause too,
//! and only report [`JoinError::Cancelled`] / [`GetError::Cancelled`] for a node that was
//! itself cancelled.
//!
//! ## Read-only views
//!
//! [`Node::minimal`] returns a [`MinimalNode`]: a handle that can register stages and observe
//! the outcome but cannot complete, cancel or obtrude the node. [`Node::completed_stage`] and
//! [`Node::failed_stage`] create such views directly.
//!
//! ## Waiting
//!
//! [`Node::wait`], [`Node::join`], [`Node::get`] and [`Node::get_timeout`] block the calling
//! thread; [`Node::to_future`] (or awaiting a node) does not. [`Node::or_timeout`] and
//! [`Node::complete_on_timeout`] bound how long a node may stay pending.
//!
//! # Optional Tracing Support
//!
//! With the `tracing` feature, registrations are logged at TRACE, completions, obtrusions and
//! rejected dispatch at DEBUG, and panicking actions at ERROR. Without it the logging code is
//! not compiled at all.
//!
//! ```toml
//! [dependencies]
//! stagex = { version = "0.1", features = ["tracing"] }
//! ```
//!
//! The `tokio` feature makes `tokio::runtime::Handle` an [`Executor`] that runs jobs on the
//! runtime's blocking pool.

mod aggregate;
mod delay;
mod error;
mod executor;
mod future;
mod minimal;
mod node;
mod outcome;
mod pair;
mod propagate;
mod stage;
mod types;

// Public re-exports
pub use aggregate::{all_of, any_of};
pub use delay::{delayed_executor, DelayedExecutor};
pub use error::{
    Abandoned, CancellationError, Cause, GetError, JoinError, Panicked, RejectedExecution,
    TimeoutError,
};
pub use executor::{default_executor, Executor, Inline, Job, ThreadPerTask};
pub use future::StageFuture;
pub use minimal::MinimalNode;
pub use node::{AnyNode, Node};
pub use outcome::{Failure, Outcome};
pub use types::NodeId;
