//! Outcome of a completion node.
//!
//! - **Outcome\<T\>**: public snapshot of a node (`Pending`, `Value`, `Failed`, `Cancelled`)
//! - **Failure**: a raw [`Cause`] plus the propagation wrapper flag and suppressed causes
//! - **Settled\<T\>**: the internal terminal representation shared with dependents

use std::sync::Arc;

use crate::error::{CancellationError, Cause};

/// Terminal state as stored inside a node and handed to its dependents.
///
/// Values are Arc-wrapped once so fan-out to any number of dependents never clones user data.
pub(crate) type Settled<T> = Result<Arc<T>, Failure>;

/// Snapshot of a node's state, as returned by [`Node::peek`](crate::Node::peek).
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// Not yet complete.
    Pending,
    /// Completed normally.
    Value(T),
    /// Completed exceptionally (including a propagated cancellation).
    Failed(Failure),
    /// The node itself was cancelled.
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    /// The value, if completed normally.
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The failure, if completed exceptionally but not cancelled.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl<T> Outcome<Arc<T>> {
    pub(crate) fn from_settled(settled: &Settled<T>) -> Self {
        match settled {
            Ok(value) => Outcome::Value(Arc::clone(value)),
            Err(failure) if failure.is_cancellation() => Outcome::Cancelled,
            Err(failure) => Outcome::Failed(failure.clone()),
        }
    }
}

/// An exceptional completion.
///
/// `cause` is always the raw error. `wrapped` records whether the failure was re-packaged by
/// propagation through a dependent stage; wrapping never nests, so a failure that travels
/// through many stages is wrapped exactly once and keeps the same raw cause object.
#[derive(Debug, Clone)]
pub struct Failure {
    cause: Cause,
    wrapped: bool,
    suppressed: Vec<Cause>,
}

impl Failure {
    /// A failure stored directly on a node, as by `complete_exceptionally`.
    pub(crate) fn raw(cause: Cause) -> Self {
        Self {
            cause,
            wrapped: false,
            suppressed: Vec::new(),
        }
    }

    /// A failure produced by a dependent stage, already carrying one wrapper layer.
    pub(crate) fn wrapped(cause: Cause) -> Self {
        Self {
            cause,
            wrapped: true,
            suppressed: Vec::new(),
        }
    }

    pub(crate) fn cancellation() -> Self {
        Self::raw(Cause::new(CancellationError))
    }

    /// This failure as seen one hop downstream.
    pub(crate) fn propagated(&self) -> Self {
        Self {
            cause: self.cause.clone(),
            wrapped: true,
            suppressed: self.suppressed.clone(),
        }
    }

    pub(crate) fn with_suppressed(mut self, cause: Cause) -> Self {
        if !cause.ptr_eq(&self.cause) {
            self.suppressed.push(cause);
        }
        self
    }

    /// The raw cause.
    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    /// Whether this failure was wrapped by propagation through a dependent stage.
    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    /// Causes attached while this failure took precedence over them.
    pub fn suppressed(&self) -> &[Cause] {
        &self.suppressed
    }

    /// A cancellation stored directly on the node (not one propagated from upstream).
    pub(crate) fn is_cancellation(&self) -> bool {
        !self.wrapped && self.cause.is_cancellation()
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.wrapped {
            write!(f, "completion failed: {}", self.cause)
        } else {
            std::fmt::Display::fmt(&self.cause, f)
        }
    }
}
