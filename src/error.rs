//! Error types for completion stages.
//!
//! A failed node stores a [`Cause`]: the raw, shared error object that made it fail.
//! The blocking accessors convert a stored failure into their own error convention:
//! [`Node::join`](crate::Node::join) reports [`JoinError`], [`Node::get`](crate::Node::get)
//! reports [`GetError`]. Both carry the same raw cause.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The raw cause of a failure.
///
/// Cheap to clone; clones share the same underlying error object, so the identity of a
/// cause survives propagation through any number of stages (see [`Cause::ptr_eq`]).
#[derive(Clone)]
pub struct Cause(Arc<dyn StdError + Send + Sync + 'static>);

impl Cause {
    /// Wrap an error as a cause.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Whether both causes are the very same error object.
    pub fn ptr_eq(&self, other: &Cause) -> bool {
        // Compare data pointers only; vtable pointers may differ across codegen units.
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    /// Attempt to view the cause as a concrete error type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Whether the cause is `E`.
    pub fn is<E>(&self) -> bool
    where
        E: StdError + 'static,
    {
        self.0.is::<E>()
    }

    /// Whether the cause is a [`CancellationError`].
    pub fn is_cancellation(&self) -> bool {
        self.is::<CancellationError>()
    }

    /// Borrow the underlying error.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }
}

impl<E> From<E> for Cause
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Cause::new(error)
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

/// Marker cause of a cancelled node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stage was cancelled")]
pub struct CancellationError;

/// A blocking wait or a scheduled timeout elapsed before the node completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timed out after {waited:?} waiting for completion")]
pub struct TimeoutError {
    pub waited: Duration,
}

/// An executor refused to accept a job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("execution rejected: {reason}")]
pub struct RejectedExecution {
    pub reason: String,
}

impl RejectedExecution {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A stage action panicked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stage action panicked: {message}")]
pub struct Panicked {
    pub message: String,
}

impl Panicked {
    /// Build from a payload returned by [`std::panic::catch_unwind`].
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Self { message }
    }
}

/// Every handle to a pending node was dropped, so it can never complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("node was dropped before it completed")]
pub struct Abandoned;

/// Error reported by [`Node::join`](crate::Node::join) and
/// [`Node::get_now`](crate::Node::get_now).
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum JoinError {
    /// The node completed exceptionally; carries the raw cause.
    #[error("stage completed exceptionally: {0}")]
    Completion(Cause),
    /// The node itself was cancelled; carries the stored [`CancellationError`] cause.
    #[error("{0}")]
    Cancelled(Cause),
}

impl JoinError {
    /// The raw cause behind this error, the same object the node stores.
    pub fn cause(&self) -> Cause {
        match self {
            JoinError::Completion(cause) | JoinError::Cancelled(cause) => cause.clone(),
        }
    }
}

/// Error reported by [`Node::get`](crate::Node::get) and
/// [`Node::get_timeout`](crate::Node::get_timeout).
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum GetError {
    /// The node completed exceptionally; carries the raw cause.
    #[error("execution failed: {0}")]
    Execution(Cause),
    /// The node itself was cancelled; carries the stored [`CancellationError`] cause.
    #[error("{0}")]
    Cancelled(Cause),
    /// The wait elapsed; the node is still pending.
    #[error(transparent)]
    Timeout(TimeoutError),
}
