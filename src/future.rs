//! Bridge from a node to `async` code.
//!
//! [`Node::to_future`] registers a dependent that forwards the outcome through a oneshot
//! channel, so awaiting never blocks a thread. A node can also be awaited directly:
//!
//! ```
//! use stagex::Node;
//!
//! # futures::executor::block_on(async {
//! let node: Node<u32> = Node::new();
//! let doubled = node.then_apply(|x| x * 2);
//! node.complete(21);
//! assert_eq!(*doubled.await.unwrap(), 42);
//! # });
//! ```

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::error::{Abandoned, Cause, JoinError};
use crate::node::{report_join, Node};
use crate::outcome::Settled;

/// Future resolving to a node's outcome, with the error convention of [`Node::join`].
///
/// Resolves with an [`Abandoned`] cause if the node is dropped while still pending.
#[must_use = "futures do nothing unless polled"]
pub struct StageFuture<T> {
    receiver: oneshot::Receiver<Settled<T>>,
}

impl<T> Future for StageFuture<T> {
    type Output = Result<Arc<T>, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| match received {
            Ok(outcome) => report_join(outcome),
            Err(oneshot::Canceled) => Err(JoinError::Completion(Cause::new(Abandoned))),
        })
    }
}

impl<T> std::fmt::Debug for StageFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageFuture").finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Node<T> {
    /// A future resolving once this node completes.
    ///
    /// The value is shared with the node, so no `Clone` bound is needed.
    pub fn to_future(&self) -> StageFuture<T> {
        let (sender, receiver) = oneshot::channel();
        self.on_settle(move |outcome| {
            // The future may have been dropped; nobody is waiting then
            let _ = sender.send(outcome.clone());
        });
        StageFuture { receiver }
    }
}

impl<T: Send + Sync + 'static> IntoFuture for Node<T> {
    type Output = Result<Arc<T>, JoinError>;
    type IntoFuture = StageFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.to_future()
    }
}
