//! Aggregates over many nodes.
//!
//! - [`all_of`]: completes when every input completed normally, fails as soon as any fails
//! - [`any_of`]: completes with the first input outcome to arrive
//!
//! Neither keeps its target alive through inputs that never complete: once an aggregate has
//! fired, its remaining registrations are dead and are purged from the inputs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

#[cfg(feature = "tracing")]
use tracing::trace;

use crate::node::{AnyNode, Node, Watch, Watchable};
use crate::outcome::{Failure, Settled};
use crate::pair::Race;

/// Shared state of one `all_of` call.
struct Join {
    remaining: AtomicUsize,
    fired: AtomicBool,
    target: Mutex<Option<Node<()>>>,
    inputs: Vec<Weak<dyn Watchable>>,
}

impl Join {
    fn finish(&self, outcome: Settled<()>) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        let target = self.target.lock().take();
        if let Some(target) = target {
            target.settle(outcome);
        }
        for input in self.inputs.iter().filter_map(Weak::upgrade) {
            input.purge();
        }
    }
}

struct JoinWatch(Arc<Join>);

impl Watch for JoinWatch {
    fn notify(self: Box<Self>, outcome: Result<(), &Failure>) {
        match outcome {
            Err(failure) => self.0.finish(Err(failure.propagated())),
            Ok(()) => {
                if self.0.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    self.0.finish(Ok(Arc::new(())));
                }
            }
        }
    }

    fn is_live(&self) -> bool {
        !self.0.fired.load(Ordering::Acquire)
    }
}

/// A node completed once every input completed normally.
///
/// Fails as soon as any input fails, with that input's failure (wrapped), without waiting
/// for the others. With no inputs it is complete immediately. Inputs may have different
/// value types; pass them as [`AnyNode`]s.
///
/// ```
/// use stagex::{all_of, Node};
///
/// let a: Node<i32> = Node::new();
/// let b: Node<i32> = Node::new();
/// let both = all_of([&a, &b]);
///
/// a.complete(1);
/// assert!(!both.is_done());
/// b.complete(2);
/// assert!(both.join().is_ok());
/// ```
pub fn all_of<I>(nodes: I) -> Node<()>
where
    I: IntoIterator,
    I::Item: Into<AnyNode>,
{
    let inputs: Vec<AnyNode> = nodes.into_iter().map(Into::into).collect();
    let target = Node::new();
    if inputs.is_empty() {
        target.complete(());
        return target;
    }

    #[cfg(feature = "tracing")]
    trace!(node = target.id().0, inputs = inputs.len(), "all_of registered");

    let join = Arc::new(Join {
        remaining: AtomicUsize::new(inputs.len()),
        fired: AtomicBool::new(false),
        target: Mutex::new(Some(target.clone())),
        inputs: inputs.iter().map(|input| Arc::downgrade(&input.inner)).collect(),
    });
    for input in &inputs {
        if join.fired.load(Ordering::Acquire) {
            break;
        }
        input.inner.watch(Box::new(JoinWatch(Arc::clone(&join))));
    }
    target
}

fn first_outcome<T: Send + Sync + 'static>(outcome: &Settled<T>, target: Node<T>) {
    target.settle(outcome.clone().map_err(|failure| failure.propagated()));
}

/// A node completed with the outcome of whichever input completes first.
///
/// If some inputs are already complete, the first of them in iteration order is taken. The
/// value is shared with the input; a failure arrives wrapped. With no inputs the node never
/// completes.
///
/// ```
/// use stagex::{any_of, Node};
///
/// let slow: Node<&str> = Node::new();
/// let fast: Node<&str> = Node::new();
/// let first = any_of([&slow, &fast]);
///
/// fast.complete("fast");
/// slow.complete("slow");
/// assert_eq!(first.join().unwrap(), "fast");
/// ```
pub fn any_of<'a, T, I>(nodes: I) -> Node<T>
where
    T: Send + Sync + 'static,
    I: IntoIterator<Item = &'a Node<T>>,
{
    let inputs: Vec<&Node<T>> = nodes.into_iter().collect();
    let target = Node::new();

    if let Some(outcome) = inputs.iter().find_map(|input| input.settled()) {
        first_outcome(&outcome, target.clone());
        return target;
    }

    #[cfg(feature = "tracing")]
    trace!(node = target.id().0, inputs = inputs.len(), "any_of registered");

    let race = Race::new(target.clone());
    for input in inputs {
        if race.is_claimed() {
            break;
        }
        race.enter(input, first_outcome::<T>);
    }
    target
}
