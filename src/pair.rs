//! Two-source stages.
//!
//! - **Both** (`then_combine`, `then_accept_both`, `run_after_both`): fire once both sources
//!   completed. Each source's outcome is recorded under the stage's own lock; whichever
//!   source arrives second fires the stage.
//! - **Either** (`apply_to_either`, `accept_either`, `run_after_either`): fire once, for the
//!   first source to complete. Both registrations race to claim the stage; the loser is a
//!   no-op. Which source wins when both complete at nearly the same time is unspecified.
//!
//! The race is shared with [`any_of`](crate::any_of).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::executor::{Dispatch, Executor};
use crate::node::{Dependent, Node, Watchable};
use crate::outcome::{Failure, Settled};
use crate::stage::guarded;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

struct BothState<T, U, P> {
    left: Option<Settled<T>>,
    right: Option<Settled<U>>,
    first: Option<Side>,
    payload: Option<P>,
}

/// Collects the outcomes of two sources.
struct Both<T, U, P> {
    state: Mutex<BothState<T, U, P>>,
}

/// Both outcomes are in; everything needed to fire.
struct Ready<T, U, P> {
    left: Settled<T>,
    right: Settled<U>,
    first: Side,
    payload: P,
}

impl<T, U, P> Both<T, U, P> {
    fn new(payload: P) -> Self {
        Self {
            state: Mutex::new(BothState {
                left: None,
                right: None,
                first: None,
                payload: Some(payload),
            }),
        }
    }

    fn offer_left(&self, outcome: &Settled<T>) -> Option<Ready<T, U, P>> {
        let mut state = self.state.lock();
        state.left = Some(outcome.clone());
        state.first.get_or_insert(Side::Left);
        Self::take_ready(&mut state)
    }

    fn offer_right(&self, outcome: &Settled<U>) -> Option<Ready<T, U, P>> {
        let mut state = self.state.lock();
        state.right = Some(outcome.clone());
        state.first.get_or_insert(Side::Right);
        Self::take_ready(&mut state)
    }

    fn take_ready(state: &mut BothState<T, U, P>) -> Option<Ready<T, U, P>> {
        if state.left.is_none() || state.right.is_none() {
            return None;
        }
        Some(Ready {
            left: state.left.take()?,
            right: state.right.take()?,
            first: state.first?,
            payload: state.payload.take()?,
        })
    }
}

impl<T, U, P> Ready<T, U, P> {
    /// The failure the stage completes with, if either source failed.
    ///
    /// A single failing source wins. If both failed, the one observed first wins and the
    /// other's cause is attached as suppressed.
    fn failure(&self) -> Option<Failure> {
        match (&self.left, &self.right) {
            (Ok(_), Ok(_)) => None,
            (Err(left), Ok(_)) => Some(left.propagated()),
            (Ok(_), Err(right)) => Some(right.propagated()),
            (Err(left), Err(right)) => Some(match self.first {
                Side::Left => left.propagated().with_suppressed(right.cause().clone()),
                Side::Right => right.propagated().with_suppressed(left.cause().clone()),
            }),
        }
    }
}

/// State shared by the contenders of a race: the first one to fire claims the payload.
pub(crate) struct Race<P> {
    claimed: AtomicBool,
    payload: Mutex<Option<P>>,
    sources: Mutex<Vec<Weak<dyn Watchable>>>,
}

impl<P: Send> Race<P> {
    pub(crate) fn new(payload: P) -> Arc<Self> {
        Arc::new(Self {
            claimed: AtomicBool::new(false),
            payload: Mutex::new(Some(payload)),
            sources: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Register a contender on `source`.
    pub(crate) fn enter<T>(self: &Arc<Self>, source: &Node<T>, win: fn(&Settled<T>, P))
    where
        T: Send + Sync + 'static,
        P: 'static,
    {
        self.sources.lock().push(source.downgrade());
        source.attach(Box::new(Contender {
            race: Arc::clone(self),
            win,
        }));
    }

    fn claim(&self) -> Option<P> {
        if self.claimed.swap(true, Ordering::AcqRel) {
            return None;
        }
        let payload = self.payload.lock().take();

        // Losing contenders are dead now; drop them from sources that may never complete
        let sources = std::mem::take(&mut *self.sources.lock());
        for source in sources.iter().filter_map(Weak::upgrade) {
            source.purge();
        }
        payload
    }
}

struct Contender<T, P> {
    race: Arc<Race<P>>,
    win: fn(&Settled<T>, P),
}

impl<T, P: Send> Dependent<T> for Contender<T, P> {
    fn fire(self: Box<Self>, outcome: &Settled<T>) {
        if let Some(payload) = self.race.claim() {
            (self.win)(outcome, payload)
        }
    }

    fn is_live(&self) -> bool {
        !self.race.is_claimed()
    }
}

type EitherPayload<F, V> = (F, Dispatch, Node<V>);

fn apply_winner<T, V, F>(outcome: &Settled<T>, (f, dispatch, target): EitherPayload<F, V>)
where
    V: Send + Sync + 'static,
    T: Send + Sync + 'static,
    F: FnOnce(&T) -> V + Send + 'static,
{
    match outcome {
        Err(failure) => {
            target.settle(Err(failure.propagated()));
        }
        Ok(value) => {
            let value = Arc::clone(value);
            dispatch.run(target, move |target| {
                target.settle(guarded(|| f(&value)).map(Arc::new));
            });
        }
    }
}

fn run_winner<T, F>(outcome: &Settled<T>, (f, dispatch, target): EitherPayload<F, ()>)
where
    T: Send + Sync + 'static,
    F: FnOnce() + Send + 'static,
{
    match outcome {
        Err(failure) => {
            target.settle(Err(failure.propagated()));
        }
        Ok(_) => dispatch.run(target, move |target| {
            target.settle(guarded(f).map(Arc::new));
        }),
    }
}

impl<T: Send + Sync + 'static> Node<T> {
    fn bi_apply<U, V, F>(&self, other: &Node<U>, dispatch: Dispatch, f: F) -> Node<V>
    where
        U: Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: FnOnce(&T, &U) -> V + Send + 'static,
    {
        let target = self.new_incomplete();
        let both = Arc::new(Both::new((f, dispatch, target.clone())));

        fn fire<T, U, V, F>(ready: Ready<T, U, (F, Dispatch, Node<V>)>)
        where
            V: Send + Sync + 'static,
            T: Send + Sync + 'static,
            U: Send + Sync + 'static,
            F: FnOnce(&T, &U) -> V + Send + 'static,
        {
            let failure = ready.failure();
            let (f, dispatch, target) = ready.payload;
            match (failure, ready.left, ready.right) {
                (None, Ok(left), Ok(right)) => dispatch.run(target, move |target| {
                    target.settle(guarded(|| f(&left, &right)).map(Arc::new));
                }),
                (Some(failure), _, _) => {
                    target.settle(Err(failure));
                }
                // No failure means both sides completed normally
                (None, _, _) => {}
            }
        }

        let left = Arc::clone(&both);
        self.on_settle(move |outcome| {
            if let Some(ready) = left.offer_left(outcome) {
                fire(ready);
            }
        });
        other.on_settle(move |outcome| {
            if let Some(ready) = both.offer_right(outcome) {
                fire(ready);
            }
        });
        target
    }

    fn or_apply<V, F>(&self, other: &Node<T>, dispatch: Dispatch, f: F) -> Node<V>
    where
        V: Send + Sync + 'static,
        F: FnOnce(&T) -> V + Send + 'static,
    {
        let target = self.new_incomplete();
        let race = Race::new((f, dispatch, target.clone()));
        race.enter(self, apply_winner::<T, V, F>);
        if !race.is_claimed() {
            race.enter(other, apply_winner::<T, V, F>);
        }
        target
    }

    fn or_run<U, F>(&self, other: &Node<U>, dispatch: Dispatch, f: F) -> Node<()>
    where
        U: Send + Sync + 'static,
        F: FnOnce() + Send + 'static,
    {
        let target = self.new_incomplete();
        let race = Race::new((f, dispatch, target.clone()));
        race.enter(self, run_winner::<T, F>);
        if !race.is_claimed() {
            race.enter(other, run_winner::<U, F>);
        }
        target
    }

    /// Combine both values with `f` once this node and `other` completed normally.
    ///
    /// ```
    /// use stagex::Node;
    ///
    /// let width: Node<u32> = Node::new();
    /// let height: Node<u32> = Node::new();
    /// let area = width.then_combine(&height, |w, h| w * h);
    ///
    /// height.complete(4);
    /// width.complete(3);
    /// assert_eq!(area.join().unwrap(), 12);
    /// ```
    pub fn then_combine<U, V, F>(&self, other: &Node<U>, f: F) -> Node<V>
    where
        U: Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: FnOnce(&T, &U) -> V + Send + 'static,
    {
        self.bi_apply(other, Dispatch::Inline, f)
    }

    pub fn then_combine_async<U, V, F>(&self, other: &Node<U>, f: F) -> Node<V>
    where
        U: Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: FnOnce(&T, &U) -> V + Send + 'static,
    {
        self.bi_apply(other, self.async_dispatch(), f)
    }

    pub fn then_combine_async_on<U, V, F>(
        &self,
        other: &Node<U>,
        executor: Arc<dyn Executor>,
        f: F,
    ) -> Node<V>
    where
        U: Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: FnOnce(&T, &U) -> V + Send + 'static,
    {
        self.bi_apply(other, Dispatch::Async(executor), f)
    }

    /// Consume both values with `f` once this node and `other` completed normally.
    pub fn then_accept_both<U, F>(&self, other: &Node<U>, f: F) -> Node<()>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T, &U) + Send + 'static,
    {
        self.bi_apply(other, Dispatch::Inline, f)
    }

    pub fn then_accept_both_async<U, F>(&self, other: &Node<U>, f: F) -> Node<()>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T, &U) + Send + 'static,
    {
        self.bi_apply(other, self.async_dispatch(), f)
    }

    pub fn then_accept_both_async_on<U, F>(
        &self,
        other: &Node<U>,
        executor: Arc<dyn Executor>,
        f: F,
    ) -> Node<()>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T, &U) + Send + 'static,
    {
        self.bi_apply(other, Dispatch::Async(executor), f)
    }

    /// Run `f` once this node and `other` completed normally.
    pub fn run_after_both<U, F>(&self, other: &Node<U>, f: F) -> Node<()>
    where
        U: Send + Sync + 'static,
        F: FnOnce() + Send + 'static,
    {
        self.bi_apply(other, Dispatch::Inline, move |_, _| f())
    }

    pub fn run_after_both_async<U, F>(&self, other: &Node<U>, f: F) -> Node<()>
    where
        U: Send + Sync + 'static,
        F: FnOnce() + Send + 'static,
    {
        self.bi_apply(other, self.async_dispatch(), move |_, _| f())
    }

    pub fn run_after_both_async_on<U, F>(
        &self,
        other: &Node<U>,
        executor: Arc<dyn Executor>,
        f: F,
    ) -> Node<()>
    where
        U: Send + Sync + 'static,
        F: FnOnce() + Send + 'static,
    {
        self.bi_apply(other, Dispatch::Async(executor), move |_, _| f())
    }

    /// Transform the value of whichever of this node and `other` completes first.
    ///
    /// If that node failed, the stage fails with its failure; the other node's later outcome
    /// is ignored.
    pub fn apply_to_either<V, F>(&self, other: &Node<T>, f: F) -> Node<V>
    where
        V: Send + Sync + 'static,
        F: FnOnce(&T) -> V + Send + 'static,
    {
        self.or_apply(other, Dispatch::Inline, f)
    }

    pub fn apply_to_either_async<V, F>(&self, other: &Node<T>, f: F) -> Node<V>
    where
        V: Send + Sync + 'static,
        F: FnOnce(&T) -> V + Send + 'static,
    {
        self.or_apply(other, self.async_dispatch(), f)
    }

    pub fn apply_to_either_async_on<V, F>(
        &self,
        other: &Node<T>,
        executor: Arc<dyn Executor>,
        f: F,
    ) -> Node<V>
    where
        V: Send + Sync + 'static,
        F: FnOnce(&T) -> V + Send + 'static,
    {
        self.or_apply(other, Dispatch::Async(executor), f)
    }

    /// Consume the value of whichever of this node and `other` completes first.
    pub fn accept_either<F>(&self, other: &Node<T>, f: F) -> Node<()>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.or_apply(other, Dispatch::Inline, f)
    }

    pub fn accept_either_async<F>(&self, other: &Node<T>, f: F) -> Node<()>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.or_apply(other, self.async_dispatch(), f)
    }

    pub fn accept_either_async_on<F>(
        &self,
        other: &Node<T>,
        executor: Arc<dyn Executor>,
        f: F,
    ) -> Node<()>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.or_apply(other, Dispatch::Async(executor), f)
    }

    /// Run `f` once either this node or `other` completes first, if it completed normally.
    pub fn run_after_either<U, F>(&self, other: &Node<U>, f: F) -> Node<()>
    where
        U: Send + Sync + 'static,
        F: FnOnce() + Send + 'static,
    {
        self.or_run(other, Dispatch::Inline, f)
    }

    pub fn run_after_either_async<U, F>(&self, other: &Node<U>, f: F) -> Node<()>
    where
        U: Send + Sync + 'static,
        F: FnOnce() + Send + 'static,
    {
        self.or_run(other, self.async_dispatch(), f)
    }

    pub fn run_after_either_async_on<U, F>(
        &self,
        other: &Node<U>,
        executor: Arc<dyn Executor>,
        f: F,
    ) -> Node<()>
    where
        U: Send + Sync + 'static,
        F: FnOnce() + Send + 'static,
    {
        self.or_run(other, Dispatch::Async(executor), f)
    }
}
