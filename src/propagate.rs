//! Per-thread propagation drain.
//!
//! Completing a node fires its dependents, which complete their own nodes, which fire theirs.
//! Done recursively, a long chain would need one stack frame group per stage. Instead each
//! thread keeps a queue of pending propagation work: while a drain is running on the current
//! thread, follow-up work is appended to it and processed iteratively by the outermost loop.
//!
//! Only the firing of dependents is queued. A node's own outcome is always stored
//! synchronously, so a value is observable the moment `complete` returns.

use std::cell::RefCell;
use std::collections::VecDeque;

type Work = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<Option<VecDeque<Work>>> = const { RefCell::new(None) };
}

// Restores the enclosing drain (or none) even if a work item unwinds
struct DrainGuard {
    saved: Option<Option<VecDeque<Work>>>,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            let _ = QUEUE.try_with(|queue| *queue.borrow_mut() = saved);
        }
    }
}

/// Run `work` in a fresh drain, then run everything it queued, before returning.
///
/// Any drain already active on this thread is set aside and resumed afterwards.
pub(crate) fn drain(work: impl FnOnce() + 'static) {
    let saved = QUEUE.with(|queue| queue.replace(Some(VecDeque::new())));
    let _guard = DrainGuard { saved: Some(saved) };

    work();
    while let Some(next) = QUEUE.with(|queue| {
        queue
            .borrow_mut()
            .as_mut()
            .and_then(VecDeque::pop_front)
    }) {
        next();
    }
}

/// Queue `work` on the drain active on this thread, or run it in a new drain.
pub(crate) fn defer(work: impl FnOnce() + 'static) {
    let work: Work = Box::new(work);
    let leftover = QUEUE.with(|queue| match queue.borrow_mut().as_mut() {
        Some(pending) => {
            pending.push_back(work);
            None
        }
        None => Some(work),
    });
    if let Some(work) = leftover {
        drain(work);
    }
}

/// Whether a drain is running on this thread.
#[cfg(test)]
pub(crate) fn is_draining() -> bool {
    QUEUE.with(|queue| queue.borrow().is_some())
}
