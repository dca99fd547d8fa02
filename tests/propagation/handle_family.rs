//! Tests for stages that see both outcomes

use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{cause_of, Calls, TestError};
use stagex::{Cause, Node, Panicked};

fn describe(calls: &Calls) -> impl FnOnce(Result<&i32, &Cause>) -> String + Send + 'static {
    let calls = calls.clone();
    move |result| {
        calls.hit();
        match result {
            Ok(v) => format!("value {v}"),
            Err(cause) if cause.is_cancellation() => "cancelled".to_string(),
            Err(cause) => format!("failed: {cause}"),
        }
    }
}

#[test]
fn test_handle_runs_exactly_once_for_each_outcome() {
    let calls = Calls::new();

    let ok: Node<i32> = Node::new();
    let failed: Node<i32> = Node::new();
    let cancelled: Node<i32> = Node::new();
    let on_ok = ok.handle(describe(&calls));
    let on_failed = failed.handle(describe(&calls));
    let on_cancelled = cancelled.handle(describe(&calls));

    ok.complete(1);
    failed.complete_exceptionally(TestError("h"));
    cancelled.cancel(true);

    assert_eq!(on_ok.join().unwrap(), "value 1");
    assert_eq!(on_failed.join().unwrap(), "failed: test error: h");
    assert_eq!(on_cancelled.join().unwrap(), "cancelled");
    assert_eq!(calls.count(), 3);
}

#[test]
fn test_handle_receives_raw_cause_downstream() {
    let ex = Cause::new(TestError("raw"));
    let source: Node<i32> = Node::new();
    let expected = ex.clone();
    let same = source
        .then_apply(|x| x + 1)
        .handle(move |result| result.err().is_some_and(|c| c.ptr_eq(&expected)));
    source.complete_exceptionally(ex);
    assert!(same.join().unwrap());
}

#[test]
fn test_when_complete_source_failure_takes_precedence() {
    let ex1 = Cause::new(TestError("ex1"));
    let f: Node<i32> = Node::new();
    let g = f.when_complete(|_| panic!("ex2"));
    f.complete_exceptionally(ex1.clone());

    let failure = g.peek().failure().cloned().unwrap();
    assert!(failure.cause().ptr_eq(&ex1));
    assert_eq!(failure.suppressed().len(), 1);
    assert_eq!(
        failure.suppressed()[0]
            .downcast_ref::<Panicked>()
            .map(|p| p.message.as_str()),
        Some("ex2")
    );
}

#[test]
fn test_when_complete_observes_and_passes_through() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let f: Node<i32> = Node::new();
    let g = f.when_complete(move |result| log.lock().push(result.map(|v| *v).ok()));
    f.complete(3);

    assert_eq!(g.join().unwrap(), 3);
    assert_eq!(*seen.lock(), vec![Some(3)]);
}

#[test]
fn test_when_complete_action_failure_after_success() {
    let g = Node::completed(3).when_complete(|_| panic!("observer"));
    assert!(cause_of(&g).is_some_and(|c| c.is::<Panicked>()));
}

#[test]
fn test_exceptionally_recovers_from_upstream_chain() {
    let source: Node<i32> = Node::new();
    let recovered = source
        .then_apply(|x| x * 2)
        .exceptionally(|cause| if cause.is::<TestError>() { -1 } else { -2 });
    source.complete_exceptionally(TestError("recover me"));
    assert_eq!(recovered.join().unwrap(), -1);
}

#[test]
fn test_exceptionally_compose_with_pending_fallback() {
    let fallback: Node<i32> = Node::new();
    let handoff = fallback.clone();
    let recovered = Node::<i32>::failed(TestError("x")).exceptionally_compose(move |_| handoff);
    assert!(!recovered.is_done());
    fallback.complete(4);
    assert_eq!(recovered.join().unwrap(), 4);
}
