//! Tests with tracing feature enabled

use std::time::Duration;

use crate::common::{init_tracing, RejectingExecutor, TestError};
use stagex::{all_of, any_of, Node};

#[test]
fn test_tracing_with_subscriber() {
    init_tracing();

    let a: Node<i32> = Node::new();
    let b: Node<i32> = Node::new();
    let sum = a.then_combine(&b, |x, y| x + y);
    let first = any_of([&a, &b]);
    let all = all_of([&a, &b]);

    a.complete(2);
    b.complete(3);
    assert_eq!(sum.join().unwrap(), 5);
    assert_eq!(first.join().unwrap(), 2);
    all.join().unwrap();
}

#[test]
fn test_tracing_failure_paths() {
    init_tracing();

    let rejected = Node::completed(1).then_apply_async_on(RejectingExecutor::new(), |x| x + 1);
    assert!(rejected.is_completed_exceptionally());

    let panicked: Node<i32> = Node::completed(1).then_apply(|_| panic!("traced panic"));
    assert!(panicked.is_completed_exceptionally());

    let obtruded: Node<i32> = Node::failed(TestError("traced"));
    obtruded.obtrude_value(1);
    assert_eq!(obtruded.join().unwrap(), 1);

    let timed_out: Node<i32> = Node::new();
    timed_out.or_timeout(Duration::from_millis(5));
    assert!(timed_out.join().is_err());
}
