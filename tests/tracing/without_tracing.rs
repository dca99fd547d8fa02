//! Tests that the library works correctly regardless of the tracing feature

use crate::common::TestError;
use stagex::{all_of, Node};

#[test]
fn test_basic_graph() {
    let a: Node<i32> = Node::new();
    let b = a.then_apply(|x| x * 10);
    let c = a.then_apply(|x| x + 1);
    let d = b.then_combine(&c, |x, y| x - y);

    a.complete(4);
    assert_eq!(d.join().unwrap(), 35);
}

#[test]
fn test_failing_graph() {
    let a: Node<i32> = Node::new();
    let b = a.then_apply(|x| x * 10);
    let all = all_of([&a, &b]);

    a.complete_exceptionally(TestError("plain"));
    assert!(all.is_completed_exceptionally());
    assert!(b.is_completed_exceptionally());
}
