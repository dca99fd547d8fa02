//! Tests for forced overrides

use crate::common::{Calls, TestError};
use stagex::{GetError, Node, Outcome};

#[test]
fn test_obtrude_value_after_every_terminal_state() {
    let completed = Node::completed(1);
    let failed: Node<i32> = Node::failed(TestError("was failed"));
    let cancelled: Node<i32> = Node::new();
    cancelled.cancel(true);

    for node in [completed, failed, cancelled] {
        node.obtrude_value(9);
        assert!(matches!(node.peek(), Outcome::Value(v) if *v == 9));
        assert_eq!(node.get_now(0).unwrap(), 9);
        assert_eq!(node.join().unwrap(), 9);
        assert_eq!(node.get().unwrap(), 9);
    }
}

#[test]
fn test_obtrude_exception_replaces_value() {
    let node = Node::completed(1);
    node.obtrude_exception(TestError("obtruded"));
    assert!(node.is_completed_exceptionally());
    assert!(!node.is_cancelled());
    match node.get() {
        Err(GetError::Execution(cause)) => {
            assert_eq!(cause.downcast_ref::<TestError>(), Some(&TestError("obtruded")));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_obtrude_on_pending_node_fires_dependents() {
    let node: Node<i32> = Node::new();
    let stage = node.then_apply(|x| x * 3);
    node.obtrude_value(2);
    assert_eq!(stage.join().unwrap(), 6);
}

#[test]
fn test_obtrude_after_completion_does_not_refire() {
    let calls = Calls::new();
    let node: Node<i32> = Node::new();
    let counted = calls.clone();
    let stage = node.then_apply(move |x| {
        counted.hit();
        *x
    });

    node.complete(1);
    node.obtrude_value(2);
    assert_eq!(calls.count(), 1);
    assert_eq!(stage.join().unwrap(), 1);
    assert_eq!(node.then_apply(|x| *x).join().unwrap(), 2);
}
