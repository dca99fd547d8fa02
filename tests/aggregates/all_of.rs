//! Tests for all_of

use crate::common::{cause_of, TestError};
use stagex::{all_of, AnyNode, Cause, Node};

#[test]
fn test_heterogeneous_inputs() {
    let id: Node<u64> = Node::new();
    let name: Node<String> = Node::new();
    let flags: Node<Vec<bool>> = Node::new();
    let all = all_of([id.erase(), name.erase(), flags.erase()]);

    name.complete("n".to_string());
    flags.complete(vec![true]);
    assert!(!all.is_done());
    id.complete(1);
    all.join().unwrap();
}

#[test]
fn test_fail_in_the_middle_completes_before_rest() {
    let a: Node<i32> = Node::new();
    let b: Node<i32> = Node::new();
    let c: Node<i32> = Node::new();
    let all = all_of([&a, &b, &c]);
    let e = Cause::new(TestError("E"));

    a.complete(1);
    c.complete_exceptionally(e.clone());
    assert!(all.is_completed_exceptionally());
    assert!(cause_of(&all).is_some_and(|cause| cause.ptr_eq(&e)));

    b.complete(2);
    assert!(cause_of(&all).is_some_and(|cause| cause.ptr_eq(&e)));
}

#[test]
fn test_zero_inputs_complete_immediately() {
    assert!(all_of(Vec::<AnyNode>::new()).is_done());
}

#[test]
fn test_large_fan_in() {
    let inputs: Vec<Node<usize>> = (0..1_000).map(|_| Node::new()).collect();
    let all = all_of(&inputs);
    for (i, input) in inputs.iter().enumerate().rev() {
        assert!(!all.is_done());
        input.complete(i);
    }
    all.join().unwrap();
}

#[test]
fn test_cancelled_input_fails_aggregate() {
    let a: Node<i32> = Node::new();
    let b: Node<i32> = Node::new();
    let all = all_of([&a, &b]);
    a.cancel(true);
    assert!(!all.is_cancelled());
    assert!(cause_of(&all).is_some_and(|c| c.is_cancellation()));
}
