//! Tests that finished work is released

use std::sync::Arc;

use stagex::{all_of, any_of, Node};

#[test]
fn test_fired_stage_drops_its_action() {
    let captured = Arc::new(String::from("big payload"));
    let held = Arc::clone(&captured);
    let source: Node<()> = Node::new();
    let stage = source.then_apply(move |_| held.len());
    assert_eq!(Arc::strong_count(&captured), 2);

    source.complete(());
    assert_eq!(stage.join().unwrap(), 11);
    assert_eq!(Arc::strong_count(&captured), 1);
}

#[test]
fn test_completed_chain_holds_no_upstream() {
    let value = Arc::new(0u8);
    let source: Node<Arc<u8>> = Node::new();
    let tail = source
        .then_apply(|v| Arc::clone(v))
        .then_apply(|v| Arc::strong_count(v));
    source.complete(Arc::clone(&value));
    drop(source);

    assert!(tail.join().unwrap() >= 2);
    assert_eq!(tail.dependent_count(), 0);
}

#[test]
fn test_dropping_pending_graph_releases_actions() {
    let captured = Arc::new(());
    let source: Node<i32> = Node::new();
    for _ in 0..10 {
        let held = Arc::clone(&captured);
        let _ = source.then_run(move || drop(held));
    }
    assert_eq!(Arc::strong_count(&captured), 11);
    drop(source);
    assert_eq!(Arc::strong_count(&captured), 1);
}

#[test]
fn test_repeated_either_against_never_completing_node() {
    let never: Node<u32> = Node::new();
    for i in 0..10_000 {
        let quick = Node::completed(i);
        let first = quick.apply_to_either(&never, |x| *x);
        let any = any_of([&never, &quick]);
        assert_eq!(first.join().unwrap(), i);
        assert_eq!(any.join().unwrap(), i);
    }
    assert_eq!(never.dependent_count(), 0);
}

#[test]
fn test_failed_all_of_releases_registrations() {
    let never: Node<u32> = Node::new();
    for _ in 0..1_000 {
        let failing: Node<u32> = Node::failed(crate::common::TestError("fast fail"));
        let all = all_of([&never, &failing]);
        assert!(all.is_completed_exceptionally());
    }
    assert_eq!(never.dependent_count(), 0);
}

#[test]
fn test_pending_list_is_swept_of_dead_registrations() {
    let never: Node<u32> = Node::new();
    let others: Vec<Node<u32>> = (0..64).map(|_| Node::new()).collect();
    // Register races against `never` while the other side is still pending
    let winners: Vec<Node<u32>> = others
        .iter()
        .map(|other| never.apply_to_either(other, |x| *x))
        .collect();
    assert_eq!(never.dependent_count(), 64);

    for (i, other) in others.iter().enumerate() {
        other.complete(i as u32);
    }
    for winner in &winners {
        assert!(winner.is_done());
    }
    assert_eq!(never.dependent_count(), 0);
}
