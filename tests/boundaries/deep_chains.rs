//! Tests for extremely deep dependency chains

use std::thread;

use crate::common::TestError;
use stagex::Node;

const DEPTH: usize = 100_000;

#[test]
fn test_deep_chain_completes_without_stack_overflow() {
    let source: Node<u64> = Node::new();
    let mut tail = source.clone();
    for _ in 0..DEPTH {
        tail = tail.then_apply(|x| x + 1);
    }
    source.complete(0);
    assert_eq!(tail.join().unwrap(), DEPTH as u64);
}

#[test]
fn test_deep_chain_failure_propagates() {
    let source: Node<u64> = Node::new();
    let mut tail = source.clone();
    for _ in 0..DEPTH {
        tail = tail.then_apply(|x| x + 1);
    }
    source.complete_exceptionally(TestError("bottom"));
    assert!(tail.is_completed_exceptionally());
}

#[test]
fn test_deep_compose_chain() {
    let source: Node<u64> = Node::new();
    let mut tail = source.clone();
    for _ in 0..10_000 {
        tail = tail.then_compose(|x| Node::completed(x + 1));
    }
    source.complete(0);
    assert_eq!(tail.join().unwrap(), 10_000);
}

#[test]
fn test_deep_chain_on_small_stack() {
    // Completion on a thread with a deliberately small stack
    let source: Node<u64> = Node::new();
    let mut tail = source.clone();
    for _ in 0..DEPTH {
        tail = tail.then_apply(|x| x + 1);
    }
    let completer = source.clone();
    thread::Builder::new()
        .stack_size(64 * 1024)
        .spawn(move || completer.complete(0))
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(tail.join().unwrap(), DEPTH as u64);
}

#[test]
fn test_wide_fanout() {
    let source: Node<u64> = Node::new();
    let leaves: Vec<Node<u64>> = (0..10_000)
        .map(|i| source.then_apply(move |x| x + i))
        .collect();
    source.complete(1);
    for (i, leaf) in leaves.iter().enumerate() {
        assert_eq!(leaf.join().unwrap(), 1 + i as u64);
    }
}
