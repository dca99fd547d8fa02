//! Tests for registrations racing with completion

use std::sync::{Arc, Barrier};
use std::thread;

use crate::common::Calls;
use stagex::Node;

#[test]
fn test_no_dependent_lost_while_completing() {
    const PER_THREAD: usize = 500;

    for _ in 0..20 {
        let node: Node<u32> = Node::new();
        let calls = Calls::new();
        let barrier = Arc::new(Barrier::new(3));

        let registrants: Vec<_> = (0..2)
            .map(|_| {
                let node = node.clone();
                let calls = calls.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (0..PER_THREAD)
                        .map(|_| {
                            let calls = calls.clone();
                            node.then_accept(move |_| calls.hit())
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let completer = {
            let node = node.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                node.complete(1)
            })
        };

        assert!(completer.join().unwrap());
        for registrant in registrants {
            for stage in registrant.join().unwrap() {
                stage.join().unwrap();
            }
        }
        assert_eq!(calls.count(), 2 * PER_THREAD);
    }
}

#[test]
fn test_registration_from_inside_a_dependent() {
    let node: Node<i32> = Node::new();
    let inner_stage = Arc::new(parking_lot::Mutex::new(None));
    let slot = Arc::clone(&inner_stage);
    let registering = node.clone();
    let outer = node.then_run(move || {
        // The node is already complete; this fires immediately
        *slot.lock() = Some(registering.then_apply(|x| x + 1));
    });

    node.complete(1);
    outer.join().unwrap();
    let inner = inner_stage.lock().take().unwrap();
    assert_eq!(inner.join().unwrap(), 2);
}

#[test]
fn test_stages_complete_across_threads() {
    let source: Node<u64> = Node::new();
    let branches: Vec<Node<u64>> = (0..16)
        .map(|i| source.then_apply_async(move |x| x * i))
        .collect();
    let total = branches
        .iter()
        .skip(1)
        .fold(branches[0].clone(), |acc, next| acc.then_combine(next, |a, b| a + b));

    source.complete(2);
    assert_eq!(total.join().unwrap(), (0..16).map(|i| 2 * i).sum::<u64>());
}
