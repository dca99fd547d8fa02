//! Tests that nodes can be awaited on any runtime

use std::future::Future;
use std::thread;
use std::time::Duration;

use test_case::test_case;

use crate::common::TestError;
use stagex::{JoinError, Node};

trait RuntimeTest {
    fn block_on<F: Future<Output = ()>>(self, future: F);
}

struct TokioRuntimeTest;

impl RuntimeTest for TokioRuntimeTest {
    fn block_on<F: Future<Output = ()>>(self, future: F) {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }
}

struct SmolRuntimeTest;

impl RuntimeTest for SmolRuntimeTest {
    fn block_on<F: Future<Output = ()>>(self, future: F) {
        smol::block_on(future)
    }
}

struct FuturesExecutorRuntimeTest;

impl RuntimeTest for FuturesExecutorRuntimeTest {
    fn block_on<F: Future<Output = ()>>(self, future: F) {
        futures::executor::block_on(future)
    }
}

struct PollsterRuntimeTest;

impl RuntimeTest for PollsterRuntimeTest {
    fn block_on<F: Future<Output = ()>>(self, future: F) {
        pollster::block_on(future)
    }
}

#[test_case(TokioRuntimeTest)]
#[test_case(SmolRuntimeTest)]
#[test_case(FuturesExecutorRuntimeTest)]
#[test_case(PollsterRuntimeTest)]
fn test_await_value_completed_from_thread(runtime: impl RuntimeTest) {
    runtime.block_on(async {
        let node: Node<i32> = Node::new();
        let doubled = node.then_apply(|x| x * 2);
        let completer = node.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            completer.complete(21);
        });
        assert_eq!(*doubled.await.unwrap(), 42);
    });
}

#[test_case(TokioRuntimeTest)]
#[test_case(SmolRuntimeTest)]
#[test_case(FuturesExecutorRuntimeTest)]
#[test_case(PollsterRuntimeTest)]
fn test_await_failure(runtime: impl RuntimeTest) {
    runtime.block_on(async {
        let node: Node<i32> = Node::failed(TestError("awaited"));
        match node.to_future().await {
            Err(JoinError::Completion(cause)) => {
                assert_eq!(cause.downcast_ref::<TestError>(), Some(&TestError("awaited")));
            }
            other => panic!("unexpected {other:?}"),
        }
    });
}

#[test_case(TokioRuntimeTest)]
#[test_case(SmolRuntimeTest)]
#[test_case(FuturesExecutorRuntimeTest)]
#[test_case(PollsterRuntimeTest)]
fn test_await_supplied_value(runtime: impl RuntimeTest) {
    runtime.block_on(async {
        let sum = Node::supply_async(|| (1..=10).sum::<u32>());
        assert_eq!(*sum.await.unwrap(), 55);
    });
}

#[tokio::test(flavor = "multi_thread")]
async fn test_join_set_of_nodes() {
    let sources: Vec<Node<u64>> = (0..8).map(|_| Node::new()).collect();
    let mut tasks = tokio::task::JoinSet::new();
    for source in &sources {
        tasks.spawn(source.then_apply(|x| x * x).to_future());
    }
    for (i, source) in sources.iter().enumerate() {
        source.complete(i as u64);
    }

    let mut total = 0;
    while let Some(result) = tasks.join_next().await {
        total += *result.unwrap().unwrap();
    }
    assert_eq!(total, (0..8).map(|i| i * i).sum::<u64>());
}
