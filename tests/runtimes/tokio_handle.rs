//! Tests for running stages on a tokio runtime

use std::sync::Arc;
use std::time::Duration;

use stagex::{Executor, GetError, Node, RejectedExecution};

#[test]
fn test_handle_is_an_executor() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .build()
        .unwrap();
    let executor: Arc<dyn Executor> = Arc::new(runtime.handle().clone());

    let source: Node<u32> = Node::with_executor(executor);
    let stage = source
        .then_apply_async(|x| x + 1)
        .then_combine_async(&Node::completed(10), |a, b| a * b);
    source.complete(1);
    assert_eq!(stage.join().unwrap(), 20);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_await_stage_running_on_current_runtime() {
    let executor: Arc<dyn Executor> = Arc::new(tokio::runtime::Handle::current());
    let stage = Node::supply_async_on(executor, || "from the blocking pool");
    assert_eq!(*stage.await.unwrap(), "from the blocking pool");
}

#[test]
fn test_stage_on_shut_down_runtime_fails() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .build()
        .unwrap();
    let handle = runtime.handle().clone();
    drop(runtime);

    let stage = Node::supply_async_on(Arc::new(handle), || 7);
    match stage.get_timeout(Duration::from_secs(5)) {
        Err(GetError::Execution(cause)) => assert!(cause.is::<RejectedExecution>()),
        other => panic!("unexpected {other:?}"),
    }
}
