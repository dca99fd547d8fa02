//! Tests for where stage actions run

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use test_case::test_case;

use crate::common::{cause_of, Calls, CountingExecutor, ManualExecutor, RejectingExecutor};
use stagex::{default_executor, Executor, Inline, Node, RejectedExecution, ThreadPerTask};

#[test_case(Arc::new(Inline); "inline")]
#[test_case(Arc::new(ThreadPerTask::new().with_name_prefix("dispatch-test")); "thread per task")]
#[test_case(default_executor(); "default")]
#[test_case(CountingExecutor::inline(); "counting")]
fn test_async_stages_complete_on_any_executor(executor: Arc<dyn Executor>) {
    let source: Node<i32> = Node::with_executor(executor);
    let applied = source.then_apply_async(|x| x + 1);
    let composed = applied.then_compose_async(|x| Node::completed(x * 10));
    let handled = composed.handle_async(|r| r.map(|v| *v).unwrap_or(0));
    let observed = handled.when_complete_async(|_| {});

    source.complete(1);
    assert_eq!(observed.get_timeout(Duration::from_secs(5)).unwrap(), 20);
}

#[test]
fn test_inline_stage_runs_on_completing_thread() {
    let source: Node<()> = Node::new();
    let stage = source.then_apply(|_| thread::current().id());
    let completer = {
        let source = source.clone();
        thread::spawn(move || {
            source.complete(());
            thread::current().id()
        })
    };
    let completing_thread = completer.join().unwrap();
    assert_eq!(stage.join().unwrap(), completing_thread);
}

#[test]
fn test_inline_stage_on_completed_node_runs_on_registering_thread() {
    let stage = Node::completed(()).then_apply(|_| thread::current().id());
    assert_eq!(stage.join().unwrap(), thread::current().id());
}

#[test]
fn test_async_stage_runs_on_named_executor_thread() {
    let executor = Arc::new(ThreadPerTask::new().with_name_prefix("report-worker"));
    let stage = Node::completed(()).then_apply_async_on(executor.clone(), |_| {
        thread::current().name().map(str::to_string)
    });
    let name = stage.join().unwrap().unwrap_or_default();
    assert!(name.starts_with("report-worker-"), "ran on {name}");
    assert_eq!(executor.spawned(), 1);
}

#[test]
fn test_manual_executor_defers_action_until_run() {
    let executor = ManualExecutor::new();
    let source: Node<i32> = Node::new();
    let stage = source.then_apply_async_on(executor.clone(), |x| x + 1);

    source.complete(1);
    assert!(!stage.is_done());
    assert_eq!(executor.pending(), 1);

    assert_eq!(executor.run_all(), 1);
    assert_eq!(stage.join().unwrap(), 2);
}

#[test]
fn test_rejection_fails_target_without_running_action() {
    let executor = RejectingExecutor::new();
    let calls = Calls::new();
    let counted = calls.clone();
    let stage = Node::completed(1).then_apply_async_on(executor.clone(), move |x| {
        counted.hit();
        x + 1
    });

    assert_eq!(executor.rejected(), 1);
    assert_eq!(calls.count(), 0);
    let cause = cause_of(&stage).unwrap();
    assert!(cause.is::<RejectedExecution>());
    assert!(stage.peek().failure().unwrap().is_wrapped());

    // The rejection propagates like any other failure
    let downstream = stage.then_apply(|x| x * 2);
    assert!(cause_of(&downstream).is_some_and(|c| c.ptr_eq(&cause)));
}

#[test]
fn test_supply_async_rejected_completes_exceptionally() {
    let executor = RejectingExecutor::new();
    let node: Node<i32> = Node::supply_async_on(executor, || 1);
    assert!(cause_of(&node).is_some_and(|c| c.is::<RejectedExecution>()));
}

#[test]
fn test_failure_propagation_never_touches_executor() {
    let executor = CountingExecutor::inline();
    let source: Node<i32> = Node::new();
    let stages = [
        source.then_apply_async_on(executor.clone(), |x| *x),
        source
            .then_accept_async_on(executor.clone(), |_| {})
            .then_apply(|_| 0),
        source.then_compose_async_on(executor.clone(), |x| Node::completed(*x)),
        source.apply_to_either_async_on(&Node::new(), executor.clone(), |x| *x),
        source.then_combine_async_on(&Node::completed(1), executor.clone(), |a, b| a + b),
    ];
    let passthrough = source.copy().exceptionally_async_on(executor.clone(), |_| 0);
    let skipped = Node::completed(5).exceptionally_async_on(executor.clone(), |_| 0);

    source.complete_exceptionally(crate::common::TestError("no dispatch"));
    for stage in &stages {
        assert!(stage.is_completed_exceptionally());
    }
    assert_eq!(executor.submitted(), 1, "only the recovery action is submitted");
    assert_eq!(passthrough.join().unwrap(), 0);
    assert_eq!(skipped.join().unwrap(), 5);
}
