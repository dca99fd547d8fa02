// Common test utilities and helpers for the test suite

#![allow(dead_code)]

use std::time::{Duration, Instant};

use stagex::{Cause, Node};

pub use stagex_test::{Calls, CountingExecutor, ManualExecutor, RejectingExecutor, TestError};

/// Install a test-writer subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The failure cause of `node`, if it completed exceptionally (cancellation excluded).
pub fn cause_of<T: Send + Sync + 'static>(node: &Node<T>) -> Option<Cause> {
    node.peek().failure().map(|failure| failure.cause().clone())
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
