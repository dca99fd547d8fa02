//! Bounding how long a result may take
//!
//! Run with: cargo run --example timeouts

use std::sync::Arc;
use std::time::Duration;

use stagex::{default_executor, delayed_executor, Node, TimeoutError};

fn main() {
    let slow_executor = Arc::new(delayed_executor(Duration::from_millis(200), default_executor()));

    // Fails with a timeout: the answer arrives too late
    let strict = Node::supply_async_on(slow_executor.clone(), || 42).or_timeout(Duration::from_millis(50));
    match strict.join() {
        Ok(v) => println!("strict: {v}"),
        Err(e) if e.cause().is::<TimeoutError>() => println!("strict: gave up ({})", e.cause()),
        Err(e) => println!("strict: failed ({e})"),
    }

    // Falls back to a default value instead
    let lenient = Node::supply_async_on(slow_executor, || 42)
        .complete_on_timeout(-1, Duration::from_millis(50));
    println!("lenient: {}", lenient.join().unwrap());

    // A fast answer wins over its timeout
    let fast = Node::supply_async(|| 7).or_timeout(Duration::from_secs(1));
    println!("fast: {}", fast.join().unwrap());
}
