//! Fan-out to several workers, then fan back in
//!
//! Run with: cargo run --example fan_in

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stagex::{all_of, any_of, Executor, Node, ThreadPerTask};

fn main() {
    let workers: Arc<dyn Executor> = Arc::new(ThreadPerTask::new().with_name_prefix("worker"));

    let shards: Vec<Node<u64>> = (1..=4)
        .map(|shard| {
            Node::supply_async_on(Arc::clone(&workers), move || {
                thread::sleep(Duration::from_millis(10 * shard));
                (1..=shard * 1_000).sum()
            })
        })
        .collect();

    let first = any_of(&shards).then_apply(|sum| format!("first shard finished with {sum}"));
    let all = all_of(&shards);
    let total = shards
        .iter()
        .skip(1)
        .fold(shards[0].clone(), |acc, shard| acc.then_combine(shard, |a, b| a + b));

    println!("{}", first.join().unwrap());
    all.join().unwrap();
    println!("all {} shards done, total = {}", shards.len(), total.join().unwrap());
}
