//! One source, many dependents

use criterion::{BenchmarkId, Criterion};
use stagex::Node;

pub fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");

    for width in [10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| {
                let source: Node<Vec<u64>> = Node::new();
                let leaves: Vec<Node<usize>> =
                    (0..width).map(|_| source.then_apply(|v| v.len())).collect();
                // Every leaf shares the same value; nothing is cloned
                source.complete(vec![0; 1_024]);
                leaves.iter().map(|leaf| leaf.join().unwrap()).sum::<usize>()
            });
        });
    }

    group.finish();
}
