//! Long sequential chains

use criterion::{BenchmarkId, Criterion};
use stagex::Node;

pub fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain");

    for depth in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                let source: Node<u64> = Node::new();
                let mut tail = source.clone();
                for _ in 0..depth {
                    tail = tail.then_apply(|x| x + 1);
                }
                source.complete(0);
                tail.join().unwrap()
            });
        });
    }

    group.bench_function("compose_1000", |b| {
        b.iter(|| {
            let source: Node<u64> = Node::new();
            let mut tail = source.clone();
            for _ in 0..1_000 {
                tail = tail.then_compose(|x| Node::completed(x + 1));
            }
            source.complete(0);
            tail.join().unwrap()
        });
    });

    group.finish();
}
