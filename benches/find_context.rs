use std::sync::Arc;

use commkit::comm::{CommRegistry, Communicator};
use commkit::core::types::ContextId;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn registry(n: u32) -> CommRegistry {
    let mut reg = CommRegistry::new();
    for i in 0..n {
        let node = Arc::new(Communicator::intra(ContextId(0x10_0000 + 4 * i), 0, 2));
        let roots = Arc::new(Communicator::intra(ContextId(0x20_0000 + 4 * i), 0, 2));
        reg.add(Arc::new(
            Communicator::intra(ContextId(4 * i), 0, 8)
                .with_node_comm(node)
                .with_node_roots_comm(roots),
        ));
    }
    reg
}

fn bench_find_by_context_id(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_by_context_id");
    for n in [16u32, 256, 4096] {
        let reg = registry(n);
        // oldest communicator's node-roots collective id: worst case
        let worst = ContextId(0x20_0001);
        group.bench_with_input(BenchmarkId::new("oldest", n), &worst, |b, id| {
            b.iter(|| reg.find_by_context_id(black_box(*id)).is_some())
        });
        group.bench_with_input(BenchmarkId::new("miss", n), &ContextId(3), |b, id| {
            b.iter(|| reg.find_by_context_id(black_box(*id)).is_none())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find_by_context_id);
criterion_main!(benches);
