//! Reconciliation benchmarks over a wide list.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use arbor_core::host::{Host, MemoryHost};
use arbor_core::vdom::{Reconciler, VElement, VNode};
use arbor_core::Config;

fn list(len: usize, selected: usize) -> Vec<VNode> {
    vec![VElement::new("ul")
        .children((0..len).map(|i| {
            VElement::new("li")
                .attr("class", if i == selected { "item selected" } else { "item" })
                .child(format!("row {i}"))
        }))
        .into()]
}

fn setup(len: usize) -> (MemoryHost, Reconciler) {
    let mut host = MemoryHost::new();
    let container = host.create_element("section");
    let mut reconciler = Reconciler::new(container, "section", Config::default());
    reconciler.render(&mut host, &list(len, 0));
    host.take_ops();
    (host, reconciler)
}

fn bench_unchanged(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_unchanged");
    for len in [100, 1_000] {
        let (mut host, mut reconciler) = setup(len);
        let tree = list(len, 0);
        group.bench_with_input(BenchmarkId::from_parameter(len), &tree, |b, tree| {
            b.iter(|| reconciler.render(&mut host, black_box(tree)));
        });
    }
    group.finish();
}

fn bench_moving_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_moving_selection");
    for len in [100, 1_000] {
        let (mut host, mut reconciler) = setup(len);
        let trees: Vec<Vec<VNode>> = (0..8).map(|i| list(len, i * len / 8)).collect();
        let mut next = 0;
        group.bench_function(BenchmarkId::from_parameter(len), |b| {
            b.iter(|| {
                reconciler.render(&mut host, black_box(&trees[next]));
                next = (next + 1) % trees.len();
                host.take_ops();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_unchanged, bench_moving_selection);
criterion_main!(benches);
