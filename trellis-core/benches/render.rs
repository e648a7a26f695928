//! Rendering throughput for wide and deep trees.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trellis_core::events::{Handler, Reply};
use trellis_core::tree::Node;

fn table(rows: usize) -> Node {
    let click = Handler::new("Table.select", |_| Ok(Reply::None));
    Node::new("table").class("grid").children((0..rows).map(|i| {
        Node::new("tr")
            .attr("data-row", i.to_string())
            .child(Node::with("td", i))
            .child(Node::with("td", format!("row <{i}>")))
            .child(Node::with("td", Node::with("button", "select").on_click(click.clone())))
    }))
}

fn nested(depth: usize) -> Node {
    (0..depth).fold(Node::with("span", "leaf"), |inner, level| {
        Node::new("div").class(format!("level-{level}")).child(inner)
    })
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    for rows in [10, 100, 1000] {
        let tree = table(rows);
        group.bench_with_input(BenchmarkId::new("table", rows), &tree, |b, tree| {
            b.iter(|| black_box(tree.render()))
        });
    }
    let deep = nested(200);
    group.bench_function("nested_200", |b| b.iter(|| black_box(deep.render())));
    group.finish();
}

fn bench_bound_handlers(c: &mut Criterion) {
    let tree = table(500);
    c.bench_function("bound_handlers_500", |b| {
        b.iter(|| black_box(tree.bound_handlers().len()))
    });
}

criterion_group!(benches, bench_render, bench_bound_handlers);
criterion_main!(benches);
