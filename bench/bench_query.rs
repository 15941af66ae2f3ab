//! Compares a single lazy key lookup against the cost of eagerly
//! materializing an entire document (spec's "lazy is cheaper than eager"
//! design goal, turned into a measurable benchmark).

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use xjson::Root;

fn wide_document(width: usize) -> Vec<u8> {
    let mut out = String::from("{");
    for i in 0..width {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!(r#""field{i}":{{"n":{i},"label":"item-{i}"}}"#));
    }
    out.push('}');
    out.into_bytes()
}

fn fully_materialize(node: &xjson::Node) {
    node.for_each(|_key, child| {
        let _ = child.string();
        true
    });
}

fn bench_lazy_single_key(c: &mut Criterion) {
    let bytes = wide_document(500);
    c.bench_function("lazy_single_key_access", |b| {
        b.iter(|| {
            let root = Root::parse(black_box(bytes.clone())).unwrap();
            let v = root.node().get("field250").get("n");
            black_box(v.int())
        })
    });
}

fn bench_full_materialize(c: &mut Criterion) {
    let bytes = wide_document(500);
    c.bench_function("full_document_materialize", |b| {
        b.iter(|| {
            let root = Root::parse(black_box(bytes.clone())).unwrap();
            fully_materialize(root.node());
            black_box(root.node().get("field250").get("n").int())
        })
    });
}

criterion_group!(benches, bench_lazy_single_key, bench_full_materialize);
criterion_main!(benches);
