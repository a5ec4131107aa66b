//! Scoring throughput: payload similarity dispatch and the combined
//! data + proximity score.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gravnet::config::kind_defaults;
use gravnet::node::{Node, NodeKind};
use gravnet::payload::{similarity, PayloadValue};
use gravnet::scoring;
use gravnet::Vec3;

fn bench_node(id: u64, kind: NodeKind, pos: Vec3, payload: PayloadValue) -> Node {
    Node {
        id,
        kind,
        addr: String::new(),
        pos,
        velocity: Vec3::zero(),
        gravity: 0.0,
        payload,
        neighbors: Vec::new(),
        neighbors_by_score: Vec::new(),
        is_anchor: kind.default_anchor(),
        attempts: 0,
        permissive_mode: false,
        history: Vec::new(),
        params: kind_defaults(kind),
    }
}

fn bench_similarity(c: &mut Criterion) {
    let text_a = PayloadValue::Text("the quick brown fox jumps over the lazy dog".into());
    let text_b = PayloadValue::Text("the quick brown cat sleeps under the lazy dog".into());
    c.bench_function("similarity/text_lcs", |b| {
        b.iter(|| similarity(black_box(&text_a), black_box(&text_b)))
    });

    let vec_a = PayloadValue::Vector((0..128).map(|i| i as f64).collect());
    let vec_b = PayloadValue::Vector((0..128).map(|i| (128 - i) as f64).collect());
    c.bench_function("similarity/vector_cosine", |b| {
        b.iter(|| similarity(black_box(&vec_a), black_box(&vec_b)))
    });
}

fn bench_score(c: &mut Criterion) {
    let a = bench_node(
        1,
        NodeKind::Block,
        Vec3::new(0.0, 0.0, 0.0),
        PayloadValue::Vector((0..64).map(|i| i as f64).collect()),
    );
    let b = bench_node(
        2,
        NodeKind::Sphere,
        Vec3::new(3.0, 4.0, 0.0),
        PayloadValue::Vector((0..64).map(|i| (i * 2) as f64).collect()),
    );
    c.bench_function("score/block_vs_sphere", |bencher| {
        bencher.iter(|| scoring::score(black_box(&a), black_box(&b)))
    });
}

criterion_group!(benches, bench_similarity, bench_score);
criterion_main!(benches);
