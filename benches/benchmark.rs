// Performance benchmarks for featurization, blocking and search
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use linkx::{
    BlockIndex, ComparatorRegistry, FieldDeclaration, FieldSchema, FieldValue, Matcher, MemoryBlockIndex, Predicate,
    PredicateKind, Record, RecordId, RecordSet, Scorer, TrainedModel,
};
use rand::prelude::*;
use rand::rngs::StdRng;

const STREETS: &[&str] = &["main", "oak", "elm", "pine", "lake shore", "maple", "cedar", "washington"];
const SUFFIXES: &[&str] = &["st", "street", "ave", "avenue", "rd", "road", "dr", "blvd"];

fn random_address(rng: &mut StdRng) -> String {
    format!(
        "{} {} {}",
        rng.random_range(1..2000),
        STREETS[rng.random_range(0..STREETS.len())],
        SUFFIXES[rng.random_range(0..SUFFIXES.len())]
    )
}

fn generate_set(prefix: &str, size: usize, seed: u64) -> RecordSet {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size)
        .map(|i| {
            Record::from_pairs(
                RecordId::tagged(prefix, i as u64),
                [("address", FieldValue::from(random_address(&mut rng)))],
            )
        })
        .collect()
}

fn model() -> TrainedModel {
    let schema = FieldSchema::new(
        vec![FieldDeclaration::string("address")],
        &ComparatorRegistry::new(),
    )
    .unwrap();
    let scorer = Scorer {
        weights: vec![10.0],
        missing_weights: vec![0.0],
        bias: -5.0,
    };
    let predicates = vec![
        Predicate::new("address", PredicateKind::FirstToken),
        Predicate::new("address", PredicateKind::Prefix(5)),
    ];
    TrainedModel::new(schema, scorer, predicates, 0.5).unwrap()
}

fn benchmark_featurize(c: &mut Criterion) {
    let model = model();
    let set = generate_set("a", 2, 1);
    let pair: Vec<_> = set.iter().cloned().collect();

    c.bench_function("featurize_pair", |b| {
        b.iter(|| model.featurize(black_box(&pair[0]), black_box(&pair[1])))
    });
}

fn benchmark_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    let predicates = model().predicates().to_vec();

    for size in [1_000, 10_000].iter() {
        let reference = generate_set("canonical", *size, 7);
        group.bench_with_input(BenchmarkId::new("memory", size), size, |b, _| {
            let index = MemoryBlockIndex::new();
            b.iter(|| index.build(black_box(&predicates), black_box(&reference)).unwrap());
        });
    }
    group.finish();
}

fn benchmark_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    for size in [1_000, 10_000].iter() {
        let reference = generate_set("canonical", *size, 7);
        let queries = generate_set("messy", 100, 8);
        let mut matcher = Matcher::new(model());
        matcher.index(&reference).unwrap();

        group.bench_with_input(BenchmarkId::new("gazetteer", size), size, |b, _| {
            b.iter(|| matcher.search(black_box(&queries)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_featurize, benchmark_index_build, benchmark_search);
criterion_main!(benches);
