use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use snowlink::clock::SystemClock;
use snowlink::services::ShortCodeAllocator;
use snowlink::utils::base62;
use snowlink::utils::id_generator::Snowflake;

fn generator() -> Snowflake {
    let epoch = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Snowflake::new(SystemClock, epoch).unwrap()
}

fn bench_encode(c: &mut Criterion) {
    c.bench_function("base62 encode", |b| {
        b.iter(|| base62::encode(black_box(23_456_789_012_345)))
    });
}

fn bench_generate(c: &mut Criterion) {
    let snowflake = generator();
    c.bench_function("snowflake generate + encode", |b| {
        b.iter(|| base62::encode(base62::reduce(snowflake.generate().unwrap())))
    });
}

fn bench_allocate_batch(c: &mut Criterion) {
    let allocator = ShortCodeAllocator::new(Arc::new(generator()), 32);
    let urls: Vec<String> = (0..1_000)
        .map(|i| format!("https://bench.example/{}", i))
        .collect();
    let existing = HashMap::new();

    c.bench_function("allocate batch of 1000", |b| {
        b.iter_batched(
            HashSet::new,
            |mut known| allocator.allocate_batch(&urls, &existing, &mut known).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_encode, bench_generate, bench_allocate_batch);
criterion_main!(benches);
