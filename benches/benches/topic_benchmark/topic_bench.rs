use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use topicbus::{sanitize, Topic};

const SHORT: &str = "home";
const TERMINATED: &str = "sensors/temperature/";
const INVALID: &str = "This is a topic";

fn make_topic(segments: usize) -> String {
    (0..segments)
        .map(|i| format!("segment-{i}"))
        .collect::<Vec<_>>()
        .join("/")
}

fn bench_sanitize_cases(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize");
    for (name, raw) in [("short", SHORT), ("terminated", TERMINATED), ("invalid", INVALID)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), raw, |b, raw| {
            b.iter(|| black_box(sanitize(black_box(raw))))
        });
    }
    group.finish();
}

fn bench_parse_by_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("Topic::parse");
    for segments in [1usize, 8, 64] {
        let raw = make_topic(segments);
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(segments), &raw, |b, raw| {
            b.iter(|| black_box(Topic::parse(black_box(raw))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sanitize_cases, bench_parse_by_length);
criterion_main!(benches);
