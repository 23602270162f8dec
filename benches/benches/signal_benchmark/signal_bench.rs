use std::hint::black_box;

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, Criterion};
use serde::{Deserialize, Serialize};
use topicbus::{
    subscriber::signal::{Ack, FilterCommand, Signal},
    Event, MsgPack,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Reading {
    device: String,
    origin: i64,
    values: Vec<f64>,
}

fn bench_signal_frames(c: &mut Criterion) {
    let command = Signal::Command {
        seq: 42,
        command: FilterCommand::Subscribe(b"sensors/temperature/".to_vec()),
    };
    let frame = command.encode();
    let ack = Ack { seq: 42, errno: 0 }.encode();

    c.bench_function("Signal::encode command", |b| {
        b.iter(|| black_box(black_box(&command).encode()))
    });
    c.bench_function("Signal::decode command", |b| {
        b.iter(|| black_box(Signal::decode(black_box(&frame))))
    });
    c.bench_function("Signal::decode shutdown", |b| {
        b.iter(|| black_box(Signal::decode(black_box(b"shutdown"))))
    });
    c.bench_function("Ack::decode", |b| b.iter(|| black_box(Ack::decode(black_box(&ack)))));
}

fn bench_event_codecs(c: &mut Criterion) {
    let raw = Bytes::from(vec![7u8; 512]);
    let reading = MsgPack(Reading {
        device: "Random-Float-Generator01".to_string(),
        origin: 1_700_000_000,
        values: (0..32).map(f64::from).collect(),
    });
    let encoded = reading.encode().unwrap_or_default();

    c.bench_function("Bytes::encode 512B", |b| b.iter(|| black_box(black_box(&raw).encode())));
    c.bench_function("MsgPack::encode reading", |b| {
        b.iter(|| black_box(black_box(&reading).encode()))
    });
    c.bench_function("MsgPack::decode reading", |b| {
        b.iter(|| black_box(MsgPack::<Reading>::decode(black_box(&encoded))))
    });
}

criterion_group!(benches, bench_signal_frames, bench_event_codecs);
criterion_main!(benches);
