//! Write path and decode throughput.
//!
//! Run with: `cargo bench`

use std::sync::Arc;

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use wsengine::protocol::wire::{self, DecodeRules};
use wsengine::protocol::{MessageAssembler, apply_mask};
use wsengine::{Config, Frame, QueueLimits, Role, WriteQueue};

// =============================================================================
// Write Queue Benchmarks
// =============================================================================

fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_queue");

    for batch in [1usize, 64, 1024] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("push_drain", batch), &batch, |b, &batch| {
            let queue = Arc::new(WriteQueue::new(QueueLimits::new(usize::MAX, batch)));
            let mut writer = queue.writer().unwrap();
            let frame = Frame::text("x".repeat(64));
            b.iter(|| {
                for _ in 0..batch {
                    queue.push(frame.clone()).unwrap();
                }
                while let Some(frame) = writer.try_next() {
                    black_box(frame);
                }
            });
        });
    }

    group.bench_function("push_rejected_full", |b| {
        let queue = WriteQueue::new(QueueLimits::new(usize::MAX, 1));
        queue.push(Frame::text("fill")).unwrap();
        let frame = Frame::text("over");
        b.iter(|| black_box(queue.push(frame.clone()).is_err()));
    });

    group.finish();
}

// =============================================================================
// Decode Benchmarks
// =============================================================================

fn masked_text(len: usize) -> BytesMut {
    let mut buf = BytesMut::new();
    wire::encode_frame(&Frame::text("a".repeat(len)), Some([0x37, 0xfa, 0x21, 0x3d]), &mut buf);
    buf
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let rules = DecodeRules::new(Role::Server, &Config::default());

    for size in [10usize, 1024, 64 * 1024] {
        let encoded = masked_text(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("masked_text", size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buf = encoded.clone();
                let raw = wire::decode(&mut buf, &rules).unwrap().unwrap();
                let mut assembler = MessageAssembler::new(Config::default().limits);
                black_box(assembler.push(raw).unwrap())
            });
        });
    }

    let mut payload = vec![0xABu8; 64 * 1024];
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("apply_mask_64kb", |b| {
        b.iter(|| apply_mask(black_box(&mut payload), [0x37, 0xfa, 0x21, 0x3d]));
    });

    group.finish();
}

criterion_group!(benches, bench_queue, bench_decode);
criterion_main!(benches);
