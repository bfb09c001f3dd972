//! Criterion benchmarks for the ring buffer.
//!
//! On the host, every critical section takes the global lock of `critical-section`'s `std`
//! implementation, so these numbers are an upper bound of what a PRIMASK-based implementation
//! costs on the target.


use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use ue_ring_buffer::RingBuffer;


fn bench_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer");
    group.throughput(Throughput::Elements(1));

    group.bench_function("push_pop_cycle", |b| {
        let mut storage = [0u8; 256];
        let mut buf = RingBuffer::new(&mut storage);
        let mut i = 0u8;
        b.iter(|| {
            buf.push(black_box(i));
            black_box(buf.pop());
            i = i.wrapping_add(1);
        });
    });

    group.bench_function("push_full", |b| {
        let mut storage = [0u8; 256];
        let mut buf = RingBuffer::new(&mut storage);
        while buf.push(0) {
        }
        b.iter(|| black_box(buf.push(black_box(1))));
    });

    group.bench_function("pop_empty", |b| {
        let mut storage = [0u8; 256];
        let mut buf = RingBuffer::new(&mut storage);
        b.iter(|| black_box(buf.pop()));
    });

    group.finish();
}

fn bench_fill_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_drain");

    for size in [16usize, 256, 4096] {
        group.throughput(Throughput::Elements((size - 1) as u64));
        group.bench_function(format!("halves_{}", size), |b| {
            let mut storage = vec![0u8; size];
            let mut buf = RingBuffer::new(&mut storage);
            let (mut producer, mut consumer) = buf.split();
            b.iter(|| {
                let mut i = 0u8;
                while producer.push(i) {
                    i = i.wrapping_add(1);
                }
                for byte in consumer.drain() {
                    black_box(byte);
                }
            });
        });
    }

    group.finish();
}


criterion_group!(benches, bench_push_pop, bench_fill_drain);
criterion_main!(benches);
