//! Bit cursor throughput: single bits and multi-bit fields.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use libio_core::stdio::{MemoryHandle, SeekOrigin, Stream};

const BITS: u64 = 1 << 20;

fn bench_put_bit(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_bit");
    group.throughput(Throughput::Elements(BITS));
    group.bench_function("alternating", |b| {
        b.iter(|| {
            let mut s = Stream::from_handle(MemoryHandle::new(), "bench", "wb").unwrap();
            for i in 0..BITS {
                s.put_bit(i & 1 == 1).unwrap();
            }
            s.close().unwrap();
        });
    });
    group.finish();
}

fn bench_fields(c: &mut Criterion) {
    let mut group = c.benchmark_group("bit_fields");
    for width in [3u32, 8, 13, 32, 64] {
        let fields = BITS / u64::from(width);
        group.throughput(Throughput::Elements(fields));
        group.bench_with_input(BenchmarkId::new("put", width), &width, |b, &width| {
            let mask = if width == 64 { u64::MAX } else { (1 << width) - 1 };
            b.iter(|| {
                let mut s = Stream::from_handle(MemoryHandle::new(), "bench", "wb").unwrap();
                for i in 0..fields {
                    s.put_bits(i.wrapping_mul(0x9E37_79B9_7F4A_7C15) & mask, width)
                        .unwrap();
                }
                s.close().unwrap();
            });
        });

        let encoded = MemoryHandle::new();
        let mut out = Stream::from_handle(encoded.clone(), "bench", "wb").unwrap();
        for i in 0..fields {
            out.put_bits(i, width).unwrap();
        }
        out.close().unwrap();
        let mut input = Stream::from_handle(encoded, "bench", "rb").unwrap();
        group.bench_with_input(BenchmarkId::new("get", width), &width, |b, &width| {
            b.iter(|| {
                input.seek(0, SeekOrigin::Start).unwrap();
                let mut acc = 0u64;
                for _ in 0..fields {
                    acc ^= input.get_bits(width).unwrap();
                }
                black_box(acc)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_put_bit, bench_fields);
criterion_main!(benches);
