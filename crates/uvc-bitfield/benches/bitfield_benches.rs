use criterion::{Criterion, criterion_group, criterion_main};
use uvc_bitfield::{BitField, extract, insert, set_bits, weight};

fn benchmark_extract(c: &mut Criterion) {
    let data = [0x2Cu8, 0x01, 0xFE, 0xFF, 0x10, 0x20, 0x30, 0x40];

    c.bench_function("extract u16 aligned", |b| {
        b.iter(|| std::hint::black_box(extract(std::hint::black_box(&data), 0, 16, false)));
    });

    c.bench_function("extract i32 unaligned", |b| {
        b.iter(|| std::hint::black_box(extract(std::hint::black_box(&data), 3, 32, true)));
    });

    let red = BitField::new(16, 16).signed();
    c.bench_function("BitField extract i16", |b| {
        b.iter(|| std::hint::black_box(red.extract(std::hint::black_box(&data))));
    });
}

fn benchmark_insert(c: &mut Criterion) {
    c.bench_function("insert u16 aligned", |b| {
        let mut data = [0u8; 8];
        b.iter(|| {
            insert(&mut data, 0, 16, std::hint::black_box(300));
            std::hint::black_box(&data);
        });
    });

    c.bench_function("insert 10 bits unaligned", |b| {
        let mut data = [0xFFu8; 8];
        b.iter(|| {
            insert(&mut data, 5, 10, std::hint::black_box(0x2A5));
            std::hint::black_box(&data);
        });
    });
}

fn benchmark_bitmap(c: &mut Criterion) {
    let bitmap = [0xFFu8, 0x7F, 0x03];

    c.bench_function("bitmap weight", |b| {
        b.iter(|| std::hint::black_box(weight(std::hint::black_box(&bitmap))));
    });

    c.bench_function("bitmap set_bits", |b| {
        b.iter(|| std::hint::black_box(set_bits(std::hint::black_box(&bitmap)).sum::<usize>()));
    });
}

criterion_group!(benches, benchmark_extract, benchmark_insert, benchmark_bitmap);
criterion_main!(benches);
