use cl_probe::{
    lookup3,
    workloads::{hash, matvec},
};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

// CPU-Referenz für den Hash-Workload: 1024 Schlüssel à 100 Bytes
fn bench_hash_keys(c: &mut Criterion) {
    let keys = hash::fill_keys(1024 * hash::KEY_LEN);
    let mut group = c.benchmark_group("lookup3");
    group.throughput(Throughput::Bytes(keys.len() as u64));
    group.bench_function("hash_keys_1024x100", |b| {
        b.iter(|| lookup3::hash_keys(black_box(&keys), hash::KEY_LEN, 0))
    });
    group.finish();
}

fn bench_key_lengths(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup3_len");
    for len in [1_usize, 12, 13, 100, 4096] {
        let key = hash::fill_keys(len);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &key, |b, key| {
            b.iter(|| lookup3::hash(black_box(key), 0))
        });
    }
    group.finish();
}

fn bench_matvec_reference(c: &mut Criterion) {
    let (aa, b) = matvec::inputs(1024);
    c.bench_function("matvec_reference_1024", |bench| {
        bench.iter(|| matvec::reference(black_box(&aa), black_box(&b)))
    });
}

criterion_group!(benches, bench_hash_keys, bench_key_lengths, bench_matvec_reference);
criterion_main!(benches);
