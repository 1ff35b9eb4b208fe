use criterion::{criterion_group, criterion_main, Criterion};
use glam::{DMat3, DVec3};
use rigreg_linalg::svd::{JacobiSvd, NalgebraSvd, Svd3};
use std::hint::black_box;

fn bench_svd3(c: &mut Criterion) {
    let mut group = c.benchmark_group("svd3");

    let a = DMat3::from_cols(
        DVec3::new(1.0, 4.0, 7.0),
        DVec3::new(2.0, 5.0, 8.0),
        DVec3::new(3.0, 6.0, 10.0),
    );

    let nalgebra_svd = NalgebraSvd::default();
    group.bench_function("nalgebra", |b| {
        b.iter(|| black_box(nalgebra_svd.svd3(black_box(&a))))
    });

    let jacobi_svd = JacobiSvd::default();
    group.bench_function("jacobi", |b| {
        b.iter(|| black_box(jacobi_svd.svd3(black_box(&a))))
    });

    group.finish();
}

criterion_group!(benches, bench_svd3);
criterion_main!(benches);
