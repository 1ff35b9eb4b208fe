use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rigreg_3d::{transforms::axis_angle_to_rotation_matrix, PointCloud, RigidTransform};
use rigreg_icp::{fit_transformation, IcpConfig, IcpRegistration};
use rigreg_linalg::{JacobiSvd, NalgebraSvd};
use std::hint::black_box;

fn random_points(rng: &mut StdRng, num_points: usize) -> Vec<[f64; 3]> {
    (0..num_points)
        .map(|_| {
            [
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
            ]
        })
        .collect()
}

fn small_motion() -> RigidTransform {
    let rotation = axis_angle_to_rotation_matrix(&[1.0, 2.0, 3.0], 0.02)
        .unwrap_or(glam::DMat3::IDENTITY);
    RigidTransform::from_rotation_translation(rotation, DVec3::new(0.05, -0.03, 0.04))
}

fn bench_fit_transformation(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_transformation");
    let mut rng = StdRng::seed_from_u64(0);

    for num_points in [100, 10_000, 100_000] {
        let points_src = random_points(&mut rng, num_points);
        let points_dst = small_motion().transform_points(&points_src);

        group.bench_with_input(
            BenchmarkId::new("nalgebra", num_points),
            &num_points,
            |b, _| {
                let svd = NalgebraSvd::default();
                b.iter(|| black_box(fit_transformation(&svd, &points_src, &points_dst)))
            },
        );

        group.bench_with_input(BenchmarkId::new("jacobi", num_points), &num_points, |b, _| {
            let svd = JacobiSvd::default();
            b.iter(|| black_box(fit_transformation(&svd, &points_src, &points_dst)))
        });
    }
    group.finish();
}

fn bench_icp(c: &mut Criterion) {
    let mut group = c.benchmark_group("icp");
    group.sample_size(20);
    let mut rng = StdRng::seed_from_u64(1);

    for num_points in [1_000, 20_000] {
        let reference = PointCloud::new(random_points(&mut rng, num_points));
        let source = PointCloud::new(small_motion().inverse().transform_points(reference.points()));
        let config = IcpConfig {
            max_iterations: 10,
            convergence_tolerance: 0.0,
            absolute_residual_threshold: 0.0,
            ..Default::default()
        };

        group.bench_with_input(BenchmarkId::new("register", num_points), &num_points, |b, _| {
            b.iter(|| {
                let registration = IcpRegistration::new(&reference, config.clone());
                black_box(registration.and_then(|r| r.register(&source)))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fit_transformation, bench_icp);
criterion_main!(benches);
