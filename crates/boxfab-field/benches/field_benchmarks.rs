//! Benchmarks for boxfab-field.
//!
//! Run with: cargo bench -p boxfab-field
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p boxfab-field -- --save-baseline main
//! 2. After changes: cargo bench -p boxfab-field -- --baseline main

use boxfab_field::{
    Box3D, BoxList, DescentParams, EnergyField, ScalarGrid, engine::expand_boxes,
};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::Point3;

// =============================================================================
// Fixtures
// =============================================================================

fn wavy_grid(n: usize) -> ScalarGrid {
    let max = (n - 1) as i32;
    ScalarGrid::from_fn([n, n, n], [0, 0, 0], [max, max, max], |p| {
        (0.3 * p.x).sin() * (0.2 * p.y).cos() + 0.02 * p.z
    })
    .unwrap()
}

fn seed_row(count: usize, span: f64) -> BoxList {
    (0..count)
        .map(|i| {
            let x = 2.0 + (i as f64 * 0.37) % span;
            Box3D::new(Point3::new(x, 3.0, 3.0), Point3::new(x + 3.0, 6.0, 7.0)).unwrap()
        })
        .collect()
}

// =============================================================================
// Sampling
// =============================================================================

fn bench_sampling(c: &mut Criterion) {
    let grid = wavy_grid(33);
    let p = Point3::new(11.3, 17.8, 5.25);
    let mut group = c.benchmark_group("sampling");

    group.bench_function("trilinear", |b| {
        b.iter(|| grid.sample(black_box(&p)))
    });
    group.bench_function("tricubic", |b| {
        b.iter(|| grid.sample_tricubic(black_box(&p)))
    });
    group.bench_function("tricubic_with_gradient", |b| {
        b.iter(|| grid.tricubic(black_box(&p)))
    });

    group.finish();
}

// =============================================================================
// Energy
// =============================================================================

fn bench_energy(c: &mut Criterion) {
    let grid = wavy_grid(33);
    let field = EnergyField::new(&grid);
    let bx = Box3D::new(Point3::new(4.2, 5.1, 3.3), Point3::new(12.7, 9.9, 15.4)).unwrap();
    let mut group = c.benchmark_group("energy");

    group.bench_function("energy", |b| b.iter(|| field.energy(black_box(&bx))));
    group.bench_function("gradient", |b| b.iter(|| field.gradient(black_box(&bx))));
    group.bench_function("gradient_finite_difference", |b| {
        b.iter(|| field.gradient_finite_difference(black_box(&bx)))
    });

    group.finish();
}

// =============================================================================
// Descent
// =============================================================================

fn bench_descent(c: &mut Criterion) {
    let grid = wavy_grid(33);
    let field = EnergyField::new(&grid).with_descent(DescentParams {
        max_iterations: 200,
        ..Default::default()
    });
    let mut group = c.benchmark_group("descent");
    group.sample_size(20);

    group.bench_function("single_box", |b| {
        b.iter(|| {
            let mut bx = Box3D::new(Point3::new(8.0, 8.0, 8.0), Point3::new(12.0, 12.0, 12.0))
                .unwrap();
            field.gradient_descent(black_box(&mut bx), None)
        })
    });

    for count in [8, 64, 256] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("sequential", count), &count, |b, &count| {
            b.iter(|| {
                let mut boxes = seed_row(count, 20.0);
                expand_boxes(&field, &mut boxes, usize::MAX, None)
            })
        });
        group.bench_with_input(BenchmarkId::new("parallel", count), &count, |b, &count| {
            b.iter(|| {
                let mut boxes = seed_row(count, 20.0);
                expand_boxes(&field, &mut boxes, 0, None)
            })
        });
    }

    group.finish();
}

// =============================================================================
// Serialization
// =============================================================================

fn bench_serialization(c: &mut Criterion) {
    let list = seed_row(1000, 20.0);
    let bytes = list.to_bytes().unwrap();
    let mut group = c.benchmark_group("serialization");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("box_list_encode", |b| b.iter(|| black_box(&list).to_bytes()));
    group.bench_function("box_list_decode", |b| {
        b.iter(|| BoxList::from_bytes(black_box(&bytes)))
    });

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(
    benches,
    bench_sampling,
    bench_energy,
    bench_descent,
    bench_serialization,
);

criterion_main!(benches);
