//! Benchmarks for the kinematics hot path
//!
//! The inverse and forward solves run every control cycle, so regressions
//! here eat directly into the time available per cycle.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::Vector2;

use drive_lib::kinematics::{ChassisVelocity, ModulePosition, SwerveKinematics, NUM_MODULES};
use drive_lib::pose_est::{Pose, PoseEstimator};

fn offsets() -> [Vector2<f64>; NUM_MODULES] {
    [
        Vector2::new(0.2885, 0.2885),
        Vector2::new(0.2885, -0.2885),
        Vector2::new(-0.2885, 0.2885),
        Vector2::new(-0.2885, -0.2885),
    ]
}

fn bench_inverse(c: &mut Criterion) {
    let mut kin = SwerveKinematics::new(offsets());

    c.bench_function("kinematics_inverse", |b| {
        b.iter(|| kin.inverse(black_box(ChassisVelocity::new(1.2, -0.4, 0.7))))
    });
}

fn bench_forward(c: &mut Criterion) {
    let mut kin = SwerveKinematics::new(offsets());
    let states = kin.inverse(ChassisVelocity::new(1.2, -0.4, 0.7));

    c.bench_function("kinematics_forward", |b| {
        b.iter(|| kin.forward(black_box(&states)))
    });
}

fn bench_odometry_step(c: &mut Criterion) {
    let estimator = PoseEstimator::new(offsets(), Pose::default(), 2.0);

    let mut distance_m = 0.0;
    let mut time_s = 0.0;

    c.bench_function("pose_estimator_integrate", |b| {
        b.iter(|| {
            distance_m += 0.02;
            time_s += 0.02;

            let positions = [ModulePosition {
                distance_m,
                angle_rad: 0.0,
            }; NUM_MODULES];

            estimator.integrate(black_box(&positions), 0.0, time_s);
        })
    });
}

criterion_group!(benches, bench_inverse, bench_forward, bench_odometry_step);
criterion_main!(benches);
