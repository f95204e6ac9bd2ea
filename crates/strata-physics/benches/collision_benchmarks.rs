//! Collision Benchmarks
//!
//! Broad-phase build, box overlap, ray casts and full physics steps

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use glam::Vec3;
use strata_core::math::{Aabb, Ray};
use strata_physics::{
    CollisionQuery, CollisionSystem, FaceDef, GeometryStore, PhysicsTuning, Scenario, WorldConfig,
};

/// A grid of `n * n` one-unit boxes on a floor
fn box_field(n: u32) -> Vec<FaceDef> {
    let half = n as f32 * 2.0;
    let mut faces = vec![FaceDef::quad(
        Vec3::new(-half, 0.0, -half),
        Vec3::new(-half, 0.0, half),
        Vec3::new(half, 0.0, half),
        Vec3::new(half, 0.0, -half),
    )];
    for i in 0..n {
        for j in 0..n {
            let min = Vec3::new(i as f32 * 4.0 - half, 0.0, j as f32 * 4.0 - half);
            faces.extend(FaceDef::solid_box(min, min + Vec3::ONE));
        }
    }
    faces
}

fn bench_geometry_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("geometry_build");

    for n in [4, 16, 32].iter() {
        let faces = box_field(*n);
        group.bench_with_input(BenchmarkId::from_parameter(faces.len()), &faces, |b, faces| {
            b.iter(|| GeometryStore::build(black_box(faces), 4.0).unwrap());
        });
    }

    group.finish();
}

fn bench_world_queries(c: &mut Criterion) {
    let tuning = PhysicsTuning::default();
    let store = GeometryStore::build(&box_field(32), tuning.grid_cell_size).unwrap();
    let collision = CollisionSystem::new(&tuning).with_geometry(Arc::new(store));

    let body = Aabb::from_center_size(Vec3::new(0.5, 0.91, 0.5), Vec3::new(0.6, 1.8, 0.6));
    c.bench_function("overlaps_world", |b| {
        b.iter(|| collision.overlaps_world(black_box(&body)))
    });

    c.bench_function("collision_planes", |b| {
        b.iter(|| collision.collision_planes(black_box(&body), 0.002))
    });

    let ray = Ray::new(Vec3::new(-60.0, 0.5, 0.3), Vec3::X);
    c.bench_function("raycast_world", |b| {
        b.iter(|| collision.raycast_world(black_box(&ray), 200.0))
    });
}

fn bench_scenario_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenario_step");

    for scenario in Scenario::ALL {
        group.bench_function(scenario.name(), |b| {
            b.iter_batched(
                || scenario.build(WorldConfig::default()).unwrap(),
                |(mut world, _)| {
                    for _ in 0..60 {
                        black_box(world.step(1.0 / 60.0));
                    }
                    world
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_geometry_build, bench_world_queries, bench_scenario_step);
criterion_main!(benches);
