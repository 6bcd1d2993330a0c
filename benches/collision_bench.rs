use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fixed_contact2d::{
    collision::{
        ccd::{time_of_impact, ToiInput},
        distance::{distance, DistanceInput, SimplexCache},
        narrowphase::NarrowPhase,
        proxy::DistanceProxy,
    },
    Fixture, Fp, Manifold, PhysicsWorld, PolygonShape, RigidBody, Shape, Sweep, Transform, Vec2,
};
use std::hint::black_box;

fn hull() -> Shape {
    let points: Vec<_> = (0..8)
        .map(|i| {
            let (sin, cos) = (Fp::TAU * Fp::ratio(i, 8)).sin_cos();
            Vec2::new(cos, sin)
        })
        .collect();
    match PolygonShape::new(&points) {
        Ok(poly) => Shape::Polygon(poly),
        Err(_) => Shape::boxed(Fp::ONE, Fp::ONE),
    }
}

fn bench_gjk(c: &mut Criterion) {
    let shape_a = hull();
    let shape_b = Shape::boxed(Fp::HALF, Fp::HALF);
    let input = DistanceInput {
        proxy_a: DistanceProxy::new(&shape_a, 0),
        proxy_b: DistanceProxy::new(&shape_b, 0),
        transform_a: Transform::IDENTITY,
        transform_b: Transform::new(Vec2::from_ints(3, 1), Fp::ratio(1, 3)),
        use_radii: true,
    };

    let mut group = c.benchmark_group("gjk");
    group.bench_function("cold", |b| {
        b.iter(|| {
            let mut cache = SimplexCache::default();
            distance(black_box(&input), &mut cache)
        })
    });
    let mut warm = SimplexCache::default();
    distance(&input, &mut warm);
    group.bench_function("warm", |b| {
        b.iter(|| {
            let mut cache = warm;
            distance(black_box(&input), &mut cache)
        })
    });
    group.finish();
}

fn bench_manifolds(c: &mut Criterion) {
    let cube = Shape::boxed(Fp::ONE, Fp::ONE);
    let (Shape::Polygon(poly), Ok(Shape::Circle(circle))) = (cube, Shape::circle(Fp::HALF)) else {
        return;
    };
    let xf_a = Transform::IDENTITY;
    let xf_b = Transform::new(Vec2::new(Fp::ratio(19, 10), Fp::ratio(1, 5)), Fp::ratio(1, 10));

    let mut group = c.benchmark_group("manifold");
    group.bench_function("polygons", |b| {
        b.iter(|| {
            let mut manifold = Manifold::default();
            NarrowPhase::collide_polygons(&mut manifold, &poly, &xf_a, black_box(&poly), &xf_b);
            manifold
        })
    });
    group.bench_function("polygon_circle", |b| {
        b.iter(|| {
            let mut manifold = Manifold::default();
            NarrowPhase::collide_polygon_and_circle(
                &mut manifold,
                &poly,
                &xf_a,
                black_box(&circle),
                &xf_b,
            );
            manifold
        })
    });
    group.finish();
}

fn bench_toi(c: &mut Criterion) {
    let wall = Shape::boxed(Fp::ratio(1, 20), Fp::from_int(5));
    let bullet = hull();
    let input = ToiInput {
        proxy_a: DistanceProxy::new(&wall, 0),
        proxy_b: DistanceProxy::new(&bullet, 0),
        sweep_a: Sweep::default(),
        sweep_b: Sweep {
            c0: Vec2::from_ints(-4, 0),
            c: Vec2::from_ints(4, 1),
            a: Fp::ONE,
            ..Sweep::default()
        },
        t_max: Fp::ONE,
    };
    c.bench_function("toi/thin_wall", |b| b.iter(|| time_of_impact(black_box(&input))));
}

fn prepare_pyramid(rows: i32) -> PhysicsWorld {
    let mut world = PhysicsWorld::default();
    let ground = world.add_body(RigidBody::fixed());
    world.add_fixture(
        ground,
        Fixture::builder(Shape::boxed(Fp::from_int(40), Fp::HALF)).build(),
    );
    for row in 0..rows {
        for column in 0..rows - row {
            let x = Fp::from_int(column) + Fp::HALF * Fp::from_int(row) - Fp::from_int(rows) * Fp::HALF;
            let y = Fp::from_int(row) + Fp::ONE;
            let body = world.add_body(RigidBody::dynamic().with_position(Vec2::new(x, y)));
            world.add_fixture(
                body,
                Fixture::builder(Shape::boxed(Fp::HALF, Fp::HALF))
                    .density(Fp::ONE)
                    .build(),
            );
        }
    }
    world
}

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    for &rows in &[4, 8, 12] {
        group.bench_with_input(BenchmarkId::new("pyramid", rows), &rows, |b, &rows| {
            let mut world = prepare_pyramid(rows);
            b.iter(|| world.step())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_gjk, bench_manifolds, bench_toi, bench_world_step);
criterion_main!(benches);
