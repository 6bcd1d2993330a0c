use approx::assert_abs_diff_eq;
use fixed_contact2d::{
    collision::{
        distance::{distance, shape_cast, DistanceInput, ShapeCastInput, SimplexCache},
        manifold::test_overlap,
        proxy::DistanceProxy,
    },
    Fp, PolygonShape, Shape, Transform, Vec2,
};

fn input(shape_a: &Shape, xf_a: Transform, shape_b: &Shape, xf_b: Transform) -> DistanceInput {
    DistanceInput {
        proxy_a: DistanceProxy::new(shape_a, 0),
        proxy_b: DistanceProxy::new(shape_b, 0),
        transform_a: xf_a,
        transform_b: xf_b,
        use_radii: true,
    }
}

#[test]
fn circles_three_apart_are_one_unit_apart() {
    let circle = Shape::circle(Fp::ONE).expect("circle");
    let mut cache = SimplexCache::default();
    let output = distance(
        &input(
            &circle,
            Transform::IDENTITY,
            &circle,
            Transform::from_position(Vec2::from_ints(3, 0)),
        ),
        &mut cache,
    );
    assert_abs_diff_eq!(output.distance.to_f64(), 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(output.point_a.x.to_f64(), 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(output.point_b.x.to_f64(), 2.0, epsilon = 1e-6);
}

#[test]
fn warm_started_gjk_is_no_slower_than_cold() {
    let hull = Shape::Polygon(
        PolygonShape::new(&[
            Vec2::from_ints(-1, -1),
            Vec2::from_ints(2, -1),
            Vec2::from_ints(3, 1),
            Vec2::from_ints(0, 2),
            Vec2::from_ints(-2, 1),
        ])
        .expect("hull"),
    );
    let cube = Shape::boxed(Fp::HALF, Fp::HALF);

    let first = Transform::new(Vec2::from_ints(6, 1), Fp::ratio(1, 5));
    let moved = Transform::new(
        Vec2::new(Fp::ratio(601, 100), Fp::ratio(99, 100)),
        Fp::ratio(21, 100),
    );

    let mut warm = SimplexCache::default();
    distance(&input(&hull, Transform::IDENTITY, &cube, first), &mut warm);
    assert!(warm.count > 0);

    let warm_output = distance(&input(&hull, Transform::IDENTITY, &cube, moved), &mut warm);
    let mut cold = SimplexCache::default();
    let cold_output = distance(&input(&hull, Transform::IDENTITY, &cube, moved), &mut cold);

    assert!(
        warm_output.iterations <= cold_output.iterations,
        "warm {} > cold {}",
        warm_output.iterations,
        cold_output.iterations
    );
    assert_abs_diff_eq!(
        warm_output.distance.to_f64(),
        cold_output.distance.to_f64(),
        epsilon = 1e-4
    );
}

#[test]
fn overlap_test_honours_skin_radius() {
    let cube = Shape::boxed(Fp::ONE, Fp::ONE);
    let touching = Transform::from_position(Vec2::new(Fp::ratio(201, 100), Fp::ZERO));
    let apart = Transform::from_position(Vec2::new(Fp::ratio(21, 10), Fp::ZERO));

    // Skins of 0.01 each bridge a 0.01 gap.
    assert!(test_overlap(&cube, 0, &cube, 0, &Transform::IDENTITY, &touching));
    assert!(!test_overlap(&cube, 0, &cube, 0, &Transform::IDENTITY, &apart));
}

#[test]
fn shape_cast_stops_short_of_target() {
    let wall = Shape::boxed(Fp::ratio(1, 10), Fp::from_int(4));
    let ball = Shape::circle(Fp::HALF).expect("circle");
    let output = shape_cast(&ShapeCastInput {
        proxy_a: DistanceProxy::new(&wall, 0),
        proxy_b: DistanceProxy::new(&ball, 0),
        transform_a: Transform::from_position(Vec2::from_ints(5, 0)),
        transform_b: Transform::IDENTITY,
        translation_b: Vec2::from_ints(10, 0),
    });

    assert!(output.hit);
    // The ball surface stops at the wall core (x = 4.9), inside the skin.
    let reach = output.lambda.to_f64() * 10.0 + 0.5;
    assert!(reach <= 4.9 + 1e-6, "cast overshot to {reach}");
    assert!(reach > 4.85, "cast stopped early at {reach}");
    assert_abs_diff_eq!(output.normal.x.to_f64(), -1.0, epsilon = 1e-3);
}
