use fixed_contact2d::*;

fn main() {
    let mut world = PhysicsWorld::default();

    let ball = world.add_body(RigidBody::fixed().with_position(Vec2::from_ints(4, 0)));
    if let Ok(circle) = Shape::circle(Fp::ONE) {
        world.add_fixture(ball, Fixture::builder(circle).build());
    }

    let wall = world.add_body(RigidBody::fixed().with_position(Vec2::from_ints(8, 0)));
    world.add_fixture(
        wall,
        Fixture::builder(Shape::boxed(Fp::HALF, Fp::from_int(3))).build(),
    );

    let hits = world.ray_cast(Vec2::ZERO, Vec2::from_ints(12, 0));
    println!("Ray hits: {}", hits.len());
    for hit in &hits {
        println!(
            "  body {:?} at ({:.3}, {:.3}) normal ({:.3}, {:.3})",
            hit.body,
            hit.point.x.to_f64(),
            hit.point.y.to_f64(),
            hit.normal.x.to_f64(),
            hit.normal.y.to_f64()
        );
    }
}
