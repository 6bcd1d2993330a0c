use fixed_contact2d::*;

fn shoot(continuous: bool) -> Fp {
    let config = WorldConfig::default()
        .with_gravity(Vec2::ZERO)
        .with_continuous_physics(continuous);
    let mut world = PhysicsWorld::new(config);

    let wall = world.add_body(RigidBody::fixed().with_position(Vec2::from_ints(5, 0)));
    world.add_fixture(
        wall,
        Fixture::builder(Shape::boxed(Fp::ratio(1, 10), Fp::from_int(2))).build(),
    );

    let bullet = world.add_body(
        RigidBody::dynamic()
            .with_bullet(true)
            .with_linear_velocity(Vec2::from_ints(300, 0)),
    );
    if let Ok(circle) = Shape::circle(Fp::ratio(1, 10)) {
        world.add_fixture(bullet, Fixture::builder(circle).density(Fp::ONE).build());
    }

    for _ in 0..10 {
        world.step();
    }
    world.body(bullet).map_or(Fp::ZERO, |body| body.position().x)
}

fn main() {
    println!("discrete:   bullet ends at x = {:.3}", shoot(false).to_f64());
    println!("continuous: bullet ends at x = {:.3}", shoot(true).to_f64());
}
