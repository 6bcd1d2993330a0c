use fixed_contact2d::*;

fn main() {
    let mut world = PhysicsWorld::new(WorldConfig::default());

    let ground = world.add_body(RigidBody::fixed());
    world.add_fixture(
        ground,
        Fixture::builder(Shape::boxed(Fp::from_int(10), Fp::HALF)).build(),
    );

    let mut stack = Vec::new();
    for i in 0..5 {
        let body = world.add_body(
            RigidBody::dynamic().with_position(Vec2::new(Fp::ZERO, Fp::from_int(i) * Fp::ratio(21, 20) + Fp::ONE)),
        );
        world.add_fixture(
            body,
            Fixture::builder(Shape::boxed(Fp::HALF, Fp::HALF))
                .density(Fp::ONE)
                .friction(Fp::ratio(6, 10))
                .build(),
        );
        stack.push(body);
    }

    for _ in 0..120 {
        world.step();
    }

    for (i, id) in stack.iter().enumerate() {
        if let Some(body) = world.body(*id) {
            println!("box {i}: y = {:.4}", body.position().y.to_f64());
        }
    }
    let profile = world.profile();
    println!(
        "{} contacts, {} touching, last step {:?}",
        profile.contact_count, profile.touching_count, profile.step
    );
}
