//! Island assembly and integration around the contact solver.

use crate::{
    collision::contact::{ContactHandle, ContactListener, ContactPool},
    config::{MAX_ROTATION, MAX_TRANSLATION},
    core::{
        collider::Fixture,
        fixed::Fp,
        rigidbody::{BodyType, RigidBody},
        types::{Position, Velocity},
    },
    dynamics::solver::{ContactConstraintInput, ContactSolver, TimeStep},
    utils::{
        allocator::{Arena, EntityId},
        math::Vec2,
        profiling::{ScopedTimer, StepProfile},
    },
};

/// Bodies and touching contacts solved together. Body slots in the
/// position and velocity buffers follow insertion order.
#[derive(Debug, Default)]
pub struct Island {
    pub bodies: Vec<EntityId>,
    pub contacts: Vec<ContactHandle>,
    positions: Vec<Position>,
    velocities: Vec<Velocity>,
}

impl Island {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
    }

    /// Adds a body and records its slot on the body.
    pub fn add_body(&mut self, body: &mut RigidBody) -> usize {
        let index = self.bodies.len();
        body.island_index = index;
        self.bodies.push(body.id);
        index
    }

    pub fn add_contact(&mut self, handle: ContactHandle) {
        self.contacts.push(handle);
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Integrates velocities, solves contacts and integrates positions for
    /// one full step. Returns whether the position pass converged.
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &mut self,
        step: &TimeStep,
        gravity: Vec2,
        bodies: &mut Arena<RigidBody>,
        fixtures: &Arena<Fixture>,
        contacts: &mut ContactPool,
        listener: &mut dyn ContactListener,
        profile: &mut StepProfile,
    ) -> bool {
        let h = step.dt;

        self.positions.clear();
        self.velocities.clear();
        for id in &self.bodies {
            let Some(body) = bodies.get_mut(*id) else {
                self.positions.push(Position::default());
                self.velocities.push(Velocity::default());
                continue;
            };

            let c = body.sweep.c;
            let a = body.sweep.a;
            let mut v = body.linear_velocity;
            let w = body.angular_velocity;

            // Sweep start for continuous collision.
            body.sweep.c0 = c;
            body.sweep.a0 = a;

            if body.body_type == BodyType::Dynamic {
                v += gravity * (h * body.gravity_scale);
            }

            self.positions.push(Position { c, a });
            self.velocities.push(Velocity { v, w });
        }

        let (handles, inputs) = self.constraint_inputs(bodies, fixtures, contacts);

        let mut solver = {
            let _timer = ScopedTimer::new("solve::init", &mut profile.solve_init);
            let mut solver = ContactSolver::new(*step, &inputs);
            solver.initialize_velocity_constraints(&self.positions, &self.velocities);
            solver.warm_start(&mut self.velocities);
            solver
        };

        {
            let _timer = ScopedTimer::new("solve::velocity", &mut profile.solve_velocity);
            for _ in 0..step.velocity_iterations {
                solver.solve_velocity_constraints(&mut self.velocities);
            }
            let mut manifolds: Vec<_> = handles
                .iter()
                .filter_map(|handle| contacts.get(*handle).map(|contact| contact.manifold))
                .collect();
            solver.store_impulses(manifolds.iter_mut());
            for (handle, manifold) in handles.iter().zip(manifolds) {
                if let Some(contact) = contacts.get_mut(*handle) {
                    contact.manifold = manifold;
                }
            }
        }

        integrate_positions(h, &mut self.positions, &mut self.velocities);

        let mut position_solved = false;
        {
            let _timer = ScopedTimer::new("solve::position", &mut profile.solve_position);
            for _ in 0..step.position_iterations {
                if solver.solve_position_constraints(&mut self.positions) {
                    position_solved = true;
                    break;
                }
            }
        }

        self.write_back(bodies);
        report(&solver, &handles, contacts, listener);

        position_solved
    }

    /// Solves the sub-step after a time of impact. Only the bodies at
    /// `toi_index_a` and `toi_index_b` are moved by the position pass; the
    /// rest of the island acts as static geometry.
    #[allow(clippy::too_many_arguments)]
    pub fn solve_toi(
        &mut self,
        sub_step: &TimeStep,
        toi_index_a: usize,
        toi_index_b: usize,
        bodies: &mut Arena<RigidBody>,
        fixtures: &Arena<Fixture>,
        contacts: &mut ContactPool,
        listener: &mut dyn ContactListener,
    ) -> bool {
        debug_assert!(toi_index_a < self.bodies.len());
        debug_assert!(toi_index_b < self.bodies.len());

        self.positions.clear();
        self.velocities.clear();
        for id in &self.bodies {
            let (position, velocity) = bodies
                .get(*id)
                .map(|body| {
                    (
                        Position {
                            c: body.sweep.c,
                            a: body.sweep.a,
                        },
                        Velocity {
                            v: body.linear_velocity,
                            w: body.angular_velocity,
                        },
                    )
                })
                .unwrap_or_default();
            self.positions.push(position);
            self.velocities.push(velocity);
        }

        let (handles, inputs) = self.constraint_inputs(bodies, fixtures, contacts);
        let mut solver = ContactSolver::new(*sub_step, &inputs);

        let mut solved = false;
        for _ in 0..sub_step.position_iterations {
            if solver.solve_toi_position_constraints(&mut self.positions, toi_index_a, toi_index_b) {
                solved = true;
                break;
            }
        }

        // The corrected pose becomes the new sweep start of the two bodies.
        for index in [toi_index_a, toi_index_b] {
            if let Some(body) = bodies.get_mut(self.bodies[index]) {
                body.sweep.c0 = self.positions[index].c;
                body.sweep.a0 = self.positions[index].a;
            }
        }

        // TOI impulses can be large, so they are not kept for warm starting.
        solver.initialize_velocity_constraints(&self.positions, &self.velocities);
        for _ in 0..sub_step.velocity_iterations {
            solver.solve_velocity_constraints(&mut self.velocities);
        }

        integrate_positions(sub_step.dt, &mut self.positions, &mut self.velocities);
        self.write_back(bodies);
        report(&solver, &handles, contacts, listener);

        solved
    }

    fn constraint_inputs(
        &self,
        bodies: &Arena<RigidBody>,
        fixtures: &Arena<Fixture>,
        contacts: &ContactPool,
    ) -> (Vec<ContactHandle>, Vec<ContactConstraintInput>) {
        let mut handles = Vec::with_capacity(self.contacts.len());
        let mut inputs = Vec::with_capacity(self.contacts.len());

        for handle in &self.contacts {
            let Some(contact) = contacts.get(*handle) else {
                continue;
            };
            let (Some(fixture_a), Some(fixture_b)) =
                (fixtures.get(contact.a.fixture), fixtures.get(contact.b.fixture))
            else {
                continue;
            };
            let (Some(body_a), Some(body_b)) =
                (bodies.get(contact.a.body), bodies.get(contact.b.body))
            else {
                continue;
            };

            handles.push(*handle);
            inputs.push(ContactConstraintInput {
                manifold: contact.manifold,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                inv_i_a: body_a.inv_i,
                inv_i_b: body_b.inv_i,
                local_center_a: body_a.sweep.local_center,
                local_center_b: body_b.sweep.local_center,
                radius_a: fixture_a.shape.radius(),
                radius_b: fixture_b.shape.radius(),
                friction: contact.friction,
                restitution: contact.restitution,
                restitution_threshold: contact.restitution_threshold,
                tangent_speed: contact.tangent_speed,
            });
        }

        (handles, inputs)
    }

    fn write_back(&self, bodies: &mut Arena<RigidBody>) {
        for (i, id) in self.bodies.iter().enumerate() {
            let Some(body) = bodies.get_mut(*id) else {
                continue;
            };
            if body.body_type == BodyType::Static {
                continue;
            }
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
            body.linear_velocity = self.velocities[i].v;
            body.angular_velocity = self.velocities[i].w;
            body.synchronize_transform();
        }
    }
}

/// Explicit position update with per-step translation and rotation limits.
fn integrate_positions(h: Fp, positions: &mut [Position], velocities: &mut [Velocity]) {
    for (position, velocity) in positions.iter_mut().zip(velocities.iter_mut()) {
        let translation = velocity.v * h;
        if translation.dot(translation) > MAX_TRANSLATION * MAX_TRANSLATION {
            let ratio = MAX_TRANSLATION / translation.length();
            velocity.v *= ratio;
        }

        let rotation = h * velocity.w;
        if rotation * rotation > MAX_ROTATION * MAX_ROTATION {
            let ratio = MAX_ROTATION / rotation.abs();
            velocity.w *= ratio;
        }

        position.c += velocity.v * h;
        position.a += h * velocity.w;
    }
}

fn report(
    solver: &ContactSolver,
    handles: &[ContactHandle],
    contacts: &ContactPool,
    listener: &mut dyn ContactListener,
) {
    for (handle, impulse) in handles.iter().zip(solver.impulses()) {
        if let Some(contact) = contacts.get(*handle) {
            listener.post_solve(contact, &impulse);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integration_clamps_translation_and_rotation() {
        let mut positions = vec![Position::default()];
        let mut velocities = vec![Velocity {
            v: Vec2::from_ints(600, 0),
            w: Fp::from_int(600),
        }];
        integrate_positions(Fp::ratio(1, 60), &mut positions, &mut velocities);

        approx::assert_abs_diff_eq!(positions[0].c.x.to_f64(), 2.0, epsilon = 1e-4);
        approx::assert_abs_diff_eq!(
            positions[0].a.to_f64(),
            std::f64::consts::FRAC_PI_2,
            epsilon = 1e-4
        );
        approx::assert_abs_diff_eq!(velocities[0].v.x.to_f64(), 120.0, epsilon = 1e-2);
    }

    #[test]
    fn add_body_assigns_slots() {
        let mut bodies = Arena::new();
        let a = bodies.insert_with(|id| RigidBody {
            id,
            ..RigidBody::dynamic()
        });
        let b = bodies.insert_with(|id| RigidBody {
            id,
            ..RigidBody::fixed()
        });

        let mut island = Island::new();
        for id in [a, b] {
            if let Some(body) = bodies.get_mut(id) {
                island.add_body(body);
            }
        }
        assert_eq!(island.body_count(), 2);
        assert_eq!(bodies.get(b).map(|body| body.island_index), Some(1));
    }
}
