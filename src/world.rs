//! Minimal world driver: bodies, fixtures, brute-force pairing, one island
//! solve per step and time-of-impact sub-stepping.

mod collision_manager;

pub use collision_manager::CollisionManager;

use std::time::Duration;

use log::{debug, warn};

use crate::{
    collision::{
        ccd::{time_of_impact, ToiInput, ToiState},
        contact::{Contact, ContactHandle, ContactListener, ContactPool, NullListener},
        proxy::DistanceProxy,
        queries::{RayCastHit, RayCastInput},
    },
    config::{MAX_SUB_STEPS, MAX_TOI_CONTACTS, WorldConfig},
    core::{
        collider::Fixture,
        fixed::Fp,
        rigidbody::{BodyType, RigidBody},
    },
    dynamics::{
        island::Island,
        solver::TimeStep,
    },
    utils::{
        allocator::{Arena, EntityId},
        math::Vec2,
        profiling::{ScopedTimer, StepProfile},
    },
};

/// Time-of-impact events this close to the end of the step are ignored.
const TOI_ALPHA_EPSILON: Fp = Fp::ratio(1, 1_000_000);

/// Position iterations used while resolving one time of impact.
const TOI_POSITION_ITERATIONS: u32 = 20;

/// Central simulation container.
pub struct PhysicsWorld {
    pub config: WorldConfig,
    pub bodies: Arena<RigidBody>,
    pub fixtures: Arena<Fixture>,
    collision: CollisionManager,
    island: Island,
    listener: Box<dyn ContactListener>,
    inv_dt0: Fp,
    step_complete: bool,
    profile: StepProfile,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl PhysicsWorld {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            bodies: Arena::new(),
            fixtures: Arena::new(),
            collision: CollisionManager::new(),
            island: Island::new(),
            listener: Box::new(NullListener),
            inv_dt0: Fp::ZERO,
            step_complete: true,
            profile: StepProfile::default(),
        }
    }

    /// Installs the listener used by [`PhysicsWorld::step`].
    pub fn set_contact_listener(&mut self, listener: Box<dyn ContactListener>) {
        self.listener = listener;
    }

    pub fn add_body(&mut self, body: RigidBody) -> EntityId {
        self.bodies.insert_with(|id| RigidBody { id, ..body })
    }

    /// Attaches a fixture and refreshes the body's mass. Returns `None` when
    /// the body does not exist.
    pub fn add_fixture(&mut self, body_id: EntityId, fixture: Fixture) -> Option<EntityId> {
        if !self.bodies.contains(body_id) {
            return None;
        }
        let fixture_id = self.fixtures.insert_with(|id| Fixture {
            id,
            body: body_id,
            ..fixture
        });
        if let Some(body) = self.bodies.get_mut(body_id) {
            body.fixtures.push(fixture_id);
        }
        self.reset_mass_data(body_id);
        Some(fixture_id)
    }

    pub fn remove_fixture(&mut self, fixture_id: EntityId) -> Option<Fixture> {
        let fixture = self.fixtures.remove(fixture_id)?;
        self.collision
            .destroy_fixture_contacts(fixture_id, self.listener.as_mut());
        if let Some(body) = self.bodies.get_mut(fixture.body) {
            body.fixtures.retain(|id| *id != fixture_id);
        }
        self.reset_mass_data(fixture.body);
        Some(fixture)
    }

    pub fn remove_body(&mut self, body_id: EntityId) -> Option<RigidBody> {
        let body = self.bodies.remove(body_id)?;
        for fixture_id in &body.fixtures {
            self.fixtures.remove(*fixture_id);
            self.collision
                .destroy_fixture_contacts(*fixture_id, self.listener.as_mut());
        }
        Some(body)
    }

    fn reset_mass_data(&mut self, body_id: EntityId) {
        let Some(body) = self.bodies.get_mut(body_id) else {
            return;
        };
        let fixtures = &self.fixtures;
        let masses: Vec<_> = body
            .fixtures
            .iter()
            .filter_map(|id| fixtures.get(*id))
            .filter(|fixture| fixture.material.density > Fp::ZERO)
            .map(Fixture::mass_data)
            .collect();
        body.reset_mass_data(masses);
    }

    pub fn body(&self, id: EntityId) -> Option<&RigidBody> {
        self.bodies.get(id)
    }

    pub fn body_mut(&mut self, id: EntityId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id)
    }

    pub fn fixture(&self, id: EntityId) -> Option<&Fixture> {
        self.fixtures.get(id)
    }

    pub fn contacts(&self) -> impl Iterator<Item = (ContactHandle, &Contact)> + '_ {
        self.collision.contacts.iter()
    }

    pub fn contact(&self, handle: ContactHandle) -> Option<&Contact> {
        self.collision.contacts.get(handle)
    }

    pub fn contact_pool(&self) -> &ContactPool {
        &self.collision.contacts
    }

    pub fn contact_count(&self) -> usize {
        self.collision.contacts.len()
    }

    /// Profile of the last step.
    pub fn profile(&self) -> &StepProfile {
        &self.profile
    }

    /// Advances one fixed step with the installed listener.
    pub fn step(&mut self) {
        let mut listener = std::mem::replace(&mut self.listener, Box::new(NullListener));
        self.step_with(listener.as_mut());
        self.listener = listener;
    }

    /// Advances one fixed step, reporting contact events to `listener`.
    pub fn step_with(&mut self, listener: &mut dyn ContactListener) {
        let mut profile = StepProfile::default();
        let mut step_time = Duration::ZERO;
        {
            let _timer = ScopedTimer::new("world::step", &mut step_time);
            self.run_phases(listener, &mut profile);
        }
        profile.step = step_time;
        profile.body_count = self.bodies.len();
        profile.contact_count = self.collision.contacts.len();
        profile.report();
        self.profile = profile;
    }

    fn run_phases(&mut self, listener: &mut dyn ContactListener, profile: &mut StepProfile) {
        let dt = self.config.time_step;
        let step = TimeStep::new(
            dt,
            self.inv_dt0,
            self.config.velocity_iterations,
            self.config.position_iterations,
            self.config.warm_starting,
        );

        {
            let _timer = ScopedTimer::new("world::pairing", &mut profile.pairing);
            self.collision.find_new_contacts(&self.bodies, &self.fixtures);
        }

        {
            let _timer = ScopedTimer::new("world::collide", &mut profile.collide);
            profile.touching_count = self.collision.collide(&self.bodies, &self.fixtures, listener);
        }

        if dt <= Fp::ZERO {
            return;
        }

        if self.step_complete {
            let mut elapsed = Duration::ZERO;
            {
                let _timer = ScopedTimer::new("world::solve", &mut elapsed);
                self.solve(&step, listener, profile);
            }
            profile.solve += elapsed;
        }

        if self.config.continuous_physics {
            let mut elapsed = Duration::ZERO;
            {
                let _timer = ScopedTimer::new("world::solve_toi", &mut elapsed);
                self.solve_toi(&step, listener, profile);
            }
            profile.solve_toi += elapsed;
        }

        self.inv_dt0 = step.inv_dt;
    }

    fn solve(&mut self, step: &TimeStep, listener: &mut dyn ContactListener, profile: &mut StepProfile) {
        self.island.clear();
        for (_, body) in self.bodies.iter_mut() {
            body.in_toi_island = false;
            self.island.add_body(body);
        }

        for (handle, contact) in self.collision.contacts.iter() {
            if !contact.is_enabled() || !contact.is_touching() {
                continue;
            }
            let sensor = [contact.a.fixture, contact.b.fixture]
                .iter()
                .any(|id| self.fixtures.get(*id).is_none_or(|fixture| fixture.is_sensor));
            if sensor {
                continue;
            }
            self.island.add_contact(handle);
        }

        let position_solved = self.island.solve(
            step,
            self.config.gravity,
            &mut self.bodies,
            &self.fixtures,
            &mut self.collision.contacts,
            listener,
            profile,
        );
        if !position_solved && !self.island.contacts.is_empty() {
            warn!(
                "position constraints not solved after {} iterations ({} contacts)",
                step.position_iterations,
                self.island.contacts.len()
            );
        }

        // New sweeps may reach new pairs before the continuous pass.
        let _timer = ScopedTimer::new("world::pairing", &mut profile.pairing);
        self.collision.find_new_contacts(&self.bodies, &self.fixtures);
    }

    /// Finds the earliest time of impact among continuous pairs, moves the
    /// pair there, and solves a sub-step. Repeats until the step is used up
    /// or every contact exhausted its sub-steps.
    fn solve_toi(&mut self, step: &TimeStep, listener: &mut dyn ContactListener, profile: &mut StepProfile) {
        if self.step_complete {
            for (_, body) in self.bodies.iter_mut() {
                body.in_toi_island = false;
                body.sweep.alpha0 = Fp::ZERO;
            }
            for handle in self.collision.contacts.handles() {
                if let Some(contact) = self.collision.contacts.get_mut(handle) {
                    contact.toi = None;
                    contact.toi_count = 0;
                }
            }
        }

        loop {
            let mut min_contact = None;
            let mut min_alpha = Fp::ONE;

            for handle in self.collision.contacts.handles() {
                let Some(alpha) = self.contact_toi(handle, profile) else {
                    continue;
                };
                if alpha < min_alpha {
                    min_contact = Some(handle);
                    min_alpha = alpha;
                }
            }

            let Some(handle) = min_contact.filter(|_| min_alpha < Fp::ONE - TOI_ALPHA_EPSILON)
            else {
                self.step_complete = true;
                break;
            };

            let Some(contact) = self.collision.contacts.get(handle) else {
                self.step_complete = true;
                break;
            };
            let (id_a, id_b) = (contact.a.body, contact.b.body);
            let backups = (
                self.bodies.get(id_a).map(|body| body.sweep),
                self.bodies.get(id_b).map(|body| body.sweep),
            );
            let (Some(backup_a), Some(backup_b)) = backups else {
                self.step_complete = true;
                break;
            };

            for id in [id_a, id_b] {
                if let Some(body) = self.bodies.get_mut(id) {
                    body.advance(min_alpha);
                }
            }

            let touching = self.update_contact(handle, listener);
            if let Some(contact) = self.collision.contacts.get_mut(handle) {
                contact.toi = None;
                contact.toi_count += 1;
            }

            if !touching {
                // Grazing miss: restore and skip this pair for the step.
                if let Some(contact) = self.collision.contacts.get_mut(handle) {
                    contact.set_enabled(false);
                }
                for (id, backup) in [(id_a, backup_a), (id_b, backup_b)] {
                    if let Some(body) = self.bodies.get_mut(id) {
                        body.sweep = backup;
                        body.synchronize_transform();
                    }
                }
                continue;
            }

            self.build_toi_island(handle, id_a, id_b, min_alpha, listener);

            let dt = (Fp::ONE - min_alpha) * step.dt;
            let sub_step = TimeStep {
                dt,
                inv_dt: Fp::ONE / dt,
                dt_ratio: Fp::ONE,
                velocity_iterations: step.velocity_iterations,
                position_iterations: TOI_POSITION_ITERATIONS,
                warm_starting: false,
            };

            let (index_a, index_b) = (
                self.bodies.get(id_a).map_or(0, |body| body.island_index),
                self.bodies.get(id_b).map_or(0, |body| body.island_index),
            );
            let solved = self.island.solve_toi(
                &sub_step,
                index_a,
                index_b,
                &mut self.bodies,
                &self.fixtures,
                &mut self.collision.contacts,
                listener,
            );
            if !solved {
                debug!("toi position pass did not converge at alpha {min_alpha}");
            }
            profile.toi_events += 1;

            // Moved bodies invalidate the cached impacts of their contacts.
            for id in self.island.bodies.clone() {
                let Some(body) = self.bodies.get_mut(id) else {
                    continue;
                };
                body.in_toi_island = false;
                if body.body_type != BodyType::Dynamic {
                    continue;
                }
                for handle in self.collision.body_contacts(id) {
                    if let Some(contact) = self.collision.contacts.get_mut(handle) {
                        contact.toi = None;
                    }
                }
            }

            self.collision.find_new_contacts(&self.bodies, &self.fixtures);

            if self.config.sub_stepping {
                self.step_complete = false;
                break;
            }
        }
    }

    /// Cached or freshly computed impact time of one contact, or `None` when
    /// the pair does not take part in continuous collision.
    fn contact_toi(&mut self, handle: ContactHandle, profile: &mut StepProfile) -> Option<Fp> {
        let contact = self.collision.contacts.get(handle)?;
        if !contact.is_enabled() || contact.toi_count as usize > MAX_SUB_STEPS {
            return None;
        }
        if let Some(alpha) = contact.toi {
            return Some(alpha);
        }

        let (a, b) = (contact.a, contact.b);
        let fixture_a = self.fixtures.get(a.fixture)?;
        let fixture_b = self.fixtures.get(b.fixture)?;
        if fixture_a.is_sensor || fixture_b.is_sensor {
            return None;
        }

        let body_a = self.bodies.get(a.body)?;
        let body_b = self.bodies.get(b.body)?;
        let (type_a, type_b) = (body_a.body_type, body_b.body_type);
        if type_a == BodyType::Static && type_b == BodyType::Static {
            return None;
        }

        // Dynamic pairs only when one of them is a bullet.
        let collide_a = body_a.bullet || type_a != BodyType::Dynamic;
        let collide_b = body_b.bullet || type_b != BodyType::Dynamic;
        if !collide_a && !collide_b {
            return None;
        }

        // Bring both sweeps to the same start time.
        let (alpha_a, alpha_b) = (body_a.sweep.alpha0, body_b.sweep.alpha0);
        let alpha0 = alpha_a.max(alpha_b);
        if alpha_a < alpha_b {
            self.bodies.get_mut(a.body)?.sweep.advance(alpha0);
        } else if alpha_b < alpha_a {
            self.bodies.get_mut(b.body)?.sweep.advance(alpha0);
        }
        debug_assert!(alpha0 < Fp::ONE);

        let input = ToiInput {
            proxy_a: DistanceProxy::new(&fixture_a.shape, a.child_index),
            proxy_b: DistanceProxy::new(&fixture_b.shape, b.child_index),
            sweep_a: self.bodies.get(a.body)?.sweep,
            sweep_b: self.bodies.get(b.body)?.sweep,
            t_max: Fp::ONE,
        };
        let output = time_of_impact(&input);
        profile.queries.record_toi(
            output.iterations,
            output.root_iterations,
            output.max_root_iterations,
        );

        let alpha = if output.state == ToiState::Touching {
            (alpha0 + (Fp::ONE - alpha0) * output.t).min(Fp::ONE)
        } else {
            Fp::ONE
        };

        if let Some(contact) = self.collision.contacts.get_mut(handle) {
            contact.toi = Some(alpha);
        }
        Some(alpha)
    }

    /// Re-evaluates one contact at the current transforms. Returns whether
    /// it is enabled and touching.
    fn update_contact(&mut self, handle: ContactHandle, listener: &mut dyn ContactListener) -> bool {
        let Some(contact) = self.collision.contacts.get_mut(handle) else {
            return false;
        };
        let (a, b) = (contact.a, contact.b);
        let resolved = self
            .fixtures
            .get(a.fixture)
            .zip(self.fixtures.get(b.fixture))
            .zip(self.bodies.get(a.body).zip(self.bodies.get(b.body)));
        let Some(((fixture_a, fixture_b), (body_a, body_b))) = resolved else {
            return false;
        };
        contact.update(
            &fixture_a.shape,
            body_a.transform(),
            &fixture_b.shape,
            body_b.transform(),
            fixture_a.is_sensor || fixture_b.is_sensor,
            listener,
        );
        contact.is_enabled() && contact.is_touching()
    }

    /// Collects the impact pair plus the touching contacts of its dynamic
    /// bodies against static geometry and bullets. Other bodies are moved
    /// to the impact time before their contacts are evaluated.
    fn build_toi_island(
        &mut self,
        handle: ContactHandle,
        id_a: EntityId,
        id_b: EntityId,
        alpha: Fp,
        listener: &mut dyn ContactListener,
    ) {
        self.island.clear();
        for id in [id_a, id_b] {
            if let Some(body) = self.bodies.get_mut(id) {
                body.in_toi_island = true;
                self.island.add_body(body);
            }
        }
        self.island.add_contact(handle);

        for id in [id_a, id_b] {
            let Some((is_dynamic, is_bullet)) = self
                .bodies
                .get(id)
                .map(|body| (body.body_type == BodyType::Dynamic, body.bullet))
            else {
                continue;
            };
            if !is_dynamic {
                continue;
            }

            for edge in self.collision.body_contacts(id) {
                if self.island.contacts.len() >= MAX_TOI_CONTACTS {
                    break;
                }
                if self.island.contacts.contains(&edge) {
                    continue;
                }

                let Some(contact) = self.collision.contacts.get(edge) else {
                    continue;
                };
                let other = if contact.a.body == id {
                    contact.b.body
                } else {
                    contact.a.body
                };
                let sensor = [contact.a.fixture, contact.b.fixture]
                    .iter()
                    .any(|f| self.fixtures.get(*f).is_none_or(|fixture| fixture.is_sensor));
                let Some(other_body) = self.bodies.get(other) else {
                    continue;
                };
                if other_body.body_type == BodyType::Dynamic && !is_bullet && !other_body.bullet {
                    continue;
                }
                if sensor {
                    continue;
                }

                let backup = other_body.sweep;
                let already_in = other_body.in_toi_island;
                if !already_in {
                    if let Some(body) = self.bodies.get_mut(other) {
                        body.advance(alpha);
                    }
                }

                if !self.update_contact(edge, listener) {
                    if !already_in {
                        if let Some(body) = self.bodies.get_mut(other) {
                            body.sweep = backup;
                            body.synchronize_transform();
                        }
                    }
                    continue;
                }

                self.island.add_contact(edge);
                if already_in {
                    continue;
                }
                if let Some(body) = self.bodies.get_mut(other) {
                    body.in_toi_island = true;
                    self.island.add_body(body);
                }
            }
        }
    }

    /// Every fixture child hit by the segment `p1 -> p2`, nearest first.
    pub fn ray_cast(&self, p1: Vec2, p2: Vec2) -> Vec<RayCastHit> {
        let input = RayCastInput {
            p1,
            p2,
            max_fraction: Fp::ONE,
        };
        let mut hits = Vec::new();
        for (fixture_id, fixture) in self.fixtures.iter() {
            let Some(body) = self.bodies.get(fixture.body) else {
                continue;
            };
            for child_index in 0..fixture.shape.child_count() {
                if let Some(output) = fixture.shape.ray_cast(&input, body.transform(), child_index) {
                    hits.push(RayCastHit {
                        fixture: fixture_id,
                        body: fixture.body,
                        child_index,
                        point: p1 + (p2 - p1) * output.fraction,
                        normal: output.normal,
                        fraction: output.fraction,
                    });
                }
            }
        }
        hits.sort_by(|a, b| {
            a.fraction
                .cmp(&b.fraction)
                .then(a.fixture.cmp(&b.fixture))
                .then(a.child_index.cmp(&b.child_index))
        });
        hits
    }

    pub fn ray_cast_closest(&self, p1: Vec2, p2: Vec2) -> Option<RayCastHit> {
        self.ray_cast(p1, p2).into_iter().next()
    }
}
