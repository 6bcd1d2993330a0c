use serde::{Deserialize, Serialize};

use crate::{
    core::{
        fixed::Fp,
        types::{MassData, Sweep, Transform},
    },
    utils::{
        allocator::EntityId,
        math::{cross_sv, Rot, Vec2},
    },
};

/// How a body takes part in the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyType {
    /// Zero mass, zero velocity, moved only by hand.
    #[default]
    Static,
    /// Zero mass, moves with its set velocity, ignores contacts.
    Kinematic,
    /// Positive mass, driven by gravity and contacts.
    Dynamic,
}

/// Rigid body state. Mass data is derived from attached fixtures.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub id: EntityId,
    pub body_type: BodyType,
    /// Bullets get continuous collision against dynamic bodies too.
    pub bullet: bool,
    pub fixed_rotation: bool,
    pub gravity_scale: Fp,
    pub linear_velocity: Vec2,
    pub angular_velocity: Fp,

    pub(crate) xf: Transform,
    pub(crate) sweep: Sweep,
    pub(crate) mass: Fp,
    pub(crate) inv_mass: Fp,
    /// Rotational inertia about the center of mass.
    pub(crate) inertia: Fp,
    pub(crate) inv_i: Fp,
    pub(crate) fixtures: Vec<EntityId>,
    pub(crate) island_index: usize,
    pub(crate) in_toi_island: bool,
}

impl Default for RigidBody {
    fn default() -> Self {
        Self {
            id: EntityId::NULL,
            body_type: BodyType::Static,
            bullet: false,
            fixed_rotation: false,
            gravity_scale: Fp::ONE,
            linear_velocity: Vec2::ZERO,
            angular_velocity: Fp::ZERO,
            xf: Transform::IDENTITY,
            sweep: Sweep::default(),
            mass: Fp::ZERO,
            inv_mass: Fp::ZERO,
            inertia: Fp::ZERO,
            inv_i: Fp::ZERO,
            fixtures: Vec::new(),
            island_index: 0,
            in_toi_island: false,
        }
    }
}

impl RigidBody {
    pub fn new(body_type: BodyType) -> Self {
        let mut body = Self {
            body_type,
            ..Self::default()
        };
        if body_type == BodyType::Dynamic {
            body.mass = Fp::ONE;
            body.inv_mass = Fp::ONE;
        }
        body
    }

    pub fn dynamic() -> Self {
        Self::new(BodyType::Dynamic)
    }

    pub fn kinematic() -> Self {
        Self::new(BodyType::Kinematic)
    }

    pub fn fixed() -> Self {
        Self::new(BodyType::Static)
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        let angle = self.sweep.a;
        self.set_transform(position, angle);
        self
    }

    pub fn with_angle(mut self, angle: Fp) -> Self {
        let position = self.xf.p;
        self.set_transform(position, angle);
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec2) -> Self {
        self.set_linear_velocity(velocity);
        self
    }

    pub fn with_angular_velocity(mut self, omega: Fp) -> Self {
        self.set_angular_velocity(omega);
        self
    }

    pub fn with_bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }

    pub fn with_gravity_scale(mut self, scale: Fp) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    pub fn transform(&self) -> &Transform {
        &self.xf
    }

    /// Body origin in world space.
    pub fn position(&self) -> Vec2 {
        self.xf.p
    }

    pub fn angle(&self) -> Fp {
        self.sweep.a
    }

    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    pub fn sweep(&self) -> &Sweep {
        &self.sweep
    }

    pub fn mass(&self) -> Fp {
        self.mass
    }

    pub fn inverse_mass(&self) -> Fp {
        self.inv_mass
    }

    pub fn inertia(&self) -> Fp {
        self.inertia
    }

    pub fn inverse_inertia(&self) -> Fp {
        self.inv_i
    }

    pub fn fixtures(&self) -> &[EntityId] {
        &self.fixtures
    }

    /// Static bodies ignore velocity changes.
    pub fn set_linear_velocity(&mut self, velocity: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        self.linear_velocity = velocity;
    }

    pub fn set_angular_velocity(&mut self, omega: Fp) {
        if self.body_type == BodyType::Static {
            return;
        }
        self.angular_velocity = omega;
    }

    /// Applies an impulse at a world point.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        self.linear_velocity += impulse * self.inv_mass;
        self.angular_velocity += self.inv_i * (point - self.sweep.c).cross(impulse);
    }

    /// Teleports the body. Contacts pick up the new pose on the next step.
    pub fn set_transform(&mut self, position: Vec2, angle: Fp) {
        self.xf = Transform::new(position, angle);
        self.sweep.c = self.xf.apply(self.sweep.local_center);
        self.sweep.a = angle;
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = angle;
    }

    /// Recomputes mass, center of mass and inertia from the attached shapes.
    /// A dynamic body without density gets unit mass so it still falls.
    pub(crate) fn reset_mass_data(
        &mut self,
        shapes: impl IntoIterator<Item = MassData>,
    ) {
        self.mass = Fp::ZERO;
        self.inv_mass = Fp::ZERO;
        self.inertia = Fp::ZERO;
        self.inv_i = Fp::ZERO;
        self.sweep.local_center = Vec2::ZERO;

        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.xf.p;
            self.sweep.c = self.xf.p;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        let mut local_center = Vec2::ZERO;
        let mut inertia = Fp::ZERO;
        for data in shapes {
            self.mass += data.mass;
            local_center += data.center * data.mass;
            inertia += data.inertia;
        }

        if self.mass > Fp::ZERO {
            self.inv_mass = Fp::ONE / self.mass;
            local_center *= self.inv_mass;
        } else {
            self.mass = Fp::ONE;
            self.inv_mass = Fp::ONE;
        }

        if inertia > Fp::ZERO && !self.fixed_rotation {
            // Shift to the center of mass.
            self.inertia = inertia - self.mass * local_center.dot(local_center);
            debug_assert!(self.inertia > Fp::ZERO);
            self.inv_i = Fp::ONE / self.inertia;
        }

        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = self.xf.apply(local_center);
        self.sweep.c0 = self.sweep.c;

        // Keep the velocity of the new center consistent with the rotation.
        self.linear_velocity += cross_sv(self.angular_velocity, self.sweep.c - old_center);
    }

    pub(crate) fn synchronize_transform(&mut self) {
        self.xf.q = Rot::from_angle(self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q.apply(self.sweep.local_center);
    }

    /// Transform at the start of the current sweep.
    pub(crate) fn start_transform(&self) -> Transform {
        self.sweep.get_transform(Fp::ZERO)
    }

    /// Moves the sweep start to `alpha` and snaps the body there.
    pub(crate) fn advance(&mut self, alpha: Fp) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }

    /// Contacts are only created when at least one side can move in
    /// response.
    pub fn should_collide(&self, other: &RigidBody) -> bool {
        self.body_type == BodyType::Dynamic || other.body_type == BodyType::Dynamic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shape::{PolygonShape, Shape};
    use approx::assert_abs_diff_eq;

    #[test]
    fn mass_from_offset_box() {
        let mut body = RigidBody::dynamic().with_position(Vec2::from_ints(2, 0));
        let shape = Shape::Polygon(PolygonShape::new_oriented_box(
            Fp::ONE,
            Fp::ONE,
            Vec2::from_ints(1, 0),
            Fp::ZERO,
        ));
        body.reset_mass_data([shape.compute_mass(Fp::ONE)]);

        assert_abs_diff_eq!(body.mass().to_f64(), 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(body.local_center().x.to_f64(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(body.world_center().x.to_f64(), 3.0, epsilon = 1e-6);
        // Box about its own center: m * (w^2 + h^2) / 12.
        assert_abs_diff_eq!(body.inertia().to_f64(), 8.0 / 3.0, epsilon = 1e-4);
    }

    #[test]
    fn static_body_ignores_velocity() {
        let mut body = RigidBody::fixed();
        body.set_linear_velocity(Vec2::from_ints(1, 0));
        assert_eq!(body.linear_velocity, Vec2::ZERO);
        body.reset_mass_data(std::iter::empty());
        assert_eq!(body.inverse_mass(), Fp::ZERO);
    }

    #[test]
    fn massless_dynamic_body_gets_unit_mass() {
        let mut body = RigidBody::dynamic();
        body.reset_mass_data(std::iter::empty());
        assert_eq!(body.mass(), Fp::ONE);
        assert_eq!(body.inverse_inertia(), Fp::ZERO);
    }
}
