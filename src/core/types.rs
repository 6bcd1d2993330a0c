use serde::{Deserialize, Serialize};

use crate::{
    core::fixed::Fp,
    dynamics::friction::MixingMode,
    utils::math::{Rot, Vec2},
};

/// Translation plus rotation. The rotation is kept as a sine/cosine pair so
/// repeated composition never drifts through an angle round-trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        p: Vec2::ZERO,
        q: Rot::IDENTITY,
    };

    pub fn new(position: Vec2, angle: Fp) -> Self {
        Self {
            p: position,
            q: Rot::from_angle(angle),
        }
    }

    pub fn from_position(position: Vec2) -> Self {
        Self {
            p: position,
            q: Rot::IDENTITY,
        }
    }

    pub fn set(&mut self, position: Vec2, angle: Fp) {
        self.p = position;
        self.q.set(angle);
    }

    /// Maps a local point into world space.
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.q.apply(v) + self.p
    }

    /// Maps a world point into local space.
    pub fn apply_t(&self, v: Vec2) -> Vec2 {
        self.q.apply_t(v - self.p)
    }

    /// `self * other`.
    pub fn mul(&self, other: &Transform) -> Transform {
        Transform {
            p: self.q.apply(other.p) + self.p,
            q: self.q.mul(other.q),
        }
    }

    /// `inverse(self) * other`.
    pub fn mul_t(&self, other: &Transform) -> Transform {
        Transform {
            p: self.q.apply_t(other.p - self.p),
            q: self.q.mul_t(other.q),
        }
    }
}

/// Motion of a body over one step, used by time of impact. Shapes are
/// defined relative to the body origin, but the sweep interpolates the
/// center of mass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sweep {
    /// Center of mass in body space.
    pub local_center: Vec2,
    pub c0: Vec2,
    pub c: Vec2,
    pub a0: Fp,
    pub a: Fp,
    /// Fraction of the step already consumed; `c0` and `a0` are the state at
    /// this time.
    pub alpha0: Fp,
}

impl Sweep {
    /// Interpolated transform at `beta` in `[0, 1]`, where zero is `alpha0`.
    pub fn get_transform(&self, beta: Fp) -> Transform {
        let one_minus = Fp::ONE - beta;
        let position = self.c0 * one_minus + self.c * beta;
        let angle = self.a0 * one_minus + self.a * beta;
        let mut xf = Transform::new(position, angle);
        xf.p -= xf.q.apply(self.local_center);
        xf
    }

    /// Rebases the sweep so that `alpha` becomes the new start time.
    pub fn advance(&mut self, alpha: Fp) {
        assert!(self.alpha0 < Fp::ONE, "sweep already fully consumed");
        assert!(alpha >= self.alpha0, "sweep cannot be rewound");
        let beta = (alpha - self.alpha0) / (Fp::ONE - self.alpha0);
        self.c0 += (self.c - self.c0) * beta;
        self.a0 += (self.a - self.a0) * beta;
        self.alpha0 = alpha;
    }

    /// Wraps `a0` into `[0, 2pi)` and shifts `a` by the same amount.
    pub fn normalize(&mut self) {
        let d = Fp::TAU * (self.a0 / Fp::TAU).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

/// Center-of-mass position and angle handed to the solver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub c: Vec2,
    pub a: Fp,
}

/// Linear and angular velocity of a body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Velocity {
    pub v: Vec2,
    pub w: Fp,
}

/// Mass, centroid and rotational inertia about the shape origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MassData {
    pub mass: Fp,
    pub center: Vec2,
    pub inertia: Fp,
}

/// Surface coefficients of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub density: Fp,
    pub friction: Fp,
    pub restitution: Fp,
    /// Approach speed below which collisions are treated as inelastic.
    pub restitution_threshold: Fp,
    pub mixing: MaterialMixing,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            density: Fp::ZERO,
            friction: Fp::ratio(2, 10),
            restitution: Fp::ZERO,
            restitution_threshold: Fp::ONE,
            mixing: MaterialMixing::default(),
        }
    }
}

impl Material {
    pub fn with_density(mut self, density: Fp) -> Self {
        self.density = density;
        self
    }

    pub fn with_friction(mut self, friction: Fp) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: Fp) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_restitution_threshold(mut self, threshold: Fp) -> Self {
        self.restitution_threshold = threshold;
        self
    }
}

/// Per-material override of the pair mixing rules. `None` keeps the default
/// rule for that coefficient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialMixing {
    pub friction: Option<MixingMode>,
    pub restitution: Option<MixingMode>,
}

impl MaterialMixing {
    pub fn with_friction(mut self, mode: MixingMode) -> Self {
        self.friction = Some(mode);
        self
    }

    pub fn with_restitution(mut self, mode: MixingMode) -> Self {
        self.restitution = Some(mode);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sweep() -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::from_ints(-2, 4),
            c: Vec2::from_ints(3, 8),
            a0: Fp::HALF,
            a: Fp::from_int(5),
            alpha0: Fp::ZERO,
        }
    }

    #[test]
    fn sweep_endpoints_reproduce_start_and_end() {
        let s = sweep();
        let start = s.get_transform(Fp::ZERO);
        assert_eq!(start.p, s.c0);
        assert_eq!(start.q, Rot::from_angle(s.a0));

        let end = s.get_transform(Fp::ONE);
        assert_eq!(end.p, s.c);
        assert_eq!(end.q, Rot::from_angle(s.a));

        let mid = s.get_transform(Fp::HALF);
        assert_abs_diff_eq!(mid.p.x.to_f64(), 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(mid.p.y.to_f64(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn sweep_transform_offsets_local_center() {
        let mut s = sweep();
        s.local_center = Vec2::from_ints(1, 0);
        s.a0 = Fp::ZERO;
        let xf = s.get_transform(Fp::ZERO);
        assert_eq!(xf.apply(s.local_center), s.c0);
    }

    #[test]
    fn advance_rebases_start_state() {
        let mut s = sweep();
        s.advance(Fp::HALF);
        assert_eq!(s.alpha0, Fp::HALF);
        assert_abs_diff_eq!(s.c0.x.to_f64(), 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(s.a0.to_f64(), 2.75, epsilon = 1e-9);
        // the end state is unchanged
        assert_eq!(s.get_transform(Fp::ONE).p, s.c);
    }

    #[test]
    #[should_panic]
    fn advance_rejects_rewinding() {
        let mut s = sweep();
        s.advance(Fp::HALF);
        s.advance(Fp::ratio(1, 4));
    }

    #[test]
    fn normalize_wraps_start_angle() {
        let mut s = sweep();
        s.a0 = Fp::from_int(7);
        s.a = Fp::from_int(8);
        s.normalize();
        assert!(s.a0 >= Fp::ZERO && s.a0 < Fp::TAU);
        assert_abs_diff_eq!((s.a - s.a0).to_f64(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn transform_inverse_round_trip() {
        let xf = Transform::new(Vec2::from_ints(3, -1), Fp::from_f32(1.2));
        let p = Vec2::from_f32(0.25, 2.5);
        let back = xf.apply_t(xf.apply(p));
        assert_abs_diff_eq!(back.x.to_f64(), 0.25, epsilon = 1e-7);
        assert_abs_diff_eq!(back.y.to_f64(), 2.5, epsilon = 1e-7);
    }
}
