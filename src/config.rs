//! Global tuning constants and world configuration for the contact core.

use serde::{Deserialize, Serialize};

use crate::{core::fixed::Fp, utils::math::Vec2};

/// Maximum number of contact points between two convex shapes.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Maximum number of vertices on a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Collision and constraint tolerance (meters).
pub const LINEAR_SLOP: Fp = Fp::ratio(5, 1000);

/// Collision and constraint tolerance (radians): two degrees.
pub const ANGULAR_SLOP: Fp = Fp::from_raw(Fp::DEG_TO_RAD.raw() * 2);

/// Skin radius around polygons. Keeps the GJK core shapes apart so that
/// polygons rarely need the slower overlap path.
pub const POLYGON_RADIUS: Fp = Fp::ratio(1, 100);

/// Fattening applied to proxy AABBs.
pub const AABB_EXTENSION: Fp = Fp::ratio(1, 10);

/// Maximum number of sub-steps per contact in continuous physics.
pub const MAX_SUB_STEPS: usize = 8;

/// Maximum number of contacts handled while resolving one time of impact.
pub const MAX_TOI_CONTACTS: usize = 32;

/// Largest position correction applied in one position iteration.
pub const MAX_LINEAR_CORRECTION: Fp = Fp::ratio(2, 10);

/// Largest angular correction applied in one position iteration: eight degrees.
pub const MAX_ANGULAR_CORRECTION: Fp = Fp::from_raw(Fp::DEG_TO_RAD.raw() * 8);

/// Upper bound on per-step body translation.
pub const MAX_TRANSLATION: Fp = Fp::from_int(2);

/// Upper bound on per-step body rotation.
pub const MAX_ROTATION: Fp = Fp::FRAC_PI_2;

/// Fraction of the overlap resolved per position iteration.
pub const BAUMGARTE: Fp = Fp::ratio(2, 10);

/// Position correction fraction used during time-of-impact sub-steps.
pub const TOI_BAUMGARTE: Fp = Fp::ratio(75, 100);

/// Reference face selection bias: `separation_b > REL * separation_a + ABS`.
pub const K_RELATIVE_TOL: Fp = Fp::ratio(98, 100);
pub const K_ABSOLUTE_TOL: Fp = Fp::ratio(1, 1000);

/// Condition number limit for the two-point block solver.
pub const MAX_CONDITION_NUMBER: Fp = Fp::from_int(1000);

/// Iteration cap for GJK.
pub const MAX_GJK_ITERATIONS: usize = 20;

/// Iteration cap for the conservative advancement shape cast.
pub const MAX_SHAPE_CAST_ITERATIONS: usize = 20;

/// Outer iteration cap for time of impact.
pub const MAX_TOI_ITERATIONS: usize = 20;

/// Root finder iteration cap inside one time-of-impact bracket.
pub const MAX_TOI_ROOT_ITERATIONS: usize = 50;

/// Simulation settings for [`crate::world::PhysicsWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub gravity: Vec2,
    pub time_step: Fp,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub warm_starting: bool,
    pub continuous_physics: bool,
    /// Stop after the first time-of-impact sub-step of every step.
    pub sub_stepping: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::from_ints(0, -10),
            time_step: Fp::ratio(1, 60),
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
            continuous_physics: true,
            sub_stepping: false,
        }
    }
}

impl WorldConfig {
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_time_step(mut self, time_step: Fp) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_iterations(mut self, velocity: u32, position: u32) -> Self {
        self.velocity_iterations = velocity;
        self.position_iterations = position;
        self
    }

    pub fn with_warm_starting(mut self, enabled: bool) -> Self {
        self.warm_starting = enabled;
        self
    }

    pub fn with_continuous_physics(mut self, enabled: bool) -> Self {
        self.continuous_physics = enabled;
        self
    }

    pub fn with_sub_stepping(mut self, enabled: bool) -> Self {
        self.sub_stepping = enabled;
        self
    }
}
