//! Fixed Contact 2D – deterministic fixed-point collision and contact core.
//!
//! All geometry runs on a Q32.32 scalar so that identical inputs produce
//! bit-identical results on every platform. The crate covers shape proxies,
//! GJK distance and shape casts, contact manifolds for circles, polygons,
//! edges and chains, time of impact, and a sequential-impulse contact
//! solver, plus a small world driver that ties them together.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod utils;
pub mod world;

pub use collision::{
    contact::{Contact, ContactHandle, ContactImpulse, ContactListener},
    manifold::{ContactId, Manifold, WorldManifold},
    queries::{RayCastHit, RayCastInput, RayCastOutput},
};
pub use config::WorldConfig;
pub use crate::core::{
    aabb::Aabb,
    collider::{CollisionFilter, Fixture},
    fixed::Fp,
    rigidbody::{BodyType, RigidBody},
    shape::{ChainShape, CircleShape, EdgeShape, PolygonShape, Shape, ShapeError},
    types::{Material, Sweep, Transform},
};
pub use dynamics::solver::{ContactSolver, TimeStep};
pub use utils::{
    allocator::{Arena, EntityId},
    math::{Rot, Vec2},
    profiling::StepProfile,
};
pub use world::PhysicsWorld;
