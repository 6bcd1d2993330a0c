//! Core value types: fixed-point scalar, transforms, bounds, shapes, bodies
//! and fixtures.

pub mod aabb;
pub mod collider;
pub mod fixed;
pub mod rigidbody;
pub mod shape;
pub mod types;

pub use aabb::Aabb;
pub use collider::{CollisionFilter, Fixture, FixtureBuilder};
pub use fixed::Fp;
pub use rigidbody::{BodyType, RigidBody};
pub use shape::{ChainShape, CircleShape, EdgeShape, PolygonShape, Shape, ShapeError, ShapeType};
pub use types::{MassData, Material, MaterialMixing, Position, Sweep, Transform, Velocity};
