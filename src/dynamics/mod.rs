//! Contact response: material mixing, the contact solver and island
//! integration.

pub mod friction;
pub mod island;
pub mod solver;

pub use friction::{MixedMaterial, MixingMode};
pub use island::Island;
pub use solver::{ContactConstraintInput, ContactSolver, TimeStep};
