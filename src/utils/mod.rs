//! Math, arena storage and profiling helpers.

pub mod allocator;
pub mod math;
pub mod profiling;

pub use allocator::{Arena, EntityId};
pub use math::*;
pub use profiling::{QueryStats, ScopedTimer, StepProfile};
