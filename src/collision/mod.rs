//! Collision detection: proxies, GJK distance, manifolds, time of impact,
//! contacts and ray casts.

pub mod ccd;
pub mod clipping;
pub mod contact;
pub mod distance;
pub mod edge;
pub mod manifold;
pub mod narrowphase;
pub mod proxy;
pub mod queries;

pub use ccd::{time_of_impact, ToiInput, ToiOutput, ToiState};
pub use contact::{
    Contact, ContactHandle, ContactImpulse, ContactKind, ContactListener, ContactPool,
    FixtureHandle, NullListener,
};
pub use distance::{
    distance, shape_cast, DistanceInput, DistanceOutput, ShapeCastInput, ShapeCastOutput,
    SimplexCache,
};
pub use manifold::{
    point_states, test_overlap, ContactFeature, ContactId, FeatureType, Manifold, ManifoldPoint,
    ManifoldType, PointState, WorldManifold,
};
pub use narrowphase::NarrowPhase;
pub use proxy::DistanceProxy;
pub use queries::{RayCastHit, RayCastInput, RayCastOutput};
