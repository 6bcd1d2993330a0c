use serde::{Deserialize, Serialize};

use crate::{
    collision::{
        distance::{distance, DistanceInput, SimplexCache},
        proxy::DistanceProxy,
    },
    config::MAX_MANIFOLD_POINTS,
    core::{fixed::Fp, shape::Shape, types::Transform},
    utils::math::Vec2,
};

/// Which feature of a shape a contact point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum FeatureType {
    #[default]
    Vertex = 0,
    Face = 1,
}

impl FeatureType {
    fn from_bits(bits: u8) -> Self {
        if bits == FeatureType::Face as u8 {
            FeatureType::Face
        } else {
            FeatureType::Vertex
        }
    }
}

/// The features that intersect to form a contact point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContactFeature {
    pub index_a: u8,
    pub index_b: u8,
    pub type_a: FeatureType,
    pub type_b: FeatureType,
}

impl ContactFeature {
    pub const fn new(index_a: u8, type_a: FeatureType, index_b: u8, type_b: FeatureType) -> Self {
        Self {
            index_a,
            index_b,
            type_a,
            type_b,
        }
    }

    /// Same feature pair seen with the shapes swapped.
    pub fn flipped(self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

/// Packed contact feature used to match points across steps. Only equality
/// is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(u32);

impl ContactId {
    pub const ZERO: ContactId = ContactId(0);

    pub const fn from_key(key: u32) -> Self {
        Self(key)
    }

    pub const fn key(self) -> u32 {
        self.0
    }

    pub fn feature(self) -> ContactFeature {
        let k = self.0;
        ContactFeature {
            index_a: (k & 0xff) as u8,
            index_b: ((k >> 8) & 0xff) as u8,
            type_a: FeatureType::from_bits(((k >> 16) & 0xff) as u8),
            type_b: FeatureType::from_bits(((k >> 24) & 0xff) as u8),
        }
    }

    pub fn flipped(self) -> Self {
        self.feature().flipped().into()
    }
}

impl From<ContactFeature> for ContactId {
    fn from(cf: ContactFeature) -> Self {
        Self(
            u32::from(cf.index_a)
                | u32::from(cf.index_b) << 8
                | (cf.type_a as u32) << 16
                | (cf.type_b as u32) << 24,
        )
    }
}

/// One contact point in local coordinates plus its warm-start impulses.
///
/// `local_point` depends on the manifold type: the circle center of B for
/// [`ManifoldType::Circles`], the clip point on B for `FaceA`, and the clip
/// point on A for `FaceB`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifoldPoint {
    pub local_point: Vec2,
    pub normal_impulse: Fp,
    pub tangent_impulse: Fp,
    pub id: ContactId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManifoldType {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// Contact points for two touching convex shapes, stored in local space so
/// they stay valid while bodies move within a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    /// Unused for [`ManifoldType::Circles`].
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub manifold_type: ManifoldType,
    pub point_count: usize,
}

impl Manifold {
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }

    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }
}

/// World-space view of a [`Manifold`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldManifold {
    /// Points from A to B.
    pub normal: Vec2,
    /// Midpoints between the two surfaces.
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Negative when overlapping.
    pub separations: [Fp; MAX_MANIFOLD_POINTS],
    pub point_count: usize,
}

impl WorldManifold {
    pub fn new(
        manifold: &Manifold,
        xf_a: &Transform,
        radius_a: Fp,
        xf_b: &Transform,
        radius_b: Fp,
    ) -> Self {
        let mut wm = WorldManifold {
            point_count: manifold.point_count,
            ..Default::default()
        };
        if manifold.point_count == 0 {
            return wm;
        }

        match manifold.manifold_type {
            ManifoldType::Circles => {
                let mut normal = Vec2::X;
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                if point_a.distance_squared(point_b) > Fp::EPSILON * Fp::EPSILON {
                    normal = (point_b - point_a).normalized();
                }

                let c_a = point_a + normal * radius_a;
                let c_b = point_b - normal * radius_b;
                wm.normal = normal;
                wm.points[0] = (c_a + c_b) * Fp::HALF;
                wm.separations[0] = (c_b - c_a).dot(normal);
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q.apply(manifold.local_normal);
                let plane_point = xf_a.apply(manifold.local_point);
                wm.normal = normal;

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_b.apply(mp.local_point);
                    let c_a = clip_point + normal * (radius_a - (clip_point - plane_point).dot(normal));
                    let c_b = clip_point - normal * radius_b;
                    wm.points[i] = (c_a + c_b) * Fp::HALF;
                    wm.separations[i] = (c_b - c_a).dot(normal);
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.apply(manifold.local_normal);
                let plane_point = xf_b.apply(manifold.local_point);

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_a.apply(mp.local_point);
                    let c_b = clip_point + normal * (radius_b - (clip_point - plane_point).dot(normal));
                    let c_a = clip_point - normal * radius_a;
                    wm.points[i] = (c_a + c_b) * Fp::HALF;
                    wm.separations[i] = (c_a - c_b).dot(normal);
                }

                // Keep the A to B convention.
                wm.normal = -normal;
            }
        }
        wm
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points[..self.point_count]
    }
}

/// Lifecycle of a manifold point between two updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointState {
    /// Slot unused.
    #[default]
    Null,
    /// Point appeared in the new manifold.
    Add,
    /// Point exists in both manifolds.
    Persist,
    /// Point vanished from the old manifold.
    Remove,
}

/// Compares two manifolds by contact id. The first array describes the old
/// points, the second the new ones.
pub fn point_states(
    old: &Manifold,
    new: &Manifold,
) -> (
    [PointState; MAX_MANIFOLD_POINTS],
    [PointState; MAX_MANIFOLD_POINTS],
) {
    let mut state1 = [PointState::Null; MAX_MANIFOLD_POINTS];
    let mut state2 = [PointState::Null; MAX_MANIFOLD_POINTS];

    for (state, point) in state1.iter_mut().zip(old.points()) {
        *state = if new.points().iter().any(|p| p.id == point.id) {
            PointState::Persist
        } else {
            PointState::Remove
        };
    }

    for (state, point) in state2.iter_mut().zip(new.points()) {
        *state = if old.points().iter().any(|p| p.id == point.id) {
            PointState::Persist
        } else {
            PointState::Add
        };
    }

    (state1, state2)
}

/// GJK overlap test between two shape children, radii included.
pub fn test_overlap(
    shape_a: &Shape,
    child_a: usize,
    shape_b: &Shape,
    child_b: usize,
    xf_a: &Transform,
    xf_b: &Transform,
) -> bool {
    let input = DistanceInput {
        proxy_a: DistanceProxy::new(shape_a, child_a),
        proxy_b: DistanceProxy::new(shape_b, child_b),
        transform_a: *xf_a,
        transform_b: *xf_b,
        use_radii: true,
    };
    let mut cache = SimplexCache::default();
    let output = distance(&input, &mut cache);
    output.distance < Fp::from_int(10) * Fp::EPSILON
}
