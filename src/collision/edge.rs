//! Edge and chain-segment collisions.
//!
//! One-sided edges carry their neighbours as ghost vertices. Contacts that
//! belong to a neighbouring segment are dropped here, which is what stops
//! shapes from snagging on the internal joints of a chain.
//! See <https://box2d.org/posts/2020/06/ghost-collisions/>.

use crate::{
    collision::{
        clipping::{clip_segment_to_line, ClipVertex},
        manifold::{ContactFeature, ContactId, FeatureType, Manifold, ManifoldType},
        narrowphase::NarrowPhase,
    },
    config::{K_ABSOLUTE_TOL, K_RELATIVE_TOL, MAX_MANIFOLD_POINTS, MAX_POLYGON_VERTICES},
    core::{
        fixed::Fp,
        shape::{CircleShape, EdgeShape, PolygonShape},
        types::Transform,
    },
    utils::math::Vec2,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisKind {
    EdgeA,
    EdgeB,
}

/// Best separating axis found so far.
#[derive(Debug, Clone, Copy)]
struct SeparatingAxis {
    kind: AxisKind,
    index: usize,
    separation: Fp,
    normal: Vec2,
}

/// Polygon B expressed in the edge's frame.
struct LocalPolygon {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
}

impl LocalPolygon {
    fn new(polygon: &PolygonShape, xf: &Transform) -> Self {
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let mut normals = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        for i in 0..polygon.count {
            vertices[i] = xf.apply(polygon.vertices[i]);
            normals[i] = xf.q.apply(polygon.normals[i]);
        }
        Self {
            vertices,
            normals,
            count: polygon.count,
        }
    }

    fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    fn normals(&self) -> &[Vec2] {
        &self.normals[..self.count]
    }

    fn next(&self, i: usize) -> usize {
        if i + 1 < self.count {
            i + 1
        } else {
            0
        }
    }
}

struct ReferenceFace {
    i1: usize,
    i2: usize,
    v1: Vec2,
    normal: Vec2,
    side_normal1: Vec2,
    side_offset1: Fp,
    side_normal2: Vec2,
    side_offset2: Fp,
}

impl ReferenceFace {
    /// Face `v1 -> v2` bounded by side planes through each end. `side_normal`
    /// points out of the face past `v1`.
    fn new(i1: usize, i2: usize, v1: Vec2, v2: Vec2, normal: Vec2, side_normal: Vec2) -> Self {
        Self {
            i1,
            i2,
            v1,
            normal,
            side_normal1: side_normal,
            side_offset1: side_normal.dot(v1),
            side_normal2: -side_normal,
            side_offset2: (-side_normal).dot(v2),
        }
    }
}

/// Deepest polygon vertex along the edge normal and its reverse.
fn edge_separation(polygon: &LocalPolygon, v1: Vec2, normal1: Vec2) -> SeparatingAxis {
    let mut axis = SeparatingAxis {
        kind: AxisKind::EdgeA,
        index: 0,
        separation: Fp::MIN,
        normal: Vec2::ZERO,
    };

    for (j, n) in [normal1, -normal1].into_iter().enumerate() {
        let sj = polygon
            .vertices()
            .iter()
            .map(|v| n.dot(*v - v1))
            .min()
            .unwrap_or(Fp::MAX);

        if sj > axis.separation {
            axis.index = j;
            axis.separation = sj;
            axis.normal = n;
        }
    }
    axis
}

fn polygon_separation(polygon: &LocalPolygon, v1: Vec2, v2: Vec2) -> SeparatingAxis {
    let mut axis = SeparatingAxis {
        kind: AxisKind::EdgeB,
        index: 0,
        separation: Fp::MIN,
        normal: Vec2::ZERO,
    };

    for (i, (v, n)) in polygon.vertices().iter().zip(polygon.normals()).enumerate() {
        let n = -*n;
        let s = n.dot(*v - v1).min(n.dot(*v - v2));
        if s > axis.separation {
            axis.index = i;
            axis.separation = s;
            axis.normal = n;
        }
    }
    axis
}

impl NarrowPhase {
    /// Circle against an edge in A's frame, honouring ghost vertices on
    /// one-sided edges.
    pub fn collide_edge_and_circle(
        manifold: &mut Manifold,
        edge_a: &EdgeShape,
        xf_a: &Transform,
        circle_b: &CircleShape,
        xf_b: &Transform,
    ) {
        manifold.point_count = 0;

        let q = xf_a.apply_t(xf_b.apply(circle_b.position));

        let a = edge_a.vertex1;
        let b = edge_a.vertex2;
        let e = b - a;

        // Normal points to the right for a CCW winding.
        let mut n = e.right_perp();
        let offset = n.dot(q - a);
        if edge_a.one_sided && offset < Fp::ZERO {
            return;
        }

        // Barycentric coordinates.
        let u = e.dot(b - q);
        let v = e.dot(q - a);

        let radius = edge_a.radius + circle_b.radius;

        let vertex_contact = |manifold: &mut Manifold, p: Vec2, index_a: u8| {
            manifold.point_count = 1;
            manifold.manifold_type = ManifoldType::Circles;
            manifold.local_normal = Vec2::ZERO;
            manifold.local_point = p;
            manifold.points[0].id =
                ContactFeature::new(index_a, FeatureType::Vertex, 0, FeatureType::Vertex).into();
            manifold.points[0].local_point = circle_b.position;
        };

        // Region A
        if v <= Fp::ZERO {
            if q.distance_squared(a) > radius * radius {
                return;
            }

            // Circle sits in the face region of the previous segment.
            if edge_a.one_sided {
                let e1 = a - edge_a.vertex0;
                if e1.dot(a - q) > Fp::ZERO {
                    return;
                }
            }

            vertex_contact(manifold, a, 0);
            return;
        }

        // Region B
        if u <= Fp::ZERO {
            if q.distance_squared(b) > radius * radius {
                return;
            }

            // Circle sits in the face region of the next segment.
            if edge_a.one_sided {
                let e2 = edge_a.vertex3 - b;
                if e2.dot(q - b) > Fp::ZERO {
                    return;
                }
            }

            vertex_contact(manifold, b, 1);
            return;
        }

        // Region AB
        let den = e.length_squared();
        debug_assert!(den > Fp::ZERO);
        let p = (a * u + b * v) * (Fp::ONE / den);
        if q.distance_squared(p) > radius * radius {
            return;
        }

        if offset < Fp::ZERO {
            n = -n;
        }
        n.normalize();

        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = n;
        manifold.local_point = a;
        manifold.points[0].id =
            ContactFeature::new(0, FeatureType::Face, 0, FeatureType::Vertex).into();
        manifold.points[0].local_point = circle_b.position;
    }

    /// Polygon against an edge. Picks the edge or polygon axis with the same
    /// hysteresis as polygon pairs, then applies Gauss-map smoothing against
    /// the ghost neighbours of a one-sided edge before clipping.
    pub fn collide_edge_and_polygon(
        manifold: &mut Manifold,
        edge_a: &EdgeShape,
        xf_a: &Transform,
        polygon_b: &PolygonShape,
        xf_b: &Transform,
    ) {
        manifold.point_count = 0;

        let xf = xf_a.mul_t(xf_b);
        let centroid_b = xf.apply(polygon_b.centroid);

        let v1 = edge_a.vertex1;
        let v2 = edge_a.vertex2;

        let edge1 = (v2 - v1).normalized();

        // Normal points to the right for a CCW winding.
        let normal1 = edge1.right_perp();
        let offset1 = normal1.dot(centroid_b - v1);

        let one_sided = edge_a.one_sided;
        if one_sided && offset1 < Fp::ZERO {
            return;
        }

        let local_b = LocalPolygon::new(polygon_b, &xf);
        let radius = polygon_b.radius + edge_a.radius;

        let edge_axis = edge_separation(&local_b, v1, normal1);
        if edge_axis.separation > radius {
            return;
        }

        let polygon_axis = polygon_separation(&local_b, v1, v2);
        if polygon_axis.separation > radius {
            return;
        }

        let mut primary = if polygon_axis.separation - radius
            > K_RELATIVE_TOL * (edge_axis.separation - radius) + K_ABSOLUTE_TOL
        {
            polygon_axis
        } else {
            edge_axis
        };

        if one_sided {
            let edge0 = (v1 - edge_a.vertex0).normalized();
            let normal0 = edge0.right_perp();
            let convex1 = edge0.cross(edge1) >= Fp::ZERO;

            let edge2 = (edge_a.vertex3 - v2).normalized();
            let normal2 = edge2.right_perp();
            let convex2 = edge1.cross(edge2) >= Fp::ZERO;

            let side1 = primary.normal.dot(edge1) <= Fp::ZERO;

            // Gauss map: admit, skip or snap to the edge normal.
            if side1 {
                if convex1 {
                    if primary.normal.cross(normal0) > Fp::EN1 {
                        return;
                    }
                } else {
                    primary = edge_axis;
                }
            } else if convex2 {
                if normal2.cross(primary.normal) > Fp::EN1 {
                    return;
                }
            } else {
                primary = edge_axis;
            }
        }

        let feature = |index_a: usize, type_a, index_b: usize, type_b| -> ContactId {
            ContactFeature::new(index_a as u8, type_a, index_b as u8, type_b).into()
        };

        let (clip_points, ref_face) = match primary.kind {
            AxisKind::EdgeA => {
                manifold.manifold_type = ManifoldType::FaceA;

                // Polygon normal most anti-parallel to the edge normal.
                let mut best_index = 0;
                let mut best_value = primary.normal.dot(local_b.normals[0]);
                for (i, n) in local_b.normals().iter().enumerate().skip(1) {
                    let value = primary.normal.dot(*n);
                    if value < best_value {
                        best_value = value;
                        best_index = i;
                    }
                }

                let i1 = best_index;
                let i2 = local_b.next(i1);
                let clip_points = [
                    ClipVertex {
                        v: local_b.vertices[i1],
                        id: feature(0, FeatureType::Face, i1, FeatureType::Vertex),
                    },
                    ClipVertex {
                        v: local_b.vertices[i2],
                        id: feature(0, FeatureType::Face, i2, FeatureType::Vertex),
                    },
                ];
                let face = ReferenceFace::new(0, 1, v1, v2, primary.normal, -edge1);
                (clip_points, face)
            }
            AxisKind::EdgeB => {
                manifold.manifold_type = ManifoldType::FaceB;

                let clip_points = [
                    ClipVertex {
                        v: v2,
                        id: feature(1, FeatureType::Vertex, primary.index, FeatureType::Face),
                    },
                    ClipVertex {
                        v: v1,
                        id: feature(0, FeatureType::Vertex, primary.index, FeatureType::Face),
                    },
                ];

                let i1 = primary.index;
                let i2 = local_b.next(i1);
                let fv1 = local_b.vertices[i1];
                let fv2 = local_b.vertices[i2];
                let normal = local_b.normals[i1];

                // CCW winding
                let face = ReferenceFace::new(i1, i2, fv1, fv2, normal, normal.right_perp());
                (clip_points, face)
            }
        };

        // Clip the incident edge against the reference face side planes.
        let (clip1, np) = clip_segment_to_line(
            &clip_points,
            ref_face.side_normal1,
            ref_face.side_offset1,
            ref_face.i1,
        );
        if np < MAX_MANIFOLD_POINTS {
            return;
        }

        let (clip2, np) = clip_segment_to_line(
            &clip1,
            ref_face.side_normal2,
            ref_face.side_offset2,
            ref_face.i2,
        );
        if np < MAX_MANIFOLD_POINTS {
            return;
        }

        match primary.kind {
            AxisKind::EdgeA => {
                manifold.local_normal = ref_face.normal;
                manifold.local_point = ref_face.v1;
            }
            AxisKind::EdgeB => {
                manifold.local_normal = polygon_b.normals[ref_face.i1];
                manifold.local_point = polygon_b.vertices[ref_face.i1];
            }
        }

        let mut point_count = 0;
        for cv in &clip2 {
            let separation = ref_face.normal.dot(cv.v - ref_face.v1);
            if separation <= radius {
                let cp = &mut manifold.points[point_count];
                match primary.kind {
                    AxisKind::EdgeA => {
                        cp.local_point = xf.apply_t(cv.v);
                        cp.id = cv.id;
                    }
                    AxisKind::EdgeB => {
                        cp.local_point = cv.v;
                        cp.id = cv.id.flipped();
                    }
                }
                cp.normal_impulse = Fp::ZERO;
                cp.tangent_impulse = Fp::ZERO;
                point_count += 1;
            }
        }
        manifold.point_count = point_count;
    }
}
