use crate::{
    collision::{
        clipping::{clip_segment_to_line, ClipVertex},
        manifold::{ContactFeature, ContactId, FeatureType, Manifold, ManifoldType},
    },
    config::{K_ABSOLUTE_TOL, K_RELATIVE_TOL, MAX_MANIFOLD_POINTS},
    core::{
        fixed::Fp,
        shape::{CircleShape, PolygonShape},
        types::Transform,
    },
    utils::math::Vec2,
};

/// Manifold generators for convex shape pairs. Each routine overwrites
/// `manifold` and leaves `point_count == 0` when the shapes are apart.
pub struct NarrowPhase;

impl NarrowPhase {
    pub fn collide_circles(
        manifold: &mut Manifold,
        circle_a: &CircleShape,
        xf_a: &Transform,
        circle_b: &CircleShape,
        xf_b: &Transform,
    ) {
        manifold.point_count = 0;

        let p_a = xf_a.apply(circle_a.position);
        let p_b = xf_b.apply(circle_b.position);
        let dist_sq = p_a.distance_squared(p_b);
        let radius = circle_a.radius + circle_b.radius;
        if dist_sq > radius * radius {
            return;
        }

        manifold.manifold_type = ManifoldType::Circles;
        manifold.local_point = circle_a.position;
        manifold.local_normal = Vec2::ZERO;
        manifold.point_count = 1;
        manifold.points[0].local_point = circle_b.position;
        manifold.points[0].id = ContactId::ZERO;
    }

    pub fn collide_polygon_and_circle(
        manifold: &mut Manifold,
        polygon_a: &PolygonShape,
        xf_a: &Transform,
        circle_b: &CircleShape,
        xf_b: &Transform,
    ) {
        manifold.point_count = 0;

        // Circle center in the polygon's frame.
        let c = xf_b.apply(circle_b.position);
        let c_local = xf_a.apply_t(c);

        let radius = polygon_a.radius + circle_b.radius;
        let vertices = polygon_a.vertices();
        let normals = polygon_a.normals();

        // Minimum separating edge.
        let mut normal_index = 0;
        let mut separation = Fp::MIN;
        for (i, (v, n)) in vertices.iter().zip(normals).enumerate() {
            let s = n.dot(c_local - *v);
            if s > radius {
                return;
            }
            if s > separation {
                separation = s;
                normal_index = i;
            }
        }

        let i1 = normal_index;
        let i2 = if i1 + 1 < vertices.len() { i1 + 1 } else { 0 };
        let v1 = vertices[i1];
        let v2 = vertices[i2];

        manifold.manifold_type = ManifoldType::FaceA;
        manifold.points[0].local_point = circle_b.position;
        manifold.points[0].id = ContactId::ZERO;

        // Center inside the polygon.
        if separation < Fp::EPSILON {
            manifold.point_count = 1;
            manifold.local_normal = normals[i1];
            manifold.local_point = (v1 + v2) * Fp::HALF;
            return;
        }

        // Voronoi regions of the closest face.
        let u1 = (c_local - v1).dot(v2 - v1);
        let u2 = (c_local - v2).dot(v1 - v2);
        if u1 <= Fp::ZERO {
            if c_local.distance_squared(v1) > radius * radius {
                return;
            }
            manifold.point_count = 1;
            manifold.local_normal = (c_local - v1).normalized();
            manifold.local_point = v1;
        } else if u2 <= Fp::ZERO {
            if c_local.distance_squared(v2) > radius * radius {
                return;
            }
            manifold.point_count = 1;
            manifold.local_normal = (c_local - v2).normalized();
            manifold.local_point = v2;
        } else {
            let face_center = (v1 + v2) * Fp::HALF;
            if (c_local - face_center).dot(normals[i1]) > radius {
                return;
            }
            manifold.point_count = 1;
            manifold.local_normal = normals[i1];
            manifold.local_point = face_center;
        }
    }

    /// Polygon pair via separating axes, then clipping of the incident edge
    /// against the side planes of the reference face.
    ///
    /// The reference face is A's best face unless B's separation beats it by
    /// the relative/absolute tolerance, which keeps the manifold type from
    /// flickering between steps.
    pub fn collide_polygons(
        manifold: &mut Manifold,
        poly_a: &PolygonShape,
        xf_a: &Transform,
        poly_b: &PolygonShape,
        xf_b: &Transform,
    ) {
        manifold.point_count = 0;
        let total_radius = poly_a.radius + poly_b.radius;

        let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
        if separation_a > total_radius {
            return;
        }

        let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
        if separation_b > total_radius {
            return;
        }

        let flip = separation_b > K_RELATIVE_TOL * separation_a + K_ABSOLUTE_TOL;
        let (poly1, xf1, poly2, xf2, edge1) = if flip {
            manifold.manifold_type = ManifoldType::FaceB;
            (poly_b, xf_b, poly_a, xf_a, edge_b)
        } else {
            manifold.manifold_type = ManifoldType::FaceA;
            (poly_a, xf_a, poly_b, xf_b, edge_a)
        };

        let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

        let vertices1 = poly1.vertices();
        let iv1 = edge1;
        let iv2 = if edge1 + 1 < vertices1.len() { edge1 + 1 } else { 0 };

        let mut v11 = vertices1[iv1];
        let mut v12 = vertices1[iv2];

        let local_tangent = (v12 - v11).normalized();
        let local_normal = local_tangent.right_perp();
        let plane_point = (v11 + v12) * Fp::HALF;

        let tangent = xf1.q.apply(local_tangent);
        let normal = tangent.right_perp();

        v11 = xf1.apply(v11);
        v12 = xf1.apply(v12);

        // Face offset.
        let front_offset = normal.dot(v11);

        // Side offsets, extended by the polygon skin.
        let side_offset1 = -tangent.dot(v11) + total_radius;
        let side_offset2 = tangent.dot(v12) + total_radius;

        let (clip1, np) = clip_segment_to_line(&incident_edge, -tangent, side_offset1, iv1);
        if np < MAX_MANIFOLD_POINTS {
            return;
        }
        let (clip2, np) = clip_segment_to_line(&clip1, tangent, side_offset2, iv2);
        if np < MAX_MANIFOLD_POINTS {
            return;
        }

        manifold.local_normal = local_normal;
        manifold.local_point = plane_point;

        let mut point_count = 0;
        for cv in &clip2 {
            let separation = normal.dot(cv.v) - front_offset;
            if separation <= total_radius {
                let cp = &mut manifold.points[point_count];
                cp.local_point = xf2.apply_t(cv.v);
                cp.id = if flip { cv.id.flipped() } else { cv.id };
                cp.normal_impulse = Fp::ZERO;
                cp.tangent_impulse = Fp::ZERO;
                point_count += 1;
            }
        }
        manifold.point_count = point_count;
    }
}

/// Best separating face of `poly1` against `poly2`, as `(edge, separation)`.
pub(crate) fn find_max_separation(
    poly1: &PolygonShape,
    xf1: &Transform,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> (usize, Fp) {
    let xf = xf2.mul_t(xf1);
    let v2s = poly2.vertices();

    let mut best_index = 0;
    let mut max_separation = Fp::MIN;
    for (i, (v1, n1)) in poly1.vertices().iter().zip(poly1.normals()).enumerate() {
        // poly1 face in poly2's frame
        let n = xf.q.apply(*n1);
        let v1 = xf.apply(*v1);

        let si = v2s
            .iter()
            .map(|v2| n.dot(*v2 - v1))
            .min()
            .unwrap_or(Fp::MAX);

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }
    (best_index, max_separation)
}

/// Edge of `poly2` most anti-parallel to the reference normal, in world space.
fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: &Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    let normals2 = poly2.normals();
    let vertices2 = poly2.vertices();

    // Reference normal in poly2's frame.
    let normal1 = xf2.q.apply_t(xf1.q.apply(poly1.normals[edge1]));

    let mut index = 0;
    let mut min_dot = Fp::MAX;
    for (i, n) in normals2.iter().enumerate() {
        let dot = normal1.dot(*n);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = if i1 + 1 < vertices2.len() { i1 + 1 } else { 0 };
    let id = |i: usize| -> ContactId {
        ContactFeature::new(edge1 as u8, FeatureType::Face, i as u8, FeatureType::Vertex).into()
    };

    [
        ClipVertex {
            v: xf2.apply(vertices2[i1]),
            id: id(i1),
        },
        ClipVertex {
            v: xf2.apply(vertices2[i2]),
            id: id(i2),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::manifold::WorldManifold;
    use approx::assert_abs_diff_eq;

    fn unit_box() -> PolygonShape {
        PolygonShape::new_box(Fp::ONE, Fp::ONE)
    }

    #[test]
    fn circle_center_inside_polygon_uses_face_normal() {
        let mut manifold = Manifold::default();
        let circle = CircleShape::new(Fp::HALF);
        NarrowPhase::collide_polygon_and_circle(
            &mut manifold,
            &unit_box(),
            &Transform::IDENTITY,
            &circle,
            &Transform::from_position(Vec2::from_f32(0.75, 0.0)),
        );
        assert_eq!(manifold.point_count, 1);
        assert_eq!(manifold.manifold_type, ManifoldType::FaceA);
        assert_eq!(manifold.local_normal, Vec2::X);
    }

    #[test]
    fn circle_near_polygon_corner_uses_vertex_region() {
        let mut manifold = Manifold::default();
        let circle = CircleShape::new(Fp::ONE);
        let xf_b = Transform::from_position(Vec2::from_f32(1.5, 1.5));
        NarrowPhase::collide_polygon_and_circle(
            &mut manifold,
            &unit_box(),
            &Transform::IDENTITY,
            &circle,
            &xf_b,
        );
        assert_eq!(manifold.point_count, 1);
        assert_eq!(manifold.local_point, Vec2::from_ints(1, 1));
        assert_abs_diff_eq!(manifold.local_normal.x.to_f64(), 0.70710678, epsilon = 1e-4);

        let far = Transform::from_position(Vec2::from_ints(2, 2));
        NarrowPhase::collide_polygon_and_circle(
            &mut manifold,
            &unit_box(),
            &Transform::IDENTITY,
            &circle,
            &far,
        );
        assert_eq!(manifold.point_count, 0);
    }

    #[test]
    fn stacked_boxes_produce_two_points_on_face() {
        let mut manifold = Manifold::default();
        let xf_b = Transform::from_position(Vec2::from_f32(0.25, 1.95));
        NarrowPhase::collide_polygons(
            &mut manifold,
            &unit_box(),
            &Transform::IDENTITY,
            &unit_box(),
            &xf_b,
        );
        assert_eq!(manifold.point_count, 2);

        let wm = WorldManifold::new(
            &manifold,
            &Transform::IDENTITY,
            unit_box().radius,
            &xf_b,
            unit_box().radius,
        );
        assert_abs_diff_eq!(wm.normal.y.to_f64(), 1.0, epsilon = 1e-6);
        for s in &wm.separations {
            assert_abs_diff_eq!(s.to_f64(), -0.07, epsilon = 1e-4);
        }
        assert_ne!(manifold.points[0].id, manifold.points[1].id);
    }

    #[test]
    fn separated_polygons_have_no_points() {
        let mut manifold = Manifold::default();
        NarrowPhase::collide_polygons(
            &mut manifold,
            &unit_box(),
            &Transform::IDENTITY,
            &unit_box(),
            &Transform::from_position(Vec2::from_f32(2.5, 0.0)),
        );
        assert!(manifold.is_empty());
    }
}
