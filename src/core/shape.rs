//! Convex collision primitives.
//!
//! Shapes are plain data in body space. Every routine that needs to treat
//! them uniformly goes through [`crate::collision::proxy::DistanceProxy`];
//! everything else matches on [`Shape`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS},
    core::{
        aabb::Aabb,
        fixed::Fp,
        types::{MassData, Transform},
    },
    utils::math::Vec2,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("polygon supports at most {max} vertices, got {count}")]
    TooManyVertices { count: usize, max: usize },
    #[error("polygon hull is degenerate")]
    DegenerateHull,
    #[error("chain needs at least {min} vertices, got {count}")]
    ChainTooShort { count: usize, min: usize },
    #[error("chain vertices {0} and {1} are closer than the linear slop")]
    VerticesTooClose(usize, usize),
    #[error("radius must be positive")]
    InvalidRadius,
}

/// Discriminant used to key contact dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShapeType {
    Circle = 0,
    Edge = 1,
    Polygon = 2,
    Chain = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircleShape {
    pub position: Vec2,
    pub radius: Fp,
}

impl CircleShape {
    pub fn new(radius: Fp) -> Self {
        Self {
            position: Vec2::ZERO,
            radius,
        }
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }
}

/// Convex polygon with counter-clockwise winding and a skin radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolygonShape {
    pub vertices: [Vec2; MAX_POLYGON_VERTICES],
    pub normals: [Vec2; MAX_POLYGON_VERTICES],
    pub count: usize,
    pub centroid: Vec2,
    pub radius: Fp,
}

impl PolygonShape {
    /// Builds the convex hull of `points`. Points closer than half the linear
    /// slop are welded and collinear points are dropped.
    pub fn new(points: &[Vec2]) -> Result<Self, ShapeError> {
        if points.len() < 3 {
            return Err(ShapeError::TooFewVertices(points.len()));
        }
        if points.len() > MAX_POLYGON_VERTICES {
            return Err(ShapeError::TooManyVertices {
                count: points.len(),
                max: MAX_POLYGON_VERTICES,
            });
        }

        let weld = Fp::HALF * LINEAR_SLOP;
        let weld_sq = weld * weld;
        let mut unique = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let mut n = 0;
        for &v in points {
            if unique[..n].iter().all(|u| v.distance_squared(*u) >= weld_sq) {
                unique[n] = v;
                n += 1;
            }
        }
        if n < 3 {
            return Err(ShapeError::DegenerateHull);
        }

        // Gift wrapping, starting from the rightmost (then lowest) point.
        let mut i0 = 0;
        for i in 1..n {
            let x = unique[i].x;
            if x > unique[i0].x || (x == unique[i0].x && unique[i].y < unique[i0].y) {
                i0 = i;
            }
        }

        let mut hull = [0usize; MAX_POLYGON_VERTICES];
        let mut m = 0;
        let mut ih = i0;
        loop {
            if m == MAX_POLYGON_VERTICES {
                return Err(ShapeError::DegenerateHull);
            }
            hull[m] = ih;

            let mut ie = 0;
            for j in 1..n {
                if ie == ih {
                    ie = j;
                    continue;
                }
                let r = unique[ie] - unique[hull[m]];
                let v = unique[j] - unique[hull[m]];
                let c = r.cross(v);
                if c < Fp::ZERO {
                    ie = j;
                }
                if c == Fp::ZERO && v.length_squared() > r.length_squared() {
                    ie = j;
                }
            }

            m += 1;
            ih = ie;
            if ie == i0 {
                break;
            }
        }

        if m < 3 {
            return Err(ShapeError::DegenerateHull);
        }

        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        for (slot, &index) in vertices.iter_mut().zip(&hull[..m]) {
            *slot = unique[index];
        }
        Self::from_hull(&vertices[..m])
    }

    /// Wraps vertices that are already a CCW convex hull.
    fn from_hull(hull: &[Vec2]) -> Result<Self, ShapeError> {
        let count = hull.len();
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let mut normals = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[..count].copy_from_slice(hull);

        for i in 0..count {
            let edge = vertices[(i + 1) % count] - vertices[i];
            if edge.length_squared() <= Fp::EPSILON * Fp::EPSILON {
                return Err(ShapeError::DegenerateHull);
            }
            normals[i] = edge.right_perp().normalized();
        }

        let centroid = compute_centroid(&vertices[..count]).ok_or(ShapeError::DegenerateHull)?;
        Ok(Self {
            vertices,
            normals,
            count,
            centroid,
            radius: POLYGON_RADIUS,
        })
    }

    /// Axis-aligned box centered on the body origin.
    pub fn new_box(hx: Fp, hy: Fp) -> Self {
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let mut normals = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[0] = Vec2::new(-hx, -hy);
        vertices[1] = Vec2::new(hx, -hy);
        vertices[2] = Vec2::new(hx, hy);
        vertices[3] = Vec2::new(-hx, hy);
        normals[0] = Vec2::from_ints(0, -1);
        normals[1] = Vec2::from_ints(1, 0);
        normals[2] = Vec2::from_ints(0, 1);
        normals[3] = Vec2::from_ints(-1, 0);
        Self {
            vertices,
            normals,
            count: 4,
            centroid: Vec2::ZERO,
            radius: POLYGON_RADIUS,
        }
    }

    /// Box rotated by `angle` and centered at `center` in body space.
    pub fn new_oriented_box(hx: Fp, hy: Fp, center: Vec2, angle: Fp) -> Self {
        let mut shape = Self::new_box(hx, hy);
        let xf = Transform::new(center, angle);
        for i in 0..shape.count {
            shape.vertices[i] = xf.apply(shape.vertices[i]);
            shape.normals[i] = xf.q.apply(shape.normals[i]);
        }
        shape.centroid = center;
        shape
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    pub fn normals(&self) -> &[Vec2] {
        &self.normals[..self.count]
    }

    pub fn with_radius(mut self, radius: Fp) -> Self {
        self.radius = radius;
        self
    }

    /// Convexity and winding check.
    pub fn validate(&self) -> bool {
        for i in 0..self.count {
            let i2 = (i + 1) % self.count;
            let p = self.vertices[i];
            let e = self.vertices[i2] - p;
            for j in 0..self.count {
                if j == i || j == i2 {
                    continue;
                }
                if e.cross(self.vertices[j] - p) <= Fp::ZERO {
                    return false;
                }
            }
        }
        true
    }
}

fn compute_centroid(vs: &[Vec2]) -> Option<Vec2> {
    let origin = vs[0];
    let inv3 = Fp::ratio(1, 3);
    let mut c = Vec2::ZERO;
    let mut area = Fp::ZERO;

    for i in 0..vs.len() {
        let e1 = vs[i] - origin;
        let e2 = vs[(i + 1) % vs.len()] - origin;
        let tri_area = Fp::HALF * e1.cross(e2);
        area += tri_area;
        c += (e1 + e2) * (tri_area * inv3);
    }

    if area <= Fp::EPSILON * Fp::EPSILON {
        return None;
    }
    Some(c * (Fp::ONE / area) + origin)
}

/// Line segment with optional ghost neighbors. One-sided edges collide only
/// on their right side (looking from `vertex1` to `vertex2`) and use the
/// ghost vertices to smooth collisions across shared vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeShape {
    pub vertex0: Vec2,
    pub vertex1: Vec2,
    pub vertex2: Vec2,
    pub vertex3: Vec2,
    pub one_sided: bool,
    pub radius: Fp,
}

impl EdgeShape {
    pub fn two_sided(v1: Vec2, v2: Vec2) -> Self {
        Self {
            vertex0: Vec2::ZERO,
            vertex1: v1,
            vertex2: v2,
            vertex3: Vec2::ZERO,
            one_sided: false,
            radius: POLYGON_RADIUS,
        }
    }

    pub fn one_sided(v0: Vec2, v1: Vec2, v2: Vec2, v3: Vec2) -> Self {
        Self {
            vertex0: v0,
            vertex1: v1,
            vertex2: v2,
            vertex3: v3,
            one_sided: true,
            radius: POLYGON_RADIUS,
        }
    }
}

/// Strip or loop of one-sided edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainShape {
    /// For loops the first vertex is repeated at the end.
    pub vertices: Vec<Vec2>,
    pub prev_vertex: Vec2,
    pub next_vertex: Vec2,
    pub radius: Fp,
}

impl ChainShape {
    /// Closed loop. Connectivity is created automatically.
    pub fn new_loop(points: &[Vec2]) -> Result<Self, ShapeError> {
        if points.len() < 3 {
            return Err(ShapeError::ChainTooShort {
                count: points.len(),
                min: 3,
            });
        }
        validate_spacing(points)?;
        let last = points.len() - 1;
        if points[last].distance_squared(points[0]) <= LINEAR_SLOP * LINEAR_SLOP {
            return Err(ShapeError::VerticesTooClose(last, 0));
        }

        let mut vertices = Vec::with_capacity(points.len() + 1);
        vertices.extend_from_slice(points);
        vertices.push(points[0]);
        let count = vertices.len();
        Ok(Self {
            prev_vertex: vertices[count - 2],
            next_vertex: vertices[1],
            vertices,
            radius: POLYGON_RADIUS,
        })
    }

    /// Open chain with explicit ghost vertices at both ends.
    pub fn new_chain(points: &[Vec2], prev_vertex: Vec2, next_vertex: Vec2) -> Result<Self, ShapeError> {
        if points.len() < 2 {
            return Err(ShapeError::ChainTooShort {
                count: points.len(),
                min: 2,
            });
        }
        validate_spacing(points)?;
        Ok(Self {
            vertices: points.to_vec(),
            prev_vertex,
            next_vertex,
            radius: POLYGON_RADIUS,
        })
    }

    pub fn child_count(&self) -> usize {
        self.vertices.len() - 1
    }

    /// One-sided edge for segment `index`, with its neighbors as ghosts.
    pub fn child_edge(&self, index: usize) -> EdgeShape {
        let count = self.vertices.len();
        assert!(index + 1 < count, "chain child {index} out of range");

        let v0 = if index > 0 {
            self.vertices[index - 1]
        } else {
            self.prev_vertex
        };
        let v3 = if index + 2 < count {
            self.vertices[index + 2]
        } else {
            self.next_vertex
        };

        let mut edge = EdgeShape::one_sided(v0, self.vertices[index], self.vertices[index + 1], v3);
        edge.radius = self.radius;
        edge
    }
}

fn validate_spacing(points: &[Vec2]) -> Result<(), ShapeError> {
    let min_sq = LINEAR_SLOP * LINEAR_SLOP;
    for i in 1..points.len() {
        if points[i - 1].distance_squared(points[i]) <= min_sq {
            return Err(ShapeError::VerticesTooClose(i - 1, i));
        }
    }
    Ok(())
}

/// Closed set of collision shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    Circle(CircleShape),
    Edge(EdgeShape),
    Polygon(PolygonShape),
    Chain(ChainShape),
}

impl Shape {
    pub fn circle(radius: Fp) -> Result<Self, ShapeError> {
        if radius <= Fp::ZERO {
            return Err(ShapeError::InvalidRadius);
        }
        Ok(Shape::Circle(CircleShape::new(radius)))
    }

    pub fn boxed(hx: Fp, hy: Fp) -> Self {
        Shape::Polygon(PolygonShape::new_box(hx, hy))
    }

    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Circle(_) => ShapeType::Circle,
            Shape::Edge(_) => ShapeType::Edge,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::Chain(_) => ShapeType::Chain,
        }
    }

    pub fn radius(&self) -> Fp {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Edge(e) => e.radius,
            Shape::Polygon(p) => p.radius,
            Shape::Chain(c) => c.radius,
        }
    }

    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(chain) => chain.child_count(),
            _ => 1,
        }
    }

    /// Whether a world point lies inside the shape. Edges and chains have no
    /// interior.
    pub fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        match self {
            Shape::Circle(circle) => {
                let center = xf.apply(circle.position);
                point.distance_squared(center) <= circle.radius * circle.radius
            }
            Shape::Polygon(poly) => {
                let local = xf.apply_t(point);
                poly.vertices()
                    .iter()
                    .zip(poly.normals())
                    .all(|(v, n)| n.dot(local - *v) <= Fp::ZERO)
            }
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }

    pub fn compute_aabb(&self, xf: &Transform, child_index: usize) -> Aabb {
        match self {
            Shape::Circle(circle) => {
                let p = xf.apply(circle.position);
                let r = Vec2::new(circle.radius, circle.radius);
                Aabb::new(p - r, p + r)
            }
            Shape::Polygon(poly) => {
                let first = xf.apply(poly.vertices[0]);
                let (lower, upper) = poly.vertices()[1..]
                    .iter()
                    .map(|v| xf.apply(*v))
                    .fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
                Aabb::new(lower, upper).fattened(poly.radius)
            }
            Shape::Edge(edge) => {
                Aabb::from_points(xf.apply(edge.vertex1), xf.apply(edge.vertex2)).fattened(edge.radius)
            }
            Shape::Chain(chain) => {
                let next = (child_index + 1) % chain.vertices.len();
                let v1 = xf.apply(chain.vertices[child_index]);
                let v2 = xf.apply(chain.vertices[next]);
                Aabb::from_points(v1, v2).fattened(chain.radius)
            }
        }
    }

    /// Mass properties for the given density. Edges and chains are massless.
    pub fn compute_mass(&self, density: Fp) -> MassData {
        match self {
            Shape::Circle(circle) => {
                let rr = circle.radius * circle.radius;
                let mass = density * Fp::PI * rr;
                MassData {
                    mass,
                    center: circle.position,
                    inertia: mass * (Fp::HALF * rr + circle.position.length_squared()),
                }
            }
            Shape::Polygon(poly) => polygon_mass(poly, density),
            Shape::Edge(edge) => MassData {
                mass: Fp::ZERO,
                center: (edge.vertex1 + edge.vertex2) * Fp::HALF,
                inertia: Fp::ZERO,
            },
            Shape::Chain(_) => MassData::default(),
        }
    }
}

fn polygon_mass(poly: &PolygonShape, density: Fp) -> MassData {
    // Triangle fan about the first vertex keeps the products small.
    let s = poly.vertices[0];
    let inv3 = Fp::ratio(1, 3);
    let mut center = Vec2::ZERO;
    let mut area = Fp::ZERO;
    let mut inertia = Fp::ZERO;

    let vs = poly.vertices();
    for i in 0..vs.len() {
        let e1 = vs[i] - s;
        let e2 = vs[(i + 1) % vs.len()] - s;
        let d = e1.cross(e2);
        let tri_area = Fp::HALF * d;
        area += tri_area;
        center += (e1 + e2) * (tri_area * inv3);

        let intx2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
        let inty2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
        inertia += (Fp::ratio(1, 4) * inv3 * d) * (intx2 + inty2);
    }

    let mass = density * area;
    let center = center * (Fp::ONE / area);
    let world_center = center + s;
    let inertia =
        density * inertia + mass * (world_center.length_squared() - center.length_squared());
    MassData {
        mass,
        center: world_center,
        inertia,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn hull_discards_interior_and_collinear_points() {
        let points = [
            Vec2::from_ints(0, 0),
            Vec2::from_ints(2, 0),
            Vec2::from_ints(1, 0),
            Vec2::from_ints(2, 2),
            Vec2::from_ints(1, 1),
            Vec2::from_ints(0, 2),
        ];
        let poly = PolygonShape::new(&points).expect("valid hull");
        assert_eq!(poly.count, 4);
        assert!(poly.validate());
        assert_abs_diff_eq!(poly.centroid.x.to_f64(), 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(poly.centroid.y.to_f64(), 1.0, epsilon = 1e-8);
    }

    #[test]
    fn hull_rejects_degenerate_input() {
        let line = [Vec2::from_ints(0, 0), Vec2::from_ints(1, 0), Vec2::from_ints(2, 0)];
        assert_eq!(PolygonShape::new(&line), Err(ShapeError::DegenerateHull));
        assert_eq!(
            PolygonShape::new(&line[..2]),
            Err(ShapeError::TooFewVertices(2))
        );
        let many = [Vec2::ZERO; 9];
        assert!(matches!(
            PolygonShape::new(&many),
            Err(ShapeError::TooManyVertices { count: 9, .. })
        ));
    }

    #[test]
    fn box_mass_matches_closed_form() {
        let shape = Shape::boxed(Fp::ONE, Fp::HALF);
        let mass = shape.compute_mass(Fp::TWO);
        // 2 x 1 box with density 2
        assert_abs_diff_eq!(mass.mass.to_f64(), 4.0, epsilon = 1e-8);
        assert_abs_diff_eq!(mass.center.x.to_f64(), 0.0, epsilon = 1e-8);
        let expected_inertia = 4.0 * (4.0 + 1.0) / 12.0;
        assert_abs_diff_eq!(mass.inertia.to_f64(), expected_inertia, epsilon = 1e-6);
    }

    #[test]
    fn offset_polygon_mass_uses_parallel_axis() {
        let points = [
            Vec2::from_ints(1, 1),
            Vec2::from_ints(3, 1),
            Vec2::from_ints(3, 3),
            Vec2::from_ints(1, 3),
        ];
        let poly = PolygonShape::new(&points).expect("square");
        let mass = Shape::Polygon(poly).compute_mass(Fp::ONE);
        assert_abs_diff_eq!(mass.mass.to_f64(), 4.0, epsilon = 1e-8);
        assert_abs_diff_eq!(mass.center.x.to_f64(), 2.0, epsilon = 1e-8);
        assert_abs_diff_eq!(mass.center.y.to_f64(), 2.0, epsilon = 1e-8);
        // I about centroid + m * |c|^2
        let expected = 4.0 * 8.0 / 12.0 + 4.0 * 8.0;
        assert_abs_diff_eq!(mass.inertia.to_f64(), expected, epsilon = 1e-5);
    }

    #[test]
    fn chain_loop_wraps_ghost_vertices() {
        let square = [
            Vec2::from_ints(0, 0),
            Vec2::from_ints(4, 0),
            Vec2::from_ints(4, 4),
            Vec2::from_ints(0, 4),
        ];
        let chain = ChainShape::new_loop(&square).expect("loop");
        assert_eq!(chain.child_count(), 4);

        let first = chain.child_edge(0);
        assert!(first.one_sided);
        assert_eq!(first.vertex0, Vec2::from_ints(0, 4));
        assert_eq!(first.vertex3, Vec2::from_ints(4, 4));

        let last = chain.child_edge(3);
        assert_eq!(last.vertex1, Vec2::from_ints(0, 4));
        assert_eq!(last.vertex2, Vec2::from_ints(0, 0));
        assert_eq!(last.vertex3, Vec2::from_ints(4, 0));
    }

    #[test]
    fn chain_rejects_coincident_vertices() {
        let pts = [Vec2::ZERO, Vec2::ZERO, Vec2::from_ints(1, 0)];
        assert_eq!(
            ChainShape::new_chain(&pts, Vec2::ZERO, Vec2::ZERO),
            Err(ShapeError::VerticesTooClose(0, 1))
        );
    }

    #[test]
    fn loop_rejects_closing_segment_that_is_too_short() {
        let pts = [
            Vec2::ZERO,
            Vec2::from_ints(2, 0),
            Vec2::from_ints(2, 2),
            Vec2::new(Fp::ratio(1, 1000), Fp::ZERO),
        ];
        assert_eq!(
            ChainShape::new_loop(&pts),
            Err(ShapeError::VerticesTooClose(3, 0))
        );
        // The same points are fine as an open chain.
        assert!(ChainShape::new_chain(&pts, Vec2::from_ints(-1, 0), Vec2::from_ints(-1, 0)).is_ok());
    }

    #[test]
    fn polygon_test_point_respects_transform() {
        let shape = Shape::boxed(Fp::ONE, Fp::ONE);
        let xf = Transform::from_position(Vec2::from_ints(5, 0));
        assert!(shape.test_point(&xf, Vec2::from_f32(5.5, 0.5)));
        assert!(!shape.test_point(&xf, Vec2::from_f32(0.5, 0.5)));
    }
}
