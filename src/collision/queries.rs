use serde::{Deserialize, Serialize};

use crate::{
    core::{
        fixed::Fp,
        shape::{CircleShape, EdgeShape, PolygonShape, Shape},
        types::Transform,
    },
    utils::{allocator::EntityId, math::Vec2},
};

/// Ray segment from `p1` to `p1 + max_fraction * (p2 - p1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: Fp,
}

/// Hit normal and fraction along the input segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RayCastOutput {
    pub normal: Vec2,
    pub fraction: Fp,
}

/// World-level hit reported by [`crate::world::PhysicsWorld::ray_cast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RayCastHit {
    pub fixture: EntityId,
    pub body: EntityId,
    pub child_index: usize,
    pub point: Vec2,
    pub normal: Vec2,
    pub fraction: Fp,
}

impl Shape {
    /// Casts a world-space ray against child `child_index` placed at `xf`.
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(circle) => ray_cast_circle(circle, input, xf),
            Shape::Polygon(poly) => ray_cast_polygon(poly, input, xf),
            Shape::Edge(edge) => ray_cast_edge(edge, input, xf),
            Shape::Chain(chain) => ray_cast_edge(&chain.child_edge(child_index), input, xf),
        }
    }
}

fn ray_cast_circle(
    circle: &CircleShape,
    input: &RayCastInput,
    xf: &Transform,
) -> Option<RayCastOutput> {
    let position = xf.apply(circle.position);
    let s = input.p1 - position;
    let b = s.length_squared() - circle.radius * circle.radius;

    // Solve quadratic equation.
    let r = input.p2 - input.p1;
    let c = s.dot(r);
    let rr = r.length_squared();
    let sigma = c * c - rr * b;

    if sigma < Fp::ZERO || rr < Fp::EPSILON {
        return None;
    }

    let mut a = -(c + sigma.sqrt());
    if Fp::ZERO <= a && a <= input.max_fraction * rr {
        a /= rr;
        return Some(RayCastOutput {
            normal: (s + r * a).normalized(),
            fraction: a,
        });
    }
    None
}

fn ray_cast_polygon(
    poly: &PolygonShape,
    input: &RayCastInput,
    xf: &Transform,
) -> Option<RayCastOutput> {
    let p1 = xf.apply_t(input.p1);
    let p2 = xf.apply_t(input.p2);
    let d = p2 - p1;

    let mut lower = Fp::ZERO;
    let mut upper = input.max_fraction;
    let mut index = None;

    for (i, (v, n)) in poly.vertices().iter().zip(poly.normals()).enumerate() {
        // p = p1 + a * d
        // dot(normal, p - v) = 0
        let numerator = n.dot(*v - p1);
        let denominator = n.dot(d);

        if denominator == Fp::ZERO {
            if numerator < Fp::ZERO {
                return None;
            }
        } else if denominator < Fp::ZERO && numerator < lower * denominator {
            // Entering this half-space.
            lower = numerator / denominator;
            index = Some(i);
        } else if denominator > Fp::ZERO && numerator < upper * denominator {
            // Leaving this half-space.
            upper = numerator / denominator;
        }

        if upper < lower {
            return None;
        }
    }

    index.map(|i| RayCastOutput {
        normal: xf.q.apply(poly.normals[i]),
        fraction: lower,
    })
}

fn ray_cast_edge(edge: &EdgeShape, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
    // Work in the edge's frame.
    let p1 = xf.apply_t(input.p1);
    let p2 = xf.apply_t(input.p2);
    let d = p2 - p1;

    let v1 = edge.vertex1;
    let v2 = edge.vertex2;
    let e = v2 - v1;

    // Normal points to the right, looking from v1 at v2.
    let normal = e.right_perp().normalized();

    let numerator = normal.dot(v1 - p1);
    if edge.one_sided && numerator > Fp::ZERO {
        return None;
    }

    let denominator = normal.dot(d);
    if denominator.abs() < Fp::EPSILON {
        return None;
    }

    let t = numerator / denominator;
    if t < Fp::ZERO || input.max_fraction < t {
        return None;
    }

    let q = p1 + d * t;
    let rr = e.length_squared();
    if rr.abs() < Fp::EPSILON {
        return None;
    }

    let s = (q - v1).dot(e) / rr;
    if s < Fp::ZERO || Fp::ONE < s {
        return None;
    }

    let world_normal = xf.q.apply(normal);
    Some(RayCastOutput {
        normal: if numerator > Fp::ZERO {
            -world_normal
        } else {
            world_normal
        },
        fraction: t,
    })
}
