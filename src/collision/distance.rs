//! GJK closest points and conservative-advancement shape casting.
//!
//! The simplex solver follows the Voronoi-region formulation from Christer
//! Ericson's Real-Time Collision Detection, expressed with barycentric
//! coordinates. All arithmetic is fixed point, so every branch that would
//! divide by a vanishing quantity collapses the simplex instead.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    collision::proxy::DistanceProxy,
    config::{LINEAR_SLOP, MAX_GJK_ITERATIONS, MAX_SHAPE_CAST_ITERATIONS, POLYGON_RADIUS},
    core::{fixed::Fp, types::Transform},
    utils::math::Vec2,
};

/// Warm-start state for [`distance`]. Reset `count` to zero before the first
/// query on a new pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplexCache {
    /// Length or area of the cached simplex.
    pub metric: Fp,
    pub count: u16,
    pub index_a: [u8; 3],
    pub index_b: [u8; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct DistanceInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    pub use_radii: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceOutput {
    /// Closest point on shape A.
    pub point_a: Vec2,
    /// Closest point on shape B.
    pub point_b: Vec2,
    pub distance: Fp,
    /// Number of GJK iterations used.
    pub iterations: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ShapeCastInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    /// Translation applied to B over the cast.
    pub translation_b: Vec2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeCastOutput {
    /// `false` for a miss and for shapes that overlap at the start.
    pub hit: bool,
    pub point: Vec2,
    pub normal: Vec2,
    /// Fraction of `translation_b` travelled before contact.
    pub lambda: Fp,
    pub iterations: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimplexVertex {
    /// Support point in proxy A.
    w_a: Vec2,
    /// Support point in proxy B.
    w_b: Vec2,
    /// `w_b - w_a`.
    w: Vec2,
    /// Barycentric coordinate for the closest point.
    a: Fp,
    index_a: usize,
    index_b: usize,
}

impl SimplexVertex {
    fn support(
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        index_a: usize,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
        index_b: usize,
    ) -> Self {
        let w_a = xf_a.apply(proxy_a.vertex(index_a));
        let w_b = xf_b.apply(proxy_b.vertex(index_b));
        Self {
            w_a,
            w_b,
            w: w_b - w_a,
            a: Fp::ONE,
            index_a,
            index_b,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
    ) -> Self {
        let mut simplex = Simplex::default();

        let cached = usize::from(cache.count);
        let in_range = cached <= 3
            && (0..cached).all(|i| {
                usize::from(cache.index_a[i]) < proxy_a.count()
                    && usize::from(cache.index_b[i]) < proxy_b.count()
            });

        if in_range {
            for i in 0..cached {
                simplex.v[i] = SimplexVertex::support(
                    proxy_a,
                    xf_a,
                    usize::from(cache.index_a[i]),
                    proxy_b,
                    xf_b,
                    usize::from(cache.index_b[i]),
                );
                simplex.v[i].a = Fp::ZERO;
            }
            simplex.count = cached;

            // Flush the cache if the simplex changed shape too much since it
            // was stored.
            if simplex.count > 1 {
                let metric1 = cache.metric;
                let metric2 = simplex.metric();
                if metric2 < Fp::HALF * metric1
                    || Fp::TWO * metric1 < metric2
                    || metric2 < Fp::EPSILON
                {
                    simplex.count = 0;
                }
            }
        }

        if simplex.count == 0 {
            simplex.v[0] = SimplexVertex::support(proxy_a, xf_a, 0, proxy_b, xf_b, 0);
            simplex.count = 1;
        }
        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count as u16;
        for i in 0..self.count {
            cache.index_a[i] = self.v[i].index_a as u8;
            cache.index_b[i] = self.v[i].index_b as u8;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = e12.cross(-self.v[0].w);
                if sgn > Fp::ZERO {
                    // Origin is left of e12.
                    e12.skew()
                } else {
                    e12.right_perp()
                }
            }
            _ => Vec2::ZERO,
        }
    }

    fn closest_point(&self) -> Vec2 {
        match self.count {
            1 => self.v[0].w,
            2 => self.v[0].w * self.v[0].a + self.v[1].w * self.v[1].a,
            _ => Vec2::ZERO,
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        match self.count {
            1 => (self.v[0].w_a, self.v[0].w_b),
            2 => (
                self.v[0].w_a * self.v[0].a + self.v[1].w_a * self.v[1].a,
                self.v[0].w_b * self.v[0].a + self.v[1].w_b * self.v[1].a,
            ),
            _ => {
                let p = self.v[0].w_a * self.v[0].a
                    + self.v[1].w_a * self.v[1].a
                    + self.v[2].w_a * self.v[2].a;
                (p, p)
            }
        }
    }

    fn metric(&self) -> Fp {
        match self.count {
            2 => self.v[0].w.distance(self.v[1].w),
            3 => (self.v[1].w - self.v[0].w).cross(self.v[2].w - self.v[0].w),
            _ => Fp::ZERO,
        }
    }

    /// Closest point on a segment to the origin.
    ///
    /// Region A: `dot(-w1, e12) <= 0`, region B: `dot(w2, e12) <= 0`,
    /// otherwise the interior with barycentric weights `(d12_1, d12_2)`.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        let d12_2 = -w1.dot(e12);
        if d12_2 <= Fp::ZERO {
            self.v[0].a = Fp::ONE;
            self.count = 1;
            return;
        }

        let d12_1 = w2.dot(e12);
        if d12_1 <= Fp::ZERO {
            self.v[1].a = Fp::ONE;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        let inv = Fp::ONE / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv;
        self.v[1].a = d12_2 * inv;
        self.count = 2;
    }

    /// Closest point on a triangle to the origin, checking the vertex, edge
    /// and interior regions in turn.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        let n123 = e12.cross(e13);
        let d123_1 = n123 * w2.cross(w3);
        let d123_2 = n123 * w3.cross(w1);
        let d123_3 = n123 * w1.cross(w2);

        // w1 region
        if d12_2 <= Fp::ZERO && d13_2 <= Fp::ZERO {
            self.v[0].a = Fp::ONE;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > Fp::ZERO && d12_2 > Fp::ZERO && d123_3 <= Fp::ZERO {
            let inv = Fp::ONE / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv;
            self.v[1].a = d12_2 * inv;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > Fp::ZERO && d13_2 > Fp::ZERO && d123_2 <= Fp::ZERO {
            let inv = Fp::ONE / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv;
            self.v[2].a = d13_2 * inv;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        // w2 region
        if d12_1 <= Fp::ZERO && d23_2 <= Fp::ZERO {
            self.v[1].a = Fp::ONE;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // w3 region
        if d13_1 <= Fp::ZERO && d23_1 <= Fp::ZERO {
            self.v[2].a = Fp::ONE;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        // e23
        if d23_1 > Fp::ZERO && d23_2 > Fp::ZERO && d123_1 <= Fp::ZERO {
            let inv = Fp::ONE / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv;
            self.v[2].a = d23_2 * inv;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        let d123 = d123_1 + d123_2 + d123_3;
        if d123 <= Fp::ZERO {
            // Collinear or underflowed triangle: keep the first edge.
            self.count = 2;
            self.solve2();
            return;
        }

        // Must be in the triangle.
        let inv = Fp::ONE / d123;
        self.v[0].a = d123_1 * inv;
        self.v[1].a = d123_2 * inv;
        self.v[2].a = d123_3 * inv;
        self.count = 3;
    }

    fn solve(&mut self) {
        match self.count {
            2 => self.solve2(),
            3 => self.solve3(),
            _ => {}
        }
    }
}

/// Closest points between two convex proxies. `cache` is read to warm start
/// and rewritten with the final simplex.
pub fn distance(input: &DistanceInput, cache: &mut SimplexCache) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = &input.transform_a;
    let xf_b = &input.transform_b;

    let mut simplex = Simplex::read_cache(cache, proxy_a, xf_a, proxy_b, xf_b);

    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];
    let mut iterations = 0u32;

    while (iterations as usize) < MAX_GJK_ITERATIONS {
        // Remember the simplex so duplicate support points can be detected.
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        simplex.solve();

        // The origin is inside the triangle: overlap.
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();

        // The origin is on the segment or too close to a vertex to get a
        // useful direction.
        if d.length_squared() < Fp::EPSILON * Fp::EPSILON {
            break;
        }

        let index_a = proxy_a.support(xf_a.q.apply_t(-d));
        let index_b = proxy_b.support(xf_b.q.apply_t(d));
        let vertex = SimplexVertex::support(proxy_a, xf_a, index_a, proxy_b, xf_b, index_b);

        iterations += 1;

        // A repeated support point means no further progress is possible.
        let duplicate = (0..save_count)
            .any(|i| vertex.index_a == save_a[i] && vertex.index_b == save_b[i]);
        if duplicate {
            break;
        }

        simplex.v[simplex.count] = vertex;
        simplex.count += 1;
    }

    if iterations as usize == MAX_GJK_ITERATIONS {
        debug!("gjk reached its iteration cap ({MAX_GJK_ITERATIONS})");
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = point_a.distance(point_b);
    simplex.write_cache(cache);

    if input.use_radii {
        if dist < Fp::EPSILON {
            // Too close to compute a reliable normal.
            let p = (point_a + point_b) * Fp::HALF;
            point_a = p;
            point_b = p;
            dist = Fp::ZERO;
        } else {
            // Keep the points on the skin even when the radii overlap so
            // that they move continuously.
            let r_a = proxy_a.radius;
            let r_b = proxy_b.radius;
            dist = (dist - r_a - r_b).max(Fp::ZERO);
            let normal = (point_b - point_a).normalized();
            point_a += normal * r_a;
            point_b -= normal * r_b;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations,
    }
}

/// Sweeps proxy B along `translation_b` against a fixed proxy A using
/// conservative advancement. Shapes that already overlap report no hit.
pub fn shape_cast(input: &ShapeCastInput) -> ShapeCastOutput {
    let mut output = ShapeCastOutput::default();

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = &input.transform_a;
    let xf_b = &input.transform_b;

    let radius_a = proxy_a.radius.max(POLYGON_RADIUS);
    let radius_b = proxy_b.radius.max(POLYGON_RADIUS);
    let radius = radius_a + radius_b;

    let r = input.translation_b;
    let mut n = Vec2::ZERO;
    let mut lambda = Fp::ZERO;

    let mut simplex = Simplex::default();

    // Initial direction from the support points along the cast.
    let index_a = proxy_a.support(xf_a.q.apply_t(-r));
    let w_a = xf_a.apply(proxy_a.vertex(index_a));
    let index_b = proxy_b.support(xf_b.q.apply_t(r));
    let w_b = xf_b.apply(proxy_b.vertex(index_b));
    let mut v = w_a - w_b;

    // Target separation between the cores.
    let sigma = POLYGON_RADIUS.max(radius - POLYGON_RADIUS);
    let tolerance = Fp::HALF * LINEAR_SLOP;

    while (output.iterations as usize) < MAX_SHAPE_CAST_ITERATIONS && v.length() - sigma > tolerance {
        output.iterations += 1;

        let index_a = proxy_a.support(xf_a.q.apply_t(-v));
        let w_a = xf_a.apply(proxy_a.vertex(index_a));
        let index_b = proxy_b.support(xf_b.q.apply_t(v));
        let w_b = xf_b.apply(proxy_b.vertex(index_b));
        let p = w_a - w_b;

        // -v is a normal at p
        v.normalize();

        // Intersect the ray with the plane.
        let vp = v.dot(p);
        let vr = v.dot(r);
        if vp - sigma > lambda * vr {
            if vr <= Fp::ZERO {
                // Moving away.
                return output;
            }
            lambda = (vp - sigma) / vr;
            if lambda > Fp::ONE {
                return output;
            }
            n = -v;
            simplex.count = 0;
        }

        // Reverse the simplex since it works with B - A; shift by lambda
        // because B is the moving shape.
        let w_a_shifted = w_b + r * lambda;
        let slot = &mut simplex.v[simplex.count];
        slot.index_a = index_b;
        slot.w_a = w_a_shifted;
        slot.index_b = index_a;
        slot.w_b = w_a;
        slot.w = slot.w_b - slot.w_a;
        slot.a = Fp::ONE;
        simplex.count += 1;

        simplex.solve();

        if simplex.count == 3 {
            // Overlap
            return output;
        }

        v = simplex.closest_point();
    }

    if output.iterations == 0 {
        // Initial overlap
        return output;
    }

    if output.iterations as usize == MAX_SHAPE_CAST_ITERATIONS {
        debug!("shape cast reached its iteration cap ({MAX_SHAPE_CAST_ITERATIONS})");
    }

    // The simplex holds B - A, so the witness pair comes back swapped.
    let (_, point_a) = simplex.witness_points();
    if v.length_squared() > Fp::ZERO {
        n = (-v).normalized();
    }

    output.hit = true;
    output.point = point_a + n * radius_a;
    output.normal = n;
    output.lambda = lambda;
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shape::Shape;
    use approx::assert_abs_diff_eq;

    fn circle_proxy() -> DistanceProxy {
        DistanceProxy::new(&Shape::circle(Fp::ONE).expect("circle"), 0)
    }

    #[test]
    fn separated_circles_subtract_radii() {
        let input = DistanceInput {
            proxy_a: circle_proxy(),
            proxy_b: circle_proxy(),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::from_position(Vec2::from_ints(3, 0)),
            use_radii: true,
        };
        let mut cache = SimplexCache::default();
        let out = distance(&input, &mut cache);
        assert_eq!(out.distance, Fp::ONE);
        assert_eq!(out.point_a, Vec2::from_ints(1, 0));
        assert_eq!(out.point_b, Vec2::from_ints(2, 0));
        assert_eq!(cache.count, 1);
    }

    #[test]
    fn overlapping_boxes_report_zero_distance() {
        let proxy = DistanceProxy::new(&Shape::boxed(Fp::ONE, Fp::ONE), 0);
        let input = DistanceInput {
            proxy_a: proxy,
            proxy_b: proxy,
            transform_a: Transform::IDENTITY,
            transform_b: Transform::from_position(Vec2::from_f32(0.5, 0.25)),
            use_radii: false,
        };
        let out = distance(&input, &mut SimplexCache::default());
        assert_eq!(out.distance, Fp::ZERO);
    }

    #[test]
    fn stale_cache_indices_fall_back_to_cold_start() {
        let proxy = circle_proxy();
        let input = DistanceInput {
            proxy_a: proxy,
            proxy_b: proxy,
            transform_a: Transform::IDENTITY,
            transform_b: Transform::from_position(Vec2::from_ints(4, 0)),
            use_radii: true,
        };
        let mut cache = SimplexCache {
            metric: Fp::ONE,
            count: 2,
            index_a: [5, 6, 0],
            index_b: [0, 7, 0],
        };
        let out = distance(&input, &mut cache);
        assert_eq!(out.distance, Fp::TWO);
        assert_eq!(cache.count, 1);
    }

    #[test]
    fn shape_cast_reports_time_of_contact() {
        let proxy = DistanceProxy::new(&Shape::boxed(Fp::HALF, Fp::HALF), 0);
        let input = ShapeCastInput {
            proxy_a: proxy,
            proxy_b: proxy,
            transform_a: Transform::IDENTITY,
            transform_b: Transform::from_position(Vec2::from_ints(5, 0)),
            translation_b: Vec2::from_ints(-8, 0),
        };
        let out = shape_cast(&input);
        assert!(out.hit);
        // Cores are 4 apart and stop at the skin separation of 0.01.
        assert_abs_diff_eq!(out.lambda.to_f64(), (4.0 - 0.01) / 8.0, epsilon = 2e-3);
        assert_abs_diff_eq!(out.normal.x.to_f64(), 1.0, epsilon = 1e-6);
        assert!(out.iterations > 0);
        assert!(out.iterations as usize <= MAX_SHAPE_CAST_ITERATIONS);
    }

    #[test]
    fn shape_cast_misses_when_moving_away() {
        let proxy = circle_proxy();
        let input = ShapeCastInput {
            proxy_a: proxy,
            proxy_b: proxy,
            transform_a: Transform::IDENTITY,
            transform_b: Transform::from_position(Vec2::from_ints(5, 0)),
            translation_b: Vec2::from_ints(3, 0),
        };
        assert!(!shape_cast(&input).hit);
    }
}
