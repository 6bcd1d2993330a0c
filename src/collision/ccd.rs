//! Continuous collision: time of impact between two swept proxies.
//!
//! Conservative advancement over a separating axis picked from the GJK
//! simplex, with a mixed bisection/secant root finder per axis.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    collision::{
        distance::{distance, DistanceInput, SimplexCache},
        proxy::DistanceProxy,
    },
    config::{LINEAR_SLOP, MAX_POLYGON_VERTICES, MAX_TOI_ITERATIONS, MAX_TOI_ROOT_ITERATIONS},
    core::{
        fixed::Fp,
        types::{Sweep, Transform},
    },
    utils::math::Vec2,
};

#[derive(Debug, Clone, Copy)]
pub struct ToiInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Upper bound of the sweep interval, usually one.
    pub t_max: Fp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToiState {
    #[default]
    Unknown,
    /// The root finder gave up; `t` is the last safe time.
    Failed,
    /// The shapes already overlap at the start of the sweep.
    Overlapped,
    /// The shapes reach the target separation at `t`.
    Touching,
    /// The shapes never come within the target separation.
    Separated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: Fp,
    /// Outer advancement iterations.
    pub iterations: u32,
    /// Root finder iterations summed over the call.
    pub root_iterations: u32,
    /// Largest root finder run within the call.
    pub max_root_iterations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeparationKind {
    Points,
    FaceA,
    FaceB,
}

/// Signed distance between the two proxies along a fixed axis, as a
/// function of sweep time.
struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationKind,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    /// Builds the function from the cached simplex at `t1`.
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: Sweep,
        t1: Fp,
    ) -> Self {
        let count = cache.count;
        debug_assert!(0 < count && count < 3);

        let xf_a = sweep_a.get_transform(t1);
        let xf_b = sweep_b.get_transform(t1);

        let mut f = Self {
            proxy_a,
            proxy_b,
            sweep_a,
            sweep_b,
            kind: SeparationKind::Points,
            local_point: Vec2::ZERO,
            axis: Vec2::ZERO,
        };

        let index_a = |i: usize| usize::from(cache.index_a[i]);
        let index_b = |i: usize| usize::from(cache.index_b[i]);

        if count == 2 {
            let face = if index_a(0) == index_a(1) {
                // Two points on B and one on A.
                f.face_axis(
                    SeparationKind::FaceB,
                    proxy_b.vertex(index_b(0)),
                    proxy_b.vertex(index_b(1)),
                    &xf_b,
                    xf_a.apply(proxy_a.vertex(index_a(0))),
                )
            } else {
                // Two points on A and one or two points on B.
                f.face_axis(
                    SeparationKind::FaceA,
                    proxy_a.vertex(index_a(0)),
                    proxy_a.vertex(index_a(1)),
                    &xf_a,
                    xf_b.apply(proxy_b.vertex(index_b(0))),
                )
            };
            if face {
                return f;
            }
            // Degenerate face: fall through to the point axis.
        }

        f.kind = SeparationKind::Points;
        let point_a = xf_a.apply(proxy_a.vertex(index_a(0)));
        let point_b = xf_b.apply(proxy_b.vertex(index_b(0)));
        f.axis = (point_b - point_a).normalized();
        f
    }

    /// Sets up a face axis on the shape owning `v1..v2`, oriented towards
    /// `other_point`. Returns false when the face is too short to define a
    /// normal.
    fn face_axis(
        &mut self,
        kind: SeparationKind,
        v1: Vec2,
        v2: Vec2,
        xf_face: &Transform,
        other_point: Vec2,
    ) -> bool {
        let mut axis = (v2 - v1).right_perp();
        if axis.normalize() == Fp::ZERO {
            return false;
        }
        self.kind = kind;
        self.axis = axis;
        self.local_point = (v1 + v2) * Fp::HALF;

        let normal = xf_face.q.apply(axis);
        let face_point = xf_face.apply(self.local_point);
        if (other_point - face_point).dot(normal) < Fp::ZERO {
            self.axis = -self.axis;
        }
        true
    }

    /// Deepest points along the axis at time `t`, with their separation.
    fn find_min_separation(&self, t: Fp) -> (usize, usize, Fp) {
        let xf_a = self.sweep_a.get_transform(t);
        let xf_b = self.sweep_b.get_transform(t);

        match self.kind {
            SeparationKind::Points => {
                let index_a = self.proxy_a.support(xf_a.q.apply_t(self.axis));
                let index_b = self.proxy_b.support(xf_b.q.apply_t(-self.axis));
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (index_a, index_b, (point_b - point_a).dot(self.axis))
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.apply(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let index_b = self.proxy_b.support(xf_b.q.apply_t(-normal));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (0, index_b, (point_b - point_a).dot(normal))
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.apply(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let index_a = self.proxy_a.support(xf_a.q.apply_t(-normal));
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                (index_a, 0, (point_a - point_b).dot(normal))
            }
        }
    }

    /// Separation of a fixed feature pair at time `t`.
    fn evaluate(&self, index_a: usize, index_b: usize, t: Fp) -> Fp {
        let xf_a = self.sweep_a.get_transform(t);
        let xf_b = self.sweep_b.get_transform(t);

        match self.kind {
            SeparationKind::Points => {
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.apply(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(normal)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.apply(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// Time of impact of two swept proxies over `[0, t_max]`.
///
/// The target separation sits a little inside the combined skin so that the
/// regular solver still sees a contact after the bodies are moved to `t`.
pub fn time_of_impact(input: &ToiInput) -> ToiOutput {
    let mut output = ToiOutput {
        state: ToiState::Unknown,
        t: input.t_max,
        ..Default::default()
    };

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;

    // Large rotations can make the root finder fail.
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = LINEAR_SLOP.max(total_radius - Fp::from_int(3) * LINEAR_SLOP);
    let tolerance = Fp::ratio(1, 4) * LINEAR_SLOP;
    debug_assert!(target > tolerance);

    let mut t1 = Fp::ZERO;
    let mut cache = SimplexCache::default();

    loop {
        let distance_input = DistanceInput {
            proxy_a: *proxy_a,
            proxy_b: *proxy_b,
            transform_a: sweep_a.get_transform(t1),
            transform_b: sweep_b.get_transform(t1),
            use_radii: false,
        };
        let distance_output = distance(&distance_input, &mut cache);

        // Overlapping cores: continuous collision gives up.
        if distance_output.distance <= Fp::ZERO {
            output.state = ToiState::Overlapped;
            output.t = Fp::ZERO;
            break;
        }

        if distance_output.distance < target + tolerance {
            output.state = ToiState::Touching;
            output.t = t1;
            break;
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // Push back the far time until the deepest points are resolved. Each
        // pass may switch to a new feature pair, which is bounded by the
        // vertex count.
        let mut done = false;
        let mut t2 = t_max;
        let mut push_back = 0;
        loop {
            let (index_a, index_b, mut s2) = fcn.find_min_separation(t2);

            // Final configuration separated.
            if s2 > target + tolerance {
                output.state = ToiState::Separated;
                output.t = t_max;
                done = true;
                break;
            }

            // Separation within tolerance: advance.
            if s2 > target - tolerance {
                t1 = t2;
                break;
            }

            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            // Initial overlap, usually from a root finder that ran out of
            // iterations on the previous axis.
            if s1 < target - tolerance {
                output.state = ToiState::Failed;
                output.t = t1;
                done = true;
                break;
            }

            if s1 <= target + tolerance {
                output.state = ToiState::Touching;
                output.t = t1;
                done = true;
                break;
            }

            // 1D root of f(t) - target = 0 on [a1, a2].
            let mut root_iterations = 0u32;
            let mut a1 = t1;
            let mut a2 = t2;
            loop {
                let t = if root_iterations % 2 == 1 && s2 != s1 {
                    // Secant rule.
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    // Bisection.
                    (a1 + a2) * Fp::HALF
                };
                root_iterations += 1;

                let s = fcn.evaluate(index_a, index_b, t);
                if (s - target).abs() < tolerance {
                    // t2 holds a tentative value for t1
                    t2 = t;
                    break;
                }

                // Keep the root bracketed.
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iterations as usize == MAX_TOI_ROOT_ITERATIONS {
                    debug!("toi root finder reached its iteration cap ({MAX_TOI_ROOT_ITERATIONS})");
                    break;
                }
            }

            output.root_iterations += root_iterations;
            output.max_root_iterations = output.max_root_iterations.max(root_iterations);

            push_back += 1;
            if push_back == MAX_POLYGON_VERTICES {
                break;
            }
        }

        output.iterations += 1;
        if done {
            break;
        }

        if output.iterations as usize == MAX_TOI_ITERATIONS {
            // Root finder got stuck. Report the last safe time.
            warn!(
                "toi failed to converge after {MAX_TOI_ITERATIONS} iterations, t = {}",
                t1
            );
            output.state = ToiState::Failed;
            output.t = t1;
            break;
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shape::Shape;

    fn still(center: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c0: center,
            c: center,
            a0: Fp::ZERO,
            a: Fp::ZERO,
            alpha0: Fp::ZERO,
        }
    }

    fn moving(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            c0: from,
            c: to,
            ..still(from)
        }
    }

    #[test]
    fn separated_motion_reports_t_max() {
        let proxy = DistanceProxy::new(&Shape::boxed(Fp::HALF, Fp::HALF), 0);
        let output = time_of_impact(&ToiInput {
            proxy_a: proxy,
            proxy_b: proxy,
            sweep_a: still(Vec2::ZERO),
            sweep_b: moving(Vec2::from_ints(5, 0), Vec2::from_ints(5, 3)),
            t_max: Fp::ONE,
        });
        assert_eq!(output.state, ToiState::Separated);
        assert_eq!(output.t, Fp::ONE);
    }

    #[test]
    fn overlapping_start_reports_overlapped() {
        let proxy = DistanceProxy::new(&Shape::boxed(Fp::ONE, Fp::ONE), 0);
        let output = time_of_impact(&ToiInput {
            proxy_a: proxy,
            proxy_b: proxy,
            sweep_a: still(Vec2::ZERO),
            sweep_b: moving(Vec2::from_f32(0.5, 0.0), Vec2::from_ints(10, 0)),
            t_max: Fp::ONE,
        });
        assert_eq!(output.state, ToiState::Overlapped);
        assert_eq!(output.t, Fp::ZERO);
    }

    #[test]
    fn head_on_boxes_touch_near_expected_time() {
        let proxy = DistanceProxy::new(&Shape::boxed(Fp::HALF, Fp::HALF), 0);
        let output = time_of_impact(&ToiInput {
            proxy_a: proxy,
            proxy_b: proxy,
            sweep_a: still(Vec2::ZERO),
            sweep_b: moving(Vec2::from_ints(10, 0), Vec2::from_ints(-10, 0)),
            t_max: Fp::ONE,
        });
        assert_eq!(output.state, ToiState::Touching);
        // Cores meet when B has travelled 9 of 20 units.
        let t = output.t.to_f64();
        assert!(t > 0.44 && t < 0.45, "t = {t}");
        assert!(output.iterations >= 1);
    }
}
