//! Sequential-impulse contact solver.
//!
//! Velocity constraints are solved with accumulated impulses (friction
//! first, then the non-penetration constraint, jointly for two-point
//! manifolds). Position drift is removed afterwards with a nonlinear
//! Gauss-Seidel pass that recomputes separations from current positions.

use serde::{Deserialize, Serialize};

use crate::{
    collision::{
        contact::ContactImpulse,
        manifold::{Manifold, ManifoldType, WorldManifold},
    },
    config::{
        BAUMGARTE, LINEAR_SLOP, MAX_ANGULAR_CORRECTION, MAX_CONDITION_NUMBER,
        MAX_LINEAR_CORRECTION, MAX_MANIFOLD_POINTS, TOI_BAUMGARTE,
    },
    core::{
        fixed::Fp,
        types::{Position, Transform, Velocity},
    },
    utils::math::{cross_sv, Mat22, Rot, Vec2},
};

/// Step parameters handed to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStep {
    pub dt: Fp,
    pub inv_dt: Fp,
    /// `dt * previous inv_dt`, used to rescale warm-start impulses when the
    /// step size changes.
    pub dt_ratio: Fp,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub warm_starting: bool,
}

impl TimeStep {
    /// Step of length `dt`. `previous_inv_dt` is the inverse step of the
    /// last call, or zero on the first step.
    pub fn new(
        dt: Fp,
        previous_inv_dt: Fp,
        velocity_iterations: u32,
        position_iterations: u32,
        warm_starting: bool,
    ) -> Self {
        let inv_dt = if dt > Fp::ZERO { Fp::ONE / dt } else { Fp::ZERO };
        Self {
            dt,
            inv_dt,
            dt_ratio: dt * previous_inv_dt,
            velocity_iterations,
            position_iterations,
            warm_starting,
        }
    }
}

/// Everything the solver needs to know about one touching contact. Body
/// indices refer to the position and velocity slices passed to the solver
/// methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactConstraintInput {
    pub manifold: Manifold,
    pub index_a: usize,
    pub index_b: usize,
    pub inv_mass_a: Fp,
    pub inv_mass_b: Fp,
    pub inv_i_a: Fp,
    pub inv_i_b: Fp,
    pub local_center_a: Vec2,
    pub local_center_b: Vec2,
    pub radius_a: Fp,
    pub radius_b: Fp,
    pub friction: Fp,
    pub restitution: Fp,
    pub restitution_threshold: Fp,
    pub tangent_speed: Fp,
}

#[derive(Debug, Clone, Copy, Default)]
struct VelocityConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: Fp,
    tangent_impulse: Fp,
    normal_mass: Fp,
    tangent_mass: Fp,
    velocity_bias: Fp,
}

#[derive(Debug, Clone, Copy)]
struct VelocityConstraint {
    points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    normal: Vec2,
    normal_mass: Mat22,
    k: Mat22,
    index_a: usize,
    index_b: usize,
    inv_mass_a: Fp,
    inv_mass_b: Fp,
    inv_i_a: Fp,
    inv_i_b: Fp,
    friction: Fp,
    restitution: Fp,
    threshold: Fp,
    tangent_speed: Fp,
    point_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct PositionConstraint {
    local_points: [Vec2; MAX_MANIFOLD_POINTS],
    local_normal: Vec2,
    local_point: Vec2,
    index_a: usize,
    index_b: usize,
    inv_mass_a: Fp,
    inv_mass_b: Fp,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_i_a: Fp,
    inv_i_b: Fp,
    manifold_type: ManifoldType,
    radius_a: Fp,
    radius_b: Fp,
    point_count: usize,
}

/// Normal, contact point and separation of one manifold point, recomputed
/// from the current positions.
struct PositionSolverManifold {
    normal: Vec2,
    point: Vec2,
    separation: Fp,
}

impl PositionSolverManifold {
    fn new(pc: &PositionConstraint, xf_a: &Transform, xf_b: &Transform, index: usize) -> Self {
        debug_assert!(pc.point_count > 0);
        match pc.manifold_type {
            ManifoldType::Circles => {
                let point_a = xf_a.apply(pc.local_point);
                let point_b = xf_b.apply(pc.local_points[0]);
                let normal = (point_b - point_a).normalized();
                Self {
                    normal,
                    point: (point_a + point_b) * Fp::HALF,
                    separation: (point_b - point_a).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q.apply(pc.local_normal);
                let plane_point = xf_a.apply(pc.local_point);
                let clip_point = xf_b.apply(pc.local_points[index]);
                Self {
                    normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.apply(pc.local_normal);
                let plane_point = xf_b.apply(pc.local_point);
                let clip_point = xf_a.apply(pc.local_points[index]);
                Self {
                    // Points from A to B.
                    normal: -normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
        }
    }
}

fn body_transform(c: Vec2, a: Fp, local_center: Vec2) -> Transform {
    let q = Rot::from_angle(a);
    Transform {
        p: c - q.apply(local_center),
        q,
    }
}

/// Contact solver for one island.
///
/// Call order per step: [`initialize_velocity_constraints`],
/// [`warm_start`], [`solve_velocity_constraints`] once per velocity
/// iteration, [`store_impulses`], then [`solve_position_constraints`] until
/// it reports convergence or the iteration budget runs out.
///
/// [`initialize_velocity_constraints`]: ContactSolver::initialize_velocity_constraints
/// [`warm_start`]: ContactSolver::warm_start
/// [`solve_velocity_constraints`]: ContactSolver::solve_velocity_constraints
/// [`store_impulses`]: ContactSolver::store_impulses
/// [`solve_position_constraints`]: ContactSolver::solve_position_constraints
#[derive(Debug, Clone)]
pub struct ContactSolver {
    step: TimeStep,
    velocity_constraints: Vec<VelocityConstraint>,
    position_constraints: Vec<PositionConstraint>,
    manifolds: Vec<Manifold>,
}

impl ContactSolver {
    pub fn new(step: TimeStep, contacts: &[ContactConstraintInput]) -> Self {
        let mut velocity_constraints = Vec::with_capacity(contacts.len());
        let mut position_constraints = Vec::with_capacity(contacts.len());
        let mut manifolds = Vec::with_capacity(contacts.len());

        for input in contacts {
            let manifold = &input.manifold;
            let point_count = manifold.point_count;
            debug_assert!(point_count > 0, "solver received an empty manifold");

            let mut vc = VelocityConstraint {
                points: [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS],
                normal: Vec2::ZERO,
                normal_mass: Mat22::ZERO,
                k: Mat22::ZERO,
                index_a: input.index_a,
                index_b: input.index_b,
                inv_mass_a: input.inv_mass_a,
                inv_mass_b: input.inv_mass_b,
                inv_i_a: input.inv_i_a,
                inv_i_b: input.inv_i_b,
                friction: input.friction,
                restitution: input.restitution,
                threshold: input.restitution_threshold,
                tangent_speed: input.tangent_speed,
                point_count,
            };

            let mut pc = PositionConstraint {
                local_points: [Vec2::ZERO; MAX_MANIFOLD_POINTS],
                local_normal: manifold.local_normal,
                local_point: manifold.local_point,
                index_a: input.index_a,
                index_b: input.index_b,
                inv_mass_a: input.inv_mass_a,
                inv_mass_b: input.inv_mass_b,
                local_center_a: input.local_center_a,
                local_center_b: input.local_center_b,
                inv_i_a: input.inv_i_a,
                inv_i_b: input.inv_i_b,
                manifold_type: manifold.manifold_type,
                radius_a: input.radius_a,
                radius_b: input.radius_b,
                point_count,
            };

            for (j, cp) in manifold.points().iter().enumerate() {
                let vcp = &mut vc.points[j];
                if step.warm_starting {
                    vcp.normal_impulse = step.dt_ratio * cp.normal_impulse;
                    vcp.tangent_impulse = step.dt_ratio * cp.tangent_impulse;
                }
                pc.local_points[j] = cp.local_point;
            }

            velocity_constraints.push(vc);
            position_constraints.push(pc);
            manifolds.push(*manifold);
        }

        Self {
            step,
            velocity_constraints,
            position_constraints,
            manifolds,
        }
    }

    pub fn len(&self) -> usize {
        self.velocity_constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.velocity_constraints.is_empty()
    }

    /// Computes anchors, effective masses and restitution bias from the
    /// current positions, and prepares the 2x2 block solve when it is well
    /// conditioned.
    pub fn initialize_velocity_constraints(
        &mut self,
        positions: &[Position],
        velocities: &[Velocity],
    ) {
        for (vc, (pc, manifold)) in self
            .velocity_constraints
            .iter_mut()
            .zip(self.position_constraints.iter().zip(&self.manifolds))
        {
            let m_a = vc.inv_mass_a;
            let m_b = vc.inv_mass_b;
            let i_a = vc.inv_i_a;
            let i_b = vc.inv_i_b;

            let Position { c: c_a, a: a_a } = positions[vc.index_a];
            let Velocity { v: v_a, w: w_a } = velocities[vc.index_a];
            let Position { c: c_b, a: a_b } = positions[vc.index_b];
            let Velocity { v: v_b, w: w_b } = velocities[vc.index_b];

            let xf_a = body_transform(c_a, a_a, pc.local_center_a);
            let xf_b = body_transform(c_b, a_b, pc.local_center_b);

            let world_manifold =
                WorldManifold::new(manifold, &xf_a, pc.radius_a, &xf_b, pc.radius_b);

            vc.normal = world_manifold.normal;
            let tangent = vc.normal.right_perp();

            for (j, vcp) in vc.points[..vc.point_count].iter_mut().enumerate() {
                vcp.r_a = world_manifold.points[j] - c_a;
                vcp.r_b = world_manifold.points[j] - c_b;

                let rn_a = vcp.r_a.cross(vc.normal);
                let rn_b = vcp.r_b.cross(vc.normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > Fp::ZERO {
                    Fp::ONE / k_normal
                } else {
                    Fp::ZERO
                };

                let rt_a = vcp.r_a.cross(tangent);
                let rt_b = vcp.r_b.cross(tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > Fp::ZERO {
                    Fp::ONE / k_tangent
                } else {
                    Fp::ZERO
                };

                // Restitution only above the approach speed threshold.
                vcp.velocity_bias = Fp::ZERO;
                let v_rel = vc
                    .normal
                    .dot(v_b + cross_sv(w_b, vcp.r_b) - v_a - cross_sv(w_a, vcp.r_a));
                if v_rel < -vc.threshold {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }

            if vc.point_count == 2 {
                let vcp1 = &vc.points[0];
                let vcp2 = &vc.points[1];

                let rn1_a = vcp1.r_a.cross(vc.normal);
                let rn1_b = vcp1.r_b.cross(vc.normal);
                let rn2_a = vcp2.r_a.cross(vc.normal);
                let rn2_b = vcp2.r_b.cross(vc.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    vc.k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    vc.normal_mass = vc.k.inverse();
                } else {
                    // Redundant constraints: keep one point.
                    vc.point_count = 1;
                }
            }
        }
    }

    /// Applies the carried-over impulses to the velocities. Does nothing
    /// when the step has warm starting turned off.
    pub fn warm_start(&self, velocities: &mut [Velocity]) {
        if !self.step.warm_starting {
            return;
        }
        for vc in &self.velocity_constraints {
            let m_a = vc.inv_mass_a;
            let i_a = vc.inv_i_a;
            let m_b = vc.inv_mass_b;
            let i_b = vc.inv_i_b;

            let Velocity { v: mut v_a, w: mut w_a } = velocities[vc.index_a];
            let Velocity { v: mut v_b, w: mut w_b } = velocities[vc.index_b];

            let normal = vc.normal;
            let tangent = normal.right_perp();

            for vcp in &vc.points[..vc.point_count] {
                let p = normal * vcp.normal_impulse + tangent * vcp.tangent_impulse;
                w_a -= i_a * vcp.r_a.cross(p);
                v_a -= p * m_a;
                w_b += i_b * vcp.r_b.cross(p);
                v_b += p * m_b;
            }

            velocities[vc.index_a] = Velocity { v: v_a, w: w_a };
            velocities[vc.index_b] = Velocity { v: v_b, w: w_b };
        }
    }

    /// One sequential-impulse pass over every contact.
    pub fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        for vc in &mut self.velocity_constraints {
            let m_a = vc.inv_mass_a;
            let i_a = vc.inv_i_a;
            let m_b = vc.inv_mass_b;
            let i_b = vc.inv_i_b;

            let Velocity { v: mut v_a, w: mut w_a } = velocities[vc.index_a];
            let Velocity { v: mut v_b, w: mut w_b } = velocities[vc.index_b];

            let normal = vc.normal;
            let tangent = normal.right_perp();
            let friction = vc.friction;

            debug_assert!(vc.point_count == 1 || vc.point_count == 2);

            // Tangent first: non-penetration matters more than friction.
            for vcp in &mut vc.points[..vc.point_count] {
                let dv = v_b + cross_sv(w_b, vcp.r_b) - v_a - cross_sv(w_a, vcp.r_a);
                let vt = dv.dot(tangent) - vc.tangent_speed;
                let mut lambda = vcp.tangent_mass * -vt;

                // Coulomb cone.
                let max_friction = friction * vcp.normal_impulse;
                let new_impulse = (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                let p = tangent * lambda;
                v_a -= p * m_a;
                w_a -= i_a * vcp.r_a.cross(p);
                v_b += p * m_b;
                w_b += i_b * vcp.r_b.cross(p);
            }

            if vc.point_count == 1 {
                let vcp = &mut vc.points[0];
                let dv = v_b + cross_sv(w_b, vcp.r_b) - v_a - cross_sv(w_a, vcp.r_a);
                let vn = dv.dot(normal);
                let mut lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

                let new_impulse = (vcp.normal_impulse + lambda).max(Fp::ZERO);
                lambda = new_impulse - vcp.normal_impulse;
                vcp.normal_impulse = new_impulse;

                let p = normal * lambda;
                v_a -= p * m_a;
                w_a -= i_a * vcp.r_a.cross(p);
                v_b += p * m_b;
                w_b += i_b * vcp.r_b.cross(p);
            } else {
                // Block solver for the linear complementarity problem
                //   vn = A * x + b, vn >= 0, x >= 0, vn_i * x_i = 0
                // with the incremental form x = a + d. The four sign
                // patterns of (x, vn) are tried in turn.
                let (cp1, cp2) = (vc.points[0], vc.points[1]);
                let a = Vec2::new(cp1.normal_impulse, cp2.normal_impulse);
                debug_assert!(a.x >= Fp::ZERO && a.y >= Fp::ZERO);

                let dv1 = v_b + cross_sv(w_b, cp1.r_b) - v_a - cross_sv(w_a, cp1.r_a);
                let dv2 = v_b + cross_sv(w_b, cp2.r_b) - v_a - cross_sv(w_a, cp2.r_a);

                let vn1 = dv1.dot(normal);
                let vn2 = dv2.dot(normal);

                let b = Vec2::new(vn1 - cp1.velocity_bias, vn2 - cp2.velocity_bias)
                    - vc.k.mul_vec(a);

                let candidates = [
                    // Both constraints active: vn = 0.
                    -vc.normal_mass.mul_vec(b),
                    // Only the first active.
                    Vec2::new(-cp1.normal_mass * b.x, Fp::ZERO),
                    // Only the second active.
                    Vec2::new(Fp::ZERO, -cp2.normal_mass * b.y),
                    // Both released.
                    Vec2::ZERO,
                ];

                let admissible = |case: usize, x: Vec2| -> bool {
                    match case {
                        0 => x.x >= Fp::ZERO && x.y >= Fp::ZERO,
                        1 => x.x >= Fp::ZERO && vc.k.ex.y * x.x + b.y >= Fp::ZERO,
                        2 => x.y >= Fp::ZERO && vc.k.ey.x * x.y + b.x >= Fp::ZERO,
                        _ => b.x >= Fp::ZERO && b.y >= Fp::ZERO,
                    }
                };

                // No admissible case is rare and left unresolved this pass.
                if let Some(x) = candidates
                    .into_iter()
                    .enumerate()
                    .find(|&(case, x)| admissible(case, x))
                    .map(|(_, x)| x)
                {
                    let d = x - a;
                    let p1 = normal * d.x;
                    let p2 = normal * d.y;
                    v_a -= (p1 + p2) * m_a;
                    w_a -= i_a * (cp1.r_a.cross(p1) + cp2.r_a.cross(p2));
                    v_b += (p1 + p2) * m_b;
                    w_b += i_b * (cp1.r_b.cross(p1) + cp2.r_b.cross(p2));

                    vc.points[0].normal_impulse = x.x;
                    vc.points[1].normal_impulse = x.y;
                }
            }

            velocities[vc.index_a] = Velocity { v: v_a, w: w_a };
            velocities[vc.index_b] = Velocity { v: v_b, w: w_b };
        }
    }

    /// Writes accumulated impulses back into the manifolds, in the order the
    /// contacts were given, so the next step can warm start from them.
    pub fn store_impulses<'a>(&self, manifolds: impl IntoIterator<Item = &'a mut Manifold>) {
        for (vc, manifold) in self.velocity_constraints.iter().zip(manifolds) {
            for (mp, vcp) in manifold.points[..vc.point_count].iter_mut().zip(&vc.points) {
                mp.normal_impulse = vcp.normal_impulse;
                mp.tangent_impulse = vcp.tangent_impulse;
            }
        }
    }

    /// Impulses applied to each contact, for post-solve reporting.
    pub fn impulses(&self) -> Vec<ContactImpulse> {
        self.velocity_constraints
            .iter()
            .map(|vc| {
                let mut impulse = ContactImpulse {
                    count: vc.point_count,
                    ..Default::default()
                };
                for (j, vcp) in vc.points[..vc.point_count].iter().enumerate() {
                    impulse.normal_impulses[j] = vcp.normal_impulse;
                    impulse.tangent_impulses[j] = vcp.tangent_impulse;
                }
                impulse
            })
            .collect()
    }

    /// One nonlinear Gauss-Seidel pass. Returns true once the deepest
    /// penetration is within three linear slops.
    pub fn solve_position_constraints(&self, positions: &mut [Position]) -> bool {
        let min_separation = self.correct_positions(positions, BAUMGARTE, None);
        min_separation >= Fp::from_int(-3) * LINEAR_SLOP
    }

    /// Position pass used during time-of-impact sub-stepping. Only the two
    /// bodies at `toi_index_a`/`toi_index_b` move; everything else is
    /// treated as static. Returns true once the deepest penetration is
    /// within one and a half linear slops.
    pub fn solve_toi_position_constraints(
        &self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        let min_separation =
            self.correct_positions(positions, TOI_BAUMGARTE, Some((toi_index_a, toi_index_b)));
        min_separation >= Fp::ratio(-3, 2) * LINEAR_SLOP
    }

    fn correct_positions(
        &self,
        positions: &mut [Position],
        baumgarte: Fp,
        toi_bodies: Option<(usize, usize)>,
    ) -> Fp {
        let mut min_separation = Fp::ZERO;
        let movable = |index: usize| match toi_bodies {
            Some((a, b)) => index == a || index == b,
            None => true,
        };

        for pc in &self.position_constraints {
            let (m_a, i_a) = if movable(pc.index_a) {
                (pc.inv_mass_a, pc.inv_i_a)
            } else {
                (Fp::ZERO, Fp::ZERO)
            };
            let (m_b, i_b) = if movable(pc.index_b) {
                (pc.inv_mass_b, pc.inv_i_b)
            } else {
                (Fp::ZERO, Fp::ZERO)
            };

            let Position { c: mut c_a, a: mut a_a } = positions[pc.index_a];
            let Position { c: mut c_b, a: mut a_b } = positions[pc.index_b];

            for j in 0..pc.point_count {
                let xf_a = body_transform(c_a, a_a, pc.local_center_a);
                let xf_b = body_transform(c_b, a_b, pc.local_center_b);

                let psm = PositionSolverManifold::new(pc, &xf_a, &xf_b, j);
                let normal = psm.normal;

                let r_a = psm.point - c_a;
                let r_b = psm.point - c_b;

                min_separation = min_separation.min(psm.separation);

                // Leave a slop of penetration to keep contacts alive.
                let c = (baumgarte * (psm.separation + LINEAR_SLOP))
                    .clamp(-MAX_LINEAR_CORRECTION, Fp::ZERO);

                let rn_a = r_a.cross(normal);
                let rn_b = r_b.cross(normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                let impulse = if k > Fp::ZERO { -c / k } else { Fp::ZERO };

                let p = normal * impulse;
                let clamp_angle =
                    |da: Fp| da.clamp(-MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION);

                c_a -= p * m_a;
                a_a -= clamp_angle(i_a * r_a.cross(p));
                c_b += p * m_b;
                a_b += clamp_angle(i_b * r_b.cross(p));
            }

            positions[pc.index_a] = Position { c: c_a, a: a_a };
            positions[pc.index_b] = Position { c: c_b, a: a_b };
        }

        min_separation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::narrowphase::NarrowPhase,
        core::shape::PolygonShape,
    };

    const STEP: Fp = Fp::ratio(1, 60);

    fn step() -> TimeStep {
        TimeStep::new(STEP, Fp::from_int(60), 8, 3, true)
    }

    /// Unit-mass box resting on a static ground box, overlapping slightly.
    fn resting_box(overlap: Fp) -> (ContactConstraintInput, Vec<Position>) {
        let ground = PolygonShape::new_box(Fp::from_int(5), Fp::HALF);
        let block = PolygonShape::new_box(Fp::HALF, Fp::HALF);
        let ground_pos = Position::default();
        let block_pos = Position {
            c: Vec2::new(Fp::ZERO, Fp::ONE - overlap),
            a: Fp::ZERO,
        };

        let mut manifold = Manifold::default();
        NarrowPhase::collide_polygons(
            &mut manifold,
            &ground,
            &Transform::IDENTITY,
            &block,
            &Transform::from_position(block_pos.c),
        );
        assert_eq!(manifold.point_count, 2);

        let input = ContactConstraintInput {
            manifold,
            index_a: 0,
            index_b: 1,
            inv_mass_a: Fp::ZERO,
            inv_mass_b: Fp::ONE,
            inv_i_a: Fp::ZERO,
            inv_i_b: Fp::from_int(6),
            local_center_a: Vec2::ZERO,
            local_center_b: Vec2::ZERO,
            radius_a: ground.radius,
            radius_b: block.radius,
            friction: Fp::HALF,
            restitution: Fp::ZERO,
            restitution_threshold: Fp::ONE,
            tangent_speed: Fp::ZERO,
        };
        (input, vec![ground_pos, block_pos])
    }

    #[test]
    fn falling_box_is_stopped() {
        let (input, positions) = resting_box(Fp::ratio(1, 100));
        let mut velocities = vec![
            Velocity::default(),
            Velocity {
                v: Vec2::from_ints(0, -2),
                w: Fp::ZERO,
            },
        ];

        let mut solver = ContactSolver::new(step(), &[input]);
        solver.initialize_velocity_constraints(&positions, &velocities);
        solver.warm_start(&mut velocities);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut velocities);
        }

        assert!(velocities[1].v.y.abs() < Fp::ratio(1, 1000));
        assert!(velocities[1].w.abs() < Fp::ratio(1, 1000));
        assert_eq!(velocities[0], Velocity::default());

        let impulses = solver.impulses();
        assert_eq!(impulses[0].count, 2);
        assert!(impulses[0].normal_impulses.iter().all(|&n| n > Fp::ZERO));
    }

    #[test]
    fn friction_is_bounded_by_normal_impulse() {
        let (input, positions) = resting_box(Fp::ratio(1, 100));
        let mut velocities = vec![
            Velocity::default(),
            Velocity {
                v: Vec2::from_ints(10, -1),
                w: Fp::ZERO,
            },
        ];
        let mut solver = ContactSolver::new(step(), &[input]);
        solver.initialize_velocity_constraints(&positions, &velocities);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut velocities);
        }
        let impulse = solver.impulses()[0];
        for j in 0..impulse.count {
            assert!(impulse.tangent_impulses[j].abs() <= Fp::HALF * impulse.normal_impulses[j]);
        }
        // Still sliding.
        assert!(velocities[1].v.x > Fp::from_int(8));
    }

    #[test]
    fn restitution_applies_above_threshold_only() {
        let (mut input, positions) = resting_box(Fp::ratio(1, 100));
        input.restitution = Fp::ONE;

        let bounce = |speed: i32| {
            let mut velocities = vec![
                Velocity::default(),
                Velocity {
                    v: Vec2::from_ints(0, -speed),
                    w: Fp::ZERO,
                },
            ];
            let mut solver = ContactSolver::new(step(), &[input]);
            solver.initialize_velocity_constraints(&positions, &velocities);
            for _ in 0..8 {
                solver.solve_velocity_constraints(&mut velocities);
            }
            velocities[1].v.y
        };

        assert!(bounce(4) > Fp::from_f32(3.9));
        assert!(bounce(4) < Fp::from_f32(4.1));
        // Below the threshold the hit is inelastic.
        assert!(bounce(0).abs() < Fp::ratio(1, 100));
    }

    #[test]
    fn store_impulses_round_trips_into_manifold() {
        let (input, positions) = resting_box(Fp::ratio(1, 100));
        let mut velocities = vec![
            Velocity::default(),
            Velocity {
                v: Vec2::from_ints(0, -1),
                w: Fp::ZERO,
            },
        ];
        let mut solver = ContactSolver::new(step(), &[input]);
        solver.initialize_velocity_constraints(&positions, &velocities);
        solver.solve_velocity_constraints(&mut velocities);

        let mut manifold = input.manifold;
        solver.store_impulses([&mut manifold]);
        let impulses = solver.impulses();
        assert_eq!(manifold.points[0].normal_impulse, impulses[0].normal_impulses[0]);
        assert_eq!(manifold.points[1].normal_impulse, impulses[0].normal_impulses[1]);

        // Warm start with the stored impulses on a fresh solver.
        let mut warmed = input;
        warmed.manifold = manifold;
        let solver = ContactSolver::new(step(), &[warmed]);
        let mut fresh = vec![Velocity::default(); 2];
        let mut solver = solver;
        solver.initialize_velocity_constraints(&positions, &fresh);
        solver.warm_start(&mut fresh);
        assert!(fresh[1].v.y > Fp::ZERO);

        // The same impulses are ignored by a cold step.
        let cold_step = TimeStep::new(STEP, Fp::from_int(60), 8, 3, false);
        let mut cold = ContactSolver::new(cold_step, &[warmed]);
        let mut still = vec![Velocity::default(); 2];
        cold.initialize_velocity_constraints(&positions, &still);
        cold.warm_start(&mut still);
        assert_eq!(still[1], Velocity::default());
    }

    #[test]
    fn position_pass_pushes_out_penetration() {
        let (input, mut positions) = resting_box(Fp::ratio(1, 10));
        let solver = ContactSolver::new(step(), &[input]);

        let mut converged = false;
        for _ in 0..20 {
            if solver.solve_position_constraints(&mut positions) {
                converged = true;
                break;
            }
        }
        assert!(converged);
        // Ground stays put; the box is lifted towards resting height.
        assert_eq!(positions[0], Position::default());
        assert!(positions[1].c.y > Fp::ratio(9, 10));
    }

    #[test]
    fn toi_position_pass_only_moves_toi_bodies() {
        let (mut input, mut positions) = resting_box(Fp::ratio(1, 10));
        input.inv_mass_a = Fp::ONE;
        input.inv_i_a = Fp::ONE;
        let solver = ContactSolver::new(step(), &[input]);

        let before = positions[0];
        for _ in 0..20 {
            if solver.solve_toi_position_constraints(&mut positions, 1, 7) {
                break;
            }
        }
        assert_eq!(positions[0], before);
        assert!(positions[1].c.y > Fp::ratio(9, 10));
    }
}
