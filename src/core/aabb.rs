use serde::{Deserialize, Serialize};

use crate::{
    collision::queries::{RayCastInput, RayCastOutput},
    core::fixed::Fp,
    utils::math::Vec2,
};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aabb {
    pub lower: Vec2,
    pub upper: Vec2,
}

impl Aabb {
    pub fn new(lower: Vec2, upper: Vec2) -> Self {
        Self { lower, upper }
    }

    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        Self::new(a.min(b), a.max(b))
    }

    /// Bounds are sorted and neither corner has saturated.
    pub fn is_valid(&self) -> bool {
        let d = self.upper - self.lower;
        d.x >= Fp::ZERO && d.y >= Fp::ZERO && self.lower.is_finite() && self.upper.is_finite()
    }

    pub fn center(&self) -> Vec2 {
        (self.lower + self.upper) * Fp::HALF
    }

    /// Half-widths.
    pub fn extents(&self) -> Vec2 {
        (self.upper - self.lower) * Fp::HALF
    }

    pub fn perimeter(&self) -> Fp {
        let wx = self.upper.x - self.lower.x;
        let wy = self.upper.y - self.lower.y;
        wx + wx + wy + wy
    }

    pub fn combine(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.lower.min(other.lower), self.upper.max(other.upper))
    }

    pub fn combine_in_place(&mut self, other: &Aabb) {
        *self = self.combine(other);
    }

    pub fn fattened(&self, margin: Fp) -> Aabb {
        let r = Vec2::new(margin, margin);
        Aabb::new(self.lower - r, self.upper + r)
    }

    /// Whether `other` lies entirely inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        self.lower.x <= other.lower.x
            && self.lower.y <= other.lower.y
            && other.upper.x <= self.upper.x
            && other.upper.y <= self.upper.y
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        self.lower.x <= point.x
            && point.x <= self.upper.x
            && self.lower.y <= point.y
            && point.y <= self.upper.y
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        let d1 = other.lower - self.upper;
        let d2 = self.lower - other.upper;
        !(d1.x > Fp::ZERO || d1.y > Fp::ZERO || d2.x > Fp::ZERO || d2.y > Fp::ZERO)
    }

    /// Slab test. Rays starting inside the box report no hit.
    pub fn ray_cast(&self, input: &RayCastInput) -> Option<RayCastOutput> {
        let mut tmin = Fp::MIN;
        let mut tmax = Fp::MAX;

        let p = input.p1;
        let d = input.p2 - input.p1;
        let abs_d = d.abs();
        let mut normal = Vec2::ZERO;

        for axis in 0..2 {
            let (p_i, d_i, abs_i, lower, upper) = if axis == 0 {
                (p.x, d.x, abs_d.x, self.lower.x, self.upper.x)
            } else {
                (p.y, d.y, abs_d.y, self.lower.y, self.upper.y)
            };

            if abs_i < Fp::EPSILON {
                // parallel
                if p_i < lower || upper < p_i {
                    return None;
                }
                continue;
            }

            let inv_d = Fp::ONE / d_i;
            let mut t1 = (lower - p_i) * inv_d;
            let mut t2 = (upper - p_i) * inv_d;
            let mut s = -Fp::ONE;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
                s = Fp::ONE;
            }

            if t1 > tmin {
                normal = if axis == 0 {
                    Vec2::new(s, Fp::ZERO)
                } else {
                    Vec2::new(Fp::ZERO, s)
                };
                tmin = t1;
            }
            tmax = tmax.min(t2);

            if tmin > tmax {
                return None;
            }
        }

        if tmin < Fp::ZERO || input.max_fraction < tmin {
            return None;
        }

        Some(RayCastOutput {
            normal,
            fraction: tmin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aabb(lx: i32, ly: i32, ux: i32, uy: i32) -> Aabb {
        Aabb::new(Vec2::from_ints(lx, ly), Vec2::from_ints(ux, uy))
    }

    #[test]
    fn combine_is_commutative_and_associative() {
        let a = aabb(0, 0, 1, 1);
        let b = aabb(-3, 2, 0, 5);
        let c = aabb(4, -6, 7, -1);

        assert_eq!(a.combine(&b), b.combine(&a));
        assert_eq!(a.combine(&b).combine(&c), a.combine(&b.combine(&c)));
        assert_eq!(a.combine(&b).combine(&c), aabb(-3, -6, 7, 5));
    }

    #[test]
    fn validity_requires_sorted_bounds() {
        assert!(aabb(0, 0, 1, 1).is_valid());
        assert!(aabb(1, 1, 1, 1).is_valid());
        assert!(!aabb(1, 0, 0, 1).is_valid());
        assert!(!Aabb::new(Vec2::ZERO, Vec2::new(Fp::MAX, Fp::ONE)).is_valid());
    }

    #[test]
    fn overlap_includes_touching_boxes() {
        let a = aabb(0, 0, 1, 1);
        assert!(a.overlaps(&aabb(1, 0, 2, 1)));
        assert!(!a.overlaps(&aabb(2, 0, 3, 1)));
        assert!(aabb(-1, -1, 3, 3).contains(&a));
        assert!(!a.contains(&aabb(-1, -1, 3, 3)));
        assert_eq!(a.perimeter(), Fp::from_int(4));
    }

    #[test]
    fn ray_hits_near_face() {
        let b = aabb(2, -1, 4, 1);
        let input = RayCastInput {
            p1: Vec2::ZERO,
            p2: Vec2::from_ints(10, 0),
            max_fraction: Fp::ONE,
        };
        let hit = b.ray_cast(&input).expect("ray crosses the box");
        assert_eq!(hit.normal, Vec2::from_ints(-1, 0));
        assert!((hit.fraction.to_f64() - 0.2).abs() < 1e-8);

        let inside = RayCastInput {
            p1: Vec2::from_ints(3, 0),
            ..input
        };
        assert!(b.ray_cast(&inside).is_none());
    }
}
