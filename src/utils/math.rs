//! Fixed-point 2D vector algebra shared by the collision and dynamics layers.

use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::core::fixed::Fp;

/// 2D column vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: Fp,
    pub y: Fp,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2::new(Fp::ZERO, Fp::ZERO);
    pub const X: Vec2 = Vec2::new(Fp::ONE, Fp::ZERO);
    pub const Y: Vec2 = Vec2::new(Fp::ZERO, Fp::ONE);

    pub const fn new(x: Fp, y: Fp) -> Self {
        Self { x, y }
    }

    pub const fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fp::from_int(x), Fp::from_int(y))
    }

    /// Lossy constructor for demos and tests.
    pub fn from_f32(x: f32, y: f32) -> Self {
        Self::new(Fp::from_f32(x), Fp::from_f32(y))
    }

    pub fn dot(self, other: Vec2) -> Fp {
        self.x * other.x + self.y * other.y
    }

    /// z-component of the 3D cross product.
    pub fn cross(self, other: Vec2) -> Fp {
        self.x * other.y - self.y * other.x
    }

    pub fn length_squared(self) -> Fp {
        self.dot(self)
    }

    pub fn length(self) -> Fp {
        self.length_squared().sqrt()
    }

    pub fn distance(self, other: Vec2) -> Fp {
        (self - other).length()
    }

    pub fn distance_squared(self, other: Vec2) -> Fp {
        (self - other).length_squared()
    }

    /// Normalizes in place and returns the previous length. Vectors shorter
    /// than [`Fp::EPSILON`] are left untouched and report a length of zero.
    pub fn normalize(&mut self) -> Fp {
        let length = self.length();
        if length < Fp::EPSILON {
            return Fp::ZERO;
        }
        let inv = Fp::ONE / length;
        self.x *= inv;
        self.y *= inv;
        length
    }

    pub fn normalized(mut self) -> Vec2 {
        self.normalize();
        self
    }

    /// Counter-clockwise perpendicular, `cross(1, v)`.
    pub fn skew(self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    /// Clockwise perpendicular, `cross(v, 1)`.
    pub fn right_perp(self) -> Vec2 {
        Vec2::new(self.y, -self.x)
    }

    pub fn abs(self) -> Vec2 {
        Vec2::new(self.x.abs(), self.y.abs())
    }

    pub fn min(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x.min(other.x), self.y.min(other.y))
    }

    pub fn max(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x.max(other.x), self.y.max(other.y))
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// `v x s`: cross product of a vector and a scalar.
pub fn cross_vs(v: Vec2, s: Fp) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// `s x v`: cross product of a scalar and a vector.
pub fn cross_sv(s: Fp, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

impl Mul<Fp> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: Fp) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vec2> for Fp {
    type Output = Vec2;

    fn mul(self, rhs: Vec2) -> Vec2 {
        rhs * self
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        *self = *self + rhs;
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        *self = *self - rhs;
    }
}

impl MulAssign<Fp> for Vec2 {
    fn mul_assign(&mut self, rhs: Fp) {
        *self = *self * rhs;
    }
}

impl From<Vec2> for glam::Vec2 {
    fn from(v: Vec2) -> Self {
        glam::Vec2::new(v.x.to_f32(), v.y.to_f32())
    }
}

/// Rotation stored as a sine/cosine pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rot {
    pub s: Fp,
    pub c: Fp,
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rot {
    pub const IDENTITY: Rot = Rot {
        s: Fp::ZERO,
        c: Fp::ONE,
    };

    pub fn from_angle(angle: Fp) -> Self {
        let (s, c) = angle.sin_cos();
        Self { s, c }
    }

    pub fn set(&mut self, angle: Fp) {
        *self = Self::from_angle(angle);
    }

    pub fn x_axis(self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    pub fn y_axis(self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Rotates `v`.
    pub fn apply(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse-rotates `v`.
    pub fn apply_t(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// `self * other`.
    pub fn mul(self, other: Rot) -> Rot {
        Rot {
            s: self.s * other.c + self.c * other.s,
            c: self.c * other.c - self.s * other.s,
        }
    }

    /// `transpose(self) * other`.
    pub fn mul_t(self, other: Rot) -> Rot {
        Rot {
            s: self.c * other.s - self.s * other.c,
            c: self.c * other.c + self.s * other.s,
        }
    }
}

/// Column-major 2x2 matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mat22 {
    pub ex: Vec2,
    pub ey: Vec2,
}

impl Mat22 {
    pub const ZERO: Mat22 = Mat22 {
        ex: Vec2::ZERO,
        ey: Vec2::ZERO,
    };

    pub fn new(ex: Vec2, ey: Vec2) -> Self {
        Self { ex, ey }
    }

    pub fn from_rows(a11: Fp, a12: Fp, a21: Fp, a22: Fp) -> Self {
        Self::new(Vec2::new(a11, a21), Vec2::new(a12, a22))
    }

    pub fn determinant(&self) -> Fp {
        self.ex.x * self.ey.y - self.ey.x * self.ex.y
    }

    /// Inverse, or the zero matrix when singular.
    pub fn inverse(&self) -> Mat22 {
        let (a, b, c, d) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a * d - b * c;
        if det != Fp::ZERO {
            det = Fp::ONE / det;
        }
        Mat22::new(Vec2::new(det * d, -det * c), Vec2::new(-det * b, det * a))
    }

    /// Solves `A * x = b` without forming the inverse. Singular systems yield zero.
    pub fn solve(&self, b: Vec2) -> Vec2 {
        let mut det = self.determinant();
        if det != Fp::ZERO {
            det = Fp::ONE / det;
        }
        Vec2::new(
            det * (self.ey.y * b.x - self.ey.x * b.y),
            det * (self.ex.x * b.y - self.ex.y * b.x),
        )
    }

    pub fn mul_vec(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_leaves_tiny_vectors_untouched() {
        let mut tiny = Vec2::new(Fp::ratio(1, 10_000), Fp::ZERO);
        assert_eq!(tiny.normalize(), Fp::ZERO);
        assert_eq!(tiny, Vec2::new(Fp::ratio(1, 10_000), Fp::ZERO));

        let mut v = Vec2::from_ints(3, 4);
        assert_eq!(v.normalize(), Fp::from_int(5));
        assert_relative_eq!(v.x.to_f64(), 0.6, epsilon = 1e-8);
        assert_relative_eq!(v.y.to_f64(), 0.8, epsilon = 1e-8);
    }

    #[test]
    fn rotation_round_trips_through_transpose() {
        let q = Rot::from_angle(Fp::from_f32(0.7));
        let v = Vec2::from_f32(1.5, -2.0);
        let back = q.apply_t(q.apply(v));
        assert_relative_eq!(back.x.to_f64(), 1.5, epsilon = 1e-7);
        assert_relative_eq!(back.y.to_f64(), -2.0, epsilon = 1e-7);
        let unit = q.s * q.s + q.c * q.c;
        assert_relative_eq!(unit.to_f64(), 1.0, epsilon = 1e-7);
    }

    #[test]
    fn mat22_solve_matches_inverse() {
        let m = Mat22::from_rows(
            Fp::from_int(4),
            Fp::from_int(1),
            Fp::from_int(2),
            Fp::from_int(3),
        );
        let b = Vec2::from_ints(1, 2);
        let x = m.solve(b);
        let y = m.inverse().mul_vec(b);
        assert_relative_eq!(x.x.to_f64(), y.x.to_f64(), epsilon = 1e-8);
        assert_relative_eq!(x.y.to_f64(), y.y.to_f64(), epsilon = 1e-8);
        assert_relative_eq!(x.x.to_f64(), 0.1, epsilon = 1e-8);
        assert_relative_eq!(x.y.to_f64(), 0.6, epsilon = 1e-8);
    }

    #[test]
    fn singular_matrix_solves_to_zero() {
        let m = Mat22::from_rows(Fp::ONE, Fp::TWO, Fp::TWO, Fp::from_int(4));
        assert_eq!(m.solve(Vec2::from_ints(1, 1)), Vec2::ZERO);
    }
}
