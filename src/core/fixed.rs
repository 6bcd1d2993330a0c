//! Deterministic Q32.32 scalar used by every geometric routine in the crate.
//!
//! `Fp` wraps [`fixed::types::I32F32`] so that all simulation math is exact
//! integer arithmetic and therefore bit-identical on every platform. The
//! arithmetic operators saturate instead of overflowing, and division by zero
//! produces a saturated value instead of panicking, so no routine can ever
//! observe a NaN or an infinity.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

const FRAC_BITS: u32 = 32;
const FRAC_MASK: i64 = (1_i64 << FRAC_BITS) - 1;

/// Deterministic fixed-point scalar (32 integer bits, 32 fractional bits).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fp(I32F32);

impl Fp {
    pub const ZERO: Fp = Fp::from_raw(0);
    pub const ONE: Fp = Fp::from_int(1);
    pub const TWO: Fp = Fp::from_int(2);
    pub const HALF: Fp = Fp::from_raw(1_i64 << (FRAC_BITS - 1));
    pub const MAX: Fp = Fp::from_raw(i64::MAX);
    pub const MIN: Fp = Fp::from_raw(i64::MIN);

    /// pi rounded to the nearest representable value.
    pub const PI: Fp = Fp::from_raw(13_493_037_705);
    pub const FRAC_PI_2: Fp = Fp::from_raw(6_746_518_852);
    pub const TAU: Fp = Fp::from_raw(26_986_075_409);
    pub const DEG_TO_RAD: Fp = Fp::from_raw(74_961_321);

    /// Tolerance used to decide that a length or a determinant is zero.
    pub const EPSILON: Fp = Fp::ratio(1, 1000);
    pub const EN1: Fp = Fp::ratio(1, 10);
    pub const EN2: Fp = Fp::ratio(1, 100);
    pub const EN3: Fp = Fp::ratio(1, 1000);

    /// Builds a value from its raw Q32.32 bit pattern.
    pub const fn from_raw(raw: i64) -> Self {
        Fp(I32F32::from_bits(raw))
    }

    /// Raw Q32.32 bit pattern, suitable for hashing or lockstep checksums.
    pub const fn raw(self) -> i64 {
        self.0.to_bits()
    }

    pub const fn from_int(value: i32) -> Self {
        Fp::from_raw((value as i64) << FRAC_BITS)
    }

    /// Exact rational constant `num / den`, rounded toward zero.
    pub const fn ratio(num: i64, den: i64) -> Self {
        Fp::from_raw((((num as i128) << FRAC_BITS) / den as i128) as i64)
    }

    /// Converts from `f32`. Only meant for tooling, demos and tests: the
    /// simulation itself never touches floating point.
    ///
    /// # Panics
    /// Panics if `value` is not finite or does not fit.
    pub fn from_f32(value: f32) -> Self {
        Fp(I32F32::from_num(value))
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num::<f32>()
    }

    pub fn to_f64(self) -> f64 {
        self.0.to_num::<f64>()
    }

    /// `false` once a value has saturated to either end of the range.
    pub fn is_finite(self) -> bool {
        self != Fp::MAX && self != Fp::MIN
    }

    pub fn abs(self) -> Self {
        if self.raw() < 0 {
            -self
        } else {
            self
        }
    }

    pub fn signum(self) -> Self {
        match self.raw() {
            0 => Fp::ZERO,
            r if r > 0 => Fp::ONE,
            _ => -Fp::ONE,
        }
    }

    pub fn floor(self) -> Self {
        Fp::from_raw(self.raw() & !FRAC_MASK)
    }

    /// Integer square root over the raw bits. Negative inputs return zero.
    pub fn sqrt(self) -> Self {
        let raw = self.raw();
        if raw <= 0 {
            return Fp::ZERO;
        }
        let root = isqrt_u128((raw as u128) << FRAC_BITS);
        Fp::from_raw(root as i64)
    }

    /// Sine of an angle in radians, accurate to roughly 1e-9 over the
    /// reduced range.
    pub fn sin(self) -> Self {
        // Reduce to [-pi, pi), then fold into [-pi/2, pi/2].
        let turns = (self / Fp::TAU + Fp::HALF).floor();
        let mut x = self - Fp::TAU * turns;
        if x > Fp::FRAC_PI_2 {
            x = Fp::PI - x;
        } else if x < -Fp::FRAC_PI_2 {
            x = -Fp::PI - x;
        }

        let x2 = x * x;
        let mut acc = Fp::ONE;
        for denom in [156, 110, 72, 42, 20, 6] {
            acc = Fp::ONE - x2 * acc / Fp::from_int(denom);
        }
        x * acc
    }

    pub fn cos(self) -> Self {
        (self + Fp::FRAC_PI_2).sin()
    }

    pub fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }
}

fn isqrt_u128(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut rem = n;
    let mut root = 0_u128;
    let mut bit = 1_u128 << ((127 - n.leading_zeros()) & !1);
    while bit != 0 {
        if rem >= root + bit {
            rem -= root + bit;
            root = (root >> 1) + bit;
        } else {
            root >>= 1;
        }
        bit >>= 2;
    }
    root
}

impl fmt::Debug for Fp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Fp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i32> for Fp {
    fn from(value: i32) -> Self {
        Fp::from_int(value)
    }
}

impl Add for Fp {
    type Output = Fp;

    fn add(self, rhs: Fp) -> Fp {
        Fp(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Fp {
    type Output = Fp;

    fn sub(self, rhs: Fp) -> Fp {
        Fp(self.0.saturating_sub(rhs.0))
    }
}

impl Mul for Fp {
    type Output = Fp;

    fn mul(self, rhs: Fp) -> Fp {
        Fp(self.0.saturating_mul(rhs.0))
    }
}

impl Div for Fp {
    type Output = Fp;

    /// `0 / 0` is zero and `x / 0` saturates toward the sign of `x`.
    fn div(self, rhs: Fp) -> Fp {
        match self.0.checked_div(rhs.0) {
            Some(value) => Fp(value),
            None if rhs.raw() == 0 && self.raw() == 0 => Fp::ZERO,
            None if (self.raw() < 0) != (rhs.raw() < 0) => Fp::MIN,
            None => Fp::MAX,
        }
    }
}

impl Neg for Fp {
    type Output = Fp;

    fn neg(self) -> Fp {
        Fp(self.0.saturating_neg())
    }
}

impl AddAssign for Fp {
    fn add_assign(&mut self, rhs: Fp) {
        *self = *self + rhs;
    }
}

impl SubAssign for Fp {
    fn sub_assign(&mut self, rhs: Fp) {
        *self = *self - rhs;
    }
}

impl MulAssign for Fp {
    fn mul_assign(&mut self, rhs: Fp) {
        *self = *self * rhs;
    }
}

impl DivAssign for Fp {
    fn div_assign(&mut self, rhs: Fp) {
        *self = *self / rhs;
    }
}

impl Sum for Fp {
    fn sum<I: Iterator<Item = Fp>>(iter: I) -> Fp {
        iter.fold(Fp::ZERO, Add::add)
    }
}
