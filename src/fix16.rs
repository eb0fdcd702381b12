//! Signed 16.16 fixed-point arithmetic with a sticky overflow latch.
//!
//! Individual operations never trap. Overflow is reported through
//! `overflowing_*` pairs, and [`ErrorLatch`] folds those reports into one
//! flag that a caller clears before a computation and inspects once at the end.

use serde::{Deserialize, Serialize};

const SIGN: u32 = 0x8000_0000;

/// A real number stored as a 32-bit signed integer scaled by 2^16.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Fix16(i32);

impl Fix16 {
    /// Number of fractional bits.
    pub const FRACTIONAL_BITS: u32 = 16;
    pub const ZERO: Fix16 = Fix16(0);
    pub const ONE: Fix16 = Fix16(1 << 16);
    pub const MAX: Fix16 = Fix16(i32::MAX);
    pub const MIN: Fix16 = Fix16(i32::MIN);

    /// Wrap a raw 16.16 bit pattern.
    #[inline]
    pub const fn from_bits(bits: i32) -> Self {
        Fix16(bits)
    }

    /// Raw 16.16 bit pattern.
    #[inline]
    pub const fn to_bits(self) -> i32 {
        self.0
    }

    /// Exact conversion from an integer; every `i16` is representable.
    #[inline]
    pub const fn from_int(value: i16) -> Self {
        Fix16((value as i32) << Self::FRACTIONAL_BITS)
    }

    /// `1 / divisor`, rounded to nearest.
    ///
    /// Meant for `const` items so that division happens at compile time;
    /// power-of-two divisors up to 2^16 are exact.
    ///
    /// # Panics
    /// Panics (at compile time when used in a `const`) if `divisor` is zero.
    pub const fn reciprocal(divisor: u32) -> Self {
        assert!(divisor > 0, "reciprocal of zero");
        let one = 1u64 << Self::FRACTIONAL_BITS;
        let d = divisor as u64;
        Fix16(((one + d / 2) / d) as i32)
    }

    /// Round-to-nearest conversion; `None` when `value` is outside the
    /// representable range or not a number.
    pub fn from_f64(value: f64) -> Option<Self> {
        let scaled = value * (1u64 << Self::FRACTIONAL_BITS) as f64;
        // `!(a <= b)` also rejects NaN.
        if !(scaled >= i32::MIN as f64 && scaled <= i32::MAX as f64) {
            return None;
        }
        let rounded = if scaled >= 0.0 { scaled + 0.5 } else { scaled - 0.5 };
        Some(Fix16(rounded as i32))
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / (1u64 << Self::FRACTIONAL_BITS) as f64
    }

    /// Saturated value carrying the sign of `negative`.
    #[inline]
    const fn saturated(negative: bool) -> Self {
        if negative {
            Self::MIN
        } else {
            Self::MAX
        }
    }

    /// Addition, flagging signed overflow with the sign-bit mismatch test.
    pub const fn overflowing_add(self, rhs: Self) -> (Self, bool) {
        let a = self.0 as u32;
        let b = rhs.0 as u32;
        let sum = a.wrapping_add(b);
        if (a ^ b) & SIGN == 0 && (sum ^ a) & SIGN != 0 {
            (Self::saturated(a & SIGN != 0), true)
        } else {
            (Fix16(sum as i32), false)
        }
    }

    /// Subtraction; overflow is only possible when the operand signs differ.
    pub const fn overflowing_sub(self, rhs: Self) -> (Self, bool) {
        let a = self.0 as u32;
        let b = rhs.0 as u32;
        let diff = a.wrapping_sub(b);
        if (a ^ b) & SIGN != 0 && (diff ^ a) & SIGN != 0 {
            (Self::saturated(a & SIGN != 0), true)
        } else {
            (Fix16(diff as i32), false)
        }
    }

    /// Double-width multiply, round to nearest, shift back to 16.16.
    ///
    /// Overflow means the bits above the result's sign bit are not a pure
    /// sign extension.
    pub const fn overflowing_mul(self, rhs: Self) -> (Self, bool) {
        let product = self.0 as i64 * rhs.0 as i64;
        let rounded = (product + (1 << (Self::FRACTIONAL_BITS - 1))) >> Self::FRACTIONAL_BITS;
        let upper = rounded >> 31;
        if upper != 0 && upper != -1 {
            (Self::saturated((self.0 ^ rhs.0) < 0), true)
        } else {
            (Fix16(rounded as i32), false)
        }
    }

    /// `floor((self + rhs) / 2)`. Never overflows.
    #[inline]
    pub const fn average(self, rhs: Self) -> Self {
        Fix16(((self.0 as i64 + rhs.0 as i64) >> 1) as i32)
    }

    /// Base-2 logarithm of a positive value; `None` for zero or negative input.
    ///
    /// Normalises into `[1, 2)` for the integer part, then extracts one
    /// fractional bit per squaring.
    pub fn log2(self) -> Option<Self> {
        if self.0 <= 0 {
            return None;
        }
        let one = 1u64 << Self::FRACTIONAL_BITS;
        let mut x = self.0 as u64;
        let mut result: i32 = 0;
        while x >= 2 * one {
            x >>= 1;
            result += 1 << Self::FRACTIONAL_BITS;
        }
        while x < one {
            x <<= 1;
            result -= 1 << Self::FRACTIONAL_BITS;
        }
        let mut bit = 1i32 << (Self::FRACTIONAL_BITS - 1);
        while bit > 0 {
            x = (x * x) >> Self::FRACTIONAL_BITS;
            if x >= 2 * one {
                x >>= 1;
                result += bit;
            }
            bit >>= 1;
        }
        Some(Fix16(result))
    }
}

impl core::fmt::Display for Fix16 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.5}", self.to_f64())
    }
}

/// Sticky error flag for one statistical cycle.
///
/// Arithmetic overflow and internal-consistency faults both raise it.
/// Only [`ErrorLatch::clear`] lowers it again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLatch {
    raised: bool,
}

impl ErrorLatch {
    pub const fn new() -> Self {
        Self { raised: false }
    }

    #[inline]
    pub fn raise(&mut self) {
        self.raised = true;
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.raised
    }

    /// Lower the flag at the start of a new computation.
    #[inline]
    pub fn clear(&mut self) {
        self.raised = false;
    }

    #[inline]
    fn record(&mut self, (value, overflowed): (Fix16, bool)) -> Fix16 {
        self.raised |= overflowed;
        value
    }

    #[inline]
    pub fn add(&mut self, a: Fix16, b: Fix16) -> Fix16 {
        self.record(a.overflowing_add(b))
    }

    #[inline]
    pub fn sub(&mut self, a: Fix16, b: Fix16) -> Fix16 {
        self.record(a.overflowing_sub(b))
    }

    #[inline]
    pub fn mul(&mut self, a: Fix16, b: Fix16) -> Fix16 {
        self.record(a.overflowing_mul(b))
    }

    /// `base^exponent` by repeated multiplication; `base^0` is one.
    pub fn pow(&mut self, base: Fix16, exponent: u32) -> Fix16 {
        let mut acc = Fix16::ONE;
        for _ in 0..exponent {
            acc = self.mul(acc, base);
        }
        acc
    }
}
