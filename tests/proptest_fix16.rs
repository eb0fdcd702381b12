use noiseqa::{ErrorLatch, Fix16};
use proptest::prelude::*;

fn fits(v: i64) -> bool {
    v >= i32::MIN as i64 && v <= i32::MAX as i64
}

// Property 1: the add overflow flag agrees with 64-bit arithmetic.
proptest! {
    #[test]
    fn prop_add_matches_wide_reference(a in any::<i32>(), b in any::<i32>()) {
        let (v, overflowed) = Fix16::from_bits(a).overflowing_add(Fix16::from_bits(b));
        let wide = a as i64 + b as i64;
        prop_assert_eq!(overflowed, !fits(wide));
        if !overflowed {
            prop_assert_eq!(v.to_bits() as i64, wide);
        } else if wide > 0 {
            prop_assert_eq!(v, Fix16::MAX);
        } else {
            prop_assert_eq!(v, Fix16::MIN);
        }
    }
}

// Property 2: the sub overflow flag agrees with 64-bit arithmetic.
proptest! {
    #[test]
    fn prop_sub_matches_wide_reference(a in any::<i32>(), b in any::<i32>()) {
        let (v, overflowed) = Fix16::from_bits(a).overflowing_sub(Fix16::from_bits(b));
        let wide = a as i64 - b as i64;
        prop_assert_eq!(overflowed, !fits(wide));
        if !overflowed {
            prop_assert_eq!(v.to_bits() as i64, wide);
        }
    }
}

// Property 3: mul is the rounded 64-bit product whenever it fits.
proptest! {
    #[test]
    fn prop_mul_matches_wide_reference(a in any::<i32>(), b in any::<i32>()) {
        let (v, overflowed) = Fix16::from_bits(a).overflowing_mul(Fix16::from_bits(b));
        let wide = (a as i64 * b as i64 + 0x8000) >> 16;
        prop_assert_eq!(overflowed, !fits(wide));
        if !overflowed {
            prop_assert_eq!(v.to_bits() as i64, wide);
        }
    }
}

// Property 4: mul is commutative, bit for bit.
proptest! {
    #[test]
    fn prop_mul_commutative(a in any::<i32>(), b in any::<i32>()) {
        let x = Fix16::from_bits(a);
        let y = Fix16::from_bits(b);
        prop_assert_eq!(x.overflowing_mul(y), y.overflowing_mul(x));
    }
}

// Property 5: average lies between its operands.
proptest! {
    #[test]
    fn prop_average_bounded(a in any::<i32>(), b in any::<i32>()) {
        let avg = Fix16::from_bits(a).average(Fix16::from_bits(b)).to_bits();
        prop_assert!(avg >= a.min(b) && avg <= a.max(b));
    }
}

// Property 6: once raised, the latch stays raised through clean operations.
proptest! {
    #[test]
    fn prop_latch_sticky(ops in prop::collection::vec((any::<i16>(), any::<i16>()), 1..50)) {
        let mut latch = ErrorLatch::new();
        let _ = latch.mul(Fix16::MAX, Fix16::MAX);
        for (a, b) in ops {
            let _ = latch.add(Fix16::from_int(a / 2), Fix16::from_int(b / 2));
            prop_assert!(latch.is_raised());
        }
    }
}

// Property 7: log2 inverts exact powers of two.
proptest! {
    #[test]
    fn prop_log2_powers_of_two(exp in -16i32..15) {
        let x = Fix16::from_bits(1i32 << (exp + 16));
        prop_assert_eq!(x.log2(), Some(Fix16::from_bits(exp << 16)));
    }
}
