#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use noiseqa::{ErrorLatch, Fix16};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    a: i32,
    b: i32,
    exponent: u8,
}

fn fits(v: i64) -> bool {
    v >= i32::MIN as i64 && v <= i32::MAX as i64
}

fuzz_target!(|input: FuzzInput| {
    let a = Fix16::from_bits(input.a);
    let b = Fix16::from_bits(input.b);

    let (sum, o) = a.overflowing_add(b);
    assert_eq!(o, !fits(input.a as i64 + input.b as i64));
    if !o {
        assert_eq!(sum.to_bits() as i64, input.a as i64 + input.b as i64);
    }

    let (diff, o) = a.overflowing_sub(b);
    assert_eq!(o, !fits(input.a as i64 - input.b as i64));
    if !o {
        assert_eq!(diff.to_bits() as i64, input.a as i64 - input.b as i64);
    }

    let wide = (input.a as i64 * input.b as i64 + 0x8000) >> 16;
    let (product, o) = a.overflowing_mul(b);
    assert_eq!(o, !fits(wide));
    if !o {
        assert_eq!(product.to_bits() as i64, wide);
    }

    let avg = a.average(b).to_bits();
    assert!(avg >= input.a.min(input.b) && avg <= input.a.max(input.b));

    // Never panics, whatever the exponent.
    let mut latch = ErrorLatch::new();
    let _ = latch.pow(a, (input.exponent % 8) as u32);

    if input.a > 0 {
        let log = a.log2().expect("positive input has a logarithm");
        assert!(log >= Fix16::from_int(-16) && log < Fix16::from_int(15));
    } else {
        assert!(a.log2().is_none());
    }
});
