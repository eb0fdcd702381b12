#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use noiseqa::{ErrorLatch, PackedHistogram, BINS, BIN_CAPACITY};

#[derive(Arbitrary, Debug)]
enum Op {
    Put { index: u16, value: u16 },
    Increment { index: u16 },
    Clear,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut hist = PackedHistogram::new();
    let mut model = vec![0u32; BINS];
    let mut overflowed = false;
    let mut increments = 0u32;
    let mut latch = ErrorLatch::new();

    for op in ops {
        match op {
            Op::Put { index, value } => {
                let index = index as usize % (BINS + 4);
                let value = value as u32;
                hist.put(index, value, &mut latch);
                if index < BINS {
                    if value > BIN_CAPACITY {
                        overflowed = true;
                    } else {
                        model[index] = value;
                    }
                }
            }
            Op::Increment { index } => {
                let index = index as usize % BINS;
                hist.increment(index, &mut latch);
                increments += 1;
                if model[index] == BIN_CAPACITY {
                    overflowed = true;
                } else {
                    model[index] += 1;
                }
            }
            Op::Clear => {
                hist.clear();
                model.iter_mut().for_each(|c| *c = 0);
                overflowed = false;
                increments = 0;
            }
        }
    }

    // Out-of-range puts raise the latch; reads below are all in range.
    for (i, &expected) in model.iter().enumerate() {
        assert_eq!(hist.get(i, &mut latch), expected, "bin {}", i);
    }
    assert_eq!(hist.overflowed(), overflowed);
    assert_eq!(hist.total(), increments);
});
