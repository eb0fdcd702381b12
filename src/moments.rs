//! Central moments of a packed histogram.
//!
//! Samples are replayed from the histogram in increasing-code order by
//! [`HistogramCursor`], so no flat sample array is ever materialised. Moments
//! are reduced with a balanced tree of pairwise averages: every intermediate
//! value is the mean of its subtree, so partial results stay near the
//! magnitude of the final moment instead of growing with the sample count.

use serde::{Deserialize, Serialize};

use crate::fix16::{ErrorLatch, Fix16};
use crate::histogram::PackedHistogram;
use crate::{BINS, SCALE_DOWN};

const HALF_RANGE: i16 = (BINS / 2) as i16;
const SCALE: Fix16 = Fix16::reciprocal(SCALE_DOWN);

/// Map a converter code to a centered, scaled-down sample value.
pub fn centered_scale(bin: usize, latch: &mut ErrorLatch) -> Fix16 {
    if bin >= BINS {
        latch.raise();
        return Fix16::ZERO;
    }
    let centered = Fix16::from_int(bin as i16 - HALF_RANGE);
    latch.mul(centered, SCALE)
}

/// Walks every recorded sample of a histogram exactly once.
#[derive(Debug)]
pub struct HistogramCursor<'a> {
    histogram: &'a PackedHistogram,
    bin: usize,
    /// Samples of `bin` already returned.
    position: u32,
    count: u32,
    value: Fix16,
}

impl<'a> HistogramCursor<'a> {
    pub fn new(histogram: &'a PackedHistogram, latch: &mut ErrorLatch) -> Self {
        let mut cursor = Self {
            histogram,
            bin: 0,
            position: 0,
            count: 0,
            value: Fix16::ZERO,
        };
        cursor.reset(latch);
        cursor
    }

    /// Rewind to the first sample of bin 0.
    pub fn reset(&mut self, latch: &mut ErrorLatch) {
        self.bin = 0;
        self.position = 0;
        self.count = self.histogram.get(0, latch);
        self.value = centered_scale(0, latch);
    }

    /// Next unvisited sample, or `None` once all recorded samples were returned.
    pub fn next_sample(&mut self, latch: &mut ErrorLatch) -> Option<Fix16> {
        while self.position >= self.count {
            if self.bin + 1 >= BINS {
                return None;
            }
            self.bin += 1;
            self.position = 0;
            self.count = self.histogram.get(self.bin, latch);
            self.value = centered_scale(self.bin, latch);
        }
        self.position += 1;
        Some(self.value)
    }

    /// `(sample - mean)^power` for the next sample.
    ///
    /// Running past the last sample is a consistency fault: the latch is
    /// raised and zero is returned.
    pub fn next_term(&mut self, mean: Fix16, power: u32, latch: &mut ErrorLatch) -> Fix16 {
        match self.next_sample(latch) {
            Some(sample) => {
                let deviation = latch.sub(sample, mean);
                latch.pow(deviation, power)
            }
            None => {
                latch.raise();
                Fix16::ZERO
            }
        }
    }
}

/// Mean of `count` terms drawn from `term`, reduced as a balanced binary tree.
fn pairwise_average<F: FnMut() -> Fix16>(count: u32, term: &mut F) -> Fix16 {
    if count <= 1 {
        return term();
    }
    let half = count / 2;
    let left = pairwise_average(half, term);
    let right = pairwise_average(half, term);
    left.average(right)
}

/// Average of `(sample - mean)^power` over every sample in `histogram`.
///
/// The sample count must be a nonzero power of two; otherwise the latch is
/// raised and zero returned.
pub fn central_moment(
    histogram: &PackedHistogram,
    mean: Fix16,
    power: u32,
    latch: &mut ErrorLatch,
) -> Fix16 {
    let total = histogram.total();
    if !total.is_power_of_two() {
        latch.raise();
        return Fix16::ZERO;
    }
    let mut cursor = HistogramCursor::new(histogram, latch);
    pairwise_average(total, &mut || cursor.next_term(mean, power, latch))
}

/// Shannon entropy in bits per sample, `-sum(p * log2(p))` over nonempty bins.
///
/// Diagnostic only. Returns `None` if the sample count is not a power of two
/// or the arithmetic overflowed.
pub fn estimate_entropy(histogram: &PackedHistogram) -> Option<Fix16> {
    let total = histogram.total();
    if !total.is_power_of_two() {
        return None;
    }
    let shift = total.trailing_zeros();
    let mut latch = ErrorLatch::new();
    let mut entropy = Fix16::ZERO;
    for bin in 0..BINS {
        let count = histogram.get(bin, &mut latch);
        if count == 0 {
            continue;
        }
        // p = count / total, exact because total is a power of two.
        let p_bits = ((count as i64) << Fix16::FRACTIONAL_BITS) >> shift;
        let p = Fix16::from_bits(p_bits.min(i32::MAX as i64) as i32);
        if let Some(log) = p.log2() {
            let term = latch.mul(p, log);
            entropy = latch.sub(entropy, term);
        }
    }
    (!latch.is_raised()).then_some(entropy)
}

/// The four moments the acceptance battery consumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moments {
    pub mean: Fix16,
    pub variance: Fix16,
    /// Third central moment (unstandardised).
    pub kappa3: Fix16,
    /// Fourth central moment (unstandardised).
    pub kappa4: Fix16,
}

impl Moments {
    pub fn compute(histogram: &PackedHistogram, latch: &mut ErrorLatch) -> Self {
        let mean = central_moment(histogram, Fix16::ZERO, 1, latch);
        Self {
            mean,
            variance: central_moment(histogram, mean, 2, latch),
            kappa3: central_moment(histogram, mean, 3, latch),
            kappa4: central_moment(histogram, mean, 4, latch),
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    fn fill(hist: &mut PackedHistogram, bin: usize, count: u32) {
        let mut latch = ErrorLatch::new();
        for _ in 0..count {
            hist.increment(bin, &mut latch);
        }
        assert!(!latch.is_raised());
    }

    fn fx(v: f64) -> Fix16 {
        Fix16::from_f64(v).unwrap()
    }

    fn close(a: Fix16, b: Fix16, ulps: i32) -> bool {
        (a.to_bits() - b.to_bits()).abs() <= ulps
    }

    #[test]
    fn test_centered_scale() {
        let mut latch = ErrorLatch::new();
        assert_eq!(centered_scale(512, &mut latch), Fix16::ZERO);
        assert_eq!(centered_scale(640, &mut latch), Fix16::ONE);
        assert_eq!(centered_scale(0, &mut latch), fx(-4.0));
        assert_eq!(centered_scale(1023, &mut latch), fx(3.992_187_5));
        assert!(!latch.is_raised());
        assert_eq!(centered_scale(BINS, &mut latch), Fix16::ZERO);
        assert!(latch.is_raised());
    }

    #[test]
    fn test_cursor_visits_each_sample_once() {
        let mut hist = PackedHistogram::new();
        fill(&mut hist, 3, 2);
        fill(&mut hist, 0, 1);
        fill(&mut hist, 1000, 1);

        let mut latch = ErrorLatch::new();
        let mut cursor = HistogramCursor::new(&hist, &mut latch);
        let seen: Vec<Fix16> = core::iter::from_fn(|| cursor.next_sample(&mut latch)).collect();
        let mut expect_latch = ErrorLatch::new();
        let expected: Vec<Fix16> = [0, 3, 3, 1000]
            .iter()
            .map(|&b| centered_scale(b, &mut expect_latch))
            .collect();
        assert_eq!(seen, expected);
        assert!(!latch.is_raised());
    }

    #[test]
    fn test_cursor_past_end_raises() {
        let mut hist = PackedHistogram::new();
        fill(&mut hist, 576, 2);
        let mut latch = ErrorLatch::new();
        let mut cursor = HistogramCursor::new(&hist, &mut latch);
        assert_eq!(cursor.next_term(Fix16::ZERO, 1, &mut latch), fx(0.5));
        assert_eq!(cursor.next_term(Fix16::ZERO, 1, &mut latch), fx(0.5));
        assert!(!latch.is_raised());
        assert_eq!(cursor.next_term(fx(3.0), 2, &mut latch), Fix16::ZERO);
        assert!(latch.is_raised());

        latch.clear();
        cursor.reset(&mut latch);
        assert_eq!(cursor.next_term(Fix16::ZERO, 2, &mut latch), fx(0.25));
        assert!(!latch.is_raised());
    }

    #[test]
    fn test_degenerate_distribution_has_zero_variance() {
        let mut hist = PackedHistogram::new();
        fill(&mut hist, 600, 1024);
        let mut latch = ErrorLatch::new();
        let mean = central_moment(&hist, Fix16::ZERO, 1, &mut latch);
        assert_eq!(mean, centered_scale(600, &mut latch));
        assert_eq!(central_moment(&hist, mean, 2, &mut latch), Fix16::ZERO);
        assert!(!latch.is_raised());
    }

    #[test]
    fn test_symmetric_distribution() {
        // Codes 512 +/- 64k map to +/- k/2.
        let mut hist = PackedHistogram::new();
        fill(&mut hist, 320, 128);
        fill(&mut hist, 384, 256);
        fill(&mut hist, 448, 512);
        fill(&mut hist, 512, 256);
        fill(&mut hist, 576, 512);
        fill(&mut hist, 640, 256);
        fill(&mut hist, 704, 128);
        assert_eq!(hist.total(), 2048);

        let mut latch = ErrorLatch::new();
        let m = Moments::compute(&hist, &mut latch);
        assert!(!latch.is_raised());
        assert!(close(m.mean, Fix16::ZERO, 2), "mean {}", m.mean);
        // (2*512*0.25 + 2*256*1 + 2*128*2.25) / 2048
        assert!(close(m.variance, fx(0.65625), 4), "variance {}", m.variance);
        assert!(close(m.kappa3, Fix16::ZERO, 4), "kappa3 {}", m.kappa3);
        // (2*512*0.0625 + 2*256*1 + 2*128*5.0625) / 2048
        assert!(close(m.kappa4, fx(0.914_062_5), 4), "kappa4 {}", m.kappa4);
    }

    #[test]
    fn test_pairwise_average_keeps_partials_small() {
        // 2048 fourth powers of 3.5 sum to ~3e5, far beyond 16.16 range,
        // yet their average is representable.
        let mut hist = PackedHistogram::new();
        fill(&mut hist, 512 + 448, 1024);
        fill(&mut hist, 512 - 448, 1024);
        let mut latch = ErrorLatch::new();
        let k4 = central_moment(&hist, Fix16::ZERO, 4, &mut latch);
        assert!(!latch.is_raised());
        assert_eq!(k4, fx(150.0625));
    }

    #[test]
    fn test_full_range_deviation_fits() {
        // Lowest code against a mean pinned at the highest code.
        let mut hist = PackedHistogram::new();
        fill(&mut hist, 0, 256);
        let mut latch = ErrorLatch::new();
        let top = centered_scale(BINS - 1, &mut latch);
        let k4 = central_moment(&hist, top, 4, &mut latch);
        assert!(!latch.is_raised());
        // (1023 / 128)^4
        assert!(close(k4, fx(4080.0), 4096), "kappa4 {}", k4);
        let k3 = central_moment(&hist, top, 3, &mut latch);
        assert!(!latch.is_raised());
        assert!(k3 < Fix16::ZERO);
    }

    #[test]
    fn test_non_power_of_two_count_raises() {
        let mut hist = PackedHistogram::new();
        fill(&mut hist, 512, 3);
        let mut latch = ErrorLatch::new();
        assert_eq!(central_moment(&hist, Fix16::ZERO, 1, &mut latch), Fix16::ZERO);
        assert!(latch.is_raised());

        let empty = PackedHistogram::new();
        latch.clear();
        central_moment(&empty, Fix16::ZERO, 2, &mut latch);
        assert!(latch.is_raised());
    }

    #[test]
    fn test_entropy_estimate() {
        let mut hist = PackedHistogram::new();
        for k in 0..16 {
            fill(&mut hist, 400 + k * 5, 256);
        }
        assert_eq!(estimate_entropy(&hist), Some(fx(4.0)));

        let mut single = PackedHistogram::new();
        fill(&mut single, 77, 64);
        assert_eq!(estimate_entropy(&single), Some(Fix16::ZERO));

        let mut odd = PackedHistogram::new();
        fill(&mut odd, 77, 5);
        assert_eq!(estimate_entropy(&odd), None);
    }
}
