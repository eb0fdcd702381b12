//! Calibrated noise-source model and the acceptance test battery.
//!
//! The bounds describe the expected distribution of centered, scaled
//! converter samples for one device type. Skewness and kurtosis are bounded
//! without division or square roots by comparing the raw central moments
//! against powers of the variance.

use serde::{Deserialize, Serialize};

use crate::fix16::{ErrorLatch, Fix16};
use crate::moments::Moments;
use crate::Error;

/// Statistical model of a healthy noise source.
///
/// All values are in scaled sample units (`(code - BINS/2) / SCALE_DOWN`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseModel {
    /// Lowest acceptable mean.
    pub mean_min: f64,
    /// Highest acceptable mean.
    pub mean_max: f64,
    /// Lowest acceptable variance.
    pub variance_min: f64,
    /// Highest acceptable variance.
    pub variance_max: f64,
    /// Largest acceptable absolute skewness.
    pub max_skewness: f64,
    /// Lowest acceptable excess kurtosis.
    pub kurtosis_min: f64,
    /// Highest acceptable excess kurtosis.
    pub kurtosis_max: f64,
}

impl Default for NoiseModel {
    fn default() -> Self {
        Self {
            mean_min: -0.375,   // 48 codes below mid-scale
            mean_max: 0.375,    // 48 codes above mid-scale
            variance_min: 0.25, // 64 codes standard deviation
            variance_max: 1.0,  // 128 codes standard deviation
            max_skewness: 0.25,
            kurtosis_min: -1.0, // rejects flat (uniform is -1.2)
            kurtosis_max: 1.0,
        }
    }
}

impl NoiseModel {
    /// Replace the mean window.
    pub fn with_mean(mut self, min: f64, max: f64) -> Self {
        self.mean_min = min;
        self.mean_max = max;
        self
    }

    /// Replace the variance window.
    pub fn with_variance(mut self, min: f64, max: f64) -> Self {
        self.variance_min = min;
        self.variance_max = max;
        self
    }

    pub fn with_max_skewness(mut self, max: f64) -> Self {
        self.max_skewness = max;
        self
    }

    /// Replace the excess kurtosis window.
    pub fn with_kurtosis(mut self, min: f64, max: f64) -> Self {
        self.kurtosis_min = min;
        self.kurtosis_max = max;
        self
    }

    /// Validate the model and precompute its fixed-point comparison constants.
    pub fn thresholds(&self) -> Result<Thresholds, Error> {
        fn window(min: f64, max: f64, field: &'static str) -> Result<(Fix16, Fix16), Error> {
            if !(min <= max) {
                return Err(Error::InvalidCalibration {
                    field,
                    reason: "minimum exceeds maximum",
                });
            }
            let lo = Fix16::from_f64(min).ok_or(Error::Unrepresentable { field })?;
            let hi = Fix16::from_f64(max).ok_or(Error::Unrepresentable { field })?;
            Ok((lo, hi))
        }

        let (mean_min, mean_max) = window(self.mean_min, self.mean_max, "mean")?;
        let (variance_min, variance_max) =
            window(self.variance_min, self.variance_max, "variance")?;
        if variance_min < Fix16::ZERO {
            return Err(Error::InvalidCalibration {
                field: "variance",
                reason: "variance cannot be negative",
            });
        }
        if !(self.max_skewness >= 0.0) {
            return Err(Error::InvalidCalibration {
                field: "max_skewness",
                reason: "bound must be non-negative",
            });
        }
        let (kurtosis_min, kurtosis_max) = window(
            self.kurtosis_min + 3.0,
            self.kurtosis_max + 3.0,
            "kurtosis",
        )?;
        if kurtosis_min < Fix16::ZERO {
            return Err(Error::InvalidCalibration {
                field: "kurtosis",
                reason: "excess kurtosis cannot be below -3",
            });
        }
        let skewness_squared = Fix16::from_f64(self.max_skewness * self.max_skewness).ok_or(
            Error::Unrepresentable {
                field: "max_skewness",
            },
        )?;

        Ok(Thresholds {
            mean_min,
            mean_max,
            variance_min,
            variance_max,
            skewness_squared,
            kurtosis_min,
            kurtosis_max,
        })
    }

    /// Parse a model from JSON.
    #[cfg(feature = "std")]
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Export the model as JSON.
    #[cfg(feature = "std")]
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Fixed-point comparison constants derived from a [`NoiseModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub mean_min: Fix16,
    pub mean_max: Fix16,
    pub variance_min: Fix16,
    pub variance_max: Fix16,
    /// `max_skewness^2`.
    pub skewness_squared: Fix16,
    /// Lowest acceptable standardised kurtosis (`excess + 3`).
    pub kurtosis_min: Fix16,
    /// Highest acceptable standardised kurtosis (`excess + 3`).
    pub kurtosis_max: Fix16,
}

impl Thresholds {
    /// Run every check. Checks are independent; each failure sets its own bit.
    ///
    /// Products computed here go through `latch` too, so the arithmetic check
    /// is decided last.
    pub fn assess(
        &self,
        m: &Moments,
        histogram_overflow: bool,
        latch: &mut ErrorLatch,
    ) -> Failures {
        let mut failures = Failures::NONE;

        if m.mean < self.mean_min || m.mean > self.mean_max {
            failures.insert(Failures::MEAN);
        }
        if m.variance < self.variance_min || m.variance > self.variance_max {
            failures.insert(Failures::VARIANCE);
        }

        // |kappa3 / variance^1.5| <= s  <=>  kappa3^2 <= variance^3 * s^2
        let kappa3_squared = latch.mul(m.kappa3, m.kappa3);
        let variance_cubed = latch.pow(m.variance, 3);
        let skew_limit = latch.mul(variance_cubed, self.skewness_squared);
        if kappa3_squared > skew_limit {
            failures.insert(Failures::SKEWNESS);
        }

        // k_min <= kappa4 / variance^2 <= k_max, with k = excess + 3
        let variance_squared = latch.mul(m.variance, m.variance);
        let kurt_low = latch.mul(self.kurtosis_min, variance_squared);
        let kurt_high = latch.mul(self.kurtosis_max, variance_squared);
        if m.kappa4 < kurt_low || m.kappa4 > kurt_high {
            failures.insert(Failures::KURTOSIS);
        }

        if latch.is_raised() || histogram_overflow {
            failures.insert(Failures::ARITHMETIC);
        }
        failures
    }
}

/// Bitmask of failed acceptance checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Failures(u8);

impl Failures {
    pub const NONE: Failures = Failures(0);
    pub const MEAN: Failures = Failures(1 << 0);
    pub const VARIANCE: Failures = Failures(1 << 1);
    pub const SKEWNESS: Failures = Failures(1 << 2);
    pub const KURTOSIS: Failures = Failures(1 << 3);
    /// Fixed-point overflow, internal-consistency fault or histogram bin overflow.
    pub const ARITHMETIC: Failures = Failures(1 << 4);

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, other: Failures) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: Failures) {
        self.0 |= other.0;
    }
}

impl core::ops::BitOr for Failures {
    type Output = Failures;

    fn bitor(self, rhs: Self) -> Self {
        Failures(self.0 | rhs.0)
    }
}

/// Outcome of one completed statistical cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Samples folded into the histogram.
    pub samples: u32,
    pub moments: Moments,
    /// Shannon entropy per sample in bits; zero when it could not be computed.
    pub entropy_estimate: Fix16,
    pub failures: Failures,
}

impl QualityReport {
    pub fn is_accepted(&self) -> bool {
        self.failures.is_empty()
    }

    /// Export the report as JSON.
    #[cfg(feature = "std")]
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
