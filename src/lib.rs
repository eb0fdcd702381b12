//! noiseqa: real-time quality assurance for ADC noise-source entropy.
//!
//! A hardware wallet that derives keys from an analog noise circuit cannot
//! trust its converter blindly: a degraded or tampered noise source silently
//! yields guessable keys. This crate checks, on a microcontroller without a
//! floating-point unit, that the sample stream matches a calibrated noise
//! model before any of it is released as entropy.
//!
//! # Architecture
//!
//! Samples flow one way:
//!
//! converter batch → [`PackedHistogram`] → [`HistogramCursor`] →
//! [`Moments`] → [`Thresholds::assess`] → verdict
//!
//! - [`Fix16`] is signed 16.16 fixed point. Overflow never traps; it is
//!   recorded in an [`ErrorLatch`] checked once per cycle.
//! - [`PackedHistogram`] stores [`BINS`] counters of [`BITS_PER_BIN`] bits
//!   each, packed across word boundaries.
//! - [`central_moment`] reduces `(x - mean)^k` over all samples with pairwise
//!   averaging so that no partial sum outgrows the final result.
//! - [`NoiseEngine`] runs the multi-call acquisition cycle over an
//!   [`AdcDriver`] and reports accept, reject or "call again".
//!
//! # Example
//!
//! ```rust
//! use noiseqa::{Failures, NoiseEngine, NoiseModel, ReplayAdc, CHUNK_SAMPLES};
//!
//! // A captured stream standing in for the converter interrupt: every code
//! // in 384..640 exactly 16 times.
//! let stream: Vec<u16> = (0..4096u32).map(|i| (384 + (i * 7919) % 256) as u16).collect();
//! let adc = ReplayAdc::new(stream, 256);
//! let mut engine = NoiseEngine::new(adc, &NoiseModel::default()).unwrap();
//!
//! let mut out = [0u8; 2 * CHUNK_SAMPLES];
//! let verdict = loop {
//!     match engine.produce_chunk(&mut out) {
//!         0 => continue,
//!         v => break v,
//!     }
//! };
//! // A flat distribution has far too little kurtosis.
//! assert_eq!(verdict, -i32::from(Failures::KURTOSIS.bits()));
//! ```
//!
//! # no_std Support
//!
//! Without the `std` feature the crate is `no_std` and allocation-free: all
//! storage is sized at compile time. `std` adds JSON export of calibration
//! and reports, and the [`ReplayAdc`] driver.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

pub mod adc;
pub mod engine;
pub mod fix16;
pub mod histogram;
pub mod model;
pub mod moments;
pub mod traits;

pub use adc::BatchFlag;
#[cfg(feature = "std")]
pub use adc::ReplayAdc;
pub use engine::{CycleStats, NoiseEngine};
pub use fix16::{ErrorLatch, Fix16};
pub use histogram::{PackedHistogram, BIN_CAPACITY};
pub use model::{Failures, NoiseModel, QualityReport, Thresholds};
pub use moments::{central_moment, centered_scale, estimate_entropy, HistogramCursor, Moments};
pub use traits::AdcDriver;

/// Distinct converter output codes (10-bit converter).
pub const BINS: usize = 1024;

/// Width of one packed histogram counter.
pub const BITS_PER_BIN: u32 = 11;

/// Samples per statistical cycle. Must be a power of two.
pub const SAMPLE_COUNT: u32 = 4096;

/// Samples folded per [`NoiseEngine::produce_chunk`] call.
pub const CHUNK_SAMPLES: usize = 16;

/// Centered codes are divided by this before any moment is taken.
///
/// Any two codes then lie less than `BINS / SCALE_DOWN` apart once scaled, so
/// the fourth power of any deviation from the mean fits 16.16.
pub const SCALE_DOWN: u32 = 128;

/// Entropy credited to an accepted cycle, in bits: one per sample.
///
/// Deliberately fixed rather than derived from the measured statistics.
pub const ACCEPTED_ENTROPY_BITS: i32 = SAMPLE_COUNT as i32;

const _: () = assert!(SAMPLE_COUNT.is_power_of_two());
const _: () = assert!(BINS <= i16::MAX as usize);
const _: () = assert!(BITS_PER_BIN > 0 && BITS_PER_BIN < 32);
const _: () = assert!(SCALE_DOWN > 0);
const _: () = assert!((BINS as u64 / SCALE_DOWN as u64).pow(4) < 1 << 15);

/// Error types for noiseqa operations.
#[derive(Debug)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum Error {
    /// A calibration value is inconsistent.
    #[cfg_attr(feature = "std", error("Invalid calibration for {field}: {reason}"))]
    InvalidCalibration {
        field: &'static str,
        reason: &'static str,
    },

    /// A calibration value does not fit 16.16 fixed point.
    #[cfg_attr(
        feature = "std",
        error("Calibration value for {field} is outside the fixed-point range")
    )]
    Unrepresentable { field: &'static str },

    /// Malformed JSON.
    #[cfg(feature = "std")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(not(feature = "std"))]
impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidCalibration { field, reason } => {
                write!(f, "Invalid calibration for {}: {}", field, reason)
            }
            Error::Unrepresentable { field } => {
                write!(
                    f,
                    "Calibration value for {} is outside the fixed-point range",
                    field
                )
            }
        }
    }
}
