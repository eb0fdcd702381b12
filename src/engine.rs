//! Acquisition and acceptance state machine.
//!
//! A statistical cycle needs more samples than the converter buffers at
//! once, so [`NoiseEngine::produce_chunk`] is called repeatedly. Each call
//! folds one small slice of the current batch into the histogram, hands the
//! same raw samples to the caller, and keeps the converter busy with the next
//! batch. The call that completes the histogram also delivers the verdict.

use serde::{Deserialize, Serialize};

use crate::fix16::{ErrorLatch, Fix16};
use crate::histogram::PackedHistogram;
use crate::model::{NoiseModel, QualityReport, Thresholds};
use crate::moments::{estimate_entropy, Moments};
use crate::{AdcDriver, Error, ACCEPTED_ENTROPY_BITS, CHUNK_SAMPLES, SAMPLE_COUNT};

/// Progress through the current converter batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Batch {
    /// An acquisition was requested and has not been consumed from yet.
    Requested,
    /// The batch is full and `consumed` samples of it were folded in.
    Ready { consumed: usize },
}

/// Lifetime verdict counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    pub accepted: u64,
    pub rejected: u64,
}

/// Entropy quality-assurance engine over a converter driver.
#[derive(Debug)]
pub struct NoiseEngine<D: AdcDriver> {
    driver: D,
    thresholds: Thresholds,
    histogram: PackedHistogram,
    latch: ErrorLatch,
    /// A histogram fill is in progress.
    filling: bool,
    batch: Batch,
    last_report: Option<QualityReport>,
    stats: CycleStats,
}

impl<D: AdcDriver> NoiseEngine<D> {
    /// Create an engine checking samples against `model`.
    pub fn new(driver: D, model: &NoiseModel) -> Result<Self, Error> {
        Ok(Self::with_thresholds(driver, model.thresholds()?))
    }

    /// Create an engine from precomputed thresholds.
    pub fn with_thresholds(driver: D, thresholds: Thresholds) -> Self {
        Self {
            driver,
            thresholds,
            histogram: PackedHistogram::new(),
            latch: ErrorLatch::new(),
            filling: false,
            batch: Batch::Requested,
            last_report: None,
            stats: CycleStats::default(),
        }
    }

    /// Fold the next slice of converter samples and copy them into `out`.
    ///
    /// Writes `k` samples as `2k` little-endian bytes at the start of `out`,
    /// `k <= CHUNK_SAMPLES`. Returns:
    /// - `0` when more samples are needed; call again.
    /// - [`ACCEPTED_ENTROPY_BITS`] when the cycle passed. The estimate covers
    ///   every byte written since the previous verdict.
    /// - A negative value, `-(failures.bits())`, when the cycle failed. Bytes
    ///   written since the previous verdict must not be used as entropy.
    ///
    /// Blocks in [`AdcDriver::wait`] until a batch is ready.
    pub fn produce_chunk(&mut self, out: &mut [u8]) -> i32 {
        if !self.filling {
            self.begin_cycle();
        }

        let consumed = match self.batch {
            Batch::Ready { consumed } => consumed,
            Batch::Requested => {
                while !self.driver.batch_ready() {
                    self.driver.wait();
                }
                0
            }
        };

        let samples = self.driver.samples();
        let batch_len = samples.len();
        let remaining = (SAMPLE_COUNT - self.histogram.total().min(SAMPLE_COUNT)) as usize;
        let take = CHUNK_SAMPLES
            .min(batch_len.saturating_sub(consumed))
            .min(remaining)
            .min(out.len() / 2);

        let slice = &samples[consumed..consumed + take];
        for (&sample, bytes) in slice.iter().zip(out.chunks_exact_mut(2)) {
            self.histogram.increment(sample as usize, &mut self.latch);
            bytes.copy_from_slice(&sample.to_le_bytes());
        }

        let consumed = consumed + take;
        if consumed >= batch_len {
            self.request_batch();
        } else {
            self.batch = Batch::Ready { consumed };
        }

        if self.histogram.total() < SAMPLE_COUNT {
            return 0;
        }
        self.finish_cycle()
    }

    fn begin_cycle(&mut self) {
        log::debug!("starting entropy cycle of {} samples", SAMPLE_COUNT);
        self.histogram.clear();
        self.latch.clear();
        self.filling = true;
        self.request_batch();
    }

    fn request_batch(&mut self) {
        log::trace!("requesting converter batch");
        self.driver.start_acquisition();
        self.batch = Batch::Requested;
    }

    fn finish_cycle(&mut self) -> i32 {
        self.filling = false;

        let moments = Moments::compute(&self.histogram, &mut self.latch);
        let failures = self
            .thresholds
            .assess(&moments, self.histogram.overflowed(), &mut self.latch);
        let report = QualityReport {
            samples: self.histogram.total(),
            moments,
            entropy_estimate: estimate_entropy(&self.histogram).unwrap_or(Fix16::ZERO),
            failures,
        };
        self.histogram.clear();
        self.last_report = Some(report);

        if report.is_accepted() {
            self.stats.accepted += 1;
            log::info!(
                "noise source accepted: mean={} variance={} entropy={} bits/sample",
                moments.mean,
                moments.variance,
                report.entropy_estimate
            );
            ACCEPTED_ENTROPY_BITS
        } else {
            self.stats.rejected += 1;
            log::warn!(
                "noise source rejected (failures={:#07b}): mean={} variance={} kappa3={} kappa4={}",
                failures.bits(),
                moments.mean,
                moments.variance,
                moments.kappa3,
                moments.kappa4
            );
            -i32::from(failures.bits())
        }
    }

    /// Report of the most recent verdict.
    pub fn last_report(&self) -> Option<&QualityReport> {
        self.last_report.as_ref()
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    /// Histogram of the cycle in progress.
    pub fn histogram(&self) -> &PackedHistogram {
        &self.histogram
    }

    /// Whether a cycle is in progress.
    pub fn is_filling(&self) -> bool {
        self.filling
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
