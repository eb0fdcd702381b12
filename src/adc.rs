//! Converter-side building blocks.
//!
//! [`BatchFlag`] is the one value shared between the sampling interrupt and
//! foreground code. [`ReplayAdc`] is a driver that replays a recorded sample
//! stream, used for bench testing against captured device data.

use core::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "std")]
use crate::AdcDriver;

/// "Batch ready" signal written by the sampling interrupt and polled by the engine.
///
/// Only plain loads and stores are used so the flag works on cores without
/// atomic read-modify-write instructions.
#[derive(Debug, Default)]
pub struct BatchFlag(AtomicBool);

impl BatchFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Interrupt side: the buffer has been completely filled.
    #[inline]
    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Foreground side. Pairs with [`signal`](Self::signal) so buffer writes
    /// made before the signal are visible after this returns `true`.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Called when a new acquisition starts.
    #[inline]
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Driver that replays a fixed sample stream in batches.
///
/// The stream wraps around when exhausted. By default a batch is filled
/// immediately by `start_acquisition`; [`with_fill_per_wait`](Self::with_fill_per_wait)
/// instead fills a few samples on every `wait` call, the way an interrupt
/// handler trickles them in while foreground code polls.
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct ReplayAdc {
    stream: Vec<u16>,
    position: usize,
    batch_len: usize,
    buffer: Vec<u16>,
    fill_per_wait: usize,
    ready: BatchFlag,
    acquisitions: usize,
}

#[cfg(feature = "std")]
impl ReplayAdc {
    /// Replay `stream` in batches of `batch_len` samples.
    pub fn new(stream: Vec<u16>, batch_len: usize) -> Self {
        Self {
            stream,
            position: 0,
            batch_len,
            buffer: Vec::with_capacity(batch_len),
            fill_per_wait: 0,
            ready: BatchFlag::new(),
            acquisitions: 0,
        }
    }

    /// Fill `samples` per `wait` call instead of instantly. Zero restores
    /// instant fills.
    pub fn with_fill_per_wait(mut self, samples: usize) -> Self {
        self.fill_per_wait = samples;
        self
    }

    /// Number of `start_acquisition` calls so far.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions
    }

    /// Stream samples delivered into batches so far.
    pub fn delivered(&self) -> usize {
        self.position
    }

    fn fill(&mut self, count: usize) {
        if self.stream.is_empty() {
            self.ready.signal();
            return;
        }
        let room = self.batch_len - self.buffer.len();
        for _ in 0..count.min(room) {
            self.buffer.push(self.stream[self.position % self.stream.len()]);
            self.position += 1;
        }
        if self.buffer.len() == self.batch_len {
            self.ready.signal();
        }
    }
}

#[cfg(feature = "std")]
impl AdcDriver for ReplayAdc {
    fn start_acquisition(&mut self) {
        self.ready.clear();
        self.buffer.clear();
        self.acquisitions += 1;
        if self.fill_per_wait == 0 {
            self.fill(self.batch_len);
        }
    }

    fn batch_ready(&self) -> bool {
        self.ready.is_set()
    }

    fn samples(&self) -> &[u16] {
        &self.buffer
    }

    fn wait(&mut self) {
        if !self.ready.is_set() {
            self.fill(self.fill_per_wait.max(1));
        }
    }
}
