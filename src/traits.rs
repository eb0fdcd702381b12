//! Seam between the quality engine and the converter driver.

/// Interrupt-driven analog-to-digital converter filling a sample buffer in
/// the background.
///
/// The engine only ever reads the buffer and the ready signal. Its single
/// write is [`start_acquisition`](AdcDriver::start_acquisition).
pub trait AdcDriver {
    /// Begin filling the sample buffer. Restarts from empty if a fill is
    /// already running.
    fn start_acquisition(&mut self);

    /// True once the buffer is completely filled. The driver stops filling
    /// until the next [`start_acquisition`](AdcDriver::start_acquisition).
    fn batch_ready(&self) -> bool;

    /// The filled buffer. Only meaningful while [`batch_ready`](AdcDriver::batch_ready) holds.
    fn samples(&self) -> &[u16];

    /// Called repeatedly while polling for a full batch.
    fn wait(&mut self) {
        core::hint::spin_loop();
    }
}
