use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Route the engine's `log` output to the test harness.
pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

/// Converter codes around `center`, each the sum of eight uniform offsets in
/// `[-spread, spread]`, clamped to the converter range.
pub fn bell_stream(seed: u64, len: usize, center: i32, spread: i32) -> Vec<u16> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            let offset: i32 = (0..8).map(|_| rng.gen_range(-spread..=spread)).sum();
            (center + offset).clamp(0, 1023) as u16
        })
        .collect()
}

/// Bell-shaped stream with variance ~11093 codes^2 (0.677 once scaled).
pub fn gaussian_stream(seed: u64, len: usize, center: i32) -> Vec<u16> {
    bell_stream(seed, len, center, 64)
}

/// Little-endian byte image of `samples`.
pub fn le_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
