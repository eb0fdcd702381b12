//! Replay a captured converter stream through the quality engine.
//!
//! Run with: `cargo run --example replay -- [capture.txt]`
//!
//! The capture holds one converter code per line. Without a file, a
//! synthetic bell-shaped stream is used.

use noiseqa::{NoiseEngine, NoiseModel, ReplayAdc, CHUNK_SAMPLES, SAMPLE_COUNT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn synthetic_stream(len: usize) -> Vec<u16> {
    let mut rng = StdRng::seed_from_u64(0x9e37_79b9);
    (0..len)
        .map(|_| {
            let offset: i32 = (0..8).map(|_| rng.gen_range(-64..=64)).sum();
            (512 + offset).clamp(0, 1023) as u16
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let stream = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.trim().parse::<u16>())
            .collect::<Result<Vec<_>, _>>()?,
        None => synthetic_stream(2 * SAMPLE_COUNT as usize),
    };
    println!("Replaying {} samples", stream.len());

    let mut engine = NoiseEngine::new(ReplayAdc::new(stream, 256), &NoiseModel::default())?;
    let mut out = [0u8; 2 * CHUNK_SAMPLES];

    for cycle in 1..=2 {
        let mut calls = 0;
        let verdict = loop {
            calls += 1;
            let v = engine.produce_chunk(&mut out);
            if v != 0 {
                break v;
            }
        };
        println!(
            "Cycle {}: {} calls, verdict {} ({})",
            cycle,
            calls,
            verdict,
            if verdict > 0 { "accepted" } else { "rejected" }
        );
        if let Some(report) = engine.last_report() {
            println!("{}", report.to_json()?);
        }
    }

    let stats = engine.stats();
    println!("Accepted: {}, rejected: {}", stats.accepted, stats.rejected);
    Ok(())
}
