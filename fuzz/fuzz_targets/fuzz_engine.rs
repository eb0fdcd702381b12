#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use noiseqa::{
    NoiseEngine, NoiseModel, ReplayAdc, ACCEPTED_ENTROPY_BITS, CHUNK_SAMPLES, SAMPLE_COUNT,
};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    stream: Vec<u16>,
    batch_len: u8,
    out_len: u8,
}

fuzz_target!(|input: FuzzInput| {
    if input.stream.is_empty() {
        return;
    }
    let batch_len = (input.batch_len as usize).max(1);
    let out_len = (input.out_len as usize % (2 * CHUNK_SAMPLES + 1)).max(2);

    // Arbitrary codes, including ones outside the converter range.
    let adc = ReplayAdc::new(input.stream, batch_len);
    let mut engine = match NoiseEngine::new(adc, &NoiseModel::default()) {
        Ok(engine) => engine,
        Err(_) => return,
    };

    let mut out = vec![0u8; out_len];
    let max_calls = SAMPLE_COUNT as usize + 1;
    for _ in 0..max_calls {
        let verdict = engine.produce_chunk(&mut out);
        if verdict != 0 {
            let report = engine.last_report().expect("verdict leaves a report");
            assert_eq!(report.samples, SAMPLE_COUNT);
            if verdict > 0 {
                assert_eq!(verdict, ACCEPTED_ENTROPY_BITS);
                assert!(report.is_accepted());
            } else {
                assert_eq!(verdict, -i32::from(report.failures.bits()));
            }
            return;
        }
    }
    panic!("no verdict after {} calls", max_calls);
});
