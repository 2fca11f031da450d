#![no_main]
use libfuzzer_sys::fuzz_target;
use stateline_core::GenConfig;
use stateline_engine::{is_well_formed, programs};
use stateline_harness::{Seed, Size};
use stateline_soundness::queue_spec;

fuzz_target!(|data: &[u8]| {
    if data.len() < 10 {
        return;
    }
    let seed = u64::from_le_bytes(data[..8].try_into().unwrap());
    let size = Size((data[8] % 60) as usize + 1);
    let threads = (data[9] % 3) as usize;

    let spec = queue_spec(false);
    let config = GenConfig {
        threads,
        ..GenConfig::default()
    };
    let program = programs(spec.clone(), config)
        .run(Seed::from_u64(seed), size)
        .root()
        .clone();
    assert!(is_well_formed(&spec, &program));
});
