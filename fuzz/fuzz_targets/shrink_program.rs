#![no_main]
use libfuzzer_sys::fuzz_target;
use stateline_core::GenConfig;
use stateline_engine::{is_well_formed, programs, shrink_candidates};
use stateline_harness::{Seed, Size};
use stateline_soundness::queue_spec;

fuzz_target!(|data: &[u8]| {
    if data.len() < 9 {
        return;
    }
    let seed = u64::from_le_bytes(data[..8].try_into().unwrap());
    let size = Size((data[8] % 30) as usize + 1);

    let spec = queue_spec(false);
    let program = programs(spec.clone(), GenConfig::default())
        .run(Seed::from_u64(seed), size)
        .root()
        .clone();
    for candidate in shrink_candidates(&spec, &program) {
        assert!(is_well_formed(&spec, &candidate));
        for second in shrink_candidates(&spec, &candidate).into_iter().take(3) {
            assert!(is_well_formed(&spec, &second));
        }
    }
});
