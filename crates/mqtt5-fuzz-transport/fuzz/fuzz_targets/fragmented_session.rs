#![no_main]

use libfuzzer_sys::fuzz_target;
use mqtt5_fuzz_transport::constants::MAX_INPUT_LEN;
use mqtt5_fuzz_transport::{FuzzConfig, FuzzMode, RunDriver};

/// Same session as `client_session`, with reads capped to a few bytes so the
/// client has to reassemble every frame.
///
/// Byte 0 is the fragment cap (low nibble, 0 means uncapped), byte 1 the
/// DYNAMIC selector.
fuzz_target!(|data: &[u8]| {
    let Some((&cap, rest)) = data.split_first() else {
        return;
    };
    let rest = &rest[..rest.len().min(MAX_INPUT_LEN)];
    let config = FuzzConfig::default()
        .with_autopilot(true)
        .with_mode(FuzzMode::Dynamic)
        .with_fragment_cap(i32::from(cap & 0x0F))
        .with_step_count(512);

    let report = RunDriver::new(config)
        .run_reference(rest.to_vec())
        .expect("reference client never fails to build");
    assert_eq!(report.steps, 512);
});
