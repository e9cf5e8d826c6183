#![no_main]

use libfuzzer_sys::fuzz_target;
use mqtt5_fuzz_transport::constants::MAX_INPUT_LEN;
use mqtt5_fuzz_transport::{FuzzConfig, FuzzMode, RunDriver};

/// Drives the reference client through one autopilot session.
///
/// The first input byte picks the broker profile, the rest is replayed as
/// inbound network data.
fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_INPUT_LEN)];
    let config = FuzzConfig::default()
        .with_autopilot(true)
        .with_mode(FuzzMode::Dynamic)
        .with_step_count(256);

    let report = RunDriver::new(config)
        .run_reference(data.to_vec())
        .expect("reference client never fails to build");
    assert_eq!(report.steps, 256);
    assert!(report.transport.bytes_from_input <= data.len());
});
