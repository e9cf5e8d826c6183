#![no_main]

use libfuzzer_sys::fuzz_target;
use mqtt5_fuzz_transport::{FuzzConfig, FuzzMode, FuzzTransport, StreamTransport};
use std::time::Duration;

/// Feeds arbitrary outbound frames to an autopilot transport and drains
/// whatever it queued. Byte 0 selects the mode.
fuzz_target!(|data: &[u8]| {
    let Some((&mode, frame)) = data.split_first() else {
        return;
    };
    let config = FuzzConfig::default()
        .with_autopilot(true)
        .with_mode(FuzzMode::from_selector(mode));
    let mut transport = FuzzTransport::new(Vec::new(), &config);
    transport.connect("fuzz", 1883, Duration::ZERO).unwrap();

    assert_eq!(transport.write(frame, Duration::ZERO).unwrap(), frame.len());

    let mut buf = [0u8; 8];
    while transport.read(&mut buf, Duration::ZERO).is_ok() {}
    assert_eq!(transport.pending_injected(), 0);
    transport.destroy().unwrap();
});
