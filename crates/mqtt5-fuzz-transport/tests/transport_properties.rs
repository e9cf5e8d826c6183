//! Behavioral properties of the fuzz transport seen through the
//! `StreamTransport` interface only.

use mqtt5_fuzz_transport::constants::{EAGAIN, ERR_TCP_TRANSPORT_CONNECTION_TIMEOUT};
use mqtt5_fuzz_transport::encoding::decode_remaining_length;
use mqtt5_fuzz_transport::{
    destroy_transport, FuzzConfig, FuzzError, FuzzMode, FuzzTransport, RawPacketBuilder,
    Readiness, StreamTransport, WouldBlockCause,
};
use proptest::prelude::*;
use std::time::Duration;

const ZERO: Duration = Duration::ZERO;

fn autopilot(mode: FuzzMode) -> FuzzConfig {
    FuzzConfig::default().with_autopilot(true).with_mode(mode)
}

fn connected(input: Vec<u8>, config: &FuzzConfig) -> FuzzTransport {
    let mut transport = FuzzTransport::new(input, config);
    transport.connect("broker.invalid", 1883, ZERO).unwrap();
    transport
}

fn read_exact(transport: &mut FuzzTransport, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    let n = transport.read(&mut buf, ZERO).unwrap();
    buf.truncate(n);
    buf
}

fn drain(transport: &mut FuzzTransport) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 64];
    while let Ok(n) = transport.read(&mut buf, ZERO) {
        out.extend_from_slice(&buf[..n]);
    }
    out
}

#[test]
fn end_to_end_dynamic_connect_then_subscribe() {
    let connect = RawPacketBuilder::connect("fuzz", 4).unwrap();
    let subscribe = [0x82, 0x02, 0x00, 0x01];
    let mut input = vec![0x01];
    input.extend_from_slice(&connect);
    input.extend_from_slice(&subscribe);

    let mut transport = connected(input, &autopilot(FuzzMode::Dynamic));
    assert_eq!(transport.mode(), FuzzMode::Connected);

    let frame = read_exact(&mut transport, connect.len());
    assert_eq!(frame, connect);
    transport.write(&frame, ZERO).unwrap();
    assert_eq!(read_exact(&mut transport, 64), [0x20, 0x02, 0x00, 0x00]);

    let frame = read_exact(&mut transport, subscribe.len());
    assert_eq!(frame, subscribe);
    transport.write(&frame, ZERO).unwrap();
    assert_eq!(read_exact(&mut transport, 64), [0x90, 0x03, 0x00, 0x01, 0x00]);

    let err = transport.read(&mut [0u8; 8], ZERO).unwrap_err();
    assert_eq!(err, FuzzError::WouldBlock(WouldBlockCause::Drained));
}

#[test]
fn varint_reference_values() {
    let cases: [(&[u8], u32, usize); 6] = [
        (&[0x00], 0, 1),
        (&[0x7F], 127, 1),
        (&[0x80, 0x01], 128, 2),
        (&[0xFF, 0x7F], 16_383, 2),
        (&[0x80, 0x80, 0x01], 16_384, 3),
        (&[0xFF, 0xFF, 0x7F], 2_097_151, 3),
    ];
    for (bytes, value, len) in cases {
        assert_eq!(decode_remaining_length(bytes), (value, len), "{bytes:02X?}");
    }
}

#[test]
fn transient_errors_carry_library_codes() {
    let mut transport = FuzzTransport::new(Vec::new(), &FuzzConfig::default());
    let err = transport.read(&mut [0u8; 4], ZERO).unwrap_err();

    assert!(err.is_transient());
    assert_eq!(err.errno(), EAGAIN);
    assert_eq!(transport.last_errno(), ERR_TCP_TRANSPORT_CONNECTION_TIMEOUT);
    assert_eq!(err.status_code(), -1);
    assert_eq!(
        std::io::Error::from(err).kind(),
        std::io::ErrorKind::WouldBlock
    );
}

#[test]
fn poll_ignores_injected_replies() {
    let mut transport = connected(Vec::new(), &autopilot(FuzzMode::Connected));
    transport.write(&RawPacketBuilder::pingreq(), ZERO).unwrap();

    assert_eq!(transport.pending_injected(), 2);
    assert_eq!(transport.poll_read(ZERO), Readiness::Failed);
    assert_eq!(read_exact(&mut transport, 8), [0xD0, 0x00]);
}

#[test]
fn destroy_is_idempotent_and_null_safe() {
    let mut transport = connected(vec![1, 2, 3], &autopilot(FuzzMode::Connected));
    transport.write(&RawPacketBuilder::pingreq(), ZERO).unwrap();
    read_exact(&mut transport, 1);
    transport.close().unwrap();
    transport.close().unwrap();
    transport.destroy().unwrap();
    transport.destroy().unwrap();
    assert!(transport.is_destroyed());

    assert!(destroy_transport(None).is_ok());
    assert!(destroy_transport(Some(transport.into_boxed())).is_ok());
}

proptest! {
    #[test]
    fn reads_fail_transiently_before_connect_and_after_close(
        input in proptest::collection::vec(any::<u8>(), 0..256),
        mode in 0i32..6,
        autopilot in any::<bool>(),
    ) {
        let mut transport = FuzzTransport::create(&input, autopilot, mode, 0);
        let mut buf = [0u8; 32];

        let err = transport.read(&mut buf, ZERO).unwrap_err();
        prop_assert_eq!(err, FuzzError::WouldBlock(WouldBlockCause::NotConnected));

        transport.connect("h", 1, ZERO).unwrap();
        let _ = transport.read(&mut buf, ZERO);
        transport.close().unwrap();

        let err = transport.read(&mut buf, ZERO).unwrap_err();
        prop_assert!(err.is_transient());
    }

    #[test]
    fn injected_reply_precedes_raw_input(
        input in proptest::collection::vec(any::<u8>(), 1..128),
    ) {
        let mut transport = connected(input.clone(), &autopilot(FuzzMode::Connected));
        transport.write(&RawPacketBuilder::connect("c", 4).unwrap(), ZERO).unwrap();

        let mut seen = drain(&mut transport);
        prop_assert_eq!(seen.drain(..4).collect::<Vec<_>>(), vec![0x20, 0x02, 0x00, 0x00]);
        prop_assert_eq!(seen, input);
    }

    #[test]
    fn fragment_cap_bounds_every_read(
        input in proptest::collection::vec(any::<u8>(), 0..256),
        cap in 1i32..32,
        requested in 1usize..96,
    ) {
        let config = FuzzConfig::default().with_fragment_cap(cap);
        let mut transport = connected(input.clone(), &config);
        let limit = requested.min(usize::try_from(cap).unwrap());

        let mut seen = Vec::new();
        let mut buf = vec![0u8; requested];
        while let Ok(n) = transport.read(&mut buf, ZERO) {
            prop_assert!(n <= limit);
            prop_assert!(n > 0);
            seen.extend_from_slice(&buf[..n]);
        }
        prop_assert_eq!(seen, input);
    }

    #[test]
    fn uncapped_reads_limited_by_request_only(
        input in proptest::collection::vec(any::<u8>(), 1..256),
        cap in -8i32..=0,
        requested in 1usize..300,
    ) {
        let config = FuzzConfig::default().with_fragment_cap(cap);
        let mut transport = connected(input.clone(), &config);
        let mut buf = vec![0u8; requested];

        let n = transport.read(&mut buf, ZERO).unwrap();
        prop_assert_eq!(n, requested.min(input.len()));
    }

    #[test]
    fn suback_echoes_packet_id(packet_id in any::<u16>(), topic in "[a-z/#+]{1,24}") {
        let mut transport = connected(Vec::new(), &autopilot(FuzzMode::Connected));
        let subscribe = RawPacketBuilder::subscribe(&topic, 1, packet_id).unwrap();
        transport.write(&subscribe, ZERO).unwrap();

        let reply = drain(&mut transport);
        let [hi, lo] = packet_id.to_be_bytes();
        prop_assert_eq!(reply, vec![0x90, 0x03, hi, lo, 0x00]);
    }

    #[test]
    fn dynamic_selector_matches_explicit_mode(
        high_nibble in 0u8..16,
        packet_id in any::<u16>(),
    ) {
        let subscribe = RawPacketBuilder::subscribe("a/b", 0, packet_id).unwrap();
        let mut dynamic_input = vec![(high_nibble << 4) | 0x02];
        dynamic_input.extend_from_slice(&subscribe);

        let mut dynamic = connected(dynamic_input, &autopilot(FuzzMode::Dynamic));
        let mut explicit = connected(subscribe.clone(), &autopilot(FuzzMode::Subscribe));
        prop_assert_eq!(dynamic.mode(), FuzzMode::Subscribe);

        let mut replies = Vec::new();
        for transport in [&mut dynamic, &mut explicit] {
            let frame = drain(transport);
            prop_assert_eq!(&frame, &subscribe);
            transport.write(&frame, ZERO).unwrap();
            replies.push(drain(transport));
        }
        prop_assert_eq!(&replies[0], &replies[1]);
        prop_assert_eq!(replies[0].len(), 5);
    }

    #[test]
    fn arbitrary_writes_are_accepted_whole(
        frame in proptest::collection::vec(any::<u8>(), 0..64),
        selector in any::<u8>(),
    ) {
        let mode = FuzzMode::from_selector(selector);
        let mut transport = connected(Vec::new(), &autopilot(mode));
        prop_assert_eq!(transport.write(&frame, ZERO).unwrap(), frame.len());
        let queued = drain(&mut transport);
        prop_assert!(queued.len() <= 6);
    }
}
