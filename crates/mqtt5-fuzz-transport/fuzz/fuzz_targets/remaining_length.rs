#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use mqtt5_fuzz_transport::encoding::{
    decode_remaining_length, encode_remaining_length, try_decode_remaining_length,
};

fuzz_target!(|data: &[u8]| {
    let (value, consumed) = decode_remaining_length(data);
    assert!(consumed <= 4);
    assert!(consumed <= data.len());

    if let Ok(Some((strict, len))) = try_decode_remaining_length(data) {
        assert_eq!(strict, value);
        assert_eq!(len, consumed);

        let mut buf = BytesMut::new();
        encode_remaining_length(strict, &mut buf).expect("decoded value is encodable");
        assert_eq!(try_decode_remaining_length(&buf), Ok(Some((strict, buf.len()))));
    }
});
