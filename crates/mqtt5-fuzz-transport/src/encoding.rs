//! MQTT remaining-length varint codec.
//!
//! [`decode_remaining_length`] is the lenient decoder the autopilot uses to
//! find packet identifiers in client writes: it never fails and stops after
//! four bytes no matter what follows. [`try_decode_remaining_length`] is the
//! strict variant used when reassembling inbound frames.

use crate::constants::{MAX_REMAINING_LENGTH, MAX_VARINT_BYTES, VARINT_MULTIPLIER_LIMIT};
use crate::error::{FuzzError, Result};
use bytes::{BufMut, BytesMut};

/// Decodes a remaining length from the start of `window`.
///
/// Returns the value and the number of bytes consumed. Decoding stops on the
/// first byte without the continuation bit, at the end of the window, or once
/// the multiplier passes 128^3, so at most four bytes are read. An empty
/// window yields `(0, 0)`.
#[must_use]
pub fn decode_remaining_length(window: &[u8]) -> (u32, usize) {
    let mut multiplier: u32 = 1;
    let mut value: u32 = 0;
    let mut consumed = 0;

    for &byte in window {
        consumed += 1;
        value += u32::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            break;
        }
        multiplier *= 128;
        if multiplier > VARINT_MULTIPLIER_LIMIT {
            break;
        }
    }

    (value, consumed)
}

/// Strict remaining-length decode.
///
/// `Ok(None)` means the window ended inside the varint and more bytes are
/// needed.
///
/// # Errors
/// Returns `MalformedPacket` if the fourth byte still has its continuation bit set.
pub fn try_decode_remaining_length(window: &[u8]) -> Result<Option<(u32, usize)>> {
    let mut value: u32 = 0;
    let mut shift = 0;

    for (index, &byte) in window.iter().enumerate() {
        if index == MAX_VARINT_BYTES {
            return Err(FuzzError::MalformedPacket(
                "remaining length exceeds 4 bytes".to_string(),
            ));
        }
        value |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(Some((value, index + 1)));
        }
        shift += 7;
    }

    if window.len() >= MAX_VARINT_BYTES {
        return Err(FuzzError::MalformedPacket(
            "remaining length exceeds 4 bytes".to_string(),
        ));
    }
    Ok(None)
}

/// Appends the varint encoding of `value` to `buf`.
///
/// # Errors
/// Returns `MalformedPacket` if `value` does not fit in four bytes.
pub fn encode_remaining_length(value: u32, buf: &mut BytesMut) -> Result<()> {
    if value > MAX_REMAINING_LENGTH {
        return Err(FuzzError::MalformedPacket(format!(
            "remaining length {value} exceeds maximum {MAX_REMAINING_LENGTH}"
        )));
    }

    let mut remaining = value;
    loop {
        #[allow(clippy::cast_possible_truncation)]
        let mut byte = (remaining & 0x7F) as u8;
        remaining >>= 7;
        if remaining > 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if remaining == 0 {
            break;
        }
    }
    Ok(())
}

#[must_use]
pub fn encoded_len(value: u32) -> usize {
    match value {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        _ => 4,
    }
}
