//! Broker-side acknowledgements synthesized from client writes.
//!
//! Only the first byte of a frame picks the reply. Packet identifiers are
//! copied from the two bytes after the fixed header; frames too short to hold
//! them produce no reply at all.

use crate::constants::{CONNECT, PACKET_TYPE_MASK, PINGREQ, PUBREL, SUBSCRIBE};
use crate::encoding::decode_remaining_length;
use crate::mode::FuzzMode;
use crate::packet_builder::RawPacketBuilder;
use bytes::Bytes;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    ConnAck,
    ConnAckV5,
    PingResp,
    SubAck,
    SubAckV5,
    PubComp,
}

impl fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConnAck => "CONNACK",
            Self::ConnAckV5 => "CONNACK(v5)",
            Self::PingResp => "PINGRESP",
            Self::SubAck => "SUBACK",
            Self::SubAckV5 => "SUBACK(v5)",
            Self::PubComp => "PUBCOMP",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticReply {
    pub kind: ReplyKind,
    pub bytes: Bytes,
}

impl SyntheticReply {
    fn new(kind: ReplyKind, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            bytes: Bytes::from(bytes),
        }
    }
}

/// Picks the reply a broker in `mode` would send for the outbound `frame`.
///
/// | outbound  | modes                        | reply                     |
/// |-----------|------------------------------|---------------------------|
/// | CONNECT   | connected, mqtt5             | CONNACK (v5 in mqtt5)     |
/// | PINGREQ   | any                          | PINGRESP                  |
/// | SUBSCRIBE | subscribe, connected, mqtt5  | SUBACK (v5 in mqtt5)      |
/// | PUBREL    | qos, connected               | PUBCOMP                   |
#[must_use]
pub fn synthesize(frame: &[u8], mode: FuzzMode) -> Option<SyntheticReply> {
    let first = *frame.first()?;

    match first & PACKET_TYPE_MASK {
        CONNECT if mode.answers_connect() => Some(if mode.is_v5() {
            SyntheticReply::new(ReplyKind::ConnAckV5, RawPacketBuilder::connack_v5(false, 0x00))
        } else {
            SyntheticReply::new(ReplyKind::ConnAck, RawPacketBuilder::connack(false, 0x00))
        }),
        PINGREQ => Some(SyntheticReply::new(
            ReplyKind::PingResp,
            RawPacketBuilder::pingresp(),
        )),
        SUBSCRIBE if mode.answers_subscribe() => {
            let packet_id = packet_id_after_fixed_header(frame)?;
            Some(if mode.is_v5() {
                SyntheticReply::new(
                    ReplyKind::SubAckV5,
                    RawPacketBuilder::suback_v5(packet_id, &[0x00]).ok()?,
                )
            } else {
                SyntheticReply::new(
                    ReplyKind::SubAck,
                    RawPacketBuilder::suback(packet_id, &[0x00]).ok()?,
                )
            })
        }
        PUBREL if mode.answers_pubrel() => {
            let packet_id = packet_id_after_fixed_header(frame)?;
            Some(SyntheticReply::new(
                ReplyKind::PubComp,
                RawPacketBuilder::pubcomp(packet_id),
            ))
        }
        _ => None,
    }
}

/// Reads the big-endian packet identifier that follows the fixed header.
///
/// The declared remaining length is not checked against the frame; only the
/// bytes actually present matter.
#[must_use]
pub fn packet_id_after_fixed_header(frame: &[u8]) -> Option<u16> {
    let window = frame.get(1..)?;
    let (_, varint_len) = decode_remaining_length(window);
    let header_len = 1 + varint_len;
    let id = frame.get(header_len..header_len + 2)?;
    Some(u16::from_be_bytes([id[0], id[1]]))
}
