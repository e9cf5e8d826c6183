//! Hand-assembled MQTT packets.
//!
//! [`RawPacketBuilder`] writes bytes directly rather than going through a
//! packet model, so it can produce both the frames the autopilot replies with
//! and the broker-side frames that make up the seed corpus. Methods without a
//! `_v5` suffix emit MQTT v3.1.1 layouts.
//!
//! Builders with caller-sized fields return `Result`: strings longer than
//! 65,535 bytes and bodies past the remaining-length maximum are rejected with
//! `MalformedPacket`.

use crate::constants::{
    CONNACK, CONNECT, DISCONNECT, PINGREQ, PINGRESP, PUBACK, PUBCOMP, PUBLISH, PUBREC, PUBREL,
    SUBACK, SUBSCRIBE,
};
use crate::encoding::encode_remaining_length;
use crate::error::{FuzzError, Result};
use bytes::{BufMut, BytesMut};

pub const PROTOCOL_LEVEL_V311: u8 = 4;
pub const PROTOCOL_LEVEL_V5: u8 = 5;

/// PUBLISH fixed-header flag bits.
pub const PUBLISH_DUP: u8 = 0x08;
pub const PUBLISH_RETAIN: u8 = 0x01;

pub struct RawPacketBuilder;

impl RawPacketBuilder {
    /// CONNECT with clean session, keepalive 60s and no credentials.
    pub fn connect(client_id: &str, protocol_level: u8) -> Result<Vec<u8>> {
        Self::connect_with_keepalive(client_id, protocol_level, 60)
    }

    pub fn connect_with_keepalive(
        client_id: &str,
        protocol_level: u8,
        keepalive_secs: u16,
    ) -> Result<Vec<u8>> {
        let mut body = BytesMut::new();
        put_mqtt_string(&mut body, "MQTT")?;
        body.put_u8(protocol_level);
        body.put_u8(0x02);
        body.put_u16(keepalive_secs);
        if protocol_level >= PROTOCOL_LEVEL_V5 {
            body.put_u8(0);
        }
        put_mqtt_string(&mut body, client_id)?;

        wrap_fixed_header(CONNECT, &body)
    }

    /// `20 02 <flags> <return code>`
    #[must_use]
    pub fn connack(session_present: bool, return_code: u8) -> Vec<u8> {
        vec![CONNACK, 0x02, u8::from(session_present), return_code]
    }

    /// `20 03 <flags> <reason code> 00`
    #[must_use]
    pub fn connack_v5(session_present: bool, reason_code: u8) -> Vec<u8> {
        vec![CONNACK, 0x03, u8::from(session_present), reason_code, 0x00]
    }

    pub fn connack_v5_with_properties(
        session_present: bool,
        reason_code: u8,
        properties: &[u8],
    ) -> Result<Vec<u8>> {
        let mut body = BytesMut::new();
        body.put_u8(u8::from(session_present));
        body.put_u8(reason_code);
        encode_remaining_length(length_u32(properties.len())?, &mut body)?;
        body.put_slice(properties);
        wrap_fixed_header(CONNACK, &body)
    }

    /// SUBSCRIBE for one filter. Fixed header byte `0x82`.
    pub fn subscribe(topic: &str, qos: u8, packet_id: u16) -> Result<Vec<u8>> {
        let mut body = BytesMut::new();
        body.put_u16(packet_id);
        put_mqtt_string(&mut body, topic)?;
        body.put_u8(qos & 0x03);
        wrap_fixed_header(SUBSCRIBE | 0x02, &body)
    }

    pub fn subscribe_v5(topic: &str, qos: u8, packet_id: u16) -> Result<Vec<u8>> {
        let mut body = BytesMut::new();
        body.put_u16(packet_id);
        body.put_u8(0);
        put_mqtt_string(&mut body, topic)?;
        body.put_u8(qos & 0x03);
        wrap_fixed_header(SUBSCRIBE | 0x02, &body)
    }

    /// SUBACK with one return code per filter.
    pub fn suback(packet_id: u16, return_codes: &[u8]) -> Result<Vec<u8>> {
        let mut body = BytesMut::new();
        body.put_u16(packet_id);
        body.put_slice(return_codes);
        wrap_fixed_header(SUBACK, &body)
    }

    /// SUBACK with an empty property block ahead of the reason codes.
    pub fn suback_v5(packet_id: u16, reason_codes: &[u8]) -> Result<Vec<u8>> {
        let mut body = BytesMut::new();
        body.put_u16(packet_id);
        body.put_u8(0);
        body.put_slice(reason_codes);
        wrap_fixed_header(SUBACK, &body)
    }

    pub fn publish_qos0(topic: &str, payload: &[u8]) -> Result<Vec<u8>> {
        Self::publish_with_flags(0, topic, payload, None)
    }

    pub fn publish_qos1(topic: &str, payload: &[u8], packet_id: u16) -> Result<Vec<u8>> {
        Self::publish_with_flags(0x02, topic, payload, Some(packet_id))
    }

    pub fn publish_qos2(topic: &str, payload: &[u8], packet_id: u16) -> Result<Vec<u8>> {
        Self::publish_with_flags(0x04, topic, payload, Some(packet_id))
    }

    /// PUBLISH with raw fixed-header `flags` (DUP, QoS and RETAIN bits).
    ///
    /// The packet identifier is written whenever one is given, regardless of
    /// the QoS bits.
    pub fn publish_with_flags(
        flags: u8,
        topic: &str,
        payload: &[u8],
        packet_id: Option<u16>,
    ) -> Result<Vec<u8>> {
        let mut body = BytesMut::new();
        put_mqtt_string(&mut body, topic)?;
        if let Some(id) = packet_id {
            body.put_u16(id);
        }
        body.put_slice(payload);
        wrap_fixed_header(PUBLISH | (flags & 0x0F), &body)
    }

    pub fn publish_v5(
        flags: u8,
        topic: &str,
        payload: &[u8],
        packet_id: Option<u16>,
    ) -> Result<Vec<u8>> {
        let mut body = BytesMut::new();
        put_mqtt_string(&mut body, topic)?;
        if let Some(id) = packet_id {
            body.put_u16(id);
        }
        body.put_u8(0);
        body.put_slice(payload);
        wrap_fixed_header(PUBLISH | (flags & 0x0F), &body)
    }

    #[must_use]
    pub fn puback(packet_id: u16) -> Vec<u8> {
        ack(PUBACK, packet_id)
    }

    #[must_use]
    pub fn pubrec(packet_id: u16) -> Vec<u8> {
        ack(PUBREC, packet_id)
    }

    /// PUBREL with its mandatory `0x02` flags, i.e. first byte `0x62`.
    #[must_use]
    pub fn pubrel(packet_id: u16) -> Vec<u8> {
        ack(PUBREL | 0x02, packet_id)
    }

    /// `70 02 <idHi> <idLo>`
    #[must_use]
    pub fn pubcomp(packet_id: u16) -> Vec<u8> {
        ack(PUBCOMP, packet_id)
    }

    /// v5 acknowledgement. With `with_reason` the body carries a Success
    /// reason code and an empty property block; otherwise only the packet id.
    #[must_use]
    pub fn ack_v5(first_byte: u8, packet_id: u16, with_reason: bool) -> Vec<u8> {
        let mut packet = ack(first_byte, packet_id);
        if with_reason {
            packet[1] = 0x04;
            packet.extend_from_slice(&[0x00, 0x00]);
        }
        packet
    }

    #[must_use]
    pub fn pingreq() -> Vec<u8> {
        vec![PINGREQ, 0x00]
    }

    #[must_use]
    pub fn pingresp() -> Vec<u8> {
        vec![PINGRESP, 0x00]
    }

    #[must_use]
    pub fn disconnect() -> Vec<u8> {
        vec![DISCONNECT, 0x00]
    }
}

fn ack(first_byte: u8, packet_id: u16) -> Vec<u8> {
    let [hi, lo] = packet_id.to_be_bytes();
    vec![first_byte, 0x02, hi, lo]
}

fn put_mqtt_string(buf: &mut BytesMut, s: &str) -> Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| {
        FuzzError::MalformedPacket(format!("string of {} bytes exceeds 65535", s.len()))
    })?;
    buf.put_u16(len);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn length_u32(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| FuzzError::MalformedPacket(format!("length {len} does not fit a varint")))
}

fn wrap_fixed_header(first_byte: u8, body: &[u8]) -> Result<Vec<u8>> {
    let mut header = BytesMut::with_capacity(5);
    header.put_u8(first_byte);
    encode_remaining_length(length_u32(body.len())?, &mut header)?;

    let mut packet = Vec::with_capacity(header.len() + body.len());
    packet.extend_from_slice(&header);
    packet.extend_from_slice(body);
    Ok(packet)
}
