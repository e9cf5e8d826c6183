//! Wire constants and harness limits.

pub const PACKET_TYPE_MASK: u8 = 0xF0;

pub const CONNECT: u8 = 0x10;
pub const CONNACK: u8 = 0x20;
pub const PUBLISH: u8 = 0x30;
pub const PUBACK: u8 = 0x40;
pub const PUBREC: u8 = 0x50;
pub const PUBREL: u8 = 0x60;
pub const PUBCOMP: u8 = 0x70;
pub const SUBSCRIBE: u8 = 0x80;
pub const SUBACK: u8 = 0x90;
pub const UNSUBSCRIBE: u8 = 0xA0;
pub const UNSUBACK: u8 = 0xB0;
pub const PINGREQ: u8 = 0xC0;
pub const PINGRESP: u8 = 0xD0;
pub const DISCONNECT: u8 = 0xE0;
pub const AUTH: u8 = 0xF0;

/// Largest value a four byte remaining length can carry.
pub const MAX_REMAINING_LENGTH: u32 = 268_435_455;

/// Decoding stops once the multiplier passes 128^3.
pub const VARINT_MULTIPLIER_LIMIT: u32 = 128 * 128 * 128;

pub const MAX_VARINT_BYTES: usize = 4;

/// Library-defined code recorded when a read finds no data.
pub const ERR_TCP_TRANSPORT_CONNECTION_TIMEOUT: i32 = 1;

pub const ERR_TCP_TRANSPORT_CONNECTION_CLOSED_BY_FIN: i32 = 2;

/// POSIX `EAGAIN`.
pub const EAGAIN: i32 = 11;

/// Return value of a failed transport call at the C-style boundary.
pub const TRANSPORT_FAILURE: i32 = -1;

pub const DEFAULT_STEP_COUNT: usize = 2048;

/// Inputs are cut to one Ethernet-sized TCP segment.
pub const MAX_INPUT_LEN: usize = 1460;

pub const READ_SCRATCH_LEN: usize = 1460;
