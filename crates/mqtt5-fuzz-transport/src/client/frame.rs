use crate::encoding::try_decode_remaining_length;
use crate::error::{FuzzError, Result};
use bytes::{Bytes, BytesMut};

pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Reassembles MQTT frames from arbitrarily split reads.
#[derive(Debug)]
pub struct FrameReader {
    buf: BytesMut,
    max_frame_len: usize,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameReader {
    #[must_use]
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_len,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Splits off the next complete frame, if one is buffered.
    ///
    /// # Errors
    /// Returns `MalformedPacket` for an overlong remaining length or a frame
    /// larger than the configured maximum. The buffer is left as is.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let Some((remaining, varint_len)) = try_decode_remaining_length(&self.buf[1..])? else {
            return Ok(None);
        };

        let total = 1 + varint_len + remaining as usize;
        if total > self.max_frame_len {
            return Err(FuzzError::MalformedPacket(format!(
                "frame of {total} bytes exceeds maximum {}",
                self.max_frame_len
            )));
        }
        if self.buf.len() < total {
            return Ok(None);
        }
        Ok(Some(self.buf.split_to(total).freeze()))
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// A complete frame split into its first byte and body.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub first_byte: u8,
    pub body: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// # Errors
    /// Returns `MalformedPacket` if the frame is not exactly one packet.
    pub fn parse(frame: &'a [u8]) -> Result<Self> {
        let (&first_byte, rest) = frame
            .split_first()
            .ok_or_else(|| FuzzError::MalformedPacket("empty frame".to_string()))?;
        let (remaining, varint_len) = try_decode_remaining_length(rest)?
            .ok_or_else(|| FuzzError::MalformedPacket("truncated remaining length".to_string()))?;
        let body = &rest[varint_len..];
        if body.len() != remaining as usize {
            return Err(FuzzError::MalformedPacket(format!(
                "remaining length {remaining} does not match body of {} bytes",
                body.len()
            )));
        }
        Ok(Self { first_byte, body })
    }

    #[must_use]
    pub fn packet_type(&self) -> u8 {
        self.first_byte & 0xF0
    }

    #[must_use]
    pub fn flags(&self) -> u8 {
        self.first_byte & 0x0F
    }
}

/// Cursor over a packet body.
#[derive(Debug)]
pub struct BodyReader<'a> {
    body: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    #[must_use]
    pub fn new(body: &'a [u8]) -> Self {
        Self { body, pos: 0 }
    }

    /// # Errors
    /// Returns `MalformedPacket` past the end of the body.
    pub fn u8(&mut self, what: &str) -> Result<u8> {
        let byte = *self
            .body
            .get(self.pos)
            .ok_or_else(|| truncated(what))?;
        self.pos += 1;
        Ok(byte)
    }

    /// # Errors
    /// Returns `MalformedPacket` past the end of the body.
    pub fn u16(&mut self, what: &str) -> Result<u16> {
        let bytes = self.take(2, what)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// # Errors
    /// Returns `MalformedPacket` past the end of the body.
    pub fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or_else(|| truncated(what))?;
        let bytes = self.body.get(self.pos..end).ok_or_else(|| truncated(what))?;
        self.pos = end;
        Ok(bytes)
    }

    /// Length-prefixed UTF-8 string; invalid sequences are replaced.
    ///
    /// # Errors
    /// Returns `MalformedPacket` past the end of the body.
    pub fn string(&mut self, what: &str) -> Result<String> {
        let len = self.u16(what)?;
        let bytes = self.take(usize::from(len), what)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Skips a v5 property block.
    ///
    /// # Errors
    /// Returns `MalformedPacket` if the block length is malformed or overruns the body.
    pub fn skip_properties(&mut self) -> Result<()> {
        let window = self.body.get(self.pos..).unwrap_or_default();
        let (len, varint_len) = try_decode_remaining_length(window)?
            .ok_or_else(|| truncated("property length"))?;
        self.pos += varint_len;
        self.take(len as usize, "properties")?;
        Ok(())
    }

    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        self.body.get(self.pos..).unwrap_or_default()
    }
}

fn truncated(what: &str) -> FuzzError {
    FuzzError::MalformedPacket(format!("truncated {what}"))
}
