//! WebSocket frame reading and writing (RFC 6455 section 5.2).
//!
//! A [`Frame`] keeps its payload exactly as it appears on the wire, masked
//! when a key is present. [`Frame::pack`] and [`Frame::unpack`] convert
//! between application bytes and that representation.

use std::io::{self, Read, Write};

use bytes::Bytes;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask;

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest payload length the 64-bit length field may carry.
pub const MAXIMUM_ALLOWED_FRAME_SIZE: u64 = 1 << 63;

/// First reserved bit, claimed by permessage-deflate.
pub const RSV1: u8 = 0b100;
/// Second reserved bit.
pub const RSV2: u8 = 0b010;
/// Third reserved bit.
pub const RSV3: u8 = 0b001;
/// All reserved bits.
pub const RESERVED: u8 = RSV1 | RSV2 | RSV3;

/// A single WebSocket frame.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                 Masking key (if MASK is set)                  |
/// +---------------------------------------------------------------+
/// |                         Payload data                          |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub finished: bool,
    /// The three RSV bits, RSV1 being the most significant.
    pub flags: u8,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Masking key, present on client-to-server frames.
    pub mask: Option<[u8; 4]>,
    /// Declared payload length.
    pub length: u64,
    /// Payload bytes as they appear on the wire.
    pub payload: Bytes,
}

impl Frame {
    /// Create an empty frame.
    #[must_use]
    pub fn new(finished: bool, opcode: OpCode, mask: Option<[u8; 4]>) -> Self {
        Self {
            finished,
            flags: 0,
            opcode,
            mask,
            length: 0,
            payload: Bytes::new(),
        }
    }

    /// Create a frame and pack `data` into it.
    pub fn packed(
        finished: bool,
        opcode: OpCode,
        mask: Option<[u8; 4]>,
        data: &[u8],
    ) -> Result<Self> {
        let mut frame = Self::new(finished, opcode, mask);
        frame.pack(data)?;
        Ok(frame)
    }

    /// A final text frame.
    pub fn text(data: &[u8], mask: Option<[u8; 4]>) -> Result<Self> {
        Self::packed(true, OpCode::Text, mask, data)
    }

    /// A final binary frame.
    pub fn binary(data: &[u8], mask: Option<[u8; 4]>) -> Result<Self> {
        Self::packed(true, OpCode::Binary, mask, data)
    }

    /// A continuation frame.
    pub fn continuation(finished: bool, data: &[u8], mask: Option<[u8; 4]>) -> Result<Self> {
        Self::packed(finished, OpCode::Continuation, mask, data)
    }

    /// A ping frame.
    pub fn ping(data: &[u8], mask: Option<[u8; 4]>) -> Result<Self> {
        Self::packed(true, OpCode::Ping, mask, data)
    }

    /// A pong frame.
    pub fn pong(data: &[u8], mask: Option<[u8; 4]>) -> Result<Self> {
        Self::packed(true, OpCode::Pong, mask, data)
    }

    /// Whether this is a control frame.
    #[inline]
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.opcode.is_control()
    }

    /// Whether this frame starts a data message.
    #[inline]
    #[must_use]
    pub fn is_data(&self) -> bool {
        self.opcode.is_data()
    }

    /// Whether RSV1 is set.
    #[inline]
    #[must_use]
    pub fn rsv1(&self) -> bool {
        self.flags & RSV1 != 0
    }

    /// Split the first header byte into FIN, RSV bits and opcode.
    pub fn parse_header(byte: u8) -> Result<(bool, u8, OpCode)> {
        let finished = byte & 0b1000_0000 != 0;
        let flags = (byte & 0b0111_0000) >> 4;
        let opcode = OpCode::from_u8(byte & 0b0000_1111)?;

        Ok((finished, flags, opcode))
    }

    /// Read the rest of a frame whose first byte has already been parsed.
    ///
    /// # Errors
    ///
    /// - `Error::Protocol` for control frames that are fragmented or too long
    /// - `Error::FrameSize` if the length exceeds `max_frame_size`
    /// - `Error::Eof` if the stream ends before the frame is complete
    pub fn read<R: Read>(
        finished: bool,
        flags: u8,
        opcode: OpCode,
        stream: &mut R,
        max_frame_size: u64,
    ) -> Result<Self> {
        let mut second = [0u8; 1];
        read_field(stream, &mut second, "length")?;

        let masked = second[0] & 0b1000_0000 != 0;
        let length = match second[0] & 0b0111_1111 {
            126 => {
                let mut buf = [0u8; 2];
                read_field(stream, &mut buf, "length")?;
                u64::from(u16::from_be_bytes(buf))
            }
            127 => {
                let mut buf = [0u8; 8];
                read_field(stream, &mut buf, "length")?;
                u64::from_be_bytes(buf)
            }
            short => u64::from(short),
        };

        if opcode.is_control() {
            validate_control(finished, length)?;
        }

        if length >= MAXIMUM_ALLOWED_FRAME_SIZE {
            return Err(Error::protocol("frame length bigger than allowed maximum"));
        }

        Limits::new(max_frame_size).check_frame_size(length)?;

        let mask = if masked {
            let mut key = [0u8; 4];
            read_field(stream, &mut key, "mask")?;
            Some(key)
        } else {
            None
        };

        let payload = read_payload(stream, length)?;

        Ok(Self {
            finished,
            flags,
            opcode,
            mask,
            length,
            payload,
        })
    }

    /// Serialize the frame onto a stream.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if `length` disagrees with the payload or a
    /// control frame breaks the control-frame constraints.
    pub fn write<W: Write>(&self, stream: &mut W) -> Result<()> {
        if self.length != self.payload.len() as u64 {
            return Err(Error::protocol("invalid payload length"));
        }

        if self.is_control() {
            validate_control(self.finished, self.length)?;
        }

        let mut header = [0u8; 14];
        header[0] = (u8::from(self.finished) << 7)
            | ((self.flags & RESERVED) << 4)
            | self.opcode.as_u8();

        let mask_bit = if self.mask.is_some() { 0b1000_0000 } else { 0 };
        let mut offset = 2;

        if self.length < 126 {
            header[1] = mask_bit | self.length as u8;
        } else if self.length < 1 << 16 {
            header[1] = mask_bit | 126;
            header[2..4].copy_from_slice(&(self.length as u16).to_be_bytes());
            offset += 2;
        } else {
            header[1] = mask_bit | 127;
            header[2..10].copy_from_slice(&self.length.to_be_bytes());
            offset += 8;
        }

        if let Some(key) = self.mask {
            header[offset..offset + 4].copy_from_slice(&key);
            offset += 4;
        }

        stream.write_all(&header[..offset])?;
        stream.write_all(&self.payload)?;

        log::trace!(
            "wrote {} frame: finished={} flags={:#05b} length={}",
            self.opcode,
            self.finished,
            self.flags,
            self.length
        );

        Ok(())
    }

    /// Store `data` as the payload, masking it when the frame has a key.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the length does not fit in 63 bits.
    pub fn pack(&mut self, data: &[u8]) -> Result<()> {
        let length = data.len() as u64;
        if length >= MAXIMUM_ALLOWED_FRAME_SIZE {
            return Err(Error::protocol("frame length bigger than allowed maximum"));
        }

        self.payload = match self.mask {
            Some(key) => {
                let mut masked = data.to_vec();
                apply_mask(&mut masked, key);
                Bytes::from(masked)
            }
            None => Bytes::copy_from_slice(data),
        };
        self.length = length;

        Ok(())
    }

    /// The application bytes carried by this frame.
    #[must_use]
    pub fn unpack(&self) -> Bytes {
        match self.mask {
            Some(key) => {
                let mut data = self.payload.to_vec();
                apply_mask(&mut data, key);
                Bytes::from(data)
            }
            None => self.payload.clone(),
        }
    }

    /// Reply to a ping: a pong echoing the unmasked payload, masked with `mask`.
    pub fn reply(&self, mask: Option<[u8; 4]>) -> Result<Self> {
        Self::pong(&self.unpack(), mask)
    }

    /// Bytes this frame occupies on the wire.
    #[must_use]
    pub fn wire_size(&self) -> u64 {
        let extended = if self.length < 126 {
            0
        } else if self.length < 1 << 16 {
            2
        } else {
            8
        };
        let mask = if self.mask.is_some() { 4 } else { 0 };
        2 + extended + mask + self.length
    }
}

fn validate_control(finished: bool, length: u64) -> Result<()> {
    if !finished {
        return Err(Error::protocol("control frame must not be fragmented"));
    }
    if length > MAX_CONTROL_FRAME_PAYLOAD as u64 {
        return Err(Error::protocol(format!(
            "control frame payload of {length} bytes exceeds {MAX_CONTROL_FRAME_PAYLOAD}"
        )));
    }
    Ok(())
}

fn read_field<R: Read>(stream: &mut R, buf: &mut [u8], field: &str) -> Result<()> {
    stream.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => Error::Eof(format!("could not read frame {field}")),
        _ => Error::from(err),
    })
}

// The declared length is untrusted, so the buffer grows with the bytes that
// actually arrive instead of being allocated up front.
fn read_payload<R: Read>(stream: &mut R, length: u64) -> Result<Bytes> {
    if length == 0 {
        return Ok(Bytes::new());
    }

    let mut payload = Vec::with_capacity(length.min(64 * 1024) as usize);
    stream.by_ref().take(length).read_to_end(&mut payload)?;

    if (payload.len() as u64) < length {
        return Err(Error::Eof("could not read frame payload".into()));
    }

    Ok(Bytes::from(payload))
}
