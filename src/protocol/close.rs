//! Close frame payloads and status codes (RFC 6455 sections 5.5.1 and 7.4).

use crate::error::{Error, Result};
use crate::protocol::frame::{Frame, MAX_CONTROL_FRAME_PAYLOAD};
use crate::protocol::OpCode;

/// WebSocket close status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CloseCode {
    /// Normal closure (1000).
    #[default]
    Normal,
    /// Going away (1001), e.g. server shutdown or page navigation.
    GoingAway,
    /// Protocol error (1002).
    ProtocolError,
    /// Unsupported data (1003).
    UnsupportedData,
    /// Invalid payload (1007), e.g. non-UTF-8 text.
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Mandatory extension (1010), the client expected an extension.
    MandatoryExtension,
    /// Internal error (1011).
    InternalError,
    /// Any other code.
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Codes that can never appear in a Close frame:
    /// 0-999, 1005, 1006, 1015 and 5000 upwards.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self.as_u16(), 0..=999 | 1005..=1006 | 1015 | 5000..=u16::MAX)
    }

    /// Codes reserved for future use: 1004 and 1016-2999.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self.as_u16(), 1004 | 1016..=2999)
    }

    /// Whether this code may be carried by a Close frame.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !self.is_invalid() && !self.is_reserved()
    }

    /// Fail with a protocol error unless the code may be sent or received.
    pub fn validate(code: u16) -> Result<()> {
        let close_code = CloseCode::from_u16(code);
        if close_code.is_invalid() {
            return Err(Error::protocol(format!("invalid close code {code}")));
        }
        if close_code.is_reserved() {
            return Err(Error::protocol(format!("reserved close code {code}")));
        }
        Ok(())
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        CloseCode::from_u16(code)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

impl Frame {
    /// A close frame carrying `code` and `reason`.
    pub fn close(code: Option<u16>, reason: &str, mask: Option<[u8; 4]>) -> Result<Self> {
        let mut frame = Frame::new(true, OpCode::Close, mask);
        frame.pack_close(code, reason)?;
        Ok(frame)
    }

    /// Pack a close code and reason. Without a code the payload is empty and
    /// the reason is ignored.
    pub fn pack_close(&mut self, code: Option<u16>, reason: &str) -> Result<()> {
        match code {
            Some(code) => {
                CloseCode::validate(code)?;
                let mut data = Vec::with_capacity(2 + reason.len());
                data.extend_from_slice(&code.to_be_bytes());
                data.extend_from_slice(reason.as_bytes());
                self.pack(&data)
            }
            None => self.pack(&[]),
        }
    }

    /// Unpack the close code and reason.
    ///
    /// An empty payload yields `(None, None)`.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for a one-byte payload, an invalid or
    /// reserved code, or a reason that is not valid UTF-8.
    pub fn unpack_close(&self) -> Result<(Option<u16>, Option<String>)> {
        let data = self.unpack();
        match data.len() {
            0 => Ok((None, None)),
            1 => Err(Error::protocol("invalid close frame length")),
            _ => {
                let code = u16::from_be_bytes([data[0], data[1]]);
                CloseCode::validate(code)?;
                let reason = std::str::from_utf8(&data[2..])
                    .map_err(|_| Error::protocol("invalid UTF-8 in close reason"))?;
                Ok((Some(code), Some(reason.to_owned())))
            }
        }
    }
}

/// Shorten `reason` so that a close frame carrying it stays within the
/// control frame limit, cutting at a character boundary.
#[must_use]
pub fn truncate_reason(reason: &str) -> &str {
    let limit = MAX_CONTROL_FRAME_PAYLOAD - 2;
    if reason.len() <= limit {
        return reason;
    }
    let mut end = limit;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}
