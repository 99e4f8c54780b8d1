//! Assembled WebSocket messages.

use std::io::{Read, Write};

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::coder::Coder;
use crate::connection::Connection;
use crate::error::{Error, INVALID_PAYLOAD, Result};
use crate::protocol::OpCode;

/// One logical application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A text message, always valid UTF-8.
    Text(String),
    /// A binary message.
    Binary(Bytes),
}

impl Message {
    /// Create a text message.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Message::Text(text.into())
    }

    /// Create a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Message::Binary(data.into())
    }

    /// Build a message from a reassembled payload and the opcode of its
    /// leading frame.
    ///
    /// # Errors
    ///
    /// A protocol error with close code 1007 if a text payload is not UTF-8,
    /// or a protocol error if `opcode` does not start a message.
    pub fn decode(opcode: OpCode, payload: Bytes) -> Result<Self> {
        match opcode {
            OpCode::Text => match String::from_utf8(payload.to_vec()) {
                Ok(text) => Ok(Message::Text(text)),
                Err(_) => Err(Error::protocol_with_code(
                    "invalid UTF-8 in text frame",
                    INVALID_PAYLOAD,
                )),
            },
            OpCode::Binary => Ok(Message::Binary(payload)),
            other => Err(Error::protocol(format!(
                "{other} frame cannot start a message"
            ))),
        }
    }

    /// Opcode of the leading frame.
    #[must_use]
    pub const fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
        }
    }

    /// Check if this is a text message.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Message::Text(_))
    }

    /// Check if this is a binary message.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Message::Binary(_))
    }

    /// The text, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(text) => Some(text),
            Message::Binary(_) => None,
        }
    }

    /// The payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(data) => data,
        }
    }

    /// Take the text, if this is a text message.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Message::Text(text) => Some(text),
            Message::Binary(_) => None,
        }
    }

    /// Take the payload bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Message::Text(text) => Bytes::from(text),
            Message::Binary(data) => data,
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Decode the payload with `coder`.
    pub fn parse<T: DeserializeOwned, C: Coder>(&self, coder: &C) -> Result<T> {
        coder.parse(self.as_bytes())
    }

    /// Encode `value` with `coder` into a text message.
    pub fn generate<T: Serialize + ?Sized, C: Coder>(value: &T, coder: &C) -> Result<Self> {
        coder.generate(value).map(Message::Text)
    }

    /// Send this message on `connection`.
    pub fn send<S: Read + Write>(&self, connection: &mut Connection<S>) -> Result<()> {
        connection.write_message(self)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Message::Binary(Bytes::from(data))
    }
}
