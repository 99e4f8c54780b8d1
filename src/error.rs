//! Error types for the WebSocket protocol implementation.
//!
//! Protocol violations carry the close code that is sent to the peer when the
//! connection escalates the failure. Stream truncation and local argument
//! validation are kept apart from protocol violations.

use thiserror::Error;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Close code used when an error does not carry one of its own.
pub const PROTOCOL_ERROR: u16 = 1002;

/// Close code for a message whose payload is inconsistent with its type.
pub const INVALID_PAYLOAD: u16 = 1007;

/// Close code for a frame that exceeds the configured maximum size.
pub const MESSAGE_TOO_BIG: u16 = 1009;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The peer violated the protocol.
    #[error("{message}")]
    Protocol {
        /// Human readable description, also used as the close reason.
        message: String,
        /// Close code sent to the peer.
        code: u16,
    },

    /// The peer closed the connection with a non-normal close code.
    #[error("connection closed ({code}): {message}")]
    Closed {
        /// Close reason sent by the peer.
        message: String,
        /// Close code sent by the peer.
        code: u16,
    },

    /// A frame exceeded the configured maximum size.
    #[error("{message}")]
    FrameSize {
        /// Human readable description.
        message: String,
        /// Close code sent to the peer.
        code: u16,
    },

    /// The stream ended before a complete field could be read.
    #[error("{0}")]
    Eof(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// A locally supplied argument or option was invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A message coder failed to parse or generate a payload.
    #[error("coder error: {0}")]
    Coder(String),
}

impl Error {
    /// A protocol violation with the default protocol-error close code.
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
            code: PROTOCOL_ERROR,
        }
    }

    /// A protocol violation with an explicit close code.
    pub fn protocol_with_code(message: impl Into<String>, code: u16) -> Self {
        Error::Protocol {
            message: message.into(),
            code,
        }
    }

    /// A frame that exceeds the configured maximum.
    pub fn frame_size(message: impl Into<String>) -> Self {
        Error::FrameSize {
            message: message.into(),
            code: MESSAGE_TOO_BIG,
        }
    }

    /// Returns `true` for protocol violations and their specialisations.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::Protocol { .. } | Error::Closed { .. } | Error::FrameSize { .. }
        )
    }

    /// The close code a best-effort Close frame carries for this error.
    pub fn close_code(&self) -> u16 {
        match self {
            Error::Protocol { code, .. }
            | Error::Closed { code, .. }
            | Error::FrameSize { code, .. } => *code,
            _ => PROTOCOL_ERROR,
        }
    }

    /// The message a best-effort Close frame carries for this error.
    pub fn close_reason(&self) -> String {
        match self {
            Error::Protocol { message, .. }
            | Error::Closed { message, .. }
            | Error::FrameSize { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::Eof(err.to_string()),
            _ => Error::Io(err.to_string()),
        }
    }
}
