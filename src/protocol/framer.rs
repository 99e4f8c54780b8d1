//! Reading and writing whole frames over a byte stream.

use std::io::{self, Read, Write};

use crate::error::{Error, Result};
use crate::protocol::frame::{Frame, MAXIMUM_ALLOWED_FRAME_SIZE};
use crate::protocol::OpCode;

/// The handler a connection dispatches a received frame to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Extends a fragmented message.
    Continuation,
    /// Starts a text message.
    Text,
    /// Starts a binary message.
    Binary,
    /// Closes the connection.
    Close,
    /// Requests a pong.
    Ping,
    /// Answers a ping.
    Pong,
    /// No dedicated handler.
    Generic,
}

/// Maps opcodes to frame kinds.
///
/// The default table knows every opcode defined by RFC 6455. Removing an
/// opcode makes the connection treat frames with it as unhandled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTable {
    kinds: [FrameKind; 16],
}

impl FrameTable {
    /// A table with no dedicated handlers.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            kinds: [FrameKind::Generic; 16],
        }
    }

    /// Register `kind` for `opcode`.
    #[must_use]
    pub fn with(mut self, opcode: OpCode, kind: FrameKind) -> Self {
        self.kinds[opcode.as_u8() as usize] = kind;
        self
    }

    /// Drop the dedicated handler for `opcode`.
    #[must_use]
    pub fn without(self, opcode: OpCode) -> Self {
        self.with(opcode, FrameKind::Generic)
    }

    /// Kind registered for `opcode`.
    #[inline]
    #[must_use]
    pub fn kind(&self, opcode: OpCode) -> FrameKind {
        self.kinds[opcode.as_u8() as usize]
    }
}

impl Default for FrameTable {
    fn default() -> Self {
        Self::empty()
            .with(OpCode::Continuation, FrameKind::Continuation)
            .with(OpCode::Text, FrameKind::Text)
            .with(OpCode::Binary, FrameKind::Binary)
            .with(OpCode::Close, FrameKind::Close)
            .with(OpCode::Ping, FrameKind::Ping)
            .with(OpCode::Pong, FrameKind::Pong)
    }
}

/// Frame reader and writer over a blocking byte stream.
#[derive(Debug)]
pub struct Framer<S> {
    stream: S,
    frames: FrameTable,
    require_masking: bool,
}

impl<S> Framer<S> {
    /// Wrap a stream with the default frame table.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            frames: FrameTable::default(),
            require_masking: false,
        }
    }

    /// Use a custom frame table.
    #[must_use]
    pub fn with_frames(mut self, frames: FrameTable) -> Self {
        self.frames = frames;
        self
    }

    /// Reject incoming frames that are not masked.
    #[must_use]
    pub fn with_require_masking(mut self, require: bool) -> Self {
        self.require_masking = require;
        self
    }

    /// The frame table in use.
    pub fn frames(&self) -> &FrameTable {
        &self.frames
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Take the underlying stream without flushing.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write> Framer<S> {
    /// Read the next frame, rejecting payloads longer than `max_frame_size`.
    ///
    /// # Errors
    ///
    /// `Error::Eof` with "could not read frame header" if the stream is
    /// exhausted before the first byte, otherwise whatever [`Frame::read`]
    /// reports.
    pub fn read_frame(&mut self, max_frame_size: u64) -> Result<Frame> {
        let mut header = [0u8; 1];
        self.stream.read_exact(&mut header).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::Eof("could not read frame header".into()),
            _ => Error::from(err),
        })?;

        let (finished, flags, opcode) = Frame::parse_header(header[0])?;
        let frame = Frame::read(finished, flags, opcode, &mut self.stream, max_frame_size)?;

        if self.require_masking && frame.mask.is_none() {
            return Err(Error::protocol(
                "received unmasked frame but masking is required",
            ));
        }

        log::trace!(
            "read {} frame: finished={} flags={:#05b} length={}",
            frame.opcode,
            frame.finished,
            frame.flags,
            frame.length
        );

        Ok(frame)
    }

    /// Read a frame without a size limit beyond the wire format's own.
    pub fn read_any_frame(&mut self) -> Result<Frame> {
        self.read_frame(MAXIMUM_ALLOWED_FRAME_SIZE)
    }

    /// Write a frame. Buffered streams are not flushed.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        frame.write(&mut self.stream)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }

    /// Flush and give the stream back. Dropping it closes it.
    pub fn close(mut self) -> Result<S> {
        self.stream.flush()?;
        Ok(self.stream)
    }
}
