use std::io::{Read, Write};

use bytes::{Bytes, BytesMut};

use crate::config::Config;
use crate::connection::pipeline::{Pipeline, WriteOptions};
use crate::connection::state::ConnectionState;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::close::{CloseCode, truncate_reason};
use crate::protocol::{Frame, FrameKind, Framer, MaskGenerator, OpCode};

/// A WebSocket connection over a blocking byte stream.
///
/// Frames are read one at a time and dispatched by kind: data frames are
/// accumulated until a message is complete, pings are answered, and a Close
/// frame ends the connection. Any error while reading is reported to the
/// peer with a Close frame before it is returned.
#[derive(Debug)]
pub struct Connection<S> {
    framer: Framer<S>,
    config: Config,
    state: ConnectionState,
    frames: Vec<Frame>,
    pipeline: Pipeline,
    masks: Option<MaskGenerator>,
    close_sent: bool,
}

impl<S> Connection<S> {
    /// Create a connection over an established framer.
    pub fn new(framer: Framer<S>, config: Config) -> Self {
        let framer = if config.require_masked_frames {
            framer.with_require_masking(true)
        } else {
            framer
        };
        let masks = config.mask_frames.then(MaskGenerator::new);
        let pipeline = Pipeline::new().with_max_message_size(config.limits.max_message_size);

        Self {
            framer,
            config,
            state: ConnectionState::Open,
            frames: Vec::new(),
            pipeline,
            masks,
            close_sent: false,
        }
    }

    /// Client side of a connection: outgoing frames are masked.
    pub fn client(stream: S) -> Self {
        Self::new(Framer::new(stream), Config::client())
    }

    /// Server side of a connection: outgoing frames are not masked.
    pub fn server(stream: S) -> Self {
        Self::new(Framer::new(stream), Config::server())
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the connection is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Configuration in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Frames of the message currently being received.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Borrow the framer.
    pub fn framer(&self) -> &Framer<S> {
        &self.framer
    }

    /// Mutably borrow the framer.
    pub fn framer_mut(&mut self) -> &mut Framer<S> {
        &mut self.framer
    }

    /// Extension stages installed on this connection.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Mutable access for installing extension stages.
    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    /// Claim an RSV bit for an extension.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if the bit is already claimed.
    pub fn reserve(&mut self, bit: u8) -> Result<()> {
        self.pipeline.reserve(bit)
    }

    /// Take the underlying stream.
    pub fn into_inner(self) -> S {
        self.framer.into_inner()
    }

    fn next_mask(&mut self) -> Option<[u8; 4]> {
        self.masks.as_mut().map(MaskGenerator::next_mask)
    }
}

impl<S: Read + Write> Connection<S> {
    /// Read one frame and apply it to the connection.
    ///
    /// # Errors
    ///
    /// Any failure is first reported to the peer with a best-effort Close
    /// frame carrying the error's close code, and the connection is closed.
    pub fn read_frame(&mut self) -> Result<Frame> {
        match self.receive() {
            Ok(frame) => Ok(frame),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn receive(&mut self) -> Result<Frame> {
        let frame = self.framer.read_frame(self.config.limits.max_frame_size)?;

        if frame.flags & !self.pipeline.reserved() != 0 {
            return Err(Error::protocol("received frame with reserved flags set"));
        }
        // RSV1 marks a compressed message and only ever rides on its first frame.
        if frame.rsv1() && !frame.is_data() {
            return Err(Error::protocol(format!(
                "received {} frame with RSV1 set",
                frame.opcode
            )));
        }

        self.apply(&frame)?;
        Ok(frame)
    }

    fn apply(&mut self, frame: &Frame) -> Result<()> {
        match self.framer.frames().kind(frame.opcode) {
            FrameKind::Continuation => self.receive_continuation(frame),
            FrameKind::Text => self.receive_text(frame),
            FrameKind::Binary => self.receive_binary(frame),
            FrameKind::Close => self.receive_close(frame),
            FrameKind::Ping => self.receive_ping(frame),
            FrameKind::Pong => self.receive_pong(frame),
            FrameKind::Generic => self.receive_frame(frame),
        }
    }

    // Tell the peer why the connection is failing. A failure to send is
    // logged and dropped so the original error reaches the caller.
    fn fail(&mut self, err: Error) -> Error {
        log::debug!("connection failed: {err}");

        let code = err.close_code();
        let reason = err.close_reason();
        if let Err(secondary) = self.send_close(Some(code), truncate_reason(&reason)) {
            log::warn!("could not send close frame: {secondary}");
        }
        self.state = ConnectionState::Closed;
        self.frames.clear();

        err
    }

    /// Start a text message.
    ///
    /// # Errors
    ///
    /// A protocol error if another message is still being received.
    pub fn receive_text(&mut self, frame: &Frame) -> Result<()> {
        if !self.frames.is_empty() {
            return Err(Error::protocol("received text but expecting continuation"));
        }
        self.accumulate(frame)
    }

    /// Start a binary message.
    ///
    /// # Errors
    ///
    /// A protocol error if another message is still being received.
    pub fn receive_binary(&mut self, frame: &Frame) -> Result<()> {
        if !self.frames.is_empty() {
            return Err(Error::protocol(
                "received binary but expecting continuation",
            ));
        }
        self.accumulate(frame)
    }

    /// Extend the message being received.
    ///
    /// # Errors
    ///
    /// A protocol error if no message is being received.
    pub fn receive_continuation(&mut self, frame: &Frame) -> Result<()> {
        if self.frames.is_empty() {
            return Err(Error::protocol("received unexpected continuation"));
        }
        self.accumulate(frame)
    }

    fn accumulate(&mut self, frame: &Frame) -> Result<()> {
        let buffered: u64 = self.frames.iter().map(|frame| frame.length).sum();
        self.config
            .limits
            .check_message_size(buffered.saturating_add(frame.length))?;

        self.frames.push(frame.clone());
        Ok(())
    }

    /// Handle a Close frame from the peer.
    ///
    /// A normal close is answered with a Close echoing the code, unless one
    /// was already sent.
    ///
    /// # Errors
    ///
    /// `Error::Closed` if the peer closed with a code other than 1000, or a
    /// protocol error if the close payload is malformed.
    pub fn receive_close(&mut self, frame: &Frame) -> Result<()> {
        self.state = ConnectionState::Closed;

        let (code, reason) = frame.unpack_close()?;
        log::debug!("peer closed connection: code={code:?} reason={reason:?}");

        if let Some(code) = code.filter(|&code| code != CloseCode::Normal.as_u16()) {
            return Err(Error::Closed {
                message: reason.unwrap_or_default(),
                code,
            });
        }

        if let Err(err) = self.send_close(code, "") {
            log::warn!("could not answer close frame: {err}");
        }
        Ok(())
    }

    /// Answer a ping with a pong carrying the same payload.
    ///
    /// # Errors
    ///
    /// A protocol error if the connection is closed.
    pub fn receive_ping(&mut self, frame: &Frame) -> Result<()> {
        if self.state.is_closed() {
            return Err(Error::protocol("cannot receive ping in closed state"));
        }

        let mask = self.next_mask();
        let reply = frame.reply(mask)?;
        self.framer.write_frame(&reply)?;
        self.framer.flush()
    }

    /// Pongs need no handling.
    pub fn receive_pong(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }

    /// Fallback for frames without a dedicated handler.
    ///
    /// # Errors
    ///
    /// Always fails with a protocol error.
    pub fn receive_frame(&mut self, frame: &Frame) -> Result<()> {
        log::debug!("no handler for {} frame", frame.opcode);
        Err(Error::protocol("unhandled frame"))
    }

    /// Write a frame as is.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.framer.write_frame(frame)
    }

    /// Flush buffered frames.
    pub fn flush(&mut self) -> Result<()> {
        self.framer.flush()
    }

    /// Send a text message in a single frame, compressed if an extension
    /// offers compression.
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        self.send_text_with(text, WriteOptions::text())
    }

    /// Send a text message with explicit options.
    pub fn send_text_with(&mut self, text: &str, options: WriteOptions) -> Result<()> {
        self.send_data(OpCode::Text, Bytes::copy_from_slice(text.as_bytes()), options)
    }

    /// Send a binary message in a single frame.
    pub fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.send_binary_with(data, WriteOptions::binary())
    }

    /// Send a binary message with explicit options.
    pub fn send_binary_with(&mut self, data: &[u8], options: WriteOptions) -> Result<()> {
        self.send_data(OpCode::Binary, Bytes::copy_from_slice(data), options)
    }

    fn send_data(&mut self, opcode: OpCode, payload: Bytes, options: WriteOptions) -> Result<()> {
        if self.state.is_closed() {
            return Err(Error::protocol(format!(
                "cannot send {opcode} in closed state"
            )));
        }

        let (payload, flags) = self.pipeline.pack(opcode, payload, &options)?;
        let mask = self.next_mask();
        let mut frame = Frame::packed(true, opcode, mask, &payload)?;
        frame.flags = flags;

        self.framer.write_frame(&frame)
    }

    /// Send a Close frame and mark the connection closed.
    ///
    /// Only the first call writes a frame; later calls return `Ok(())`.
    pub fn send_close(&mut self, code: Option<u16>, reason: &str) -> Result<()> {
        if self.close_sent {
            return Ok(());
        }

        let mask = self.next_mask();
        let frame = Frame::close(code, reason, mask)?;

        self.close_sent = true;
        self.state = ConnectionState::Closed;
        self.framer.write_frame(&frame)?;
        self.framer.flush()
    }

    /// Send a ping.
    ///
    /// # Errors
    ///
    /// A protocol error if the connection is closed.
    pub fn send_ping(&mut self, data: &[u8]) -> Result<()> {
        if self.state.is_closed() {
            return Err(Error::protocol("cannot send ping in closed state"));
        }

        let mask = self.next_mask();
        let frame = Frame::ping(data, mask)?;
        self.framer.write_frame(&frame)?;
        self.framer.flush()
    }

    /// Read frames until a whole message has arrived and return its frames:
    /// a text or binary frame followed by any continuations.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection or the
    /// stream ends between messages.
    pub fn next_message(&mut self) -> Result<Option<Vec<Frame>>> {
        self.framer.flush()?;

        loop {
            if self.state.is_closed() {
                return Ok(None);
            }

            let in_progress = !self.frames.is_empty();
            match self.read_frame() {
                Ok(_) => {}
                Err(Error::Eof(message)) => {
                    if !in_progress {
                        log::debug!("stream ended: {message}");
                        return Ok(None);
                    }
                    return Err(Error::Eof(message));
                }
                Err(err) => return Err(err),
            }

            if self.frames.last().is_some_and(|frame| frame.finished) {
                return Ok(Some(std::mem::take(&mut self.frames)));
            }
        }
    }

    /// Read the next message, running it through the installed reader
    /// stages and validating text.
    ///
    /// # Errors
    ///
    /// Decoding failures are reported to the peer like frame errors.
    pub fn read_message(&mut self) -> Result<Option<Message>> {
        let Some(frames) = self.next_message()? else {
            return Ok(None);
        };

        match self.unpack_frames(&frames) {
            Ok(message) => Ok(Some(message)),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn unpack_frames(&mut self, frames: &[Frame]) -> Result<Message> {
        let Some(first) = frames.first() else {
            return Err(Error::protocol("empty message"));
        };

        let mut buffer = BytesMut::new();
        for frame in frames {
            buffer.extend_from_slice(&frame.unpack());
        }

        let mut flags = first.flags;
        let payload = self
            .pipeline
            .unpack(first.opcode, buffer.freeze(), &mut flags)?;
        self.config
            .limits
            .check_message_size(payload.len() as u64)?;

        if flags != 0 {
            return Err(Error::protocol("message has unhandled reserved flags"));
        }

        Message::decode(first.opcode, payload)
    }

    /// Send a message with the default options for its kind.
    pub fn write_message(&mut self, message: &Message) -> Result<()> {
        match message {
            Message::Text(text) => self.send_text(text),
            Message::Binary(data) => self.send_binary(data),
        }
    }

    /// Send a normal close and hand back the stream.
    pub fn close(mut self) -> Result<S> {
        self.send_close(Some(CloseCode::Normal.as_u16()), "")?;
        self.framer.close()
    }
}
