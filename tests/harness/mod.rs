//! Shared helpers for the integration tests.
//!
//! Connections run over an in-memory [`MockStream`]; [`pump`] moves the
//! bytes one side wrote into the other side's input, which is enough to
//! drive a client and a server against each other on one thread.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Once;

use wsproto::Connection;
use wsproto::protocol::Frame;

/// In-memory duplex stream: reads drain `input`, writes append to `output`.
#[derive(Debug, Default)]
pub struct MockStream {
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stream whose reads return `bytes`.
    pub fn with_input(bytes: &[u8]) -> Self {
        Self {
            input: bytes.iter().copied().collect(),
            output: Vec::new(),
        }
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Move everything `from` has written into the input of `to`.
pub fn pump(from: &mut Connection<MockStream>, to: &mut Connection<MockStream>) {
    let written = std::mem::take(&mut from.framer_mut().get_mut().output);
    to.framer_mut().get_mut().input.extend(written);
}

/// Serialize frames into wire bytes.
pub fn encode(frames: &[Frame]) -> Vec<u8> {
    let mut buf = Vec::new();
    for frame in frames {
        frame.write(&mut buf).unwrap();
    }
    buf
}

/// Parse every frame a connection has written so far.
pub fn written_frames(conn: &mut Connection<MockStream>) -> Vec<Frame> {
    let output = std::mem::take(&mut conn.framer_mut().get_mut().output);
    let mut framer = wsproto::Framer::new(MockStream::with_input(&output));
    let mut frames = Vec::new();
    while !framer.get_ref().input.is_empty() {
        frames.push(framer.read_any_frame().unwrap());
    }
    frames
}

static LOGGING: Once = Once::new();

/// Route library logs to stderr once per test binary.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = simple_logger::init_with_level(log::Level::Trace);
    });
}
