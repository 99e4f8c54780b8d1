use bytes::Bytes;
use flate2::{Decompress, FlushDecompress, Status};

use super::deflate::TRAILER;
use super::{CompressionOptions, check_window_bits};
use crate::connection::Reader;
use crate::error::{Error, INVALID_PAYLOAD, Result};
use crate::protocol::{MAXIMUM_ALLOWED_FRAME_SIZE, OpCode, RSV1};

/// Decompressing reader stage. Only messages with RSV1 set are inflated.
pub struct Inflate {
    window_bits: u8,
    context_takeover: bool,
    max_size: u64,
    decompress: Option<Decompress>,
}

impl Inflate {
    /// Build an inflate stage.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if `window_bits` is outside 9..=15.
    pub fn new(window_bits: u8, context_takeover: bool) -> Result<Self> {
        Ok(Self {
            window_bits: check_window_bits(window_bits)?,
            context_takeover,
            max_size: MAXIMUM_ALLOWED_FRAME_SIZE,
            decompress: None,
        })
    }

    /// Cap the size of one inflated message.
    #[must_use]
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// The client's decompressor reads what the server compressed.
    pub fn client(options: &CompressionOptions) -> Result<Self> {
        Self::new(
            options.server_max_window_bits.resolve(),
            !options.server_no_context_takeover,
        )
    }

    /// The server's decompressor reads what the client compressed.
    pub fn server(options: &CompressionOptions) -> Result<Self> {
        Self::new(
            options.client_max_window_bits.resolve(),
            !options.client_no_context_takeover,
        )
    }

    /// Base-2 logarithm of the decompressor's window.
    pub fn window_bits(&self) -> u8 {
        self.window_bits
    }

    /// Whether the decompressor is kept between messages.
    pub fn context_takeover(&self) -> bool {
        self.context_takeover
    }

    /// Decompress one message whose sync-flush trailer was stripped.
    ///
    /// # Errors
    ///
    /// A protocol error with close code 1007 if the data is not a valid
    /// deflate stream, and `Error::FrameSize` if the output grows past the
    /// maximum size.
    pub fn inflate(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut decompress = self
            .decompress
            .take()
            .unwrap_or_else(|| Decompress::new_with_window_bits(false, self.window_bits));

        let mut buffer = Vec::with_capacity(payload.len() + TRAILER.len());
        buffer.extend_from_slice(payload);
        buffer.extend_from_slice(&TRAILER);

        let mut input = buffer.as_slice();
        let mut output = Vec::with_capacity(payload.len() * 2 + 64);

        loop {
            if output.len() == output.capacity() {
                output.reserve(output.capacity().max(1024));
            }

            let before_in = decompress.total_in();
            let before_out = decompress.total_out();
            let status = decompress
                .decompress_vec(input, &mut output, FlushDecompress::Sync)
                .map_err(|err| {
                    Error::protocol_with_code(
                        format!("invalid compressed payload: {err}"),
                        INVALID_PAYLOAD,
                    )
                })?;
            let consumed = (decompress.total_in() - before_in) as usize;
            let produced = decompress.total_out() - before_out;
            input = &input[consumed..];

            if output.len() as u64 > self.max_size {
                return Err(Error::frame_size(format!(
                    "inflated message exceeds maximum {}",
                    self.max_size
                )));
            }

            if status == Status::StreamEnd {
                // A final block ends the stream; later messages start a new one.
                decompress.reset(false);
                break;
            }
            if input.is_empty() && output.len() < output.capacity() {
                break;
            }
            if consumed == 0 && produced == 0 && output.len() < output.capacity() {
                break;
            }
        }

        if self.context_takeover {
            self.decompress = Some(decompress);
        }

        Ok(output)
    }
}

impl Reader for Inflate {
    fn unpack(&mut self, opcode: OpCode, payload: Bytes, flags: &mut u8) -> Result<Bytes> {
        if *flags & RSV1 == 0 {
            return Ok(payload);
        }

        let inflated = self.inflate(&payload)?;
        log::trace!(
            "inflated {} {} bytes into {}",
            opcode,
            payload.len(),
            inflated.len()
        );

        *flags &= !RSV1;
        Ok(Bytes::from(inflated))
    }
}

impl std::fmt::Debug for Inflate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inflate")
            .field("window_bits", &self.window_bits)
            .field("context_takeover", &self.context_takeover)
            .field("max_size", &self.max_size)
            .finish()
    }
}
