use bytes::Bytes;
use flate2::{Compress, Compression, FlushCompress, Status};

use super::{CompressionOptions, check_window_bits};
use crate::connection::{WriteOptions, Writer};
use crate::error::{Error, Result};
use crate::protocol::{OpCode, RSV1};

/// Marker a sync flush ends with; stripped from every message.
pub(super) const TRAILER: [u8; 4] = [0x00, 0x00, 0xff, 0xff];

/// Compressing writer stage.
///
/// With context takeover the compressor and its dictionary live for the whole
/// connection; without it a fresh compressor is used for every message.
pub struct Deflate {
    window_bits: u8,
    context_takeover: bool,
    level: Compression,
    compress: Option<Compress>,
}

impl Deflate {
    /// Build a deflate stage.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if `window_bits` is outside 9..=15.
    pub fn new(window_bits: u8, context_takeover: bool, level: u32) -> Result<Self> {
        Ok(Self {
            window_bits: check_window_bits(window_bits)?,
            context_takeover,
            level: Compression::new(level),
            compress: None,
        })
    }

    /// The client's compressor: `client_*` parameters.
    pub fn client(options: &CompressionOptions) -> Result<Self> {
        Self::new(
            options.client_max_window_bits.resolve(),
            !options.client_no_context_takeover,
            options.compression_level,
        )
    }

    /// The server's compressor: `server_*` parameters.
    pub fn server(options: &CompressionOptions) -> Result<Self> {
        Self::new(
            options.server_max_window_bits.resolve(),
            !options.server_no_context_takeover,
            options.compression_level,
        )
    }

    /// Base-2 logarithm of the compressor's window.
    pub fn window_bits(&self) -> u8 {
        self.window_bits
    }

    /// Whether the compressor is kept between messages.
    pub fn context_takeover(&self) -> bool {
        self.context_takeover
    }

    /// Compress one message, without the sync-flush trailer.
    pub fn deflate(&mut self, mut input: &[u8]) -> Result<Vec<u8>> {
        let mut compress = self
            .compress
            .take()
            .unwrap_or_else(|| Compress::new_with_window_bits(self.level, false, self.window_bits));

        let mut output = Vec::with_capacity(input.len() / 2 + 64);

        loop {
            if output.len() == output.capacity() {
                output.reserve(1024);
            }

            let before_in = compress.total_in();
            let status = compress
                .compress_vec(input, &mut output, FlushCompress::Sync)
                .map_err(|err| Error::Io(format!("compression failed: {err}")))?;
            let consumed = (compress.total_in() - before_in) as usize;
            input = &input[consumed..];

            // The flush is complete once input is drained and output space remains.
            if input.is_empty() && output.len() < output.capacity() {
                break;
            }
            if status == Status::BufError && consumed == 0 {
                break;
            }
        }

        if output.ends_with(&TRAILER) {
            output.truncate(output.len() - TRAILER.len());
        }

        // A flush with nothing pending writes no block at all; an empty
        // message is then sent as a single empty block byte.
        if output.is_empty() {
            output.push(0x00);
        }

        if self.context_takeover {
            self.compress = Some(compress);
        }

        Ok(output)
    }
}

impl Writer for Deflate {
    fn pack(
        &mut self,
        opcode: OpCode,
        payload: Bytes,
        flags: &mut u8,
        options: &WriteOptions,
    ) -> Result<Bytes> {
        if !options.compress || !opcode.is_data() {
            return Ok(payload);
        }

        let compressed = self.deflate(&payload)?;
        log::trace!(
            "deflated {} {} bytes into {}",
            opcode,
            payload.len(),
            compressed.len()
        );

        *flags |= RSV1;
        Ok(Bytes::from(compressed))
    }
}

impl std::fmt::Debug for Deflate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deflate")
            .field("window_bits", &self.window_bits)
            .field("context_takeover", &self.context_takeover)
            .field("level", &self.level.level())
            .finish()
    }
}
