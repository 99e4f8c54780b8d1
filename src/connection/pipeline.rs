//! Message transforms installed by negotiated extensions.
//!
//! Writers run from the most recently installed to the first, readers in
//! installation order, so the stage that wraps last on the way out unwraps
//! last on the way in.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::{MAXIMUM_ALLOWED_FRAME_SIZE, OpCode, RESERVED};

/// Per-message options for outgoing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Ask compression stages to compress this message.
    pub compress: bool,
}

impl WriteOptions {
    /// Defaults for text messages: compressed.
    #[must_use]
    pub const fn text() -> Self {
        Self { compress: true }
    }

    /// Defaults for binary messages: sent as is.
    #[must_use]
    pub const fn binary() -> Self {
        Self { compress: false }
    }

    /// Set whether the message should be compressed.
    #[must_use]
    pub const fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// A stage applied to outgoing text and binary payloads.
pub trait Writer: Send {
    /// Transform `payload` before framing. `flags` are the RSV bits of the
    /// leading frame and may be set by the stage.
    fn pack(
        &mut self,
        opcode: OpCode,
        payload: Bytes,
        flags: &mut u8,
        options: &WriteOptions,
    ) -> Result<Bytes>;
}

/// A stage applied to reassembled incoming payloads.
pub trait Reader: Send {
    /// Transform a reassembled `payload`. `flags` are the RSV bits of the
    /// leading frame; a stage clears the bits it consumed.
    fn unpack(&mut self, opcode: OpCode, payload: Bytes, flags: &mut u8) -> Result<Bytes>;
}

/// The reader and writer stages of one connection, and the RSV bits they own.
pub struct Pipeline {
    reserved: u8,
    max_message_size: u64,
    writers: Vec<Box<dyn Writer>>,
    readers: Vec<Box<dyn Reader>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            reserved: 0,
            max_message_size: MAXIMUM_ALLOWED_FRAME_SIZE,
            writers: Vec::new(),
            readers: Vec::new(),
        }
    }
}

impl Pipeline {
    /// An empty pipeline with no RSV bits claimed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the size readers may expand a message to.
    #[must_use]
    pub fn with_max_message_size(mut self, size: u64) -> Self {
        self.max_message_size = size;
        self
    }

    /// Largest message a reader stage may produce.
    #[must_use]
    pub fn max_message_size(&self) -> u64 {
        self.max_message_size
    }

    /// Claim an RSV bit for an extension.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if `bit` is not a single RSV bit or is
    /// already claimed.
    pub fn reserve(&mut self, bit: u8) -> Result<()> {
        if bit == 0 || bit & !RESERVED != 0 || !bit.is_power_of_two() {
            return Err(Error::InvalidArgument(format!(
                "{bit:#05b} is not a reserved bit"
            )));
        }
        if self.reserved & bit != 0 {
            return Err(Error::InvalidArgument(format!(
                "reserved bit {bit:#05b} is already claimed"
            )));
        }

        self.reserved |= bit;
        Ok(())
    }

    /// RSV bits claimed so far.
    #[must_use]
    pub fn reserved(&self) -> u8 {
        self.reserved
    }

    /// Install an outgoing stage. It runs before every stage installed earlier.
    pub fn push_writer(&mut self, writer: Box<dyn Writer>) {
        self.writers.push(writer);
    }

    /// Install an incoming stage. It runs after every stage installed earlier.
    pub fn push_reader(&mut self, reader: Box<dyn Reader>) {
        self.readers.push(reader);
    }

    /// Whether no stages are installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writers.is_empty() && self.readers.is_empty()
    }

    /// Run an outgoing payload through the writers, returning it with the
    /// RSV bits for the leading frame.
    pub fn pack(
        &mut self,
        opcode: OpCode,
        mut payload: Bytes,
        options: &WriteOptions,
    ) -> Result<(Bytes, u8)> {
        let mut flags = 0;
        for writer in self.writers.iter_mut().rev() {
            payload = writer.pack(opcode, payload, &mut flags, options)?;
        }
        Ok((payload, flags))
    }

    /// Run a reassembled payload through the readers.
    pub fn unpack(&mut self, opcode: OpCode, mut payload: Bytes, flags: &mut u8) -> Result<Bytes> {
        for reader in &mut self.readers {
            payload = reader.unpack(opcode, payload, flags)?;
        }
        Ok(payload)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("reserved", &format_args!("{:#05b}", self.reserved))
            .field("max_message_size", &self.max_message_size)
            .field("writers", &self.writers.len())
            .field("readers", &self.readers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RSV1, RSV2};

    struct Tag(u8);

    impl Writer for Tag {
        fn pack(
            &mut self,
            _opcode: OpCode,
            payload: Bytes,
            _flags: &mut u8,
            _options: &WriteOptions,
        ) -> Result<Bytes> {
            let mut out = payload.to_vec();
            out.push(self.0);
            Ok(Bytes::from(out))
        }
    }

    impl Reader for Tag {
        fn unpack(&mut self, _opcode: OpCode, payload: Bytes, _flags: &mut u8) -> Result<Bytes> {
            let mut out = payload.to_vec();
            out.push(self.0);
            Ok(Bytes::from(out))
        }
    }

    #[test]
    fn test_reserve_once() {
        let mut pipeline = Pipeline::new();
        pipeline.reserve(RSV1).unwrap();
        pipeline.reserve(RSV2).unwrap();
        assert_eq!(pipeline.reserved(), RSV1 | RSV2);

        let err = pipeline.reserve(RSV1).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_reserve_rejects_non_rsv_bits() {
        let mut pipeline = Pipeline::new();
        assert!(pipeline.reserve(0).is_err());
        assert!(pipeline.reserve(0b1000).is_err());
        assert!(pipeline.reserve(RSV1 | RSV2).is_err());
    }

    #[test]
    fn test_writer_order_is_reversed() {
        let mut pipeline = Pipeline::new();
        pipeline.push_writer(Box::new(Tag(1)));
        pipeline.push_writer(Box::new(Tag(2)));

        let (payload, flags) = pipeline
            .pack(OpCode::Text, Bytes::new(), &WriteOptions::text())
            .unwrap();
        assert_eq!(&payload[..], &[2, 1]);
        assert_eq!(flags, 0);
    }

    #[test]
    fn test_reader_order_is_installation_order() {
        let mut pipeline = Pipeline::new();
        pipeline.push_reader(Box::new(Tag(1)));
        pipeline.push_reader(Box::new(Tag(2)));

        let mut flags = 0;
        let payload = pipeline
            .unpack(OpCode::Binary, Bytes::new(), &mut flags)
            .unwrap();
        assert_eq!(&payload[..], &[1, 2]);
    }

    #[test]
    fn test_max_message_size() {
        assert_eq!(Pipeline::new().max_message_size(), MAXIMUM_ALLOWED_FRAME_SIZE);
        assert_eq!(Pipeline::new().with_max_message_size(64).max_message_size(), 64);
    }

    #[test]
    fn test_write_options() {
        assert!(WriteOptions::text().compress);
        assert!(!WriteOptions::binary().compress);
        assert!(WriteOptions::binary().with_compress(true).compress);
    }
}
