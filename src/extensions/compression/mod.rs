//! Permessage-deflate compression extension (RFC 7692).
//!
//! Negotiation is handled by [`PerMessageDeflate`]; the negotiated parameters
//! then build a [`Deflate`] writer and an [`Inflate`] reader, which claim RSV1
//! on the connection's pipeline.

mod deflate;
mod inflate;

use flate2::Compression;

use crate::connection::Pipeline;
use crate::error::{Error, Result};
use crate::extensions::{Extension, ExtensionHeader, ExtensionParam};
use crate::protocol::RSV1;

pub use deflate::Deflate;
pub use inflate::Inflate;

/// Registered extension name.
pub const NAME: &str = "permessage-deflate";

/// zlib cannot use raw windows smaller than this.
pub const MINIMUM_WINDOW_BITS: u8 = 9;

/// Largest window, also the default when none is negotiated.
pub const MAXIMUM_WINDOW_BITS: u8 = 15;

/// Range a peer may offer for `*_max_window_bits`.
const OFFERABLE_WINDOW_BITS: std::ops::RangeInclusive<u8> = 8..=MAXIMUM_WINDOW_BITS;

/// Window bits for one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindowBits {
    /// Not set to a specific value. A client offers `client_max_window_bits`
    /// without a value; a server window is left unspecified. Resolves to 15.
    #[default]
    Default,
    /// An explicit base-2 logarithm of the window size.
    Bits(u8),
}

impl WindowBits {
    /// Effective window bits.
    #[must_use]
    pub const fn resolve(self) -> u8 {
        match self {
            WindowBits::Default => MAXIMUM_WINDOW_BITS,
            WindowBits::Bits(bits) => bits,
        }
    }
}

/// Options for both directions of a permessage-deflate session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionOptions {
    /// Window bits of the client's compressor.
    pub client_max_window_bits: WindowBits,
    /// Window bits of the server's compressor.
    pub server_max_window_bits: WindowBits,
    /// Reset the client's compressor after every message.
    pub client_no_context_takeover: bool,
    /// Reset the server's compressor after every message.
    pub server_no_context_takeover: bool,
    /// Local compression level, 0-9. Never negotiated.
    pub compression_level: u32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            client_max_window_bits: WindowBits::Default,
            server_max_window_bits: WindowBits::Default,
            client_no_context_takeover: false,
            server_no_context_takeover: false,
            compression_level: Compression::default().level(),
        }
    }
}

impl CompressionOptions {
    /// Default options: full windows, context takeover in both directions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window bits of the client's compressor.
    pub fn client_max_window_bits(mut self, bits: WindowBits) -> Self {
        self.client_max_window_bits = bits;
        self
    }

    /// Set the window bits of the server's compressor.
    pub fn server_max_window_bits(mut self, bits: WindowBits) -> Self {
        self.server_max_window_bits = bits;
        self
    }

    /// Ask the client to reset its compressor after every message.
    pub fn client_no_context_takeover(mut self, value: bool) -> Self {
        self.client_no_context_takeover = value;
        self
    }

    /// Ask the server to reset its compressor after every message.
    pub fn server_no_context_takeover(mut self, value: bool) -> Self {
        self.server_no_context_takeover = value;
        self
    }

    /// Set the compression level.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if `level` is above 9.
    pub fn compression_level(mut self, level: u32) -> Result<Self> {
        if level > 9 {
            return Err(Error::InvalidArgument(format!(
                "compression level must be 0-9, got {level}"
            )));
        }
        self.compression_level = level;
        Ok(self)
    }

    fn set(&mut self, param: &ExtensionParam, clamp: bool) -> Result<()> {
        match param.name.as_str() {
            "server_no_context_takeover" => self.server_no_context_takeover = true,
            "client_no_context_takeover" => self.client_no_context_takeover = true,
            "server_max_window_bits" => {
                self.server_max_window_bits = WindowBits::Bits(parse_window_bits(param, clamp)?);
            }
            "client_max_window_bits" => {
                self.client_max_window_bits = WindowBits::Bits(parse_window_bits(param, clamp)?);
            }
            other => {
                return Err(Error::InvalidArgument(format!("unknown option: {other}")));
            }
        }
        Ok(())
    }
}

/// A window-bits value from a header; absent means 15. Values outside
/// 8..=15 are rejected.
fn parse_window_bits(param: &ExtensionParam, clamp: bool) -> Result<u8> {
    let bits = match param.value.as_deref() {
        None => MAXIMUM_WINDOW_BITS,
        Some(value) => value
            .trim_matches('"')
            .parse::<u8>()
            .ok()
            .filter(|bits| OFFERABLE_WINDOW_BITS.contains(bits))
            .ok_or_else(|| Error::InvalidArgument(format!("invalid {}: {value:?}", param.name)))?,
    };

    if clamp {
        Ok(bits.max(MINIMUM_WINDOW_BITS))
    } else {
        Ok(bits)
    }
}

/// The permessage-deflate extension.
///
/// Holds the local options before negotiation and the agreed options after.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerMessageDeflate {
    options: CompressionOptions,
}

impl PerMessageDeflate {
    pub fn new(options: CompressionOptions) -> Self {
        Self { options }
    }

    /// Current options; negotiated values once `negotiate` or `accept` ran.
    pub fn options(&self) -> &CompressionOptions {
        &self.options
    }
}

impl Extension for PerMessageDeflate {
    fn name(&self) -> &str {
        NAME
    }

    fn offer(&self) -> Result<ExtensionHeader> {
        let options = &self.options;
        let mut header = ExtensionHeader::new(NAME);

        match options.client_max_window_bits {
            WindowBits::Bits(bits) if OFFERABLE_WINDOW_BITS.contains(&bits) => {
                header = header.with_param(ExtensionParam::new(
                    "client_max_window_bits",
                    bits.to_string(),
                ));
            }
            WindowBits::Default => {
                header = header.with_param(ExtensionParam::flag("client_max_window_bits"));
            }
            WindowBits::Bits(bits) => {
                return Err(Error::InvalidArgument(format!(
                    "invalid local maximum window bits: {bits}"
                )));
            }
        }

        if options.client_no_context_takeover {
            header = header.with_param(ExtensionParam::flag("client_no_context_takeover"));
        }

        match options.server_max_window_bits {
            WindowBits::Bits(bits) if OFFERABLE_WINDOW_BITS.contains(&bits) => {
                header = header.with_param(ExtensionParam::new(
                    "server_max_window_bits",
                    bits.to_string(),
                ));
            }
            WindowBits::Default => {}
            WindowBits::Bits(bits) => {
                return Err(Error::InvalidArgument(format!(
                    "invalid remote maximum window bits: {bits}"
                )));
            }
        }

        if options.server_no_context_takeover {
            header = header.with_param(ExtensionParam::flag("server_no_context_takeover"));
        }

        Ok(header)
    }

    fn negotiate(&mut self, params: &[ExtensionParam]) -> Result<ExtensionHeader> {
        let mut options = self.options.clone();
        let mut header = ExtensionHeader::new(NAME);

        for param in params {
            options.set(param, true)?;

            let reply = match param.name.as_str() {
                "server_max_window_bits" => ExtensionParam::new(
                    &param.name,
                    options.server_max_window_bits.resolve().to_string(),
                ),
                "client_max_window_bits" => ExtensionParam::new(
                    &param.name,
                    options.client_max_window_bits.resolve().to_string(),
                ),
                _ => ExtensionParam::flag(&param.name),
            };
            header = header.with_param(reply);
        }

        self.options = options;
        Ok(header)
    }

    fn accept(&mut self, params: &[ExtensionParam]) -> Result<()> {
        let mut options = self.options.clone();
        for param in params {
            options.set(param, false)?;
        }
        self.options = options;
        Ok(())
    }

    fn server(&self, pipeline: &mut Pipeline) -> Result<()> {
        let inflate = Inflate::server(&self.options)?.with_max_size(pipeline.max_message_size());
        let deflate = Deflate::server(&self.options)?;

        pipeline.reserve(RSV1)?;
        pipeline.push_reader(Box::new(inflate));
        pipeline.push_writer(Box::new(deflate));
        Ok(())
    }

    fn client(&self, pipeline: &mut Pipeline) -> Result<()> {
        let inflate = Inflate::client(&self.options)?.with_max_size(pipeline.max_message_size());
        let deflate = Deflate::client(&self.options)?;

        pipeline.reserve(RSV1)?;
        pipeline.push_reader(Box::new(inflate));
        pipeline.push_writer(Box::new(deflate));
        Ok(())
    }
}

/// Reject window bits flate2 cannot build a raw codec for.
fn check_window_bits(bits: u8) -> Result<u8> {
    if (MINIMUM_WINDOW_BITS..=MAXIMUM_WINDOW_BITS).contains(&bits) {
        Ok(bits)
    } else {
        Err(Error::InvalidArgument(format!(
            "window bits must be {MINIMUM_WINDOW_BITS}-{MAXIMUM_WINDOW_BITS}, got {bits}"
        )))
    }
}
