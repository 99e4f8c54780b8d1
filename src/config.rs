//! Configuration and limits for WebSocket connections.

use crate::error::{Error, Result};
use crate::protocol::MAXIMUM_ALLOWED_FRAME_SIZE;

/// Resource limits applied while reading frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload length of a single frame in bytes.
    ///
    /// Default: [`MAXIMUM_ALLOWED_FRAME_SIZE`] (2^63), i.e. only the wire
    /// format's own bound.
    pub max_frame_size: u64,

    /// Maximum size of a complete message in bytes.
    ///
    /// This applies to the reassembled payload and to its size after
    /// decompression.
    ///
    /// Default: [`MAXIMUM_ALLOWED_FRAME_SIZE`] (2^63)
    pub max_message_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: MAXIMUM_ALLOWED_FRAME_SIZE,
            max_message_size: MAXIMUM_ALLOWED_FRAME_SIZE,
        }
    }
}

impl Limits {
    /// Limits with a custom maximum frame size.
    #[must_use]
    pub const fn new(max_frame_size: u64) -> Self {
        Self {
            max_frame_size,
            max_message_size: MAXIMUM_ALLOWED_FRAME_SIZE,
        }
    }

    /// Limits suited to memory-constrained peers (1 MB frames, 4 MB
    /// messages).
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_frame_size: 1024 * 1024,
            max_message_size: 4 * 1024 * 1024,
        }
    }

    /// Set the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: u64) -> Self {
        self.max_message_size = size;
        self
    }

    /// Check a frame length against the limit.
    pub fn check_frame_size(&self, size: u64) -> Result<()> {
        if size > self.max_frame_size {
            return Err(Error::frame_size(format!(
                "frame length {size} exceeds maximum {}",
                self.max_frame_size
            )));
        }
        Ok(())
    }

    /// Check a message length against the limit.
    pub fn check_message_size(&self, size: u64) -> Result<()> {
        if size > self.max_message_size {
            return Err(Error::frame_size(format!(
                "message length {size} exceeds maximum {}",
                self.max_message_size
            )));
        }
        Ok(())
    }
}

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Mask outgoing frames with a fresh random key.
    ///
    /// Clients must mask (RFC 6455 section 5.3). Default: `false`.
    pub mask_frames: bool,

    /// Reject incoming frames that are not masked.
    ///
    /// Default: `false`.
    pub require_masked_frames: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::server()
    }
}

impl Config {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the maximum frame size.
    #[must_use]
    pub const fn with_max_frame_size(mut self, size: u64) -> Self {
        self.limits.max_frame_size = size;
        self
    }

    /// Set the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: u64) -> Self {
        self.limits.max_message_size = size;
        self
    }

    /// Enable or disable masking of outgoing frames.
    #[must_use]
    pub const fn with_mask_frames(mut self, mask: bool) -> Self {
        self.mask_frames = mask;
        self
    }

    /// Enable or disable rejection of unmasked incoming frames.
    #[must_use]
    pub const fn with_require_masked_frames(mut self, require: bool) -> Self {
        self.require_masked_frames = require;
        self
    }

    /// Configuration for the server side: frames go out unmasked.
    #[must_use]
    pub fn server() -> Self {
        Self {
            limits: Limits::default(),
            mask_frames: false,
            require_masked_frames: false,
        }
    }

    /// Configuration for the client side: every outgoing frame is masked.
    #[must_use]
    pub fn client() -> Self {
        Self {
            limits: Limits::default(),
            mask_frames: true,
            require_masked_frames: false,
        }
    }
}
