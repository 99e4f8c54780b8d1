//! Pluggable encodings for message payloads.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Converts between message payloads and typed values.
pub trait Coder {
    /// Decode a payload.
    fn parse<T: DeserializeOwned>(&self, buffer: &[u8]) -> Result<T>;

    /// Encode a value as text.
    fn generate<T: Serialize + ?Sized>(&self, value: &T) -> Result<String>;
}

/// JSON coder backed by `serde_json`. This is the default coder.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Json {
    pretty: bool,
}

#[cfg(feature = "json")]
impl Json {
    /// Compact output.
    #[must_use]
    pub const fn new() -> Self {
        Self { pretty: false }
    }

    /// Indented output.
    #[must_use]
    pub const fn pretty() -> Self {
        Self { pretty: true }
    }
}

#[cfg(feature = "json")]
impl Coder for Json {
    fn parse<T: DeserializeOwned>(&self, buffer: &[u8]) -> Result<T> {
        serde_json::from_slice(buffer).map_err(|err| crate::Error::Coder(err.to_string()))
    }

    fn generate<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let encoded = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        encoded.map_err(|err| crate::Error::Coder(err.to_string()))
    }
}

/// The coder used when none is given.
#[cfg(feature = "json")]
pub const DEFAULT: Json = Json::new();
