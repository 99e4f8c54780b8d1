//! Header names and digests used by the HTTP upgrade.
//!
//! Only the hashing glue lives here; exchanging the headers is up to the
//! HTTP layer.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// Value of the `Upgrade` header and the `:protocol` pseudo-header.
pub const PROTOCOL: &str = "websocket";

/// Client nonce header.
pub const SEC_WEBSOCKET_KEY: &str = "sec-websocket-key";
/// Subprotocol negotiation header.
pub const SEC_WEBSOCKET_PROTOCOL: &str = "sec-websocket-protocol";
/// Protocol version header.
pub const SEC_WEBSOCKET_VERSION: &str = "sec-websocket-version";
/// Accept digest header.
pub const SEC_WEBSOCKET_ACCEPT: &str = "sec-websocket-accept";
/// Extension negotiation header.
pub const SEC_WEBSOCKET_EXTENSIONS: &str = "sec-websocket-extensions";

/// The only protocol version defined by RFC 6455.
pub const VERSION: &str = "13";

/// GUID appended to the client key before hashing (RFC 6455 section 1.3).
pub const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Generate a `Sec-WebSocket-Key`: 16 random bytes, base64 encoded.
pub fn generate_key() -> Result<String> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce)
        .map_err(|err| Error::Io(format!("could not generate key: {err}")))?;
    Ok(BASE64.encode(nonce))
}

/// Compute the `Sec-WebSocket-Accept` value for a client key.
#[must_use]
pub fn accept_digest(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_digest_rfc_example() {
        assert_eq!(
            accept_digest("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_generate_key() {
        let key = generate_key().unwrap();
        assert_eq!(key.len(), 24);
        assert_eq!(BASE64.decode(&key).unwrap().len(), 16);
        assert_ne!(key, generate_key().unwrap());
    }
}
