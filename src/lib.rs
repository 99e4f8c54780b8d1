//! # wsproto - WebSocket protocol over blocking streams
//!
//! `wsproto` implements the RFC 6455 wire protocol on top of any
//! `std::io::Read + Write` stream that has already been upgraded:
//!
//! - **Frame codec**: header parsing and serialization, masking and the three
//!   payload length encodings
//! - **Connection state machine**: fragmentation, ping/pong and the close
//!   handshake, with a best-effort close frame on every protocol violation
//! - **permessage-deflate** (RFC 7692): offer, negotiation and the
//!   compressing/decompressing pipeline stages
//! - **Message coders**: typed payloads through [`Coder`], JSON by default
//!
//! The HTTP upgrade itself is left to the caller; [`protocol::headers`] has
//! the key and accept-digest helpers it needs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::TcpStream;
//! use wsproto::{Connection, Message};
//! use wsproto::extensions::Client;
//!
//! # fn main() -> wsproto::Result<()> {
//! let mut extensions = Client::default();
//! let offer = extensions.offer()?;
//! // ... send `offer` as Sec-WebSocket-Extensions and read the response ...
//! extensions.accept(["permessage-deflate; client_max_window_bits=15"])?;
//!
//! let stream = TcpStream::connect("127.0.0.1:8080")?;
//! let mut conn = Connection::client(stream);
//! extensions.apply(&mut conn)?;
//!
//! conn.write_message(&Message::text("Hello World"))?;
//! if let Some(reply) = conn.read_message()? {
//!     println!("{:?}", reply.as_text());
//! }
//! conn.close()?;
//! # Ok(())
//! # }
//! ```

pub mod coder;
pub mod config;
pub mod connection;
pub mod error;
pub mod extensions;
pub mod message;
pub mod protocol;

pub use coder::Coder;
#[cfg(feature = "json")]
pub use coder::Json;
pub use config::{Config, Limits};
pub use connection::{Connection, ConnectionState, WriteOptions};
pub use error::{Error, Result};
pub use message::Message;
pub use protocol::{CloseCode, Frame, Framer, OpCode};
