//! WebSocket connection state machine.
//!
//! A [`Connection`] owns a [`Framer`](crate::protocol::Framer) and turns the
//! frames it reads into messages, answering pings and closes along the way.
//! Negotiated extensions install reader and writer stages into its
//! [`Pipeline`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::net::TcpStream;
//! use wsproto::Connection;
//!
//! # fn main() -> wsproto::Result<()> {
//! // The HTTP upgrade has already happened on this stream.
//! let stream = TcpStream::connect("127.0.0.1:8080")?;
//! let mut conn = Connection::client(stream);
//!
//! conn.send_text("Hello")?;
//! while let Some(message) = conn.read_message()? {
//!     println!("received: {:?}", message);
//! }
//! # Ok(())
//! # }
//! ```

mod pipeline;
mod state;

#[allow(clippy::module_inception)]
mod connection;

pub use connection::Connection;
pub use pipeline::{Pipeline, Reader, WriteOptions, Writer};
pub use state::ConnectionState;
