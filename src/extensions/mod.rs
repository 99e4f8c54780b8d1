//! Extension negotiation (RFC 6455 section 9).
//!
//! Extensions are negotiated through `Sec-WebSocket-Extensions` header
//! lines, one extension per line:
//!
//! ```text
//! permessage-deflate; client_max_window_bits=12; server_no_context_takeover
//! ```
//!
//! A [`Client`] offers its extensions and accepts what the server answers; a
//! [`Server`] negotiates the client's offers. Once the upgrade completes,
//! `apply` installs every accepted extension on the connection.
//!
//! # Example
//!
//! ```rust
//! use std::io::Cursor;
//! use wsproto::Connection;
//! use wsproto::extensions::{Client, Server};
//!
//! # fn main() -> wsproto::Result<()> {
//! let mut client = Client::default();
//! let mut server = Server::default();
//!
//! let request = client.offer()?;
//! let response = server.accept(&request)?;
//! client.accept(&response)?;
//!
//! let mut conn = Connection::server(Cursor::new(Vec::<u8>::new()));
//! server.apply(&mut conn)?;
//! # Ok(())
//! # }
//! ```

pub mod compression;

use std::fmt;

use crate::connection::{Connection, Pipeline};
use crate::error::{Error, Result};

pub use compression::{CompressionOptions, PerMessageDeflate, WindowBits};

/// One extension parameter: `key` or `key=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionParam {
    /// Parameter name, e.g. `client_max_window_bits`.
    pub name: String,
    /// Value, absent for flags.
    pub value: Option<String>,
}

impl ExtensionParam {
    /// A parameter with a value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// A flag parameter.
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// Parse `key` or `key=value`; only the first `=` separates.
    pub fn parse(s: &str) -> Self {
        match s.split_once('=') {
            Some((name, value)) => Self::new(name, value),
            None => Self::flag(s),
        }
    }
}

impl fmt::Display for ExtensionParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => f.write_str(&self.name),
        }
    }
}

/// One `Sec-WebSocket-Extensions` header line: an extension name and its
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionHeader {
    /// Extension name, e.g. `permessage-deflate`.
    pub name: String,
    /// Parameters in header order.
    pub params: Vec<ExtensionParam>,
}

impl ExtensionHeader {
    /// A header with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    #[must_use]
    pub fn with_param(mut self, param: ExtensionParam) -> Self {
        self.params.push(param);
        self
    }

    /// Parse a header line: `name (";" SP* key ["=" value])*`.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if the extension name is empty.
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split(';').map(str::trim);
        let name = parts.next().unwrap_or_default();
        if name.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "missing extension name in {line:?}"
            )));
        }

        Ok(Self {
            name: name.to_owned(),
            params: parts.map(ExtensionParam::parse).collect(),
        })
    }

    /// Parse several header lines independently.
    pub fn parse_all<I, T>(lines: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        lines
            .into_iter()
            .map(|line| Self::parse(line.as_ref()))
            .collect()
    }

    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ExtensionParam> {
        self.params.iter().find(|param| param.name == name)
    }
}

impl fmt::Display for ExtensionHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for param in &self.params {
            write!(f, "; {param}")?;
        }
        Ok(())
    }
}

/// A negotiable extension together with its options.
///
/// `negotiate` and `accept` update the stored options to the negotiated
/// values; `server` and `client` then install the extension's stages.
pub trait Extension: Send {
    /// Registered extension name.
    fn name(&self) -> &str;

    /// Header line offered by a client.
    fn offer(&self) -> Result<ExtensionHeader>;

    /// Server side: reconcile a client's offer and return the response line.
    fn negotiate(&mut self, params: &[ExtensionParam]) -> Result<ExtensionHeader>;

    /// Client side: adopt the parameters the server responded with.
    fn accept(&mut self, params: &[ExtensionParam]) -> Result<()>;

    /// Install on a server connection.
    fn server(&self, pipeline: &mut Pipeline) -> Result<()>;

    /// Install on a client connection.
    fn client(&self, pipeline: &mut Pipeline) -> Result<()>;
}

/// Client side registry: offers extensions and accepts the server's choice.
pub struct Client {
    pending: Vec<Box<dyn Extension>>,
    accepted: Vec<Box<dyn Extension>>,
}

impl Client {
    /// A registry offering `extensions` in order.
    pub fn new(extensions: Vec<Box<dyn Extension>>) -> Self {
        Self {
            pending: extensions,
            accepted: Vec::new(),
        }
    }

    /// One header line per offered extension.
    pub fn offer(&self) -> Result<Vec<String>> {
        self.pending
            .iter()
            .map(|extension| extension.offer().map(|header| header.to_string()))
            .collect()
    }

    /// Accept the server's response header lines.
    ///
    /// The first line naming an offered extension wins; later lines with the
    /// same name and lines naming unknown extensions are ignored.
    pub fn accept<I, T>(&mut self, headers: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        for header in ExtensionHeader::parse_all(headers)? {
            let Some(index) = self
                .pending
                .iter()
                .position(|extension| extension.name() == header.name)
            else {
                continue;
            };

            let mut extension = self.pending.remove(index);
            extension.accept(&header.params)?;
            log::debug!("accepted extension {header}");
            self.accepted.push(extension);
        }
        Ok(())
    }

    /// Names of the accepted extensions, in acceptance order.
    pub fn accepted(&self) -> Vec<&str> {
        self.accepted.iter().map(|extension| extension.name()).collect()
    }

    /// Install the accepted extensions in acceptance order.
    pub fn apply<S>(&self, connection: &mut Connection<S>) -> Result<()> {
        for extension in &self.accepted {
            log::debug!("installing {} on client connection", extension.name());
            extension.client(connection.pipeline_mut())?;
        }
        Ok(())
    }
}

impl Default for Client {
    /// Offers permessage-deflate with default options.
    fn default() -> Self {
        Self::new(vec![Box::new(PerMessageDeflate::default())])
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |list: &[Box<dyn Extension>]| -> Vec<String> {
            list.iter().map(|extension| extension.name().to_owned()).collect()
        };
        f.debug_struct("Client")
            .field("pending", &names(&self.pending))
            .field("accepted", &names(&self.accepted))
            .finish()
    }
}

/// Server side registry: negotiates the client's offers.
pub struct Server {
    supported: Vec<Box<dyn Extension>>,
    accepted: Vec<Box<dyn Extension>>,
}

impl Server {
    /// A registry supporting `extensions`.
    pub fn new(extensions: Vec<Box<dyn Extension>>) -> Self {
        Self {
            supported: extensions,
            accepted: Vec::new(),
        }
    }

    /// Negotiate the client's request header lines and return the response
    /// header lines.
    ///
    /// Each supported extension is accepted at most once, for the first line
    /// that names it.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if an offer carries a parameter the
    /// extension does not understand.
    pub fn accept<I, T>(&mut self, headers: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut response = Vec::new();

        for header in ExtensionHeader::parse_all(headers)? {
            let Some(index) = self
                .supported
                .iter()
                .position(|extension| extension.name() == header.name)
            else {
                continue;
            };

            let mut extension = self.supported.remove(index);
            let reply = extension.negotiate(&header.params)?;
            log::debug!("negotiated extension {reply}");

            response.push(reply.to_string());
            self.accepted.push(extension);
        }

        Ok(response)
    }

    /// Names of the accepted extensions, in negotiation order.
    pub fn accepted(&self) -> Vec<&str> {
        self.accepted.iter().map(|extension| extension.name()).collect()
    }

    /// Install the accepted extensions, last negotiated first.
    pub fn apply<S>(&self, connection: &mut Connection<S>) -> Result<()> {
        for extension in self.accepted.iter().rev() {
            log::debug!("installing {} on server connection", extension.name());
            extension.server(connection.pipeline_mut())?;
        }
        Ok(())
    }
}

impl Default for Server {
    /// Supports permessage-deflate with default options.
    fn default() -> Self {
        Self::new(vec![Box::new(PerMessageDeflate::default())])
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |list: &[Box<dyn Extension>]| -> Vec<String> {
            list.iter().map(|extension| extension.name().to_owned()).collect()
        };
        f.debug_struct("Server")
            .field("supported", &names(&self.supported))
            .field("accepted", &names(&self.accepted))
            .finish()
    }
}
