//! Transport abstraction layer for Waymark.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the network protocol carrying a member's live position stream.
//!
//! A connection also exposes the data its client supplied when it
//! connected ([`ConnectInfo`]): the query parameters and bearer credential
//! that admission is gated on.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::{BoxError, TransportError};
#[cfg(feature = "websocket")]
pub use websocket::{IncomingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What the client presented when it opened the connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectInfo {
    /// Query parameters from the request URI, in order of appearance.
    pub query: Vec<(String, String)>,
    /// Credential from an `Authorization: Bearer <token>` header.
    pub bearer: Option<String>,
    /// Remote address, when the transport knows it.
    pub peer: Option<SocketAddr>,
}

impl ConnectInfo {
    /// Parses a raw `application/x-www-form-urlencoded` query string
    /// (`a=1&b=2`), decoding `+` and percent escapes.
    ///
    /// Pairs without `=` are kept with an empty value.
    pub fn from_query(query: &str) -> Self {
        let query = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        Self {
            query,
            ..Self::default()
        }
    }

    /// Returns the first value of a query parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// The credential the client presented: the bearer header wins over
    /// a `token` query parameter.
    pub fn credential(&self) -> Option<&str> {
        self.bearer.as_deref().or_else(|| self.param("token"))
    }
}

/// Accepts new incoming connections.
///
/// Accepting only takes the raw stream off the listener. The protocol
/// handshake happens in [`Incoming::upgrade`], so a slow client never holds
/// up the accept loop.
pub trait Transport: Send + Sync + 'static {
    /// An accepted stream that has not been upgraded yet.
    type Incoming: Incoming<Connection = Self::Connection, Error = Self::Error>;
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming stream.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;
}

/// A stream accepted by a [`Transport`], waiting for its handshake.
pub trait Incoming: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// The id the upgraded connection will carry.
    fn id(&self) -> ConnectionId;

    /// Runs the protocol handshake. Callers should bound it with a
    /// timeout; a client may never send its upgrade request.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive bytes.
///
/// `send` and `recv` may be called concurrently from different tasks:
/// a session's own receive loop reads while its writer task sends.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends data to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection with an application close code and reason.
    async fn close(&self, code: u16, reason: &str) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns what the client supplied at connect time.
    fn connect_info(&self) -> &ConnectInfo;
}
