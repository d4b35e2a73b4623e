//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::{ConnectInfo, Connection, ConnectionId, Incoming, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Incoming = IncomingWebSocket;
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "accepted TCP connection");
        Ok(IncomingWebSocket { id, stream, peer })
    }
}

/// A TCP stream whose WebSocket handshake has not run yet.
pub struct IncomingWebSocket {
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
}

impl IncomingWebSocket {
    /// The remote address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Incoming for IncomingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn upgrade(self) -> Result<Self::Connection, Self::Error> {
        let Self { id, stream, peer } = self;

        // The handshake callback is the only place the request line and
        // headers are visible; capture what admission needs from them.
        let mut info = ConnectInfo::default();
        let ws = tokio_tungstenite::accept_hdr_async(
            stream,
            |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                info = read_connect_info(req);
                Ok(resp)
            },
        )
        .await
        .map_err(|e| TransportError::Handshake {
            peer: peer.to_string(),
            source: Box::new(e),
        })?;
        info.peer = Some(peer);
        tracing::debug!(%id, %peer, "WebSocket handshake complete");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            info,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

fn read_connect_info(req: &Request) -> ConnectInfo {
    let mut info = req
        .uri()
        .query()
        .map(ConnectInfo::from_query)
        .unwrap_or_default();
    info.bearer = req
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());
    info
}

/// A single WebSocket connection.
///
/// The sink and stream halves are locked independently so a broadcast
/// writer never waits on a pending read.
pub struct WebSocketConnection {
    id: ConnectionId,
    info: ConnectInfo,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        // Waymark's wire format is JSON; send it as a text frame when it
        // is valid UTF-8 so browser clients can read it directly.
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| TransportError::Send(Box::new(e)))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => return Err(TransportError::Receive(Box::new(e))),
            }
        }
    }

    async fn close(&self, code: u16, reason: &str) -> Result<(), Self::Error> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        self.sink
            .lock()
            .await
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::Close(Box::new(e)))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn connect_info(&self) -> &ConnectInfo {
        &self.info
    }
}
