/// Error reported by the underlying protocol library.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The client connected but the protocol upgrade failed.
    #[error("handshake with {peer} failed: {source}")]
    Handshake {
        peer: String,
        #[source]
        source: BoxError,
    },

    #[error("send failed: {0}")]
    Send(#[source] BoxError),

    #[error("receive failed: {0}")]
    Receive(#[source] BoxError),

    /// The close frame could not be sent; the peer is usually gone already.
    #[error("close failed: {0}")]
    Close(#[source] BoxError),
}
