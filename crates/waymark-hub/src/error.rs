//! Error types for the hub.

use waymark_transport::ConnectionId;

/// Why a delivery to one connection failed.
///
/// The hub turns either variant into deregistration of that connection;
/// neither is ever returned to the broadcaster.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection's outbound buffer is at capacity; the peer is not
    /// keeping up.
    #[error("outbound buffer full for {0}")]
    Full(ConnectionId),

    /// The connection's writer has stopped (the connection is closing or
    /// closed).
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}
