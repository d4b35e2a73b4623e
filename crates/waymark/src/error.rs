//! Unified error type for Waymark.

use waymark_hub::DeliveryError;
use waymark_protocol::ProtocolError;
use waymark_session::{AuthError, DirectoryError};
use waymark_store::StoreError;
use waymark_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum WaymarkError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid fix).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Admission was refused.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The directory could not answer a query.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The position cache or location log failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A delivery to one connection failed.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// A configuration value was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
