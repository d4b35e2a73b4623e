//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing required fields,
    /// or non-numeric coordinates.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but breaks a protocol rule, e.g. a latitude
    /// outside `-90..=90` or a `NaN` timestamp.
    #[error("protocol violation: {0}")]
    Violation(String),
}

impl ProtocolError {
    /// Whether this error was caused by what the peer sent, as opposed to
    /// something failing on our side.
    pub fn is_peer_fault(&self) -> bool {
        match self {
            #[cfg(feature = "json")]
            Self::Encode(_) => false,
            #[cfg(feature = "json")]
            Self::Decode(_) => true,
            Self::Violation(_) => true,
        }
    }
}
