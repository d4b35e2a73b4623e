//! Error types for the session layer.

use waymark_protocol::CloseReason;

/// Why a connection was refused admission.
///
/// Each variant maps to its own [`CloseReason`], so a client can tell
/// "get a fresh token" apart from "you are not allowed in this group"
/// and "try again later".
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The credential is missing, malformed, expired, of the wrong type,
    /// or names a user the directory does not know.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The credential is valid, but the account is inactive or not a
    /// member of the target group.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The directory could not answer.
    #[error(transparent)]
    Unavailable(#[from] DirectoryError),
}

impl AuthError {
    /// The close reason sent to a client refused with this error.
    pub fn close_reason(&self) -> CloseReason {
        match self {
            Self::Unauthenticated(_) => CloseReason::Unauthenticated,
            Self::Forbidden(_) => CloseReason::Forbidden,
            Self::Unavailable(_) => CloseReason::Unavailable,
        }
    }
}

/// Errors reported by a [`Directory`](crate::Directory) backend.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The backend could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("directory backend error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}
