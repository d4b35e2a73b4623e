//! Error types for the storage layer.

/// Errors reported by a position cache or location log backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    /// Callers may retry later.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}
