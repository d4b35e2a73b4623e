//! Connection admission for Waymark.
//!
//! Handles:
//! - **Authentication**: [`Authenticator`] trait, [`SessionAuthenticator`]
//! - **Tokens**: [`TokenValidator`] trait, [`JwtValidator`]
//! - **Directory**: [`Directory`] trait (users, group membership),
//!   [`MemoryDirectory`]
//! - **Identity**: who a live connection belongs to

mod auth;
mod directory;
mod error;
mod token;

pub use auth::{Authenticator, SessionAuthenticator};
pub use directory::{Directory, MemoryDirectory};
pub use error::{AuthError, DirectoryError};
pub use token::{ACCESS_TOKEN_TYPE, AccessClaims, JwtValidator, TokenValidator};

use serde::{Deserialize, Serialize};
use waymark_protocol::UserId;

/// A user as known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable, unique user id.
    pub user_id: UserId,
    /// Display name shown to other group members.
    pub name: String,
    /// Inactive users are refused admission.
    pub active: bool,
}

impl Identity {
    /// An active user.
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            active: true,
        }
    }
}
