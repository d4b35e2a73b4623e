//! Admission check for new streaming connections.
//!
//! The server does not know how credentials are checked; it only calls
//! an [`Authenticator`] once per connection, before anything else
//! happens. [`SessionAuthenticator`] is the standard implementation:
//! validate the token, then ask the directory about the user and group.

use std::future::Future;

use tracing::debug;
use waymark_protocol::GroupId;

use crate::{AuthError, Directory, Identity, TokenValidator};

/// Decides whether a connection may join a group, and as whom.
///
/// # Example
///
/// ```rust
/// use waymark_protocol::{GroupId, UserId};
/// use waymark_session::{AuthError, Authenticator, Identity};
///
/// /// Admits anyone into "lobby" under the name they present.
/// /// Only for local experiments.
/// struct LobbyAuthenticator;
///
/// impl Authenticator for LobbyAuthenticator {
///     async fn authenticate(
///         &self,
///         credential: Option<&str>,
///         group: &GroupId,
///     ) -> Result<Identity, AuthError> {
///         let name = credential
///             .ok_or_else(|| AuthError::Unauthenticated("missing credential".into()))?;
///         if group.as_str() != "lobby" {
///             return Err(AuthError::Forbidden("lobby only".into()));
///         }
///         Ok(Identity::new(UserId::new(name), name))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Resolves `credential` to an identity allowed into `group`.
    ///
    /// # Errors
    /// - [`AuthError::Unauthenticated`]: missing or invalid credential, or
    ///   an unknown user.
    /// - [`AuthError::Forbidden`]: inactive user, or not a member of
    ///   `group`.
    /// - [`AuthError::Unavailable`]: the check itself could not be made.
    fn authenticate(
        &self,
        credential: Option<&str>,
        group: &GroupId,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;
}

/// [`Authenticator`] built from a token validator and a directory.
///
/// Membership is looked up on every call; nothing is cached.
pub struct SessionAuthenticator<V, D> {
    validator: V,
    directory: D,
}

impl<V: TokenValidator, D: Directory> SessionAuthenticator<V, D> {
    /// Combines a validator and a directory.
    pub fn new(validator: V, directory: D) -> Self {
        Self {
            validator,
            directory,
        }
    }

    /// The directory consulted on admission.
    pub fn directory(&self) -> &D {
        &self.directory
    }
}

impl<V: TokenValidator, D: Directory> Authenticator for SessionAuthenticator<V, D> {
    async fn authenticate(
        &self,
        credential: Option<&str>,
        group: &GroupId,
    ) -> Result<Identity, AuthError> {
        let token = credential
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::Unauthenticated("missing credential".into()))?;

        let user_id = self.validator.validate(token)?;

        let identity = self
            .directory
            .user(&user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthenticated(format!("unknown user {user_id}")))?;

        if !identity.active {
            return Err(AuthError::Forbidden(format!("user {user_id} is inactive")));
        }
        if !self.directory.is_member(group, &user_id).await? {
            return Err(AuthError::Forbidden(format!(
                "user {user_id} is not a member of group {group}"
            )));
        }

        debug!(%user_id, %group, "admission granted");
        Ok(identity)
    }
}
