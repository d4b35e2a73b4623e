//! Access token validation.
//!
//! Waymark does not issue tokens; an external identity service does. The
//! core only needs to turn a presented credential into a user id, which is
//! what [`TokenValidator`] does. [`JwtValidator`] handles the HS256 access
//! tokens the identity service mints.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use waymark_protocol::UserId;

use crate::AuthError;

/// The `type` claim an access token carries.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Turns a presented credential into the user it identifies.
///
/// Implementations only check the credential itself (signature, expiry,
/// shape). Whether the user exists or belongs to a group is the
/// directory's business.
pub trait TokenValidator: Send + Sync + 'static {
    /// # Errors
    /// [`AuthError::Unauthenticated`] for any credential that does not
    /// validate.
    fn validate(&self, credential: &str) -> Result<UserId, AuthError>;
}

/// Claims of a Waymark access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// The user id.
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
    /// Token kind; only [`ACCESS_TOKEN_TYPE`] is admitted.
    #[serde(rename = "type")]
    pub token_type: String,
}

impl AccessClaims {
    /// Claims for an access token for `user_id` that expires `ttl` from now.
    pub fn access(user_id: &UserId, ttl: Duration) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sub: user_id.to_string(),
            exp: (now + ttl).as_secs(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
        }
    }
}

/// [`TokenValidator`] for HS256 JWTs signed with a shared secret.
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    /// Creates a validator for tokens signed with `secret`.
    ///
    /// `exp` and `sub` are required; expiry is checked with no leeway.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl TokenValidator for JwtValidator {
    fn validate(&self, credential: &str) -> Result<UserId, AuthError> {
        let data = decode::<AccessClaims>(credential, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    AuthError::Unauthenticated("token expired".into())
                }
                _ => AuthError::Unauthenticated(format!("invalid token: {e}")),
            })?;

        let claims = data.claims;
        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(AuthError::Unauthenticated(format!(
                "expected an access token, got {:?}",
                claims.token_type
            )));
        }
        if claims.sub.trim().is_empty() {
            return Err(AuthError::Unauthenticated("token has no subject".into()));
        }
        Ok(UserId::new(claims.sub))
    }
}
