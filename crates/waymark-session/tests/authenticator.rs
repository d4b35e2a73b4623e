//! Integration tests for connection admission.

use std::time::Duration;

use jsonwebtoken::{EncodingKey, Header, encode};
use waymark_protocol::{CloseReason, GroupId, UserId};
use waymark_session::{
    AccessClaims, AuthError, Authenticator, Directory, DirectoryError, Identity, JwtValidator,
    MemoryDirectory, SessionAuthenticator,
};

const SECRET: &[u8] = b"authenticator-test-secret";

// =========================================================================
// Helpers
// =========================================================================

fn token_for(user: &str) -> String {
    let claims = AccessClaims::access(&UserId::new(user), Duration::from_secs(600));
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

fn group() -> GroupId {
    GroupId::new("family")
}

/// Ana and Bia are in "family"; Caio exists but is in no group.
fn directory() -> MemoryDirectory {
    let dir = MemoryDirectory::new();
    for (id, name) in [("ana", "Ana"), ("bia", "Bia"), ("caio", "Caio")] {
        dir.add_user(Identity::new(UserId::new(id), name));
    }
    dir.add_member(group(), UserId::new("ana"));
    dir.add_member(group(), UserId::new("bia"));
    dir
}

fn authenticator() -> SessionAuthenticator<JwtValidator, MemoryDirectory> {
    SessionAuthenticator::new(JwtValidator::new(SECRET), directory())
}

/// A directory whose backend is down.
struct DownDirectory;

impl Directory for DownDirectory {
    async fn user(&self, _: &UserId) -> Result<Option<Identity>, DirectoryError> {
        Err(DirectoryError::Unavailable("connection refused".into()))
    }

    async fn is_member(&self, _: &GroupId, _: &UserId) -> Result<bool, DirectoryError> {
        Err(DirectoryError::Unavailable("connection refused".into()))
    }

    async fn members(&self, _: &GroupId) -> Result<Vec<Identity>, DirectoryError> {
        Err(DirectoryError::Unavailable("connection refused".into()))
    }
}

// =========================================================================
// Admission
// =========================================================================

#[tokio::test]
async fn test_authenticate_member_returns_identity() {
    let token = token_for("ana");
    let identity = authenticator()
        .authenticate(Some(&token), &group())
        .await
        .unwrap();

    assert_eq!(identity.user_id, UserId::new("ana"));
    assert_eq!(identity.name, "Ana");
}

#[tokio::test]
async fn test_authenticate_missing_credential_is_unauthenticated() {
    let auth = authenticator();
    for credential in [None, Some(""), Some("   ")] {
        let err = auth.authenticate(credential, &group()).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)), "{credential:?}");
        assert_eq!(err.close_reason(), CloseReason::Unauthenticated);
    }
}

#[tokio::test]
async fn test_authenticate_unknown_user_is_unauthenticated() {
    let token = token_for("ghost");
    let err = authenticator()
        .authenticate(Some(&token), &group())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthenticated(_)));
}

#[tokio::test]
async fn test_authenticate_non_member_is_forbidden() {
    let token = token_for("caio");
    let err = authenticator()
        .authenticate(Some(&token), &group())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Forbidden(_)));
    assert_eq!(err.close_reason(), CloseReason::Forbidden);
}

#[tokio::test]
async fn test_authenticate_inactive_user_is_forbidden() {
    let auth = authenticator();
    assert!(auth.directory().set_active(&UserId::new("bia"), false));

    let token = token_for("bia");
    let err = auth.authenticate(Some(&token), &group()).await.unwrap_err();
    assert!(matches!(err, AuthError::Forbidden(_)));
}

#[tokio::test]
async fn test_authenticate_rechecks_membership_every_time() {
    let auth = authenticator();
    let token = token_for("bia");
    assert!(auth.authenticate(Some(&token), &group()).await.is_ok());

    assert!(auth.directory().remove_member(&group(), &UserId::new("bia")));
    let err = auth.authenticate(Some(&token), &group()).await.unwrap_err();
    assert!(matches!(err, AuthError::Forbidden(_)));
}

#[tokio::test]
async fn test_authenticate_directory_down_is_unavailable() {
    let auth = SessionAuthenticator::new(JwtValidator::new(SECRET), DownDirectory);
    let token = token_for("ana");

    let err = auth.authenticate(Some(&token), &group()).await.unwrap_err();
    assert!(matches!(err, AuthError::Unavailable(_)));
    assert_eq!(err.close_reason(), CloseReason::Unavailable);
}

#[tokio::test]
async fn test_authenticate_bad_token_skips_directory() {
    // A broken directory must not turn a bad token into "unavailable".
    let auth = SessionAuthenticator::new(JwtValidator::new(SECRET), DownDirectory);
    let err = auth.authenticate(Some("garbage"), &group()).await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthenticated(_)));
}

// =========================================================================
// MemoryDirectory
// =========================================================================

#[tokio::test]
async fn test_memory_directory_members_sorted_by_id() {
    let dir = directory();
    let members = dir.members(&group()).await.unwrap();
    let ids: Vec<&str> = members.iter().map(|m| m.user_id.as_str()).collect();
    assert_eq!(ids, vec!["ana", "bia"]);

    assert!(dir.members(&GroupId::new("empty")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_memory_directory_through_arc() {
    let dir = std::sync::Arc::new(directory());
    assert!(dir.is_member(&group(), &UserId::new("ana")).await.unwrap());
    assert!(!dir.is_member(&group(), &UserId::new("caio")).await.unwrap());
}
