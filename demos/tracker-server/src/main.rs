//! A Waymark server with an in-memory directory seeded with one group.
//!
//! Prints an access token per demo member on startup. Point
//! `simulate-member` at it with one of those tokens.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{EncodingKey, Header, encode};
use waymark::logging::init_tracing;
use waymark::prelude::*;

const ENV_JWT_SECRET: &str = "WAYMARK_JWT_SECRET";
const DEFAULT_SECRET: &str = "waymark-demo-secret";
const DEMO_GROUP: &str = "family";
const TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// ---------------------------------------------------------------------------
// Demo data
// ---------------------------------------------------------------------------

fn seed_directory() -> Arc<MemoryDirectory> {
    let directory = Arc::new(MemoryDirectory::new());
    let group = GroupId::new(DEMO_GROUP);
    for (id, name) in [("ana", "Ana"), ("bia", "Bia"), ("caio", "Caio")] {
        let user_id = UserId::new(id);
        directory.add_user(Identity::new(user_id.clone(), name));
        directory.add_member(group.clone(), user_id);
    }
    // Exists, but belongs to no group: useful for seeing a 4403.
    directory.add_user(Identity::new(UserId::new("stranger"), "Stranger"));
    directory
}

fn print_tokens(secret: &[u8], addr: &str) -> Result<(), jsonwebtoken::errors::Error> {
    let key = EncodingKey::from_secret(secret);
    for id in ["ana", "bia", "caio", "stranger"] {
        let claims = AccessClaims::access(&UserId::new(id), TOKEN_TTL);
        let token = encode(&Header::default(), &claims, &key)?;
        println!("{id:>8}: ws://{addr}/?group_id={DEMO_GROUP}&token={token}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("waymark=info,tracker_server=info")?;

    let config = ServerConfig::from_env()?;
    let secret = std::env::var(ENV_JWT_SECRET).unwrap_or_else(|_| {
        tracing::warn!("{ENV_JWT_SECRET} not set, using the built-in demo secret");
        DEFAULT_SECRET.to_string()
    });

    let directory = seed_directory();
    let auth = SessionAuthenticator::new(
        JwtValidator::new(secret.as_bytes()),
        Arc::clone(&directory),
    );

    let server = WaymarkServerBuilder::new()
        .config(config)
        .build_with_memory_cache(auth, directory, MemoryLocationLog::new())
        .await?;

    let addr = server.local_addr()?.to_string();
    print_tokens(secret.as_bytes(), &addr)?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await?;
    Ok(())
}
