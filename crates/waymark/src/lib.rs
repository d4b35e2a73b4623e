//! # Waymark
//!
//! Live location sharing for groups.
//!
//! Members connect over WebSocket with an access token and a group id,
//! stream their position fixes, and receive every other member's updates
//! in real time. Fixes refresh an expiring last-known-position cache; a
//! distance/time throttle decides which ones are recorded durably.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use waymark::prelude::*;
//!
//! # async fn run() -> Result<(), WaymarkError> {
//! let directory = Arc::new(MemoryDirectory::new());
//! let auth = SessionAuthenticator::new(JwtValidator::new(b"secret"), Arc::clone(&directory));
//!
//! let server = WaymarkServerBuilder::new()
//!     .config(ServerConfig::from_env()?)
//!     .build_with_memory_cache(auth, directory, MemoryLocationLog::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
pub mod logging;
mod server;
mod session;
mod tracker;

pub use config::{ConfigError, ServerConfig};
pub use error::WaymarkError;
pub use server::{WaymarkServer, WaymarkServerBuilder};
pub use session::PERSISTENCE_FAILURE;
pub use tracker::{FixOutcome, Frame, Persistence, Tracker};

/// Everything needed to assemble and run a server.
pub mod prelude {
    pub use crate::config::ServerConfig;
    pub use crate::error::WaymarkError;
    pub use crate::server::{WaymarkServer, WaymarkServerBuilder};
    pub use crate::tracker::{FixOutcome, Persistence, Tracker};

    pub use waymark_hub::HubConfig;
    pub use waymark_protocol::{
        CloseReason, Fix, GroupId, HistoryEntry, MemberPosition, ServerMessage, UserId,
    };
    pub use waymark_session::{
        AccessClaims, Authenticator, Directory, Identity, JwtValidator, MemoryDirectory,
        SessionAuthenticator,
    };
    pub use waymark_store::{
        CacheConfig, LocationLog, MemoryLocationLog, MemoryPositionCache, PositionCache,
    };
    pub use waymark_throttle::{Decision, ThrottleConfig};
}
