//! Storage seams for Waymark.
//!
//! - [`PositionCache`]: volatile, expiring "where is this user now".
//! - [`LocationLog`]: durable, append-only "where has this user been".
//!
//! Both are traits so a deployment can back them with a key/value server
//! and a database; [`MemoryPositionCache`] and [`MemoryLocationLog`] are
//! the in-process implementations used by tests and the demo server.

mod cache;
mod error;
mod log;

pub use cache::{CacheConfig, MAX_CACHE_TTL, MemoryPositionCache, PositionCache};
pub use error::StoreError;
pub use log::{LocationLog, MemoryLocationLog};
