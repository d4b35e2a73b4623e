//! Ephemeral last-known-position cache.
//!
//! One entry per user, overwritten on every inbound fix and expiring
//! after a TTL. An absent entry means "nobody has reported this user
//! recently", not an error.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use waymark_protocol::{Fix, UserId};

use crate::StoreError;

/// Configuration for a position cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long an entry lives after its last `put`.
    pub ttl: Duration,

    /// When `true`, a `put` carrying an older fix timestamp than the live
    /// entry is ignored, so racing writers cannot roll the cache back.
    /// When `false` (default), the last physical write wins.
    pub reject_out_of_order: bool,
}

/// Longest TTL an entry may be given.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            reject_out_of_order: false,
        }
    }
}

impl CacheConfig {
    /// Clamp `ttl` to [`MAX_CACHE_TTL`].
    pub fn validated(mut self) -> Self {
        if self.ttl > MAX_CACHE_TTL {
            warn!(ttl = ?self.ttl, max = ?MAX_CACHE_TTL, "cache ttl too long, clamping");
            self.ttl = MAX_CACHE_TTL;
        }
        self
    }
}

/// A TTL-capable key/value store of each user's most recent fix.
///
/// Implementations must tolerate unbounded concurrent readers and
/// writers; contention should be scoped per user key.
pub trait PositionCache: Send + Sync + 'static {
    /// Stores `fix` as its user's latest position and resets the entry's
    /// expiry.
    fn put(&self, fix: Fix) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns the live entry for `user_id`, if any.
    fn get(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Option<Fix>, StoreError>> + Send;

    /// Returns the live entries for those of `user_ids` that have one.
    fn get_many(
        &self,
        user_ids: &[UserId],
    ) -> impl Future<Output = Result<HashMap<UserId, Fix>, StoreError>> + Send;

    /// Reclaims expired entries and returns how many were dropped.
    ///
    /// Backends that expire entries on their own (e.g. a TTL-aware
    /// key/value server) need not override this.
    fn purge_expired(&self) -> impl Future<Output = usize> + Send {
        async { 0 }
    }
}

struct CachedFix {
    fix: Fix,
    expires_at: Instant,
}

impl CachedFix {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process [`PositionCache`] backed by a sharded concurrent map.
///
/// Expiry is measured on the tokio clock, so paused-time tests can step
/// over the TTL without sleeping.
pub struct MemoryPositionCache {
    entries: DashMap<UserId, CachedFix>,
    config: CacheConfig,
}

impl MemoryPositionCache {
    /// Creates an empty cache. The TTL is clamped to [`MAX_CACHE_TTL`].
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config: config.validated(),
        }
    }

    /// The configuration in effect.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live(&self, user_id: &UserId, now: Instant) -> Option<Fix> {
        self.entries
            .get(user_id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.fix.clone())
    }
}

impl Default for MemoryPositionCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl PositionCache for MemoryPositionCache {
    async fn put(&self, fix: Fix) -> Result<(), StoreError> {
        let now = Instant::now();
        let fresh = CachedFix {
            expires_at: now + self.config.ttl,
            fix,
        };

        match self.entries.entry(fresh.fix.user_id.clone()) {
            Entry::Occupied(mut slot) => {
                let current = slot.get();
                if self.config.reject_out_of_order
                    && current.is_live(now)
                    && fresh.fix.timestamp < current.fix.timestamp
                {
                    debug!(
                        user_id = %fresh.fix.user_id,
                        cached = current.fix.timestamp,
                        incoming = fresh.fix.timestamp,
                        "ignoring out-of-order cache write"
                    );
                    return Ok(());
                }
                slot.insert(fresh);
            }
            Entry::Vacant(slot) => {
                trace!(user_id = %fresh.fix.user_id, "first cached fix");
                slot.insert(fresh);
            }
        }
        Ok(())
    }

    async fn get(&self, user_id: &UserId) -> Result<Option<Fix>, StoreError> {
        Ok(self.live(user_id, Instant::now()))
    }

    async fn get_many(
        &self,
        user_ids: &[UserId],
    ) -> Result<HashMap<UserId, Fix>, StoreError> {
        let now = Instant::now();
        Ok(user_ids
            .iter()
            .filter_map(|id| self.live(id, now).map(|fix| (id.clone(), fix)))
            .collect())
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let live = entry.is_live(now);
            if !live {
                purged += 1;
            }
            live
        });
        if purged > 0 {
            debug!(purged, remaining = self.entries.len(), "purged expired positions");
        }
        purged
    }
}
