//! Durable, append-only location log.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::RwLock;
use waymark_protocol::{Fix, UserId};

use crate::StoreError;

/// Append-only store of recorded fixes, queried per user.
///
/// Fixes are never updated or deleted once appended.
pub trait LocationLog: Send + Sync + 'static {
    /// Records `fix`.
    ///
    /// # Errors
    /// Any backend failure; the caller decides whether it is fatal.
    fn append(&self, fix: Fix) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Up to `limit` of `user_id`'s recorded fixes, newest first.
    fn history(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Fix>, StoreError>> + Send;
}

/// In-process [`LocationLog`] keeping each user's fixes in recording
/// order.
#[derive(Default)]
pub struct MemoryLocationLog {
    by_user: RwLock<HashMap<UserId, Vec<Fix>>>,
}

impl MemoryLocationLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of recorded fixes across all users.
    pub async fn len(&self) -> usize {
        self.by_user.read().await.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl LocationLog for MemoryLocationLog {
    async fn append(&self, fix: Fix) -> Result<(), StoreError> {
        self.by_user
            .write()
            .await
            .entry(fix.user_id.clone())
            .or_default()
            .push(fix);
        Ok(())
    }

    async fn history(&self, user_id: &UserId, limit: usize) -> Result<Vec<Fix>, StoreError> {
        let by_user = self.by_user.read().await;
        Ok(by_user
            .get(user_id)
            .map(|fixes| fixes.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
