//! The location pipeline and its queries, independent of any socket.
//!
//! For every inbound fix:
//!
//! ```text
//! cache.get(last) → throttle.evaluate(last, fix) → log.append (if accepted)
//!                 → cache.put(fix) → hub.broadcast(location_update)
//! ```
//!
//! The cache is refreshed for every fix, recorded or not, so it always
//! holds the freshest position rather than the freshest recorded one.

use std::sync::Arc;

use tracing::{debug, error, warn};
use waymark_hub::{BroadcastReport, Hub};
use waymark_protocol::{
    Codec, Fix, GroupId, HistoryEntry, JsonCodec, LocationBroadcast, MemberPosition,
    ServerMessage, UserId,
};
use waymark_session::{Directory, Identity};
use waymark_store::{LocationLog, PositionCache, StoreError};
use waymark_throttle::{Decision, ThrottlePolicy};

use crate::{ServerConfig, WaymarkError};

/// One encoded message, shared by every recipient of a broadcast.
pub type Frame = Arc<[u8]>;

/// What happened to a fix's durable record.
#[derive(Debug)]
pub enum Persistence {
    /// Appended to the location log.
    Recorded,
    /// Throttled; not appended.
    Skipped,
    /// The throttle accepted it but the append failed.
    Failed(StoreError),
}

/// Result of running one fix through the pipeline.
#[derive(Debug)]
pub struct FixOutcome {
    pub decision: Decision,
    pub persistence: Persistence,
    pub broadcast: BroadcastReport,
}

/// Owns the hub, the position cache, the location log, and the throttle,
/// and runs fixes through them.
pub struct Tracker<D, P, L> {
    directory: D,
    cache: P,
    log: L,
    policy: ThrottlePolicy,
    hub: Hub<Frame>,
    codec: JsonCodec,
    max_history_limit: usize,
}

impl<D, P, L> Tracker<D, P, L>
where
    D: Directory,
    P: PositionCache,
    L: LocationLog,
{
    /// Builds a tracker from its collaborators. Throttle, hub, and history
    /// limits come from `config`; the cache carries its own config.
    pub fn new(directory: D, cache: P, log: L, config: &ServerConfig) -> Self {
        Self {
            directory,
            cache,
            log,
            policy: ThrottlePolicy::new(config.throttle.clone()),
            hub: Hub::new(config.hub.clone()),
            codec: JsonCodec,
            max_history_limit: config.max_history_limit,
        }
    }

    /// The connection registry broadcasts go through.
    pub fn hub(&self) -> &Hub<Frame> {
        &self.hub
    }

    /// The position cache.
    pub fn cache(&self) -> &P {
        &self.cache
    }

    /// The location log.
    pub fn log(&self) -> &L {
        &self.log
    }

    /// The directory used for group queries.
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// The persistence throttle.
    pub fn policy(&self) -> &ThrottlePolicy {
        &self.policy
    }

    /// Encodes a message once for any number of recipients.
    pub fn encode(&self, msg: &ServerMessage) -> Result<Frame, WaymarkError> {
        Ok(Frame::from(self.codec.encode(msg)?))
    }

    /// Runs `fix` from `sender` through the pipeline and fans it out to
    /// `group`.
    ///
    /// `fix.user_id` is overwritten with the sender's id. Cache failures
    /// are logged and do not stop the fix; a failed append is reported in
    /// the outcome and does not stop the cache update or the broadcast.
    pub async fn ingest(&self, sender: &Identity, group: &GroupId, mut fix: Fix) -> FixOutcome {
        fix.user_id = sender.user_id.clone();

        let last = match self.cache.get(&fix.user_id).await {
            Ok(last) => last,
            Err(e) => {
                warn!(user_id = %fix.user_id, error = %e, "cache read failed, treating as no prior fix");
                None
            }
        };

        let decision = self.policy.evaluate(last.as_ref(), &fix);
        let persistence = if decision.is_accept() {
            match self.log.append(fix.clone()).await {
                Ok(()) => Persistence::Recorded,
                Err(e) => {
                    warn!(user_id = %fix.user_id, error = %e, "failed to record fix");
                    Persistence::Failed(e)
                }
            }
        } else {
            Persistence::Skipped
        };

        let update = ServerMessage::LocationUpdate(LocationBroadcast::from_fix(&fix, &sender.name));

        if let Err(e) = self.cache.put(fix).await {
            warn!(user_id = %sender.user_id, error = %e, "cache write failed");
        }

        let broadcast = match self.encode(&update) {
            Ok(frame) => self.hub.broadcast(group, &frame),
            Err(e) => {
                error!(error = %e, "failed to encode location update");
                BroadcastReport::default()
            }
        };

        debug!(
            user_id = %sender.user_id,
            %group,
            %decision,
            delivered = broadcast.delivered,
            "fix ingested"
        );
        FixOutcome {
            decision,
            persistence,
            broadcast,
        }
    }

    /// Up to `limit` recorded fixes for `user_id`, newest first. `limit`
    /// is clamped to the configured maximum.
    ///
    /// # Errors
    /// [`StoreError`] from the location log.
    pub async fn history(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let limit = limit.min(self.max_history_limit);
        let fixes = self.log.history(user_id, limit).await?;
        Ok(fixes.iter().map(HistoryEntry::from).collect())
    }

    /// Last known position of every member of `group` that has one.
    /// Members with no live cache entry are omitted.
    ///
    /// # Errors
    /// Directory or cache failures.
    pub async fn group_last_positions(
        &self,
        group: &GroupId,
    ) -> Result<Vec<MemberPosition>, WaymarkError> {
        let members = self.directory.members(group).await?;
        let ids: Vec<UserId> = members.iter().map(|m| m.user_id.clone()).collect();
        let mut fixes = self.cache.get_many(&ids).await?;

        Ok(members
            .into_iter()
            .filter_map(|member| {
                let fix = fixes.remove(&member.user_id)?;
                Some(MemberPosition {
                    user_id: member.user_id,
                    user_name: member.name,
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                    timestamp: fix.timestamp,
                })
            })
            .collect())
    }
}
