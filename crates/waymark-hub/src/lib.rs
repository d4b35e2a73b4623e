//! Connection registry and group fan-out for Waymark.
//!
//! The [`Hub`] maps each group to the live connections registered under
//! it and delivers broadcasts to all of them. Delivery is a non-blocking
//! enqueue into each connection's bounded outbound buffer ([`Link`]); a
//! connection whose buffer is full or closed is dropped from the registry
//! on the spot, and nobody else notices.
//!
//! The hub is an ordinary value owned by whoever builds it (the server,
//! or a test), not a process-wide singleton.
//!
//! # Key types
//!
//! - [`Hub`]: register, deregister, broadcast
//! - [`Link`]: the sending half of one connection's outbound buffer
//! - [`BroadcastReport`]: what happened to one broadcast
//! - [`HubConfig`]: outbound buffer sizing

mod error;
mod link;

pub use error::DeliveryError;
pub use link::{Link, LinkReceiver};

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use waymark_protocol::{GroupId, UserId};
use waymark_transport::ConnectionId;

// ---------------------------------------------------------------------------
// HubConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Hub`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Messages a connection may have queued before it is considered
    /// too slow and pruned.
    pub outbound_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 64,
        }
    }
}

impl HubConfig {
    /// Clamp `outbound_capacity` to at least 1.
    pub fn validated(mut self) -> Self {
        if self.outbound_capacity == 0 {
            warn!("outbound_capacity of 0 is not usable, clamping to 1");
            self.outbound_capacity = 1;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// BroadcastReport
// ---------------------------------------------------------------------------

/// Outcome of one [`Hub::broadcast`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections a delivery was attempted to (the snapshot size).
    pub attempted: usize,
    /// Deliveries that were enqueued.
    pub delivered: usize,
    /// Connections whose delivery failed and that were deregistered.
    pub pruned: Vec<ConnectionId>,
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

type GroupLinks<M> = HashMap<ConnectionId, Link<M>>;

/// Registry of live connections, keyed by group.
///
/// Safe to share behind an `Arc` across every session task. Locking is
/// per map shard, so groups do not contend with each other, and no lock
/// is held while delivering.
pub struct Hub<M> {
    groups: DashMap<GroupId, GroupLinks<M>>,
    config: HubConfig,
}

impl<M: Clone + Send + 'static> Hub<M> {
    /// Creates an empty hub.
    pub fn new(config: HubConfig) -> Self {
        Self {
            groups: DashMap::new(),
            config: config.validated(),
        }
    }

    /// The configuration in effect.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Creates a link sized by this hub's `outbound_capacity`.
    pub fn link(&self, id: ConnectionId, user_id: UserId) -> (Link<M>, LinkReceiver<M>) {
        Link::channel(id, user_id, self.config.outbound_capacity)
    }

    /// Adds `link` to `group`. Returns the group's connection count
    /// afterwards.
    ///
    /// The same user may hold several links in one group; each one
    /// receives every broadcast.
    pub fn register(&self, group: GroupId, link: Link<M>) -> usize {
        let conn_id = link.id();
        let user_id = link.user_id().clone();
        let mut links = self.groups.entry(group.clone()).or_default();
        links.insert(conn_id, link);
        let count = links.len();
        drop(links);

        info!(%group, %conn_id, %user_id, connections = count, "connection registered");
        count
    }

    /// Removes connection `id` from `group`.
    ///
    /// Idempotent: returns `false` if it was not registered. A group left
    /// with no connections is dropped.
    pub fn deregister(&self, group: &GroupId, id: ConnectionId) -> bool {
        let removed = match self.groups.get_mut(group) {
            Some(mut links) => links.remove(&id).is_some(),
            None => false,
        };
        self.groups.remove_if(group, |_, links| links.is_empty());

        if removed {
            info!(%group, conn_id = %id, "connection deregistered");
        }
        removed
    }

    /// Delivers `msg` to every connection registered under `group` at the
    /// time of the call.
    ///
    /// Exactly one non-blocking attempt is made per connection. A failed
    /// attempt deregisters that connection and is reported in
    /// [`BroadcastReport::pruned`]; it never stops delivery to the rest.
    pub fn broadcast(&self, group: &GroupId, msg: &M) -> BroadcastReport {
        let snapshot: Vec<Link<M>> = match self.groups.get(group) {
            Some(links) => links.values().cloned().collect(),
            None => return BroadcastReport::default(),
        };

        let mut report = BroadcastReport {
            attempted: snapshot.len(),
            ..BroadcastReport::default()
        };
        for link in snapshot {
            match link.try_deliver(msg.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(%group, conn_id = %link.id(), error = %e, "delivery failed, pruning");
                    self.deregister(group, link.id());
                    link.mark_pruned();
                    report.pruned.push(link.id());
                }
            }
        }

        debug!(
            %group,
            attempted = report.attempted,
            delivered = report.delivered,
            pruned = report.pruned.len(),
            "broadcast"
        );
        report
    }

    /// Number of connections registered under `group`.
    pub fn connection_count(&self, group: &GroupId) -> usize {
        self.groups.get(group).map_or(0, |links| links.len())
    }

    /// The connections a broadcast to `group` would target right now.
    pub fn recipients(&self, group: &GroupId) -> Vec<ConnectionId> {
        self.groups
            .get(group)
            .map(|links| links.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Returns `true` if connection `id` is registered under `group`.
    pub fn contains(&self, group: &GroupId, id: ConnectionId) -> bool {
        self.groups
            .get(group)
            .is_some_and(|links| links.contains_key(&id))
    }

    /// Number of groups with at least one connection.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl<M: Clone + Send + 'static> Default for Hub<M> {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
