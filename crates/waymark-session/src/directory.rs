//! The user and group directory, as seen by the core.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use waymark_protocol::{GroupId, UserId};

use crate::{DirectoryError, Identity};

/// Read-only view of users and group memberships.
///
/// The core never writes to the directory and never caches its answers:
/// every admission asks again, so a removed member cannot open a new
/// session.
pub trait Directory: Send + Sync + 'static {
    /// Looks up a user. `Ok(None)` means the user does not exist.
    fn user(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Option<Identity>, DirectoryError>> + Send;

    /// Whether `user_id` is currently a member of `group`.
    fn is_member(
        &self,
        group: &GroupId,
        user_id: &UserId,
    ) -> impl Future<Output = Result<bool, DirectoryError>> + Send;

    /// Every member of `group`, active or not.
    fn members(
        &self,
        group: &GroupId,
    ) -> impl Future<Output = Result<Vec<Identity>, DirectoryError>> + Send;
}

impl<D: Directory> Directory for Arc<D> {
    async fn user(&self, user_id: &UserId) -> Result<Option<Identity>, DirectoryError> {
        (**self).user(user_id).await
    }

    async fn is_member(&self, group: &GroupId, user_id: &UserId) -> Result<bool, DirectoryError> {
        (**self).is_member(group, user_id).await
    }

    async fn members(&self, group: &GroupId) -> Result<Vec<Identity>, DirectoryError> {
        (**self).members(group).await
    }
}

/// In-process [`Directory`] for tests and the demo server.
#[derive(Default)]
pub struct MemoryDirectory {
    users: DashMap<UserId, Identity>,
    groups: DashMap<GroupId, HashSet<UserId>>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub fn add_user(&self, identity: Identity) {
        self.users.insert(identity.user_id.clone(), identity);
    }

    /// Activates or deactivates a user. Returns `false` for unknown users.
    pub fn set_active(&self, user_id: &UserId, active: bool) -> bool {
        match self.users.get_mut(user_id) {
            Some(mut identity) => {
                identity.active = active;
                true
            }
            None => false,
        }
    }

    /// Makes `user_id` a member of `group`.
    pub fn add_member(&self, group: GroupId, user_id: UserId) {
        self.groups.entry(group).or_default().insert(user_id);
    }

    /// Removes `user_id` from `group`. Returns whether it was a member.
    pub fn remove_member(&self, group: &GroupId, user_id: &UserId) -> bool {
        self.groups
            .get_mut(group)
            .is_some_and(|mut members| members.remove(user_id))
    }
}

impl Directory for MemoryDirectory {
    async fn user(&self, user_id: &UserId) -> Result<Option<Identity>, DirectoryError> {
        Ok(self.users.get(user_id).map(|identity| identity.clone()))
    }

    async fn is_member(&self, group: &GroupId, user_id: &UserId) -> Result<bool, DirectoryError> {
        Ok(self
            .groups
            .get(group)
            .is_some_and(|members| members.contains(user_id)))
    }

    async fn members(&self, group: &GroupId) -> Result<Vec<Identity>, DirectoryError> {
        let ids: Vec<UserId> = match self.groups.get(group) {
            Some(members) => members.iter().cloned().collect(),
            None => return Ok(Vec::new()),
        };
        let mut members: Vec<Identity> = ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|identity| identity.clone()))
            .collect();
        members.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(members)
    }
}
