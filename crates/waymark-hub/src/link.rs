//! Outbound links: the hub's handle on one live connection.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc};
use waymark_protocol::UserId;
use waymark_transport::ConnectionId;

use crate::DeliveryError;

/// Channel receiver paired with a [`Link`]; drained by the connection's
/// writer task.
pub type LinkReceiver<M> = mpsc::Receiver<M>;

/// Sending half of one connection's bounded outbound buffer.
///
/// Cheap to clone. Delivery never waits: a full or closed buffer is
/// reported immediately so the hub can prune the link. Clones share one
/// prune signal, so the session owning the connection learns when the hub
/// dropped it.
pub struct Link<M> {
    id: ConnectionId,
    user_id: UserId,
    sender: mpsc::Sender<M>,
    pruned: Arc<Notify>,
}

impl<M> Link<M> {
    /// Wraps an existing sender.
    pub fn new(id: ConnectionId, user_id: UserId, sender: mpsc::Sender<M>) -> Self {
        Self {
            id,
            user_id,
            sender,
            pruned: Arc::new(Notify::new()),
        }
    }

    /// Creates a link and the receiver its writer task drains.
    ///
    /// `capacity` is clamped to at least 1.
    pub fn channel(
        id: ConnectionId,
        user_id: UserId,
        capacity: usize,
    ) -> (Self, LinkReceiver<M>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, user_id, tx), rx)
    }

    /// The connection this link delivers to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The user that connection belongs to.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns `true` once the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Completes once the hub has pruned this link after a failed
    /// delivery. A prune that happened before the call is not lost.
    pub async fn pruned(&self) {
        self.pruned.notified().await;
    }

    pub(crate) fn mark_pruned(&self) {
        self.pruned.notify_one();
    }

    /// Enqueues `msg` without waiting.
    ///
    /// # Errors
    /// [`DeliveryError::Full`] if the outbound buffer is at capacity,
    /// [`DeliveryError::Closed`] if the connection's writer has stopped.
    pub fn try_deliver(&self, msg: M) -> Result<(), DeliveryError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full(self.id),
            TrySendError::Closed(_) => DeliveryError::Closed(self.id),
        })
    }
}

impl<M> Clone for Link<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            user_id: self.user_id.clone(),
            sender: self.sender.clone(),
            pruned: Arc::clone(&self.pruned),
        }
    }
}

impl<M> std::fmt::Debug for Link<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
