//! Per-connection streaming session.
//!
//! Each accepted connection gets its own Tokio task running
//! [`run_session`], an explicit state machine:
//!
//! ```text
//! Connecting ──admitted──→ Active ──peer left / bad message──→ Closing
//!     │                                                          ▲
//!     └──────────────── refused / timed out ─────────────────────┘
//! ```
//!
//! - **Connecting**: finish the WebSocket handshake, read the credential
//!   and `group_id` the client connected with, and run the authenticator.
//!   Handshake and authentication share one admission deadline.
//! - **Active**: queue `session_ready` on a fresh outbound link (drained
//!   by a writer task), register the link with the hub, then process one
//!   inbound fix at a time, in arrival order. If the hub prunes the link
//!   because the client fell behind, the session closes as `lagged`.
//! - **Closing**: deregister, stop the writer, and close the socket with
//!   the reason's close code. Terminal.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use waymark_hub::{Link, LinkReceiver};
use waymark_protocol::{CloseReason, Codec, GroupId, ServerMessage};
use waymark_session::{Authenticator, Directory, Identity};
use waymark_store::{LocationLog, PositionCache};
use waymark_transport::{
    Connection, ConnectionId, Incoming, IncomingWebSocket, WebSocketConnection,
};

use crate::server::ServerState;
use crate::tracker::{Frame, Persistence};

/// Notice code sent when a fix could not be recorded durably.
pub const PERSISTENCE_FAILURE: &str = "persistence_failure";

/// How long Closing waits for the writer to flush queued messages, and
/// then for the close frame to go out.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Bound on an admission deadline that would overflow the clock.
const MAX_ADMISSION_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// A connection that passed admission and is registered with the hub.
struct Registration {
    identity: Identity,
    group: GroupId,
    link: Link<Frame>,
    writer: JoinHandle<()>,
}

enum SessionState {
    Connecting,
    Active(Identity, GroupId),
    Closing {
        reason: CloseReason,
        registration: Option<Registration>,
    },
}

/// Drives one connection from accept to close.
pub(crate) async fn run_session<A, D, P, L>(
    incoming: IncomingWebSocket,
    state: Arc<ServerState<A, D, P, L>>,
) where
    A: Authenticator,
    D: Directory,
    P: PositionCache,
    L: LocationLog,
{
    let conn_id = incoming.id();
    let peer = incoming.peer();
    let now = Instant::now();
    let deadline = now
        .checked_add(state.config.admission_timeout)
        .unwrap_or(now + MAX_ADMISSION_WAIT);

    let conn = match tokio::time::timeout_at(deadline, incoming.upgrade()).await {
        Ok(Ok(conn)) => Arc::new(conn),
        Ok(Err(e)) => {
            debug!(%conn_id, %peer, error = %e, "handshake failed");
            return;
        }
        Err(_) => {
            info!(%conn_id, %peer, "handshake timed out, dropping connection");
            return;
        }
    };
    debug!(%conn_id, "handling new connection");

    let mut session = SessionState::Connecting;
    loop {
        session = match session {
            SessionState::Connecting => admit(&conn, &state, deadline).await,
            SessionState::Active(identity, group) => {
                let registration = activate(&conn, &state, identity, group);
                let reason = receive_loop(&conn, &state, &registration).await;
                SessionState::Closing {
                    reason,
                    registration: Some(registration),
                }
            }
            SessionState::Closing {
                reason,
                registration,
            } => {
                close(&conn, &state, reason, registration).await;
                break;
            }
        };
    }
}

/// Connecting: decide who this is and whether they may join the group.
async fn admit<A, D, P, L>(
    conn: &WebSocketConnection,
    state: &ServerState<A, D, P, L>,
    deadline: Instant,
) -> SessionState
where
    A: Authenticator,
    D: Directory,
    P: PositionCache,
    L: LocationLog,
{
    let conn_id = conn.id();
    let info = conn.connect_info();

    let Some(group) = info.param("group_id").map(GroupId::new) else {
        info!(%conn_id, "connection refused: no group_id");
        return refused(CloseReason::ProtocolViolation);
    };

    let admission =
        tokio::time::timeout_at(deadline, state.auth.authenticate(info.credential(), &group))
            .await;

    match admission {
        Ok(Ok(identity)) => {
            info!(%conn_id, user_id = %identity.user_id, %group, "member admitted");
            SessionState::Active(identity, group)
        }
        Ok(Err(e)) => {
            info!(%conn_id, %group, error = %e, "connection refused");
            refused(e.close_reason())
        }
        Err(_) => {
            warn!(%conn_id, %group, "admission timed out");
            refused(CloseReason::Unavailable)
        }
    }
}

fn refused(reason: CloseReason) -> SessionState {
    SessionState::Closing {
        reason,
        registration: None,
    }
}

/// Active, setup half: start the writer and join the group's fan-out.
fn activate<A, D, P, L>(
    conn: &Arc<WebSocketConnection>,
    state: &ServerState<A, D, P, L>,
    identity: Identity,
    group: GroupId,
) -> Registration
where
    A: Authenticator,
    D: Directory,
    P: PositionCache,
    L: LocationLog,
{
    let hub = state.tracker.hub();
    let (link, rx) = hub.link(conn.id(), identity.user_id.clone());
    let writer = tokio::spawn(write_outbound(Arc::clone(conn), rx));

    let registration = Registration {
        identity,
        group,
        link,
        writer,
    };
    // Queued before registering so it is always the first message out.
    let ready = ServerMessage::SessionReady {
        user_id: registration.identity.user_id.clone(),
        group_id: registration.group.clone(),
    };
    deliver_own(state, &registration, &ready);
    hub.register(registration.group.clone(), registration.link.clone());
    registration
}

/// Active, steady state: one inbound fix at a time until the peer leaves,
/// breaks protocol, or is pruned from the hub.
async fn receive_loop<A, D, P, L>(
    conn: &WebSocketConnection,
    state: &ServerState<A, D, P, L>,
    registration: &Registration,
) -> CloseReason
where
    A: Authenticator,
    D: Directory,
    P: PositionCache,
    L: LocationLog,
{
    let conn_id = conn.id();
    let user_id = &registration.identity.user_id;

    loop {
        let received = tokio::select! {
            received = conn.recv() => received,
            () = registration.link.pruned() => {
                info!(%conn_id, %user_id, "dropped by the hub for falling behind");
                return CloseReason::Lagged;
            }
        };
        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                info!(%conn_id, %user_id, "connection closed by peer");
                return CloseReason::Normal;
            }
            Err(e) => {
                debug!(%conn_id, %user_id, error = %e, "recv failed");
                return CloseReason::Normal;
            }
        };

        let inbound = match state.codec.decode_fix(&data) {
            Ok(inbound) => inbound,
            Err(e) => {
                info!(%conn_id, %user_id, error = %e, "protocol violation");
                return CloseReason::ProtocolViolation;
            }
        };

        let fix = inbound.into_fix(user_id.clone(), unix_now());
        let outcome = state
            .tracker
            .ingest(&registration.identity, &registration.group, fix)
            .await;

        if let Persistence::Failed(e) = outcome.persistence {
            let notice = ServerMessage::Notice {
                code: PERSISTENCE_FAILURE.to_string(),
                message: e.to_string(),
            };
            deliver_own(state, registration, &notice);
        }
    }
}

/// Closing: leave the hub, let the writer drain, close the socket.
async fn close<A, D, P, L>(
    conn: &WebSocketConnection,
    state: &ServerState<A, D, P, L>,
    reason: CloseReason,
    registration: Option<Registration>,
) where
    A: Authenticator,
    D: Directory,
    P: PositionCache,
    L: LocationLog,
{
    let conn_id = conn.id();

    if let Some(Registration {
        group,
        link,
        mut writer,
        ..
    }) = registration
    {
        state.tracker.hub().deregister(&group, conn_id);
        // Last sender gone: the writer sees the channel close once it has
        // flushed what is queued.
        drop(link);
        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
            .await
            .is_err()
        {
            writer.abort();
        }
    }

    match tokio::time::timeout(
        WRITER_DRAIN_TIMEOUT,
        conn.close(reason.code(), reason.as_str()),
    )
    .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(%conn_id, error = %e, "close frame not sent"),
        Err(_) => debug!(%conn_id, "close frame timed out"),
    }
    info!(%conn_id, %reason, "session closed");
}

/// Drains a connection's outbound buffer onto the socket.
async fn write_outbound(conn: Arc<WebSocketConnection>, mut rx: LinkReceiver<Frame>) {
    let conn_id: ConnectionId = conn.id();
    while let Some(frame) = rx.recv().await {
        if let Err(e) = conn.send(&frame).await {
            debug!(%conn_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}

/// Queues a message for this session's own client only.
fn deliver_own<A, D, P, L>(
    state: &ServerState<A, D, P, L>,
    registration: &Registration,
    msg: &ServerMessage,
) where
    A: Authenticator,
    D: Directory,
    P: PositionCache,
    L: LocationLog,
{
    let conn_id = registration.link.id();
    match state.tracker.encode(msg) {
        Ok(frame) => {
            if let Err(e) = registration.link.try_deliver(frame) {
                debug!(%conn_id, error = %e, "could not queue message for own client");
            }
        }
        Err(e) => warn!(%conn_id, error = %e, "failed to encode message"),
    }
}

/// Seconds since the Unix epoch, for fixes sent without a timestamp.
fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}
