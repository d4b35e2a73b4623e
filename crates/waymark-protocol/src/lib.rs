//! Wire protocol for Waymark.
//!
//! - **Types** ([`Fix`], [`InboundFix`], [`ServerMessage`], [`CloseReason`],
//!   ...): what members send, what the server pushes back, and the ids
//!   that tie them to users and groups.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes ↔ types.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (InboundFix / ServerMessage) → Session
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    CloseReason, Fix, GroupId, HistoryEntry, InboundFix, LocationBroadcast,
    MemberPosition, ServerMessage, UserId,
};
