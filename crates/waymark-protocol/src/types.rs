//! Core protocol types for Waymark's wire format.
//!
//! Everything here travels on the wire or crosses a collaborator seam:
//! identifiers, position fixes, the messages the server pushes to
//! members, and the reasons a connection gets closed.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque, stable identifier of a user, as issued by the directory.
///
/// `#[serde(transparent)]` keeps it a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Creates a user id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a group whose members share live positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    /// Creates a group id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Fixes
// ---------------------------------------------------------------------------

/// One observed position of a user.
///
/// `timestamp` is seconds since the Unix epoch. The optional telemetry
/// fields ride along unchanged; nothing in the pipeline interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub user_id: UserId,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: f64,
    /// Horizontal accuracy in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Ground speed in meters per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Course over ground in degrees from true north.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Height above the WGS84 ellipsoid in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Fix {
    /// A fix with no optional telemetry.
    pub fn new(user_id: UserId, latitude: f64, longitude: f64, timestamp: f64) -> Self {
        Self {
            user_id,
            latitude,
            longitude,
            timestamp,
            accuracy: None,
            speed: None,
            heading: None,
            altitude: None,
        }
    }
}

/// Client → Server: one position report.
///
/// The sender's identity is not part of the message; it comes from the
/// session that received it. `timestamp` may be omitted, in which case
/// the server stamps its own receive time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundFix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
}

impl InboundFix {
    /// Checks that coordinates are finite and on the globe and that any
    /// provided timestamp is a finite, non-negative number.
    ///
    /// # Errors
    /// [`ProtocolError::Violation`] naming the offending field.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ProtocolError::Violation(format!(
                "latitude {} is outside -90..=90",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ProtocolError::Violation(format!(
                "longitude {} is outside -180..=180",
                self.longitude
            )));
        }
        for (name, value) in [
            ("accuracy", self.accuracy),
            ("speed", self.speed),
            ("heading", self.heading),
            ("altitude", self.altitude),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(ProtocolError::Violation(format!("{name} is not a finite number")));
            }
        }
        if let Some(ts) = self.timestamp {
            if !ts.is_finite() || ts < 0.0 {
                return Err(ProtocolError::Violation(format!(
                    "timestamp {ts} is not a valid epoch time"
                )));
            }
        }
        Ok(())
    }

    /// Binds this report to its sender, stamping `received_at` when the
    /// client did not supply a timestamp.
    pub fn into_fix(self, user_id: UserId, received_at: f64) -> Fix {
        Fix {
            user_id,
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: self.timestamp.unwrap_or(received_at),
            accuracy: self.accuracy,
            speed: self.speed,
            heading: self.heading,
            altitude: self.altitude,
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// A live position update fanned out to every member of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationBroadcast {
    pub user_id: UserId,
    pub user_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: f64,
}

impl LocationBroadcast {
    /// Builds the broadcast for an accepted fix from `user_name`.
    pub fn from_fix(fix: &Fix, user_name: impl Into<String>) -> Self {
        Self {
            user_id: fix.user_id.clone(),
            user_name: user_name.into(),
            latitude: fix.latitude,
            longitude: fix.longitude,
            timestamp: fix.timestamp,
        }
    }
}

/// Messages the server pushes down a live connection.
///
/// Internally tagged, so a location update reads
/// `{ "type": "location_update", "user_id": ..., ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after admission: the session is registered and will
    /// receive the group's updates from now on.
    SessionReady { user_id: UserId, group_id: GroupId },

    /// A group member's position.
    LocationUpdate(LocationBroadcast),

    /// Something the member should know about but that does not end the
    /// session, e.g. `persistence_failure`.
    Notice { code: String, message: String },
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// One entry of a user's recorded history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: f64,
}

impl From<&Fix> for HistoryEntry {
    fn from(fix: &Fix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            timestamp: fix.timestamp,
        }
    }
}

/// A group member's last known position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberPosition {
    pub user_id: UserId,
    pub user_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: f64,
}

// ---------------------------------------------------------------------------
// Close reasons
// ---------------------------------------------------------------------------

/// Why the server closed a connection.
///
/// Each reason maps to its own WebSocket close code so clients can tell
/// "retry with fresh credentials" apart from "your message was invalid"
/// and "you are not allowed in this group".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The peer went away or the session ended normally.
    Normal,
    /// Missing, malformed, expired, or unknown credential.
    Unauthenticated,
    /// Valid credential, but inactive account or not a group member.
    Forbidden,
    /// The peer sent a message the server could not accept.
    ProtocolViolation,
    /// A collaborator needed for admission was unreachable; retry later.
    Unavailable,
    /// The client fell behind on broadcasts and was dropped from its
    /// group; reconnect to resume.
    Lagged,
}

impl CloseReason {
    /// The WebSocket close code sent with this reason.
    pub fn code(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::ProtocolViolation => 4400,
            Self::Unauthenticated => 4401,
            Self::Forbidden => 4403,
            Self::Unavailable => 4503,
            Self::Lagged => 4429,
        }
    }

    /// The reason text sent alongside the close code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::ProtocolViolation => "protocol_violation",
            Self::Unavailable => "unavailable",
            Self::Lagged => "lagged",
        }
    }

    /// Maps a received close code back to a reason.
    pub fn from_code(code: u16) -> Option<Self> {
        [
            Self::Normal,
            Self::Unauthenticated,
            Self::Forbidden,
            Self::ProtocolViolation,
            Self::Unavailable,
            Self::Lagged,
        ]
        .into_iter()
        .find(|reason| reason.code() == code)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The JSON shapes here are what mobile clients parse; a serde
    //! attribute drifting breaks them silently, so pin the shapes.

    use super::*;

    fn inbound(latitude: f64, longitude: f64) -> InboundFix {
        InboundFix {
            latitude,
            longitude,
            timestamp: Some(1000.0),
            accuracy: None,
            speed: None,
            heading: None,
            altitude: None,
        }
    }

    #[test]
    fn test_user_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::new("u-1")).unwrap();
        assert_eq!(json, "\"u-1\"");
    }

    #[test]
    fn test_location_update_json_format() {
        let msg = ServerMessage::LocationUpdate(LocationBroadcast {
            user_id: UserId::new("u-1"),
            user_name: "Ana".into(),
            latitude: -23.5,
            longitude: -46.6,
            timestamp: 1000.0,
        });
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "location_update");
        assert_eq!(json["user_id"], "u-1");
        assert_eq!(json["user_name"], "Ana");
        assert_eq!(json["latitude"], -23.5);
        assert_eq!(json["longitude"], -46.6);
        assert_eq!(json["timestamp"], 1000.0);
    }

    #[test]
    fn test_session_ready_json_format() {
        let msg = ServerMessage::SessionReady {
            user_id: UserId::new("u-1"),
            group_id: GroupId::new("g-1"),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "session_ready");
        assert_eq!(json["group_id"], "g-1");
    }

    #[test]
    fn test_notice_json_format() {
        let msg = ServerMessage::Notice {
            code: "persistence_failure".into(),
            message: "log unavailable".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "notice");
        assert_eq!(json["code"], "persistence_failure");
    }

    #[test]
    fn test_fix_omits_absent_telemetry() {
        let fix = Fix::new(UserId::new("u"), 1.0, 2.0, 3.0);
        let json: serde_json::Value = serde_json::to_value(&fix).unwrap();
        assert!(json.get("accuracy").is_none());
        assert!(json.get("speed").is_none());
        assert!(json.get("altitude").is_none());
    }

    #[test]
    fn test_inbound_fix_altitude_carries_into_fix() {
        let report: InboundFix =
            serde_json::from_str(r#"{"latitude":1.0,"longitude":2.0,"altitude":760.5}"#).unwrap();
        assert!(report.validate().is_ok());

        let fix = report.into_fix(UserId::new("u"), 5.0);
        assert_eq!(fix.altitude, Some(760.5));
        let json: serde_json::Value = serde_json::to_value(&fix).unwrap();
        assert_eq!(json["altitude"], 760.5);
    }

    #[test]
    fn test_validate_accepts_poles_and_antimeridian() {
        assert!(inbound(90.0, 180.0).validate().is_ok());
        assert!(inbound(-90.0, -180.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_longitude() {
        let err = inbound(0.0, 180.5).validate().unwrap_err();
        assert!(err.to_string().contains("longitude"));
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        assert!(inbound(f64::NAN, 0.0).validate().is_err());
        assert!(inbound(0.0, f64::INFINITY).validate().is_err());

        let mut fix = inbound(0.0, 0.0);
        fix.timestamp = Some(f64::NAN);
        assert!(fix.validate().is_err());

        let mut fix = inbound(0.0, 0.0);
        fix.altitude = Some(f64::INFINITY);
        assert!(fix.validate().unwrap_err().to_string().contains("altitude"));
    }

    #[test]
    fn test_validate_rejects_negative_timestamp() {
        let mut fix = inbound(0.0, 0.0);
        fix.timestamp = Some(-1.0);
        assert!(fix.validate().is_err());
    }

    #[test]
    fn test_into_fix_stamps_receive_time_when_missing() {
        let mut report = inbound(1.0, 2.0);
        report.timestamp = None;
        let fix = report.into_fix(UserId::new("u"), 42.0);
        assert_eq!(fix.timestamp, 42.0);
    }

    #[test]
    fn test_into_fix_keeps_client_timestamp() {
        let fix = inbound(1.0, 2.0).into_fix(UserId::new("u"), 42.0);
        assert_eq!(fix.timestamp, 1000.0);
        assert_eq!(fix.user_id, UserId::new("u"));
    }

    #[test]
    fn test_close_reason_codes_are_distinct() {
        let codes = [
            CloseReason::Unauthenticated.code(),
            CloseReason::Forbidden.code(),
            CloseReason::ProtocolViolation.code(),
            CloseReason::Unavailable.code(),
            CloseReason::Lagged.code(),
            CloseReason::Normal.code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn test_close_reason_from_code() {
        assert_eq!(CloseReason::from_code(4401), Some(CloseReason::Unauthenticated));
        assert_eq!(CloseReason::from_code(4403), Some(CloseReason::Forbidden));
        assert_eq!(CloseReason::from_code(4429), Some(CloseReason::Lagged));
        assert_eq!(CloseReason::from_code(1234), None);
    }

    #[test]
    fn test_close_reason_text() {
        assert_eq!(CloseReason::Forbidden.to_string(), "forbidden");
        assert_eq!(CloseReason::ProtocolViolation.as_str(), "protocol_violation");
    }
}
