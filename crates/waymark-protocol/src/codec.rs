//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The session layer only needs something that implements [`Codec`];
//! [`JsonCodec`] is the wire format clients speak today.

use serde::{Serialize, de::DeserializeOwned};

use crate::{InboundFix, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes and validates one inbound position message.
    ///
    /// # Errors
    /// Any decode failure or [`InboundFix::validate`] failure.
    fn decode_fix(&self, data: &[u8]) -> Result<InboundFix, ProtocolError> {
        let fix: InboundFix = self.decode(data)?;
        fix.validate()?;
        Ok(fix)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use waymark_protocol::{Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let fix = codec
///     .decode_fix(br#"{"latitude": -23.5, "longitude": -46.6, "timestamp": 1000.0}"#)
///     .unwrap();
/// assert_eq!(fix.latitude, -23.5);
///
/// assert!(codec.decode_fix(br#"{"latitude": "north"}"#).is_err());
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fix_missing_longitude_is_rejected() {
        let err = JsonCodec
            .decode_fix(br#"{"latitude": 1.0, "timestamp": 5.0}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
        assert!(err.is_peer_fault());
    }

    #[test]
    fn test_decode_fix_string_coordinate_is_rejected() {
        let err = JsonCodec
            .decode_fix(br#"{"latitude": "1.0", "longitude": 2.0}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_decode_fix_out_of_range_is_violation() {
        let err = JsonCodec
            .decode_fix(br#"{"latitude": 91.0, "longitude": 2.0}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Violation(_)));
    }

    #[test]
    fn test_decode_fix_garbage_is_rejected() {
        assert!(JsonCodec.decode_fix(b"not json at all").is_err());
    }

    #[test]
    fn test_decode_fix_accepts_optional_telemetry() {
        let fix = JsonCodec
            .decode_fix(
                br#"{"latitude": 1.0, "longitude": 2.0, "accuracy": 4.5, "speed": 1.2, "heading": 90.0}"#,
            )
            .unwrap();
        assert_eq!(fix.accuracy, Some(4.5));
        assert_eq!(fix.timestamp, None);
    }
}
