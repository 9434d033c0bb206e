//! Codec trait and implementations for backend payloads.
//!
//! A "codec" converts between Rust types and raw bytes. The session core
//! doesn't care how the backend serializes its answers; it only needs
//! something that implements [`Codec`]. Today that is [`JsonCodec`],
//! because every `/api/auth/*` endpoint speaks JSON.

use serde::{Serialize, de::DeserializeOwned};

use crate::{ApiEnvelope, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec lives inside the HTTP
/// fetcher, which is shared by every task that checks the session.
///
/// `DeserializeOwned` (vs plain `Deserialize`) means the decoded value
/// owns its data, so the response buffer can be dropped right after.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// Decodes a backend body that may or may not be wrapped in an
/// [`ApiEnvelope`], returning the inner payload.
///
/// # Errors
/// - `ProtocolError::Decode`: the body is not valid for either shape
/// - `ProtocolError::Rejected`: wrapped with `success: false`
/// - `ProtocolError::InvalidMessage`: wrapped success without `data`
pub fn decode_api<T, C>(codec: &C, data: &[u8]) -> Result<T, ProtocolError>
where
    T: DeserializeOwned,
    C: Codec,
{
    codec.decode::<ApiEnvelope<T>>(data)?.into_data()
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use sessync_protocol::{Codec, JsonCodec, UserSession, decode_api};
///
/// let codec = JsonCodec;
/// let body = br#"{"success":true,"data":{"id":7,"role":"ADMIN"}}"#;
///
/// let user: UserSession = decode_api(&codec, body).unwrap();
/// assert_eq!(user.role.as_deref(), Some("ADMIN"));
///
/// let bytes = codec.encode(&user).unwrap();
/// let again: UserSession = codec.decode(&bytes).unwrap();
/// assert_eq!(user, again);
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
