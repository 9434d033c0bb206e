//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding backend payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, wrong field types, or a
    /// body that matches neither the wrapped nor the bare shape.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The backend wrapped the body in an envelope with `success: false`.
    ///
    /// Carries the backend's message when it sent one.
    #[error("backend rejected the request: {}", .0.as_deref().unwrap_or("no message"))]
    Rejected(Option<String>),

    /// The body decoded, but violates a protocol rule (for example a
    /// successful envelope without its `data` field).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
