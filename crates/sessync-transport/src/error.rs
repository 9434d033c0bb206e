use sessync_protocol::ProtocolError;

/// Errors that can occur while talking to the session backend.
///
/// Every variant is "indeterminate" from the session core's point of view:
/// none of them proves the user is logged out. A clean `401` is not an
/// error at all, it is [`FetchOutcome::Unauthenticated`](crate::FetchOutcome).
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, TLS, reset).
    #[cfg(feature = "http")]
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a status the endpoint doesn't define.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The body could not be decoded into the expected record.
    #[error("malformed response: {0}")]
    Protocol(#[from] ProtocolError),

    /// A base URL or endpoint path did not form a valid URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The backend could not be reached through a non-HTTP fetcher.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}
