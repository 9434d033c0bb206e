//! Unified error type for sessync.

use sessync_protocol::ProtocolError;
use sessync_session::{SessionError, StorageError};
use sessync_transport::FetchError;

/// Top-level error that wraps every crate-specific error.
///
/// Only construction and the background-check handle return it; the
/// session operations themselves absorb every failure.
#[derive(Debug, thiserror::Error)]
pub enum SessyncError {
    /// Talking to the backend failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A body could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Configuration was invalid.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The local store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The background check task is gone.
    #[error("background session checks have stopped")]
    BackgroundStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fetch_error() {
        let err = FetchError::Status(502);
        let sessync_err: SessyncError = err.into();
        assert!(matches!(sessync_err, SessyncError::Fetch(_)));
        assert!(sessync_err.to_string().contains("502"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let sessync_err: SessyncError = err.into();
        assert!(matches!(sessync_err, SessyncError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::Config {
            key: "SESSYNC_POLL_JITTER_MS".into(),
            reason: "soon".into(),
        };
        let sessync_err: SessyncError = err.into();
        assert!(matches!(sessync_err, SessyncError::Session(_)));
        assert!(sessync_err.to_string().contains("SESSYNC_POLL_JITTER_MS"));
    }

    #[test]
    fn test_from_storage_error() {
        let err = StorageError::Io(std::io::Error::other("disk full"));
        let sessync_err: SessyncError = err.into();
        assert!(matches!(sessync_err, SessyncError::Storage(_)));
    }
}
