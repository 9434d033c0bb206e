//! Error types for the session layer.
//!
//! The session core itself never fails: checks, logins and clears absorb
//! every failure (see the crate docs). Errors only come out of
//! configuration parsing and the [`LocalStore`](crate::LocalStore)
//! backends, and the facade logs and swallows the latter.

/// Errors raised while building the session layer.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A configuration value could not be parsed.
    #[error("invalid config {key}: {reason}")]
    Config { key: String, reason: String },
}

/// Errors raised by a [`LocalStore`](crate::LocalStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file is not a JSON object.
    #[error("storage file is corrupt: {0}")]
    Format(#[from] serde_json::Error),
}
