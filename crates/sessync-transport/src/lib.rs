//! Backend access layer for sessync.
//!
//! Provides the [`SessionFetcher`] trait, the interface through which the
//! session core reaches the authentication backend, and an HTTP
//! implementation of it.
//!
//! # Feature Flags
//!
//! - `http` (default): [`HttpFetcher`] via `reqwest`, with a cookie store
//!   so the backend's session cookie rides along on every call

mod error;
#[cfg(feature = "http")]
mod http;

pub use error::FetchError;
#[cfg(feature = "http")]
pub use http::{Endpoints, HttpFetcher};

use std::future::Future;

use sessync_protocol::{LoginRequest, LoginResponse, SessionInfo, UserSession};

/// The definitive answers `/api/auth/current-user` can give.
///
/// Anything else (transport failure, 5xx, garbage body) is a
/// [`FetchError`] and is treated as ambiguous by the session core.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// `200` with a user payload.
    Authenticated(UserSession),
    /// `401`: the backend does not see a session for this client.
    Unauthenticated,
}

/// Performs the network calls the session core depends on.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` because the fetcher lives inside the session
/// facade for the whole process and is called from whatever task happens
/// to run a check. The returned futures are `Send` so an in-flight check
/// can be shared between tasks.
///
/// # Example
///
/// ```rust
/// use sessync_protocol::{LoginRequest, LoginResponse, SessionInfo, UserSession};
/// use sessync_transport::{FetchError, FetchOutcome, SessionFetcher};
///
/// /// Always logged in as the same administrator. Useful offline.
/// struct FixedFetcher;
///
/// impl SessionFetcher for FixedFetcher {
///     async fn current_user(&self) -> Result<FetchOutcome, FetchError> {
///         Ok(FetchOutcome::Authenticated(UserSession::new(1).with_role("ADMIN")))
///     }
///     async fn session_info(&self) -> Result<Option<SessionInfo>, FetchError> {
///         Ok(None)
///     }
///     async fn logout(&self) -> Result<(), FetchError> {
///         Ok(())
///     }
///     async fn clear_session(&self) -> Result<(), FetchError> {
///         Ok(())
///     }
///     async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse, FetchError> {
///         Err(FetchError::Unavailable("read-only".into()))
///     }
///     async fn confirm_duplicate_login(
///         &self,
///         _request: &LoginRequest,
///     ) -> Result<LoginResponse, FetchError> {
///         Err(FetchError::Unavailable("read-only".into()))
///     }
/// }
/// ```
pub trait SessionFetcher: Send + Sync + 'static {
    /// `GET /api/auth/current-user`.
    fn current_user(&self) -> impl Future<Output = Result<FetchOutcome, FetchError>> + Send;

    /// `GET /api/auth/session-info`. `Ok(None)` when the backend has
    /// nothing to say.
    fn session_info(&self) -> impl Future<Output = Result<Option<SessionInfo>, FetchError>> + Send;

    /// `POST /api/auth/logout`. Response body is ignored.
    fn logout(&self) -> impl Future<Output = Result<(), FetchError>> + Send;

    /// `POST /api/auth/clear-session`. Response body is ignored.
    fn clear_session(&self) -> impl Future<Output = Result<(), FetchError>> + Send;

    /// `POST /api/auth/login`.
    ///
    /// A rejected login is `Ok` with `success: false`; `Err` means no
    /// usable answer arrived.
    fn login(
        &self,
        request: &LoginRequest,
    ) -> impl Future<Output = Result<LoginResponse, FetchError>> + Send;

    /// `POST /api/auth/confirm-duplicate-login`: log in again, terminating
    /// the session the account holds elsewhere.
    fn confirm_duplicate_login(
        &self,
        request: &LoginRequest,
    ) -> impl Future<Output = Result<LoginResponse, FetchError>> + Send;
}
