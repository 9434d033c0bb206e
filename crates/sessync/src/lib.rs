//! # sessync
//!
//! Client-side session synchronization: a single-flight, interval-gated
//! cache of "who is the current user" that many independent parts of an
//! application observe and mutate around.
//!
//! The application builds one [`SessionFacade`] at startup and shares
//! clones of it. The facade:
//!
//! - deduplicates checks: concurrent callers share one network call, and
//!   calls within `min_check_interval` of the last check are answered
//!   from the cache
//! - never lets an ambiguous answer (a `401`, a timeout, a garbled body)
//!   erase an identity that carries a role
//! - pauses background checks while forms submit ([`SessionFacade::submit_scope`])
//! - broadcasts every change to listeners, isolated from each other's panics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sessync::prelude::*;
//!
//! # async fn run() -> Result<(), SessyncError> {
//! let session = SessionFacade::builder()
//!     .config(SessionConfig::from_env()?)
//!     .build(HttpFetcher::new("http://localhost:8080")?)?;
//!
//! let background = session.spawn_background_checks();
//! session.check_session(false).await;
//!
//! {
//!     let _submitting = session.submit_scope();
//!     // ... post the form; background checks are suppressed meanwhile
//! }
//!
//! background.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod background;
mod error;
mod facade;

pub use background::BackgroundChecks;
pub use error::SessyncError;
pub use facade::{LoginOutcome, SessionFacade, SessionFacadeBuilder};

pub use sessync_poll as poll;
pub use sessync_protocol as protocol;
pub use sessync_session as session;
pub use sessync_transport as transport;

/// Everything a typical consumer needs.
pub mod prelude {
    pub use crate::{BackgroundChecks, LoginOutcome, SessionFacade, SessionFacadeBuilder, SessyncError};
    pub use sessync_protocol::{Role, SessionInfo, SessionTokens, UserId, UserSession};
    pub use sessync_session::{
        FileStore, ListenerId, LocalStore, MemoryStore, Provenance, SessionConfig, SessionPhase,
        SessionSnapshot, SubmitScope,
    };
    #[cfg(feature = "http")]
    pub use sessync_transport::HttpFetcher;
    pub use sessync_transport::{FetchError, FetchOutcome, SessionFetcher};
}
