//! Session state core for sessync.
//!
//! Everything here is synchronous and I/O-free except [`FileStore`]:
//!
//! 1. **Cache**: the session record plus the gating and merge rules
//!    ([`SessionCache`])
//! 2. **Listeners**: ordered, panic-isolated change notification
//!    ([`ListenerRegistry`])
//! 3. **Guard**: suppression of background checks during form
//!    submissions and open modals ([`SubmissionGuard`])
//! 4. **Storage**: local persistence of the last known identity
//!    ([`LocalStore`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade (above)        ← owns the fetcher, drives check cycles, broadcasts
//!     ↕
//! Session core (this crate)  ← decides when to check and how to merge
//!     ↕
//! Protocol (below)      ← UserSession, SessionInfo wire types
//! ```
//!
//! # Failure model
//!
//! Nothing in the check cycle returns an error. Transport failures and
//! malformed answers become [`CheckOutcome::Indeterminate`], which never
//! clears a user holding a role.

mod cache;
mod config;
mod error;
mod guard;
mod listeners;
mod state;
mod storage;

pub use cache::{Applied, CheckOutcome, Gate, SessionCache, SkipReason};
pub use config::SessionConfig;
pub use error::{SessionError, StorageError};
pub use guard::{SubmissionGuard, SubmitScope};
pub use listeners::{Listener, ListenerId, ListenerRegistry};
pub use state::{Provenance, SessionPhase, SessionSnapshot, SessionState};
pub use storage::{FileStore, LocalStore, MemoryStore, keys};
