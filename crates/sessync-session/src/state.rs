//! Session state types: the single mutable record and the snapshots
//! broadcast to listeners.

use sessync_protocol::{SessionInfo, UserSession};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Where the current identity came from.
///
/// Consumers that need strict confirmation (a security-sensitive
/// permission check, say) can refuse to act on an `Optimistic` identity
/// until a network check has confirmed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Confirmed (or cleared) by `/api/auth/current-user`.
    Network,
    /// Asserted locally by `set_user`/`login`, not yet confirmed.
    Optimistic,
    /// Produced by a local clear (`logout`, `force_clear_session`), or the
    /// initial empty state.
    Local,
}

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// The state machine seen by consumers.
///
/// ```text
///            check_session           success / ambiguous
///   Unknown ───────────────→ Checking ───────────────→ Authenticated
///      │                         │                         │
///      │ set_user                └──── 401 / no role ────→ Anonymous
///      └──────────────→ Authenticated                      ↑
///                            └──── logout / force clear ───┘
/// ```
///
/// `Checking` always resolves: the end of a check runs on every path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unknown,
    Checking,
    Authenticated,
    Anonymous,
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The process-wide session record.
///
/// Owned by the [`SessionCache`](crate::SessionCache); the submission
/// depth lives in the [`SubmissionGuard`](crate::SubmissionGuard).
#[derive(Debug, Clone)]
pub struct SessionState {
    pub user: Option<UserSession>,
    pub session_info: Option<SessionInfo>,
    pub is_loading: bool,
    /// End of the last completed check. `None` means never checked (or
    /// reset by a forced clear).
    pub last_check_time: Option<Instant>,
    pub check_in_progress: bool,
    pub provenance: Provenance,
    /// Set once anything has decided the identity (a check, a login, a
    /// clear). Distinguishes `Unknown` from `Anonymous`.
    pub resolved: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            session_info: None,
            is_loading: false,
            last_check_time: None,
            check_in_progress: false,
            provenance: Provenance::Local,
            resolved: false,
        }
    }
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        if self.check_in_progress {
            SessionPhase::Checking
        } else if !self.resolved {
            SessionPhase::Unknown
        } else if self.user.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Anonymous
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user: self.user.clone(),
            session_info: self.session_info.clone(),
            is_loading: self.is_loading,
            phase: self.phase(),
            provenance: self.provenance,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// What listeners receive on every state change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<UserSession>,
    pub session_info: Option<SessionInfo>,
    pub is_loading: bool,
    pub phase: SessionPhase,
    pub provenance: Provenance,
}

impl SessionSnapshot {
    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }
}
