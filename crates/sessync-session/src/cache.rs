//! The session cache: gating and merge rules over the session record.
//!
//! `SessionCache` is plain synchronous state. It decides whether a check
//! should hit the network ([`SessionCache::gate`]) and folds a check's
//! outcome into the record ([`SessionCache::apply_outcome`]). It never
//! performs I/O itself. The facade owns the fetcher and drives the cycle:
//!
//! ```text
//! gate() ──Proceed──→ begin_check() ──fetch──→ apply_outcome() ──→ finish_check()
//!    │                                               │
//!    ├──Join──→ await the check already in flight    └─ set_session_info()
//!    └──Skip──→ answer from the cache
//! ```
//!
//! # Identity preservation
//!
//! Once the user carries a non-empty role, only a fresh success carrying
//! its own role may replace or clear it. A `401`, a transport error or a
//! malformed body leaves the user exactly as it was.

use sessync_protocol::UserSession;
use tokio::time::{Duration, Instant};

use crate::{Provenance, SessionPhase, SessionSnapshot, SessionState};

/// What a check learned from the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// `200` with a user.
    Authenticated(UserSession),
    /// `401`.
    Unauthenticated,
    /// Transport failure, unexpected status, or a malformed body.
    Indeterminate(String),
}

/// The verdict of [`SessionCache::gate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Answer from the cache without touching the network.
    Skip(SkipReason),
    /// A check is already in flight; wait for its answer.
    Join,
    /// Run a network check.
    Proceed,
}

/// Why a non-forced check was answered from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A submission or an open modal suppresses background checks.
    Suppressed,
    /// The last completed check is younger than the minimum interval.
    Fresh,
}

/// How [`SessionCache::apply_outcome`] changed the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// No user was cached; the incoming one was stored.
    Stored,
    /// Same principal; fields were merged.
    Merged,
    /// A different principal with its own role replaced the cached one.
    Replaced,
    /// The cached identity was kept despite the outcome.
    Preserved,
    /// The user and session info were cleared.
    Cleared,
}

impl Applied {
    /// `true` if the outcome left a network-confirmed user in place.
    pub fn confirmed(self) -> bool {
        matches!(self, Self::Stored | Self::Merged | Self::Replaced)
    }
}

/// Holds the session record and enforces the gating and merge rules.
#[derive(Debug)]
pub struct SessionCache {
    state: SessionState,
    min_check_interval: Duration,
}

impl SessionCache {
    pub fn new(min_check_interval: Duration) -> Self {
        Self {
            state: SessionState::default(),
            min_check_interval,
        }
    }

    /// Decides what a `check_session(force)` call should do.
    ///
    /// `suppressed` is the submission guard's verdict. Forced checks
    /// bypass every rule.
    pub fn gate(&self, force: bool, suppressed: bool, now: Instant) -> Gate {
        if force {
            return Gate::Proceed;
        }
        if suppressed {
            return Gate::Skip(SkipReason::Suppressed);
        }
        if self.state.check_in_progress {
            return Gate::Join;
        }
        match self.state.last_check_time {
            Some(last) if now.saturating_duration_since(last) < self.min_check_interval => {
                Gate::Skip(SkipReason::Fresh)
            }
            _ => Gate::Proceed,
        }
    }

    /// Marks a check as started. Returns the loading-start snapshot.
    pub fn begin_check(&mut self) -> SessionSnapshot {
        self.state.check_in_progress = true;
        self.state.is_loading = true;
        self.state.snapshot()
    }

    /// Folds a check outcome into the record.
    pub fn apply_outcome(&mut self, outcome: CheckOutcome) -> Applied {
        self.state.resolved = true;

        let applied = match outcome {
            CheckOutcome::Authenticated(incoming) => self.apply_success(incoming),
            CheckOutcome::Unauthenticated => self.apply_ambiguous("401 from current-user"),
            CheckOutcome::Indeterminate(reason) => self.apply_ambiguous(&reason),
        };

        if applied.confirmed() {
            self.state.provenance = Provenance::Network;
        }
        applied
    }

    fn apply_success(&mut self, incoming: UserSession) -> Applied {
        let Some(current) = self.state.user.as_mut() else {
            self.state.user = Some(incoming);
            return Applied::Stored;
        };

        if same_principal(current, &incoming) {
            merge_into(current, incoming);
            return Applied::Merged;
        }

        if incoming.has_role_value() || !current.has_role_value() {
            tracing::info!(
                previous = ?current.id,
                next = ?incoming.id,
                "current-user answered for a different principal, replacing"
            );
            *current = incoming;
            return Applied::Replaced;
        }

        tracing::warn!(
            role = current.role_str().unwrap_or_default(),
            incoming = ?incoming.id,
            "current-user named a different principal without a role, keeping cached identity"
        );
        Applied::Preserved
    }

    fn apply_ambiguous(&mut self, reason: &str) -> Applied {
        match &self.state.user {
            Some(user) if user.has_role_value() => {
                tracing::warn!(
                    role = user.role_str().unwrap_or_default(),
                    reason,
                    "session check was ambiguous, preserving cached identity"
                );
                Applied::Preserved
            }
            _ => {
                tracing::debug!(reason, "session check found no session");
                self.state.user = None;
                self.state.session_info = None;
                self.state.provenance = Provenance::Network;
                Applied::Cleared
            }
        }
    }

    /// Stores the secondary session metadata.
    pub fn set_session_info(&mut self, info: Option<sessync_protocol::SessionInfo>) {
        self.state.session_info = info;
    }

    /// Ends a check. `still_pending` is `true` when another check was
    /// queued behind this one; the in-progress flag then stays up.
    ///
    /// `last_check_time` only ever moves forward.
    pub fn finish_check(&mut self, now: Instant, still_pending: bool) -> SessionSnapshot {
        self.state.last_check_time = Some(match self.state.last_check_time {
            Some(last) if last > now => last,
            _ => now,
        });
        if !still_pending {
            self.state.check_in_progress = false;
            self.state.is_loading = false;
        }
        self.state.snapshot()
    }

    /// Ends a check whose outcome was discarded because a local change
    /// (login, logout, clear) happened while it was in flight.
    /// `last_check_time` is left alone.
    pub fn abandon_check(&mut self, still_pending: bool) -> SessionSnapshot {
        if !still_pending {
            self.state.check_in_progress = false;
            self.state.is_loading = false;
        }
        self.state.snapshot()
    }

    /// Optimistic login: the user is trusted until a check says otherwise.
    /// Leaves `last_check_time` alone.
    pub fn set_user(&mut self, user: UserSession) -> SessionSnapshot {
        self.state.user = Some(user);
        self.state.provenance = Provenance::Optimistic;
        self.state.resolved = true;
        self.state.snapshot()
    }

    /// Drops the user and session info (logout).
    pub fn clear_user(&mut self) -> SessionSnapshot {
        self.state.user = None;
        self.state.session_info = None;
        self.state.provenance = Provenance::Local;
        self.state.resolved = true;
        self.state.snapshot()
    }

    /// Drops the user and forgets when the last check ran, so the next
    /// non-forced check goes to the network. A check that is still in
    /// flight keeps its in-progress flag.
    pub fn reset(&mut self) -> SessionSnapshot {
        self.state.last_check_time = None;
        self.clear_user()
    }

    pub fn user(&self) -> Option<&UserSession> {
        self.state.user.as_ref()
    }

    pub fn session_info(&self) -> Option<&sessync_protocol::SessionInfo> {
        self.state.session_info.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.user.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    pub fn check_in_progress(&self) -> bool {
        self.state.check_in_progress
    }

    pub fn last_check_time(&self) -> Option<Instant> {
        self.state.last_check_time
    }

    pub fn provenance(&self) -> Provenance {
        self.state.provenance
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    pub fn min_check_interval(&self) -> Duration {
        self.min_check_interval
    }
}

/// Two records name the same principal unless both carry an id (or, failing
/// that, an email) and those differ.
fn same_principal(a: &UserSession, b: &UserSession) -> bool {
    match (&a.id, &b.id) {
        (Some(x), Some(y)) => x == y,
        _ => match (&a.email, &b.email) {
            (Some(x), Some(y)) => x == y,
            _ => true,
        },
    }
}

/// Present incoming fields overwrite; absent ones keep the cached value.
/// An empty incoming role never overwrites.
fn merge_into(current: &mut UserSession, incoming: UserSession) {
    let UserSession {
        id,
        email,
        name,
        nickname,
        role,
        profile_image,
        provider,
        extra,
    } = incoming;

    overwrite(&mut current.id, id);
    overwrite(&mut current.email, email);
    overwrite(&mut current.name, name);
    overwrite(&mut current.nickname, nickname);
    overwrite(&mut current.profile_image, profile_image);
    overwrite(&mut current.provider, provider);
    if role.as_deref().is_some_and(|r| !r.is_empty()) {
        current.role = role;
    }
    current.extra.extend(extra);
}

fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}
