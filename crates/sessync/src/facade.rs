//! The session facade: the one object the rest of an application touches.
//!
//! [`SessionFacade`] composes the fetcher, the session cache, the listener
//! registry, the submission guard and the local store into the public
//! session contract. It is a cheap `Clone` handle; build one at startup
//! and hand clones to whatever needs the session.
//!
//! # Check cycle
//!
//! ```text
//! check_session(force)
//!   │  lock ─ gate ─ register flight ─ unlock        (no await inside)
//!   ├─ Skip ─────────────→ cached answer
//!   ├─ Join ─────────────→ await the flight already running
//!   └─ Proceed ─→ flight: broadcast(loading)
//!                         await previous flight (forced calls only)
//!                         current-user ─→ merge ─→ session-info ─→ persist
//!                         finish ─→ broadcast(final) ─→ answer
//! ```
//!
//! Both broadcasts of a check come from inside its flight, so whichever
//! task ends up driving it, listeners see the loading snapshot first.
//! A panic anywhere in the flight is caught and the check is abandoned;
//! a flight never stays registered after it has resolved.
//!
//! The gate decision and the flight registration happen under one lock
//! before the first suspension point, so two concurrent callers can never
//! both start a network check. At most one check talks to the backend at
//! any time; a forced call made while one is running queues behind it.
//!
//! # Local changes win over stale checks
//!
//! `set_user`, `logout` and the clears bump an epoch. A check that was
//! already in flight when the epoch moved discards its outcome, so a
//! `200` that raced a logout can't log the user back in.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde_json::Value;
use sessync_protocol::{LoginRequest, LoginResponse, Role, SessionInfo, SessionTokens, UserSession};
use sessync_session::{
    Applied, CheckOutcome, Gate, ListenerId, ListenerRegistry, LocalStore, MemoryStore,
    Provenance, SessionCache, SessionConfig, SessionPhase, SessionSnapshot, StorageError,
    SubmissionGuard, SubmitScope, keys,
};
use sessync_transport::{FetchError, FetchOutcome, SessionFetcher};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::SessyncError;

type Flight = Shared<BoxFuture<'static, bool>>;

/// The answer of [`SessionFacade::login`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// The user is logged in (optimistically, until the confirming check).
    Success { user: UserSession },
    /// The account is logged in elsewhere. Call
    /// [`SessionFacade::confirm_duplicate_login`] to take the session over.
    RequiresConfirmation { message: Option<String> },
    /// Bad credentials, a backend refusal, or an unreachable backend.
    Rejected { message: Option<String> },
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

struct InFlight {
    id: u64,
    result: Flight,
}

struct Core {
    cache: SessionCache,
    flight: Option<InFlight>,
    next_flight: u64,
    /// Bumped by every local identity change.
    epoch: u64,
}

struct Inner<F, S> {
    fetcher: F,
    store: S,
    core: Mutex<Core>,
    listeners: ListenerRegistry,
    guard: SubmissionGuard,
    config: SessionConfig,
}

/// What `check_session` decided while holding the lock.
enum Step {
    Answer(bool),
    Await(Flight),
}

// ---------------------------------------------------------------------------
// SessionFacade
// ---------------------------------------------------------------------------

/// Process-wide session synchronization.
///
/// # Example
///
/// ```rust,no_run
/// use sessync::prelude::*;
///
/// # async fn run() -> Result<(), SessyncError> {
/// let fetcher = HttpFetcher::new("http://localhost:8080")?;
/// let session = SessionFacade::builder()
///     .config(SessionConfig::from_env()?)
///     .build(fetcher)?;
///
/// session.add_listener(|snap| println!("logged in: {}", snap.is_logged_in()));
/// if session.check_session(false).await && session.is_admin() {
///     println!("welcome back, admin");
/// }
/// # Ok(())
/// # }
/// ```
pub struct SessionFacade<F, S = MemoryStore> {
    inner: Arc<Inner<F, S>>,
}

impl<F, S> Clone for SessionFacade<F, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SessionFacade<(), MemoryStore> {
    /// Starts building a facade.
    pub fn builder() -> SessionFacadeBuilder<MemoryStore> {
        SessionFacadeBuilder::default()
    }
}

impl<F: SessionFetcher> SessionFacade<F, MemoryStore> {
    /// A facade with the default config and an in-memory store.
    pub fn new(fetcher: F) -> Self {
        Self::from_parts(fetcher, MemoryStore::new(), SessionConfig::default())
    }
}

impl<F: SessionFetcher, S: LocalStore> SessionFacade<F, S> {
    fn from_parts(fetcher: F, store: S, config: SessionConfig) -> Self {
        let config = config.validated();
        let cache = SessionCache::new(config.min_check_interval);
        Self {
            inner: Arc::new(Inner {
                fetcher,
                store,
                core: Mutex::new(Core {
                    cache,
                    flight: None,
                    next_flight: 0,
                    epoch: 0,
                }),
                listeners: ListenerRegistry::new(),
                guard: SubmissionGuard::new(),
                config,
            }),
        }
    }

    // -- checks ------------------------------------------------------------

    /// Makes sure the cached identity is current and returns whether a user
    /// is logged in.
    ///
    /// A non-forced call is answered from the cache while a submission or
    /// modal is active, or within `min_check_interval` of the last
    /// completed check. It joins the running check if there is one.
    /// `force` bypasses all of that. Never fails: every backend problem is
    /// absorbed by the identity-preservation rule.
    pub async fn check_session(&self, force: bool) -> bool {
        let step = {
            let mut core = self.inner.lock_core();
            let suppressed = self.inner.guard.is_active();
            match core.cache.gate(force, suppressed, Instant::now()) {
                Gate::Skip(reason) => {
                    debug!(?reason, "session check skipped");
                    Step::Answer(core.cache.is_logged_in())
                }
                Gate::Join => match &core.flight {
                    Some(flight) => {
                        debug!(flight = flight.id, "joining session check in flight");
                        Step::Await(flight.result.clone())
                    }
                    None => self.inner.start_flight(&mut core, force),
                },
                Gate::Proceed => self.inner.start_flight(&mut core, force),
            }
        };

        match step {
            Step::Answer(logged_in) => logged_in,
            Step::Await(flight) => flight.await,
        }
    }

    // -- local identity changes ----------------------------------------------

    /// Optimistic login: stores `user` (and any tokens) without a round
    /// trip and broadcasts.
    ///
    /// `last_check_time` is not touched, so a non-forced check right after
    /// may still be answered from the cache.
    pub fn set_user(&self, user: UserSession, tokens: Option<SessionTokens>) {
        let snapshot = {
            let mut core = self.inner.lock_core();
            core.epoch += 1;
            core.cache.set_user(user.clone())
        };
        info!(user_id = ?user.id, role = user.role_str().unwrap_or_default(), "user set locally");

        self.inner.persist(keys::USER, &user);
        if let Some(tokens) = tokens {
            let pairs = [
                (keys::ACCESS_TOKEN, tokens.access_token),
                (keys::REFRESH_TOKEN, tokens.refresh_token),
                (keys::SESSION_ID, tokens.session_id),
            ];
            for (key, value) in pairs {
                if let Some(value) = value {
                    self.inner.persist(key, &value);
                }
            }
        }
        self.inner.listeners.notify(&snapshot);
    }

    /// Logs out on the backend (best effort), then clears the local user
    /// no matter what the backend said.
    pub async fn logout(&self) {
        if let Err(e) = self.inner.fetcher.logout().await {
            warn!(error = %e, "logout endpoint failed, clearing locally anyway");
        }

        let snapshot = {
            let mut core = self.inner.lock_core();
            core.epoch += 1;
            core.cache.clear_user()
        };
        for key in keys::SESSION_KEYS {
            self.inner.store_op("remove", |store| store.remove(key));
        }
        info!("logged out");
        self.inner.listeners.notify(&snapshot);
    }

    /// Asks the backend to drop its session (best effort), then wipes the
    /// local store and every piece of in-memory state, including the last
    /// check time. Always succeeds locally.
    pub async fn force_clear_session(&self) {
        if let Err(e) = self.inner.fetcher.clear_session().await {
            warn!(error = %e, "clear-session endpoint failed, clearing locally anyway");
        }
        self.clear_local_storage();
    }

    /// [`force_clear_session`](Self::force_clear_session) without the
    /// network call.
    pub fn clear_local_storage(&self) {
        let snapshot = {
            let mut core = self.inner.lock_core();
            core.epoch += 1;
            core.cache.reset()
        };
        self.inner.store_op("clear", |store| store.clear());
        info!("local session state cleared");
        self.inner.listeners.notify(&snapshot);
    }

    // -- login workflow -------------------------------------------------------

    /// Logs in with email and password.
    ///
    /// On success the user is set optimistically and a forced check is
    /// scheduled after `post_login_check_delay` to confirm it. Requires a
    /// Tokio runtime for that confirming check.
    pub async fn login(&self, email: &str, password: &str) -> LoginOutcome {
        let request = LoginRequest::new(email, password);
        let response = self.inner.fetcher.login(&request).await;
        self.complete_login(response)
    }

    /// Confirms a login that was answered with
    /// [`LoginOutcome::RequiresConfirmation`], ending the other session.
    pub async fn confirm_duplicate_login(&self, email: &str, password: &str) -> LoginOutcome {
        let request = LoginRequest::new(email, password);
        let response = self.inner.fetcher.confirm_duplicate_login(&request).await;
        self.complete_login(response)
    }

    fn complete_login(&self, response: Result<LoginResponse, FetchError>) -> LoginOutcome {
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "login request failed");
                return LoginOutcome::Rejected {
                    message: Some(e.to_string()),
                };
            }
        };

        if response.data.requires_confirmation {
            info!("login requires confirming the duplicate session");
            return LoginOutcome::RequiresConfirmation {
                message: response.message,
            };
        }

        let tokens = response.tokens();
        match response.data.user {
            Some(user) if response.success => {
                self.set_user(user.clone(), (!tokens.is_empty()).then_some(tokens));
                self.schedule_confirming_check();
                LoginOutcome::Success { user }
            }
            _ => {
                debug!(message = ?response.message, "login rejected");
                LoginOutcome::Rejected {
                    message: response.message,
                }
            }
        }
    }

    fn schedule_confirming_check(&self) {
        let Some(delay) = self.inner.config.post_login_check_delay else {
            return;
        };
        let facade = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("confirming fresh login");
            facade.check_session(true).await;
        });
    }

    // -- read API -------------------------------------------------------------

    pub fn get_user(&self) -> Option<UserSession> {
        self.inner.lock_core().cache.user().cloned()
    }

    pub fn get_session_info(&self) -> Option<SessionInfo> {
        self.inner.lock_core().cache.session_info().cloned()
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.lock_core().cache.is_logged_in()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock_core().cache.is_loading()
    }

    /// Where the current identity came from.
    pub fn provenance(&self) -> Provenance {
        self.inner.lock_core().cache.provenance()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock_core().cache.phase()
    }

    /// Everything a listener would see right now.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock_core().cache.snapshot()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // -- role helpers ---------------------------------------------------------

    pub fn role(&self) -> Option<Role> {
        self.inner.lock_core().cache.user().and_then(UserSession::role)
    }

    /// `true` if the user's role string is exactly `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.role().is_some_and(|r| r.as_str() == role)
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        self.role().is_some_and(|r| roles.contains(&r.as_str()))
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub fn is_consultant(&self) -> bool {
        self.role() == Some(Role::Consultant)
    }

    pub fn is_client(&self) -> bool {
        self.role() == Some(Role::Client)
    }

    // -- listeners ------------------------------------------------------------

    /// Registers a callback for every state change. Callbacks run with no
    /// session lock held and may call back into the facade.
    pub fn add_listener<L>(&self, listener: L) -> ListenerId
    where
        L: Fn(&SessionSnapshot) + Send + Sync + 'static,
    {
        self.inner.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    // -- submission guard -----------------------------------------------------

    /// Suppresses non-forced checks until the matching
    /// [`end_form_submit`](Self::end_form_submit). Calls nest.
    pub fn start_form_submit(&self) {
        let depth = self.inner.guard.start();
        debug!(depth, "form submit started");
    }

    pub fn end_form_submit(&self) {
        let depth = self.inner.guard.end();
        debug!(depth, "form submit ended");
    }

    /// A submission that ends when the scope is dropped.
    pub fn submit_scope(&self) -> SubmitScope {
        self.inner.guard.scope()
    }

    /// While a modal is open, non-forced checks are suppressed.
    pub fn set_modal_open(&self, open: bool) {
        self.inner.guard.set_modal_open(open);
    }

    pub fn guard(&self) -> &SubmissionGuard {
        &self.inner.guard
    }
}

// ---------------------------------------------------------------------------
// Inner: the check cycle
// ---------------------------------------------------------------------------

impl<F: SessionFetcher, S: LocalStore> Inner<F, S> {
    fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new flight. Must be called with the core lock held.
    fn start_flight(self: &Arc<Self>, core: &mut Core, force: bool) -> Step {
        core.next_flight += 1;
        let id = core.next_flight;
        let epoch = core.epoch;
        let previous = core.flight.as_ref().map(|f| f.result.clone());
        core.cache.begin_check();
        debug!(flight = id, force, queued = previous.is_some(), "session check started");

        let inner = Arc::clone(self);
        let flight = async move {
            let loading = inner.lock_core().cache.snapshot();
            inner.listeners.notify(&loading);

            if let Some(previous) = previous {
                previous.await;
            }
            match AssertUnwindSafe(inner.run_check(id, epoch)).catch_unwind().await {
                Ok(logged_in) => logged_in,
                Err(_) => {
                    warn!(flight = id, "session check panicked, abandoning it");
                    inner.settle(id, false)
                }
            }
        }
        .boxed()
        .shared();

        core.flight = Some(InFlight {
            id,
            result: flight.clone(),
        });
        Step::Await(flight)
    }

    async fn run_check(&self, id: u64, epoch: u64) -> bool {
        let outcome = match AssertUnwindSafe(self.fetcher.current_user())
            .catch_unwind()
            .await
        {
            Ok(Ok(FetchOutcome::Authenticated(user))) => CheckOutcome::Authenticated(user),
            Ok(Ok(FetchOutcome::Unauthenticated)) => CheckOutcome::Unauthenticated,
            Ok(Err(e)) => {
                warn!(flight = id, error = %e, "current-user check failed");
                CheckOutcome::Indeterminate(e.to_string())
            }
            Err(_) => {
                warn!(flight = id, "session fetcher panicked");
                CheckOutcome::Indeterminate("fetcher panicked".into())
            }
        };

        let applied = {
            let mut core = self.lock_core();
            (core.epoch == epoch).then(|| core.cache.apply_outcome(outcome))
        };

        match applied {
            Some(applied) if applied.confirmed() => self.refresh_session_info(id, epoch).await,
            Some(Applied::Cleared) => {
                for key in [keys::USER, keys::SESSION_INFO] {
                    self.store_op("remove", |store| store.remove(key));
                }
            }
            Some(_) => {}
            None => {
                debug!(flight = id, "discarding session check superseded by a local change");
            }
        }

        self.settle(id, applied.is_some())
    }

    /// Ends flight `id`: unregisters it unless a newer flight is queued,
    /// completes or abandons the check, and broadcasts. Returns the answer.
    fn settle(&self, id: u64, completed: bool) -> bool {
        let (snapshot, logged_in) = {
            let mut core = self.lock_core();
            let still_pending = core.flight.as_ref().is_some_and(|f| f.id != id);
            if !still_pending {
                core.flight = None;
            }
            let snapshot = if completed {
                core.cache.finish_check(Instant::now(), still_pending)
            } else {
                core.cache.abandon_check(still_pending)
            };
            (snapshot, core.cache.is_logged_in())
        };
        debug!(flight = id, logged_in, completed, "session check finished");
        self.listeners.notify(&snapshot);
        logged_in
    }

    /// Fetches the secondary metadata and persists the confirmed user.
    /// A failing session-info call keeps whatever was cached before.
    async fn refresh_session_info(&self, id: u64, epoch: u64) {
        let info = match AssertUnwindSafe(self.fetcher.session_info())
            .catch_unwind()
            .await
        {
            Ok(Ok(info)) => Some(info),
            Ok(Err(e)) => {
                debug!(flight = id, error = %e, "session-info fetch failed, ignoring");
                None
            }
            Err(_) => {
                warn!(flight = id, "session-info fetcher panicked, ignoring");
                None
            }
        };

        let (user, info) = {
            let mut core = self.lock_core();
            if core.epoch != epoch {
                return;
            }
            if let Some(info) = info {
                core.cache.set_session_info(info);
            }
            (core.cache.user().cloned(), core.cache.session_info().cloned())
        };

        if let Some(user) = user {
            self.persist(keys::USER, &user);
        }
        match info {
            Some(info) => self.persist(keys::SESSION_INFO, &info),
            None => self.store_op("remove", |store| store.remove(keys::SESSION_INFO)),
        }
    }

    fn persist<T: serde::Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.store_op("set", |store| store.set(key, value)),
            Err(e) => warn!(key, error = %e, "could not serialize session value"),
        }
    }

    /// Runs a store operation, logging and swallowing its failure.
    fn store_op(&self, op: &str, f: impl FnOnce(&S) -> Result<(), StorageError>) {
        if let Err(e) = f(&self.store) {
            warn!(op, error = %e, "local session store failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds a [`SessionFacade`].
pub struct SessionFacadeBuilder<S = MemoryStore> {
    config: SessionConfig,
    store: S,
    restore: bool,
}

impl Default for SessionFacadeBuilder<MemoryStore> {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            store: MemoryStore::new(),
            restore: false,
        }
    }
}

impl<S: LocalStore> SessionFacadeBuilder<S> {
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Persists session data into `store` instead of memory.
    pub fn store<T: LocalStore>(self, store: T) -> SessionFacadeBuilder<T> {
        SessionFacadeBuilder {
            config: self.config,
            store,
            restore: self.restore,
        }
    }

    /// Seeds the facade with the user persisted by a previous run. The
    /// restored user is `Optimistic` until a check confirms it.
    #[must_use]
    pub fn restore_persisted(mut self, restore: bool) -> Self {
        self.restore = restore;
        self
    }

    /// Builds the facade around `fetcher`.
    ///
    /// # Errors
    ///
    /// With `restore_persisted(true)`, returns [`SessyncError::Storage`] if
    /// the store cannot be read or holds a corrupt user.
    pub fn build<F: SessionFetcher>(self, fetcher: F) -> Result<SessionFacade<F, S>, SessyncError> {
        let restored = if self.restore {
            Self::read_persisted(&self.store)?
        } else {
            None
        };

        let facade = SessionFacade::from_parts(fetcher, self.store, self.config);
        if let Some((user, info)) = restored {
            info!(user_id = ?user.id, "restored persisted session");
            let mut core = facade.inner.lock_core();
            core.cache.set_user(user);
            core.cache.set_session_info(info);
        }
        Ok(facade)
    }

    fn read_persisted(store: &S) -> Result<Option<(UserSession, Option<SessionInfo>)>, StorageError> {
        let Some(user) = store.get(keys::USER)? else {
            return Ok(None);
        };
        let user: UserSession = serde_json::from_value(user)?;
        let info = match store.get(keys::SESSION_INFO)? {
            Some(Value::Null) | None => None,
            Some(info) => Some(serde_json::from_value(info)?),
        };
        Ok(Some((user, info)))
    }
}
