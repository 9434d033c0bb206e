//! Session configuration.

use std::time::Duration;

use crate::SessionError;

/// Configuration for the session core.
///
/// Sensible defaults are provided; build one with
/// `SessionConfig::default()` and override the fields you care about, or
/// read it from the environment with [`from_env`](Self::from_env).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Minimum time between two non-forced network checks. A non-forced
    /// check within this window of the last completed one is served from
    /// the cache.
    ///
    /// Default: 5 minutes.
    pub min_check_interval: Duration,

    /// Delay before the confirming forced check that follows a successful
    /// login. Gives the backend time to make the new session cookie
    /// visible. `None` disables the confirming check.
    ///
    /// Default: 500 ms.
    pub post_login_check_delay: Option<Duration>,

    /// Interval of the background check loop. `Duration::ZERO` disables
    /// background checks.
    ///
    /// Default: same as `min_check_interval`.
    pub poll_interval: Duration,

    /// Upper bound of the random delay added to the first background
    /// check, so instances started together don't poll in lockstep.
    ///
    /// Default: 2 seconds.
    pub poll_jitter: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_check_interval: Self::DEFAULT_CHECK_INTERVAL,
            post_login_check_delay: Some(Duration::from_millis(500)),
            poll_interval: Self::DEFAULT_CHECK_INTERVAL,
            poll_jitter: Duration::from_secs(2),
        }
    }
}

impl SessionConfig {
    /// Default minimum interval between network checks.
    pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

    /// Reads overrides from the process environment.
    ///
    /// # Optional env vars
    /// - `SESSYNC_MIN_CHECK_INTERVAL_SECS`
    /// - `SESSYNC_POST_LOGIN_CHECK_MS` (`0` disables the confirming check)
    /// - `SESSYNC_POLL_INTERVAL_SECS` (`0` disables background checks)
    /// - `SESSYNC_POLL_JITTER_MS`
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if a variable is set but is not a
    /// non-negative integer.
    pub fn from_env() -> Result<Self, SessionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SessionError> {
        let number = |key: &str| -> Result<Option<u64>, SessionError> {
            lookup(key)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|e| SessionError::Config {
                        key: key.to_string(),
                        reason: format!("{raw:?}: {e}"),
                    })
                })
                .transpose()
        };

        let mut config = Self::default();
        if let Some(secs) = number("SESSYNC_MIN_CHECK_INTERVAL_SECS")? {
            config.min_check_interval = Duration::from_secs(secs);
            config.poll_interval = config.min_check_interval;
        }
        if let Some(ms) = number("SESSYNC_POST_LOGIN_CHECK_MS")? {
            config.post_login_check_delay = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(secs) = number("SESSYNC_POLL_INTERVAL_SECS")? {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = number("SESSYNC_POLL_JITTER_MS")? {
            config.poll_jitter = Duration::from_millis(ms);
        }
        Ok(config.validated())
    }

    /// Fixes out-of-range combinations so the config is safe to use.
    ///
    /// - `poll_jitter` is capped to `poll_interval` when polling is on.
    pub fn validated(mut self) -> Self {
        if !self.poll_interval.is_zero() && self.poll_jitter > self.poll_interval {
            tracing::warn!(
                jitter_ms = self.poll_jitter.as_millis() as u64,
                interval_ms = self.poll_interval.as_millis() as u64,
                "poll jitter exceeds poll interval, clamping"
            );
            self.poll_jitter = self.poll_interval;
        }
        self
    }

    /// `true` if a background check loop should run.
    pub fn polling_enabled(&self) -> bool {
        !self.poll_interval.is_zero()
    }
}
