//! In-process login attempt throttle.
//!
//! Failed attempts are tracked per `email|ip` key in a process-local map.
//! State is lost on restart and is not shared between instances; a
//! multi-instance deployment needs an external store instead.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::AuthzError;

/// Limits applied by [`LoginThrottle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    /// Failed attempts allowed inside one window.
    pub max_attempts: usize,
    pub window: Duration,
    /// How long a key stays locked once it hits the limit.
    pub lockout: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::seconds(300),
            lockout: Duration::seconds(900),
        }
    }
}

#[derive(Debug, Default)]
struct KeyState {
    attempts: Vec<DateTime<Utc>>,
    locked_until: Option<DateTime<Utc>>,
}

impl KeyState {
    /// Still locked, or holding an attempt inside the window.
    fn is_live(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.locked_until.is_some_and(|until| until > now) || self.attempts.iter().any(|ts| now - *ts < window)
    }
}

#[derive(Debug, Default)]
pub struct LoginThrottle {
    policy: ThrottlePolicy,
    keys: Mutex<HashMap<String, KeyState>>,
}

impl LoginThrottle {
    pub fn new(policy: ThrottlePolicy) -> Self {
        Self {
            policy,
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// Throttle key: lowercased email, suffixed with `|ip` when known.
    pub fn key(email: &str, ip: Option<&str>) -> String {
        let base = email.to_lowercase();
        match ip {
            Some(ip) => format!("{base}|{ip}"),
            None => base,
        }
    }

    /// Fail with [`AuthzError::RateLimited`] if `key` may not attempt a login at `now`.
    ///
    /// Reaching the attempt limit inside the window starts a lockout and
    /// clears the attempt history.
    pub fn check(&self, key: &str, now: DateTime<Utc>) -> Result<(), AuthzError> {
        let mut keys = match self.keys.lock() {
            Ok(k) => k,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = self.policy.window;
        let Some(state) = keys.get_mut(key) else {
            return Ok(());
        };

        if state.locked_until.is_some_and(|until| until > now) {
            return Err(AuthzError::RateLimited);
        }

        state.attempts.retain(|ts| now - *ts < window);

        if state.attempts.len() >= self.policy.max_attempts {
            state.locked_until = Some(now + self.policy.lockout);
            state.attempts.clear();
            tracing::warn!(key, "login rate limit exceeded");
            return Err(AuthzError::RateLimited);
        }

        if !state.is_live(now, window) {
            keys.remove(key);
        }
        Ok(())
    }

    /// Record a failed login for `key`.
    ///
    /// Also drops keys whose attempts and lockout have both expired.
    pub fn record_failure(&self, key: &str, now: DateTime<Utc>) {
        let mut keys = match self.keys.lock() {
            Ok(k) => k,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = self.policy.window;
        keys.retain(|_, state| state.is_live(now, window));
        keys.entry(key.to_string()).or_default().attempts.push(now);
    }

}
