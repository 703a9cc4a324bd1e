//! Login attempt gate in front of the upstream authenticator.

use std::sync::Arc;

use orbit_auth::{AuthzError, LoginThrottle};

use crate::clock::Clock;
use crate::state::AppState;

#[derive(Clone)]
pub struct LoginGuard {
    throttle: Arc<LoginThrottle>,
    clock: Arc<dyn Clock>,
}

impl LoginGuard {
    pub fn new(state: &AppState) -> Self {
        Self {
            throttle: state.throttle.clone(),
            clock: state.clock.clone(),
        }
    }

    /// Call before verifying credentials.
    pub fn check(&self, email: &str, ip: Option<&str>) -> Result<(), AuthzError> {
        self.throttle.check(&LoginThrottle::key(email, ip), self.clock.now())
    }

    /// Call after credentials were rejected.
    pub fn record_failure(&self, email: &str, ip: Option<&str>) {
        tracing::debug!("failed login recorded");
        self.throttle.record_failure(&LoginThrottle::key(email, ip), self.clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::Settings;
    use chrono::{Duration, TimeZone, Utc};

    fn guard() -> (LoginGuard, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()));
        let state = AppState::in_memory(Settings::default()).with_clock(clock.clone());
        (state.logins(), clock)
    }

    #[test]
    fn locks_after_configured_failures_and_releases_after_lockout() {
        let (guard, clock) = guard();
        for _ in 0..5 {
            guard.check("pat@example.com", Some("10.1.1.1")).unwrap();
            guard.record_failure("pat@example.com", Some("10.1.1.1"));
        }
        assert_eq!(guard.check("pat@example.com", Some("10.1.1.1")), Err(AuthzError::RateLimited));
        // other address is unaffected
        assert!(guard.check("pat@example.com", Some("10.9.9.9")).is_ok());

        clock.advance(Duration::seconds(901));
        assert!(guard.check("PAT@example.com", Some("10.1.1.1")).is_ok());
    }
}
