//! API application state shared across handlers.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use docmill_config::ConfigSnapshot;
use docmill_convert::{Dispatcher, UploadValidator};
use docmill_telemetry::Metrics;
use docmill_workspace::WorkspaceManager;
use tracing::warn;
use uuid::Uuid;

use crate::http::rate_limit::{RateLimitError, RateLimitSnapshot, RateLimiter};

pub(crate) struct ApiState {
    pub(crate) config: Arc<ConfigSnapshot>,
    pub(crate) telemetry: Metrics,
    pub(crate) validator: UploadValidator,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) workspaces: WorkspaceManager,
    rate_limiters: Mutex<HashMap<IpAddr, RateLimiter>>,
    csrf_tokens: Mutex<HashMap<String, Instant>>,
}

impl ApiState {
    pub(crate) fn new(
        config: Arc<ConfigSnapshot>,
        telemetry: Metrics,
        workspaces: WorkspaceManager,
    ) -> Self {
        let validator = UploadValidator::new(&config.uploads);
        let dispatcher = Dispatcher::new(&config.convert);
        Self {
            config,
            telemetry,
            validator,
            dispatcher,
            workspaces,
            rate_limiters: Mutex::new(HashMap::new()),
            csrf_tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token from the client's bucket, creating it on first contact.
    ///
    /// Returns `Ok(None)` when rate limiting is disabled in config.
    pub(crate) fn enforce_rate_limit(
        &self,
        client: IpAddr,
    ) -> Result<Option<RateLimitSnapshot>, RateLimitError> {
        let policy = &self.config.rate_limit;
        if !policy.enabled {
            return Ok(None);
        }

        let mut guard = Self::lock_guard(&self.rate_limiters, "rate_limiters");
        let limiter = guard
            .entry(client)
            .or_insert_with(|| RateLimiter::new(policy));
        let status = limiter.evaluate(Instant::now());
        drop(guard);

        if status.allowed {
            Ok(Some(RateLimitSnapshot {
                limit: policy.burst,
                remaining: status.remaining,
            }))
        } else {
            self.telemetry.inc_rate_limit_throttled();
            warn!(client = %client, "client rate limit exceeded");
            Err(RateLimitError {
                limit: policy.burst,
                retry_after: status.retry_after,
            })
        }
    }

    /// Mint a fresh anti-forgery token with the configured lifetime.
    pub(crate) fn issue_csrf_token(&self) -> (String, Duration) {
        let token = Uuid::new_v4().simple().to_string();
        let ttl = self.config.csrf.token_ttl;
        let mut guard = Self::lock_guard(&self.csrf_tokens, "csrf_tokens");
        guard.retain(|_, expires_at| *expires_at > Instant::now());
        guard.insert(token.clone(), Instant::now() + ttl);
        (token, ttl)
    }

    /// Whether the token was issued by this instance and has not expired.
    pub(crate) fn csrf_token_valid(&self, token: &str) -> bool {
        let mut guard = Self::lock_guard(&self.csrf_tokens, "csrf_tokens");
        match guard.get(token) {
            Some(expires_at) if *expires_at > Instant::now() => true,
            Some(_) => {
                guard.remove(token);
                false
            }
            None => false,
        }
    }

    fn lock_guard<'a, T>(mutex: &'a Mutex<T>, name: &'a str) -> MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|err| {
            panic!("failed to lock {name}: {err}");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmill_config::load_with_lookup;

    fn state(vars: &[(&str, &str)]) -> ApiState {
        let owned: Vec<(String, String)> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        let config = load_with_lookup(|key| {
            owned
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
        })
        .expect("config loads");
        let metrics = Metrics::new().expect("metrics");
        let workspaces = WorkspaceManager::new(
            std::env::temp_dir().join("docmill-state-tests"),
            metrics.clone(),
        );
        ApiState::new(Arc::new(config), metrics, workspaces)
    }

    #[test]
    fn rate_limit_disabled_yields_no_snapshot() {
        let state = state(&[("DOCMILL_RATE_LIMIT_ENABLED", "false")]);
        let outcome = state
            .enforce_rate_limit("10.0.0.1".parse().expect("addr"))
            .expect("disabled limiter admits");
        assert!(outcome.is_none());
    }

    #[test]
    fn burst_exhaustion_rejects_with_retry_delay() {
        let state = state(&[
            ("DOCMILL_RATE_BURST", "2"),
            ("DOCMILL_RATE_PERIOD_SECS", "60"),
        ]);
        let client: IpAddr = "10.0.0.2".parse().expect("addr");
        assert!(state.enforce_rate_limit(client).is_ok());
        assert!(state.enforce_rate_limit(client).is_ok());
        let err = state
            .enforce_rate_limit(client)
            .expect_err("third call exceeds the burst");
        assert_eq!(err.limit, 2);
        assert!(err.retry_after > Duration::ZERO);
    }

    #[test]
    fn buckets_are_per_client() {
        let state = state(&[
            ("DOCMILL_RATE_BURST", "1"),
            ("DOCMILL_RATE_PERIOD_SECS", "60"),
        ]);
        let first: IpAddr = "10.0.0.3".parse().expect("addr");
        let second: IpAddr = "10.0.0.4".parse().expect("addr");
        assert!(state.enforce_rate_limit(first).is_ok());
        assert!(state.enforce_rate_limit(first).is_err());
        assert!(state.enforce_rate_limit(second).is_ok());
    }

    #[test]
    fn issued_csrf_tokens_validate_until_forgotten() {
        let state = state(&[]);
        let (token, ttl) = state.issue_csrf_token();
        assert!(ttl > Duration::ZERO);
        assert!(state.csrf_token_valid(&token));
        assert!(!state.csrf_token_valid("not-a-token"));
    }
}
