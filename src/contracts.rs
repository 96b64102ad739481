// src/contracts.rs
//
// Trait-only contracts for the external collaborators named in the
// out-of-scope list (§1): session storage/propagation, token issuance,
// rate limiting, Bloom-filter membership, and IP blocklisting. No
// concrete store/limiter lives here — these are the seams an adapter
// crate fills in. Shapes are grounded on `chopin-core::auth::*`,
// generalized from its sea-orm/login-specific free functions to
// storage-agnostic traits.

use std::sync::Arc;
use std::time::Duration;

use crate::error::APIError;

/// A single session record. Grounded on the create/validate/revoke shape
/// of `chopin-core::auth::session`.
pub trait Session: Send + Sync {
    fn id(&self) -> &str;
    fn get(&self, key: &str) -> Option<&serde_json::Value>;
    fn set(&mut self, key: &str, value: serde_json::Value);
    fn delete(&mut self, key: &str);
    /// Persist any mutations made through `set`/`delete`.
    fn save(&self) -> Result<(), APIError>;
}

/// Storage backend for sessions.
pub trait SessionStore: Send + Sync {
    fn create(&self, user_id: &str) -> Result<Box<dyn Session>, APIError>;
    fn get(&self, session_id: &str) -> Result<Option<Box<dyn Session>>, APIError>;
    fn refresh(&self, session_id: &str, ttl: Duration) -> Result<(), APIError>;
    fn remove(&self, session_id: &str) -> Result<(), APIError>;
}

/// Carries a session identifier across the wire, independent of the
/// storage backend behind `SessionStore`.
pub trait SessionPropagator: Send + Sync {
    fn inject(&self, ctx: &mut crate::context::Context, session_id: &str);
    fn extract(&self, ctx: &crate::context::Context) -> Option<String>;
    fn remove(&self, ctx: &mut crate::context::Context);
}

#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub name: String,
    pub path: String,
    pub domain: Option<String>,
    pub max_age: Option<Duration>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: &'static str,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: "session_id".to_string(),
            path: "/".to_string(),
            domain: None,
            max_age: None,
            secure: true,
            http_only: true,
            same_site: "Lax",
        }
    }
}

/// Cookie-based `SessionPropagator`. The actual `Set-Cookie` string
/// assembly and request-cookie parsing are left to the adapter that owns
/// the wire format; this struct only carries the option set documented
/// informally for `chopin-core`'s cookie-based session handling.
pub struct CookiePropagator {
    pub options: CookieOptions,
}

impl CookiePropagator {
    pub fn new(options: CookieOptions) -> Self {
        Self { options }
    }
}

/// Access/refresh token issuance and verification. Grounded on
/// `chopin-core::auth::jwt::{create_token, validate_token}`, generalized
/// from a single access-token pair to access + refresh.
pub trait TokenManager: Send + Sync {
    fn generate_access(&self, claims: &serde_json::Value) -> Result<String, APIError>;
    fn generate_refresh(&self, claims: &serde_json::Value) -> Result<String, APIError>;
    fn verify_access(&self, token: &str) -> Result<serde_json::Value, APIError>;
    fn verify_refresh(&self, token: &str) -> Result<serde_json::Value, APIError>;
}

/// Generic rate limiter keyed by an arbitrary string (client IP, API key,
/// user id, ...). Grounded on `chopin-core::auth::rate_limit::RateLimiter`
/// (sliding window over `Instant`), generalized from login-attempt
/// counting to any key.
pub trait RateLimiter: Send + Sync {
    /// Returns `Ok(true)` if the call under `key` is allowed, `Ok(false)`
    /// if the limit has been exceeded. Takes `ctx` so implementations can
    /// key on request-scoped data (client IP, authenticated user, ...)
    /// beyond the caller-supplied `key`.
    fn limit(&self, ctx: &crate::context::Context, key: &str) -> Result<bool, APIError>;
}

/// Probabilistic set membership, for cheap existence pre-checks ahead of
/// an authoritative (and more expensive) lookup. No teacher/pack file
/// implements one; specified as a trait only.
pub trait BloomFilter: Send + Sync {
    fn add(&self, item: &str);
    fn check_batch(&self, items: &[&str]) -> Vec<bool>;
    fn remove(&self, item: &str);
}

#[derive(Clone)]
pub struct BlocklistPolicy {
    pub max_failed_attempts: u32,
    pub block_duration: Duration,
    pub clear_interval: Duration,
    pub record_expiry: Duration,
    pub whitelist_ips: Vec<String>,
    /// Invoked the moment an IP crosses into a blocked state.
    pub on_blocked: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

impl std::fmt::Debug for BlocklistPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlocklistPolicy")
            .field("max_failed_attempts", &self.max_failed_attempts)
            .field("block_duration", &self.block_duration)
            .field("clear_interval", &self.clear_interval)
            .field("record_expiry", &self.record_expiry)
            .field("whitelist_ips", &self.whitelist_ips)
            .field("on_blocked", &self.on_blocked.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Default for BlocklistPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 10,
            block_duration: Duration::from_secs(15 * 60),
            clear_interval: Duration::from_secs(60 * 60),
            record_expiry: Duration::from_secs(24 * 60 * 60),
            whitelist_ips: Vec::new(),
            on_blocked: None,
        }
    }
}

/// Tracks per-IP failure counts and enforces temporary blocks. A
/// `block_ip`/`unblock_ip` pair exists alongside the automatic
/// `record_failure` path so operators can intervene manually.
pub trait IpBlocklistManager: Send + Sync {
    fn record_success(&self, ip: &str);
    /// Returns whether this failure just pushed `ip` over the threshold
    /// into a blocked state.
    fn record_failure(&self, ip: &str) -> bool;
    fn is_blocked(&self, ip: &str) -> bool;
    fn block_ip(&self, ip: &str, duration: Duration);
    fn unblock_ip(&self, ip: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_options_default_is_secure() {
        let opts = CookieOptions::default();
        assert!(opts.secure);
        assert!(opts.http_only);
        assert_eq!(opts.same_site, "Lax");
    }

    #[test]
    fn blocklist_policy_default_values() {
        let policy = BlocklistPolicy::default();
        assert_eq!(policy.max_failed_attempts, 10);
        assert!(policy.whitelist_ips.is_empty());
        assert!(policy.on_blocked.is_none());
    }

    #[test]
    fn blocklist_policy_on_blocked_is_callable() {
        let seen: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let policy = BlocklistPolicy {
            on_blocked: Some(Arc::new(move |ip: &str| seen_clone.lock().unwrap().push(ip.to_string()))),
            ..BlocklistPolicy::default()
        };

        (policy.on_blocked.as_ref().unwrap())("203.0.113.5");
        assert_eq!(*seen.lock().unwrap(), vec!["203.0.113.5"]);
    }
}
