//! Token-bucket-per-key rate limiter for protected endpoints, keyed by
//! `"<ip>:<username>"` per spec §4.2. Built on `governor`, the same crate
//! `riptide-utils::rate_limit` uses for its single-key limiter — here keyed,
//! via `governor`'s `DefaultKeyedRateLimiter`, whose `retain_recent` is
//! exactly the hourly idle-bucket GC spec §4.2 asks for.

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

pub type KeyedLimiter = GovernorRateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Per-(ip, username) token bucket. Rate = `requests / window`, burst =
/// `requests` (spec §4.2).
pub struct RateLimiter {
    limiter: KeyedLimiter,
    enabled: bool,
    requests: u32,
    window_min: u64,
}

/// Per-token replenish period for a `requests`-per-`window_min` quota.
/// Uses fractional seconds so a burst that divides the window evenly (or
/// exceeds it, e.g. 100 requests/minute) never truncates to a zero
/// `Duration` under integer division — that would make `Quota::with_period`
/// return `None` and silently fall back to one token per *second* instead
/// of per `window_min` minutes.
fn token_period(requests: u32, window_min: u64) -> std::time::Duration {
    let window_secs = (window_min.max(1) * 60) as f64;
    std::time::Duration::from_secs_f64(window_secs / requests.max(1) as f64)
}

impl RateLimiter {
    pub fn new(enabled: bool, requests: u32, window_min: u64) -> Arc<Self> {
        let burst = NonZeroU32::new(requests.max(1)).unwrap();
        let period = token_period(requests, window_min);
        let quota = Quota::with_period(period)
            .map(|q| q.allow_burst(burst))
            .unwrap_or_else(|| Quota::per_second(burst).allow_burst(burst));

        Arc::new(Self {
            limiter: GovernorRateLimiter::keyed(quota),
            enabled,
            requests,
            window_min,
        })
    }

    pub fn key(ip: &str, username: &str) -> String {
        format!("{ip}:{username}")
    }

    /// `true` if the request is allowed, `false` if the bucket is empty.
    pub fn check(&self, key: &str) -> bool {
        if !self.enabled {
            return true;
        }
        self.limiter.check_key(&key.to_string()).is_ok()
    }

    /// Hourly sweep: drop any bucket that's been idle long enough to have
    /// fully refilled (spec §4.2: "idle for a full refill window").
    pub fn sweep_idle(&self) {
        self.limiter.retain_recent();
    }

    pub fn error_message(&self) -> String {
        format!(
            "Rate limit exceeded. Maximum {} requests per {} allowed.",
            self.requests,
            if self.window_min == 1 {
                "1 minute".to_string()
            } else {
                format!("{} minutes", self.window_min)
            }
        )
    }
}
