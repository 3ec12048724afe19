use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;

/// Sliding window in-memory rate limiter (process local).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), enabled }
    }

    /// Returns true if allowed, false if limited.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled { return true; }
        let now = Instant::now();
        let mut entry = self.store.entry(key.to_string()).or_default();
        while let Some(front) = entry.front() {
            if now.duration_since(*front) >= window { entry.pop_front(); } else { break; }
        }
        if entry.len() < limit {
            entry.push_back(now);
            true
        } else {
            false
        }
    }
}

/// Per-action limits, read from `RL_*` variables.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub register_limit: usize,
    pub register_window: Duration,
    pub login_limit: usize,
    pub login_window: Duration,
    pub search_limit: usize,
    pub search_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            register_limit: 5,
            register_window: Duration::from_secs(3600),
            login_limit: 10,
            login_window: Duration::from_secs(300),
            search_limit: 60,
            search_window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        fn usize_env(name: &str, default: usize) -> usize { std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default) }
        fn dur_env(name: &str, default: Duration) -> Duration { std::env::var(name).ok().and_then(|v| v.parse().ok()).map(Duration::from_secs).unwrap_or(default) }
        let d = Self::default();
        Self {
            register_limit: usize_env("RL_REGISTER_LIMIT", d.register_limit),
            register_window: dur_env("RL_REGISTER_WINDOW", d.register_window),
            login_limit: usize_env("RL_LOGIN_LIMIT", d.login_limit),
            login_window: dur_env("RL_LOGIN_WINDOW", d.login_window),
            search_limit: usize_env("RL_SEARCH_LIMIT", d.search_limit),
            search_window: dur_env("RL_SEARCH_WINDOW", d.search_window),
        }
    }
}

/// High level guard used by handlers, keyed by client IP.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self { Self { limiter, cfg } }
    pub fn allow_register(&self, ip: &str) -> bool { self.limiter.check(&format!("register:{ip}"), self.cfg.register_limit, self.cfg.register_window) }
    pub fn allow_login(&self, ip: &str) -> bool { self.limiter.check(&format!("login:{ip}"), self.cfg.login_limit, self.cfg.login_window) }
    pub fn allow_search(&self, ip: &str) -> bool { self.limiter.check(&format!("search:{ip}"), self.cfg.search_limit, self.cfg.search_window) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_window_basic() {
        let rl = InMemoryRateLimiter::new(true);
        let window = Duration::from_millis(50);
        for _ in 0..3 { assert!(rl.check("k", 3, window)); }
        assert!(!rl.check("k", 3, window));
        std::thread::sleep(Duration::from_millis(60));
        assert!(rl.check("k", 3, window));
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let rl = InMemoryRateLimiter::new(false);
        for _ in 0..100 { assert!(rl.check("k", 1, Duration::from_secs(60))); }
    }

    #[test]
    fn actions_are_counted_separately() {
        let cfg = RateLimitConfig { login_limit: 1, register_limit: 1, ..RateLimitConfig::default() };
        let f = RateLimiterFacade::new(InMemoryRateLimiter::new(true), cfg);
        assert!(f.allow_login("1.2.3.4"));
        assert!(!f.allow_login("1.2.3.4"));
        assert!(f.allow_register("1.2.3.4"));
        assert!(f.allow_login("5.6.7.8"));
    }
}
