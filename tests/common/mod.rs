#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use dialect_base::auth::{AuthService, TokenIssuer};
use dialect_base::catalog::LanguageCatalog;
use dialect_base::lookup::LookupChain;
use dialect_base::password::PasswordHasher;
use dialect_base::quota::QuotaPolicy;
use dialect_base::rate_limit::RateLimiterFacade;
use dialect_base::repo::inmem::InMemRepo;
use dialect_base::AppState;

pub const SECRET: &str = "test-secret-must-be-32-bytes-long!!";

/// Nothing listens here, so both dictionary APIs fail fast and the local table answers.
pub const UNREACHABLE: &str = "http://127.0.0.1:1";

pub fn issuer() -> TokenIssuer {
    TokenIssuer::new(SECRET, chrono::Duration::days(TokenIssuer::DEFAULT_TTL_DAYS))
}

pub fn state_with(wiktionary: &str, free_dictionary: &str, rate_limiter: Option<RateLimiterFacade>) -> (AppState, Arc<InMemRepo>) {
    let repo = Arc::new(InMemRepo::new());
    // minimal argon2 cost keeps the suite fast
    let hasher = PasswordHasher::with_params(1024, 1, 1).unwrap();
    let auth = AuthService::new(repo.clone(), hasher, issuer());
    let lookup = LookupChain::standard(
        Arc::new(LanguageCatalog::builtin()),
        wiktionary,
        free_dictionary,
        Duration::from_secs(2),
    )
    .unwrap();
    let state = AppState {
        repo: repo.clone(),
        auth: Arc::new(auth),
        lookup: Arc::new(lookup),
        quota: QuotaPolicy::default(),
        rate_limiter,
    };
    (state, repo)
}

pub fn offline_state() -> (AppState, Arc<InMemRepo>) {
    state_with(UNREACHABLE, UNREACHABLE, None)
}
