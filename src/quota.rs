//! Weekly search quota for free-tier accounts.
//!
//! The window is anchored at `last_search_reset`. Once it is older than the
//! window length the counter is zeroed and persisted *before* the allow
//! check runs, so an exhausted account regains access on its first search
//! of the new week.

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};

use crate::models::{Subscription, User};
use crate::repo::{RepoResult, UserRepo};

pub const FREE_WEEKLY_SEARCHES: u32 = 10;
pub const QUOTA_WINDOW_DAYS: i64 = 7;

/// Remaining searches as reported to clients: a number, or `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchesLeft {
    Remaining(u32),
    Unlimited,
}

impl Serialize for SearchesLeft {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SearchesLeft::Remaining(n) => serializer.serialize_u32(*n),
            SearchesLeft::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

/// Outcome of [`QuotaPolicy::admit`]; both arms carry the post-reset record.
#[derive(Debug, Clone)]
pub enum QuotaDecision {
    Allowed(User),
    Denied(User),
}

#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    weekly_limit: u32,
    window: Duration,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self::new(FREE_WEEKLY_SEARCHES, Duration::days(QUOTA_WINDOW_DAYS))
    }
}

impl QuotaPolicy {
    pub fn new(weekly_limit: u32, window: Duration) -> Self {
        Self { weekly_limit, window }
    }

    pub fn window_expired(&self, user: &User, now: DateTime<Utc>) -> bool {
        user.last_search_reset < now - self.window
    }

    pub fn allows(&self, user: &User) -> bool {
        user.subscription == Subscription::Premium || user.searches_this_week < self.weekly_limit
    }

    pub fn remaining(&self, user: &User) -> SearchesLeft {
        match user.subscription {
            Subscription::Premium => SearchesLeft::Unlimited,
            Subscription::Free => SearchesLeft::Remaining(self.weekly_limit.saturating_sub(user.searches_this_week)),
        }
    }

    /// Reset the window if it has lapsed, returning the record to evaluate.
    pub async fn refresh(&self, repo: &dyn UserRepo, user: User, now: DateTime<Utc>) -> RepoResult<User> {
        if self.window_expired(&user, now) {
            tracing::debug!(user_id = user.id, "weekly search window lapsed; resetting");
            return repo.reset_search_window(user.id, now).await;
        }
        Ok(user)
    }

    pub async fn admit(&self, repo: &dyn UserRepo, user: User, now: DateTime<Utc>) -> RepoResult<QuotaDecision> {
        let user = self.refresh(repo, user, now).await?;
        if self.allows(&user) {
            Ok(QuotaDecision::Allowed(user))
        } else {
            tracing::info!(user_id = user.id, searches = user.searches_this_week, "search quota exhausted");
            Ok(QuotaDecision::Denied(user))
        }
    }

    /// Count one completed search. Premium accounts are never charged.
    pub async fn record(&self, repo: &dyn UserRepo, user: &User) -> RepoResult<SearchesLeft> {
        match user.subscription {
            Subscription::Premium => Ok(SearchesLeft::Unlimited),
            Subscription::Free => {
                let used = user.searches_this_week + 1;
                repo.update_search_count(user.id, used).await?;
                Ok(SearchesLeft::Remaining(self.weekly_limit.saturating_sub(used)))
            }
        }
    }
}
