use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

pub type Id = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Subscription {
    #[default]
    Free,
    Premium,
}

impl Subscription {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subscription::Free => "free",
            Subscription::Premium => "premium",
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subscription {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Subscription::Free),
            "premium" => Ok(Subscription::Premium),
            other => Err(format!("unknown subscription tier '{other}'")),
        }
    }
}

/// Stored account record. Serialized only into the store snapshot, never to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub age: i32,
    pub email: String,
    pub password_hash: String,
    pub searches_this_week: u32,
    pub last_search_reset: DateTime<Utc>,
    pub subscription: Subscription,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub age: i32,
    pub email: String,
    pub password_hash: String,
}

/// Client-facing view of a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub age: i32,
    pub subscription: Subscription,
    pub searches_this_week: u32,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            age: u.age,
            subscription: u.subscription,
            searches_this_week: u.searches_this_week,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SearchRequest {
    pub word: Option<String>,
    pub language: Option<String>,
    pub token: Option<String>,
}

/// Which step of the lookup chain produced a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    PrimaryApi,
    SecondaryApi,
    LocalFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    pub word: String,
    pub language: String,
    pub meaning: String,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_word: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Language {
    pub name: String,
    pub code: String,
}
