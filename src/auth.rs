use actix_web::{dev::Payload, web, Error, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{Id, NewUser, User};
use crate::password::{HashError, PasswordHasher};
use crate::repo::{RepoError, UserRepo};
use crate::routes::AppState;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("email already exists")]
    DuplicateEmail,
    #[error("incorrect email or password")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    ExpiredToken,
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Hash(#[from] HashError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<Id, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

/// Signs and checks HS256 bearer tokens with the server secret.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Arc<String>,
    ttl: Duration,
}

impl TokenIssuer {
    pub const DEFAULT_TTL_DAYS: i64 = 90;

    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self { secret: Arc::new(secret.into()), ttl }
    }

    pub fn issue(&self, user_id: Id) -> Result<String, AuthError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a token as if signed at `now`.
    pub fn issue_at(&self, user_id: Id, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp().max(0) as usize,
            exp: (now + self.ttl).timestamp().max(0) as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(self.secret.as_bytes()))
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("token rejected: {e}");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                    _ => AuthError::InvalidToken,
                }
            })
    }
}

/// Token plus the account it was issued for.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registration, login and token verification on top of a [`UserRepo`].
pub struct AuthService {
    repo: Arc<dyn UserRepo>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(repo: Arc<dyn UserRepo>, hasher: PasswordHasher, tokens: TokenIssuer) -> Self {
        Self { repo, hasher, tokens }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub async fn register(&self, name: &str, age: i32, email: &str, password: &str) -> Result<Session, AuthError> {
        let name = name.trim();
        let email = normalize_email(email);
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation("Name, age, email and password are required".into()));
        }
        if !email.contains('@') {
            return Err(AuthError::Validation("Please provide a valid email".into()));
        }
        if age <= 0 {
            return Err(AuthError::Validation("Age must be a positive number".into()));
        }

        let password_hash = self.hasher.hash(password.to_owned()).await?;
        let user = self
            .repo
            .create_user(NewUser { name: name.to_owned(), age, email, password_hash })
            .await
            .map_err(|e| match e {
                RepoError::Conflict => AuthError::DuplicateEmail,
                other => AuthError::Repo(other),
            })?;
        tracing::info!(user_id = user.id, "registered user");
        let token = self.tokens.issue(user.id)?;
        Ok(Session { token, user })
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.repo.find_by_email(&email).await? else {
            let _ = self.hasher.verify(password.to_owned(), PasswordHasher::DUMMY_HASH.to_owned()).await;
            return Err(AuthError::InvalidCredentials);
        };
        let matches = self
            .hasher
            .verify(password.to_owned(), user.password_hash.clone())
            .await
            .unwrap_or_else(|e| {
                tracing::error!(user_id = user.id, "stored password hash unusable: {e}");
                false
            });
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }
        let token = self.tokens.issue(user.id)?;
        Ok(Session { token, user })
    }

    pub fn verify_token(&self, token: &str) -> Result<Id, AuthError> {
        self.tokens.verify(token)?.user_id()
    }
}

/// Extractor yielding validated `Claims` from an `Authorization: Bearer` header.
pub struct Auth(pub Claims);

impl Auth {
    pub fn user_id(&self) -> Result<Id, AuthError> {
        self.0.user_id()
    }
}

impl FromRequest for Auth {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            tracing::error!("AppState missing; cannot verify bearer token");
            return ready(Err(ApiError::Internal.into()));
        };
        // Delegate to BearerAuth to parse the header.
        match BearerAuth::from_request(req, pl).into_inner() {
            Ok(bearer) => ready(
                state
                    .auth
                    .tokens()
                    .verify(bearer.token())
                    .map(Auth)
                    .map_err(|e| ApiError::from(e).into()),
            ),
            Err(_) => ready(Err(ApiError::MissingToken.into())),
        }
    }
}
