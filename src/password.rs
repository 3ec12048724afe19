//! Argon2id password hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

#[derive(thiserror::Error, Debug)]
pub enum HashError {
    #[error("invalid argon2 parameters: {0}")]
    Params(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("hashing task failed: {0}")]
    Task(String),
}

/// Salted, deliberately slow one-way hashing. Work runs on the blocking pool.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// OWASP minimum memory cost (KiB).
    const MEMORY_COST: u32 = 19_456;
    const TIME_COST: u32 = 2;
    const PARALLELISM: u32 = 1;
    const OUTPUT_LEN: usize = 32;

    /// A well-formed hash that matches no password; verified against when
    /// the account does not exist so both login failures cost the same.
    pub const DUMMY_HASH: &'static str =
        "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    pub fn new() -> Result<Self, HashError> {
        Self::with_params(Self::MEMORY_COST, Self::TIME_COST, Self::PARALLELISM)
    }

    /// Custom cost, mainly for tests.
    pub fn with_params(memory_cost: u32, time_cost: u32, parallelism: u32) -> Result<Self, HashError> {
        let params = Params::new(memory_cost, time_cost, parallelism, Some(Self::OUTPUT_LEN))
            .map_err(|e| HashError::Params(e.to_string()))?;
        Ok(Self { params })
    }

    pub async fn hash(&self, password: String) -> Result<String, HashError> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| HashError::Hash(e.to_string()))
        })
        .await
        .map_err(|e| HashError::Task(e.to_string()))?
    }

    /// `Ok(false)` on mismatch; an unparseable stored hash is an error.
    pub async fn verify(&self, password: String, hash: String) -> Result<bool, HashError> {
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&hash).map_err(|e| HashError::Hash(e.to_string()))?;
            // parameters are read back from the PHC string
            Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await
        .map_err(|e| HashError::Task(e.to_string()))?
    }
}
