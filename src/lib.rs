pub mod auth;
pub mod catalog;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod lookup;
pub mod models;
pub mod openapi;
pub mod password;
pub mod quota;
pub mod rate_limit; // in-memory rate limiting
pub mod repo;
pub mod routes;
pub mod security;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
