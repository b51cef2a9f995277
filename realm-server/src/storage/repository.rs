//! Repository traits - abstraction layer for persistent data
//!
//! The network layer only sees these traits, so the LMDB backend and the
//! in-memory one used by tests are interchangeable.

use async_trait::async_trait;
use std::error::Error;

use realm_core::persistence::PlayerRecord;

/// Generic result type for repository operations
pub type RepoResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Saved player state, keyed by account name
#[async_trait]
pub trait PlayerRepo: Send + Sync {
    async fn load(&self, name: &str) -> RepoResult<Option<PlayerRecord>>;
    async fn save(&self, name: &str, record: &PlayerRecord) -> RepoResult<()>;
}

/// Login credentials
#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// Returns `false` when the name is already taken.
    async fn create(&self, username: &str, password: &str) -> RepoResult<bool>;
    /// Returns `false` for unknown users and wrong passwords alike.
    async fn verify(&self, username: &str, password: &str) -> RepoResult<bool>;
}
