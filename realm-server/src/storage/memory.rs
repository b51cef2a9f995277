//! In-memory repositories, for tests and throwaway servers.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use realm_core::persistence::PlayerRecord;

use super::repository::{AccountRepo, PlayerRepo, RepoResult};
use crate::auth;

#[derive(Default)]
pub struct MemoryPlayerRepo {
    records: Mutex<HashMap<String, PlayerRecord>>,
}

#[async_trait]
impl PlayerRepo for MemoryPlayerRepo {
    async fn load(&self, name: &str) -> RepoResult<Option<PlayerRecord>> {
        Ok(self.records.lock().get(name).cloned())
    }

    async fn save(&self, name: &str, record: &PlayerRecord) -> RepoResult<()> {
        self.records.lock().insert(name.to_string(), record.clone());
        Ok(())
    }
}

/// Stores password hashes, never plain text.
#[derive(Default)]
pub struct MemoryAccountRepo {
    hashes: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl AccountRepo for MemoryAccountRepo {
    async fn create(&self, username: &str, password: &str) -> RepoResult<bool> {
        let hash = auth::hash_password(password)?;
        let mut hashes = self.hashes.lock();
        if hashes.contains_key(username) {
            return Ok(false);
        }
        hashes.insert(username.to_string(), hash);
        Ok(true)
    }

    async fn verify(&self, username: &str, password: &str) -> RepoResult<bool> {
        Ok(self
            .hashes
            .lock()
            .get(username)
            .is_some_and(|hash| auth::verify_password(password, hash)))
    }
}
