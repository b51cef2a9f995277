//! LMDB store - persistent player records and accounts
//!
//! One environment, two named databases keyed by account name:
//! - `players`: JSON-encoded `PlayerRecord`
//! - `accounts`: JSON-encoded `AccountRecord`
//!
//! Writes are single ACID transactions; account creation checks and inserts
//! inside the same write transaction so two registrations cannot race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use realm_core::persistence::PlayerRecord;

use super::repository::{AccountRepo, PlayerRepo, RepoResult};
use crate::auth;

type JsonDb = Database<heed::types::Str, heed::types::Bytes>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct LmdbStore {
    env: Arc<Env>,
    players: JsonDb,
    accounts: JsonDb,
}

impl LmdbStore {
    /// Open or create the store under `path`.
    ///
    /// `max_size` must be a multiple of the OS page size.
    pub fn new<P: AsRef<Path>>(path: P, max_size: usize) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size)
                .max_dbs(2)
                .open(path.as_ref())?
        };

        let mut wtxn = env.write_txn()?;
        let players = env.create_database::<heed::types::Str, heed::types::Bytes>(&mut wtxn, Some("players"))?;
        let accounts = env.create_database::<heed::types::Str, heed::types::Bytes>(&mut wtxn, Some("accounts"))?;
        wtxn.commit()?;

        info!(
            "LMDB store opened at {} ({}MB)",
            path.as_ref().display(),
            max_size / (1024 * 1024)
        );

        Ok(Self {
            env: Arc::new(env),
            players,
            accounts,
        })
    }

    // ========================================================================
    // Players
    // ========================================================================

    pub fn put_player(&self, name: &str, record: &PlayerRecord) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(record)?;
        let mut wtxn = self.env.write_txn()?;
        self.players.put(&mut wtxn, name, &bytes)?;
        wtxn.commit()?;
        debug!("Stored player record: {}", name);
        Ok(())
    }

    pub fn get_player(&self, name: &str) -> Result<Option<PlayerRecord>, StorageError> {
        let rtxn = self.env.read_txn()?;
        match self.players.get(&rtxn, name)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Inserts a new account. Returns `false` without writing if the name exists.
    pub fn create_account(&self, username: &str, password: &str) -> Result<bool, StorageError> {
        // hashed before the write lock is taken
        let record = AccountRecord {
            password_hash: auth::hash_password(password)?,
            created_at: Utc::now(),
        };
        let mut wtxn = self.env.write_txn()?;
        if self.accounts.get(&wtxn, username)?.is_some() {
            return Ok(false);
        }
        let bytes = serde_json::to_vec(&record)?;
        self.accounts.put(&mut wtxn, username, &bytes)?;
        wtxn.commit()?;
        info!("Registered account: {}", username);
        Ok(true)
    }

    pub fn get_account(&self, username: &str) -> Result<Option<AccountRecord>, StorageError> {
        let rtxn = self.env.read_txn()?;
        match self.accounts.get(&rtxn, username)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }
}

// ============================================================================
// Repository adapters
// ============================================================================

pub struct LmdbPlayerRepo {
    store: Arc<LmdbStore>,
}

impl LmdbPlayerRepo {
    pub fn new(store: Arc<LmdbStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PlayerRepo for LmdbPlayerRepo {
    async fn load(&self, name: &str) -> RepoResult<Option<PlayerRecord>> {
        Ok(self.store.get_player(name)?)
    }

    async fn save(&self, name: &str, record: &PlayerRecord) -> RepoResult<()> {
        Ok(self.store.put_player(name, record)?)
    }
}

pub struct LmdbAccountRepo {
    store: Arc<LmdbStore>,
}

impl LmdbAccountRepo {
    pub fn new(store: Arc<LmdbStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AccountRepo for LmdbAccountRepo {
    async fn create(&self, username: &str, password: &str) -> RepoResult<bool> {
        Ok(self.store.create_account(username, password)?)
    }

    async fn verify(&self, username: &str, password: &str) -> RepoResult<bool> {
        Ok(self
            .store
            .get_account(username)?
            .is_some_and(|account| auth::verify_password(password, &account.password_hash)))
    }
}
