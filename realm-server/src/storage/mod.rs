//! Storage Layer - player records and accounts
//!
//! ## Architecture
//! ```text
//! [Network tasks]      [Bevy tick]
//!       ↓                   ↓ SaveRequest (mpsc)
//! [AccountRepo]      [persistence worker]
//!       ↓                   ↓
//! ┌──────────────────────────────────┐
//! │ LmdbStore (players, accounts)    │
//! │ or Memory*Repo for tests         │
//! └──────────────────────────────────┘
//! ```
//!
//! The tick never awaits storage: disconnects and the shutdown flush hand
//! records to the worker, which writes them in arrival order.

pub mod lmdb_store;
pub mod memory;
pub mod repository;

use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use realm_core::persistence::PlayerRecord;

use self::lmdb_store::{LmdbAccountRepo, LmdbPlayerRepo, LmdbStore, StorageError};
use self::memory::{MemoryAccountRepo, MemoryPlayerRepo};
use self::repository::{AccountRepo, PlayerRepo};

/// Both repositories behind trait objects.
#[derive(Clone)]
pub struct Storage {
    pub players: Arc<dyn PlayerRepo>,
    pub accounts: Arc<dyn AccountRepo>,
}

impl Storage {
    pub fn lmdb<P: AsRef<Path>>(path: P, max_size: usize) -> Result<Self, StorageError> {
        let store = Arc::new(LmdbStore::new(path, max_size)?);
        Ok(Self {
            players: Arc::new(LmdbPlayerRepo::new(store.clone())),
            accounts: Arc::new(LmdbAccountRepo::new(store)),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            players: Arc::new(MemoryPlayerRepo::default()),
            accounts: Arc::new(MemoryAccountRepo::default()),
        }
    }
}

/// A player record to write, produced by the world thread.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub name: String,
    pub record: PlayerRecord,
}

pub type SaveSender = mpsc::UnboundedSender<SaveRequest>;
pub type SaveReceiver = mpsc::UnboundedReceiver<SaveRequest>;

pub fn save_channel() -> (SaveSender, SaveReceiver) {
    mpsc::unbounded_channel()
}

/// Writes queued records until every sender is dropped. Returns how many
/// records were written successfully.
pub async fn run_persistence_worker(players: Arc<dyn PlayerRepo>, mut requests: SaveReceiver) -> usize {
    let mut saved = 0;
    while let Some(SaveRequest { name, record }) = requests.recv().await {
        match players.save(&name, &record).await {
            Ok(()) => {
                saved += 1;
                debug!("Saved player {}", name);
            }
            Err(e) => error!("Failed to save player {}: {}", name, e),
        }
    }
    info!("Persistence worker stopped after {} saves", saved);
    saved
}
