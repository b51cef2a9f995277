//! Integration tests for the storage layer
//!
//! LMDB store → repository adapters → persistence worker, against a
//! temporary directory per test.

use std::sync::Arc;

use realm_core::persistence::PlayerRecord;
use realm_server::storage::lmdb_store::LmdbStore;
use realm_server::storage::repository::{AccountRepo, PlayerRepo};
use realm_server::storage::{self, SaveRequest, Storage};

const DB_SIZE: usize = 10 * 1024 * 1024;

fn record(x: f32, level: u32) -> PlayerRecord {
    PlayerRecord {
        pos_x: Some(x),
        pos_y: Some(10.0),
        level: Some(level),
        experience: Some(250),
        class_name: Some("Warrior".into()),
        strength: Some(4),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_lmdb_player_repo_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = Storage::lmdb(tmp.path(), DB_SIZE).unwrap();

    assert!(storage.players.load("ana").await.unwrap().is_none());
    storage.players.save("ana", &record(12.0, 3)).await.unwrap();
    storage.players.save("ana", &record(14.0, 4)).await.unwrap();

    assert_eq!(storage.players.load("ana").await.unwrap(), Some(record(14.0, 4)));
    assert!(storage.players.load("bo").await.unwrap().is_none());
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let storage = Storage::lmdb(tmp.path(), DB_SIZE).unwrap();
        storage.players.save("ana", &record(20.0, 5)).await.unwrap();
        assert!(storage.accounts.create("ana", "pw").await.unwrap());
    }

    let storage = Storage::lmdb(tmp.path(), DB_SIZE).unwrap();
    assert_eq!(storage.players.load("ana").await.unwrap(), Some(record(20.0, 5)));
    assert!(storage.accounts.verify("ana", "pw").await.unwrap());
}

#[tokio::test]
async fn test_partial_stored_record_loads() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(LmdbStore::new(tmp.path(), DB_SIZE).unwrap());
    let partial: PlayerRecord = serde_json::from_str(r#"{"level": 7, "pos_x": 3.5}"#).unwrap();
    store.put_player("old", &partial).unwrap();

    let loaded = store.get_player("old").unwrap().unwrap();
    assert_eq!(loaded.level, Some(7));
    assert_eq!(loaded.pos_y, None);
    assert_eq!(loaded.class_name(), "Novice");
}

async fn check_accounts(accounts: &dyn AccountRepo) {
    assert!(accounts.create("ana", "secret").await.unwrap());
    assert!(!accounts.create("ana", "other").await.unwrap());
    assert!(accounts.verify("ana", "secret").await.unwrap());
    assert!(!accounts.verify("ana", "other").await.unwrap());
    assert!(!accounts.verify("nobody", "secret").await.unwrap());
    assert!(!accounts.verify("bo", "").await.unwrap());
}

#[tokio::test]
async fn test_account_rules_lmdb() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = Storage::lmdb(tmp.path(), DB_SIZE).unwrap();
    check_accounts(storage.accounts.as_ref()).await;
}

#[tokio::test]
async fn test_account_rules_memory() {
    let storage = Storage::in_memory();
    check_accounts(storage.accounts.as_ref()).await;
}

#[tokio::test]
async fn test_persistence_worker_drains_until_senders_drop() {
    let storage = Storage::in_memory();
    let (tx, rx) = storage::save_channel();
    let worker = tokio::spawn(storage::run_persistence_worker(storage.players.clone(), rx));

    for (i, name) in ["ana", "bo", "ana"].iter().enumerate() {
        tx.send(SaveRequest {
            name: name.to_string(),
            record: record(i as f32, 1),
        })
        .unwrap();
    }
    drop(tx);

    assert_eq!(worker.await.unwrap(), 3);
    // later writes win
    assert_eq!(storage.players.load("ana").await.unwrap(), Some(record(2.0, 1)));
    assert_eq!(storage.players.load("bo").await.unwrap(), Some(record(1.0, 1)));
}
