//! Realm Server Library
//!
//! Everything around the world core that touches the outside:
//! - TCP game protocol with login handshake (`network`)
//! - Channels between tokio tasks and the Bevy world (`ecs_bridge`)
//! - LMDB player records and accounts (`storage`, `auth`)
//! - HTTP status API and counters (`api`, `metrics`)
//! - Environment configuration (`config`)

pub mod api; // HTTP status endpoints
pub mod auth; // Salted password hashing
pub mod config; // Environment configuration
pub mod ecs_bridge; // Network ↔ Bevy ECS communication bridge
pub mod metrics; // Server metrics (Prometheus + JSON export)
pub mod network; // TCP accept loop and per-connection sessions
pub mod storage; // LMDB repositories + persistence worker

pub use config::ServerConfig;
pub use ecs_bridge::{BridgePlugin, GameCommand};
pub use storage::Storage;
