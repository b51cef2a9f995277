//! Realm - authoritative world core
//!
//! Deterministic simulation for a tile-based multiplayer world. The server
//! crate owns sockets and storage; everything here runs on one `World`:
//! - Component store and wire ids (`store`)
//! - JSON wire protocol and entity records (`protocol`, `serialization`)
//! - Tile maps and data-driven assets (`map`, `assets`)
//! - Movement with speed budget and collision (`movement`, `collision`)
//! - Melee combat, death and respawn (`combat`)
//! - Levels, stat points and class evolution (`progression`)
//! - Area-of-interest fan-out (`aoi`, `outbox`)
//! - Monster AI tick (`ai`)
//! - Sessions, chat and bevy wiring (`engine`)

pub mod ai;
pub mod aoi;
pub mod assets;
pub mod collision;
pub mod combat;
pub mod components;
pub mod constants;
pub mod engine;
pub mod logging;
pub mod map;
pub mod movement;
pub mod outbox;
pub mod persistence;
pub mod progression;
pub mod protocol;
pub mod serialization;
pub mod store;
