//! ECS Bridge - connects the tokio network tasks to the live Bevy world
//!
//! Sockets live on a tokio runtime, the world lives in the Bevy app. Traffic
//! crosses in both directions through channels only:
//!
//! ```text
//! connection task (tokio)
//!       │ GameCommand
//!       ▼
//! mpsc channel ──▶ process_game_commands   (RealmSet::Ingest)
//!                        │
//!                        ▼
//!                  engine::handle_packet … ──▶ Outbox
//!                                               │
//!                  flush_outbox            (RealmSet::Egress)
//!                        │ JSON line
//!                        ▼
//! per-connection mpsc ──▶ writer task (tokio) ──▶ socket
//! ```
//!
//! Read-only HTTP handlers use a `WorldSnapshot` republished every tick.

use bevy::app::AppExit;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use realm_core::components::{ConnectionId, EntityKind, Health, PlayerClass, Position, Stats};
use realm_core::engine::{self, EngineConfig, RealmSet};
use realm_core::map::GameMap;
use realm_core::outbox::{Outbox, Outgoing};
use realm_core::persistence::PlayerRecord;
use realm_core::protocol::{encode_server_line, ClientPacket};
use realm_core::store;

use crate::metrics::ServerMetrics;
use crate::storage::{SaveRequest, SaveSender};

// ============================================================================
// World Snapshot (read-only, updated every tick)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub uptime_secs: f64,
    pub map_name: String,
    /// Online players, sorted by name
    pub players: Vec<PlayerSnapshot>,
    pub monster_count: usize,
    pub entity_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub entity_id: u64,
    pub name: String,
    pub class_name: String,
    pub level: u32,
    pub position: [f32; 2],
    pub health: u32,
    pub max_health: u32,
}

pub type SharedWorldSnapshot = Arc<RwLock<WorldSnapshot>>;

// ============================================================================
// Game Commands (network → Bevy)
// ============================================================================

/// Writer half of one client connection. Carries encoded lines.
pub type ClientSender = mpsc::UnboundedSender<String>;

#[derive(Debug)]
pub enum GameCommand {
    /// A login succeeded; spawn the player from its stored record.
    Connect {
        connection: ConnectionId,
        name: String,
        record: PlayerRecord,
        sender: ClientSender,
    },
    /// A decoded in-game packet, in the order it was read.
    Packet {
        connection: ConnectionId,
        packet: ClientPacket,
    },
    /// The socket closed, gracefully or not.
    Disconnect { connection: ConnectionId },
    /// Flush every online player to storage and stop the app.
    Shutdown,
}

pub type CommandSender = mpsc::UnboundedSender<GameCommand>;
pub type CommandReceiver = mpsc::UnboundedReceiver<GameCommand>;

// ============================================================================
// Bevy Resources
// ============================================================================

#[derive(Resource)]
pub struct GameCommandReceiver {
    pub receiver: CommandReceiver,
}

#[derive(Resource)]
pub struct WorldSnapshotResource {
    pub snapshot: SharedWorldSnapshot,
}

/// Where finished player records go to be written.
#[derive(Resource)]
pub struct PersistenceQueue {
    pub sender: SaveSender,
}

#[derive(Resource, Clone)]
pub struct MetricsResource(pub Arc<ServerMetrics>);

/// Writers of every logged-in connection.
#[derive(Resource, Debug, Default)]
pub struct ConnectionRegistry {
    senders: HashMap<ConnectionId, ClientSender>,
}

impl ConnectionRegistry {
    pub fn insert(&mut self, connection: ConnectionId, sender: ClientSender) {
        self.senders.insert(connection, sender);
    }

    pub fn remove(&mut self, connection: ConnectionId) -> Option<ClientSender> {
        self.senders.remove(&connection)
    }

    pub fn get(&self, connection: ConnectionId) -> Option<&ClientSender> {
        self.senders.get(&connection)
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[derive(Resource, Default)]
pub struct ServerUptime {
    pub ticks: u64,
    pub total_time: f64,
}

// ============================================================================
// Bevy Systems
// ============================================================================

/// Applies queued commands, at most `max_commands_per_tick` per tick.
pub fn process_game_commands(world: &mut World) {
    let budget = world
        .get_resource::<EngineConfig>()
        .map_or(256, |config| config.max_commands_per_tick);

    for _ in 0..budget {
        let next = match world.get_resource_mut::<GameCommandReceiver>() {
            Some(mut res) => res.receiver.try_recv(),
            None => return,
        };
        let Ok(command) = next else {
            return;
        };
        apply_command(world, command);
    }
}

pub fn apply_command(world: &mut World, command: GameCommand) {
    match command {
        GameCommand::Connect {
            connection,
            name,
            record,
            sender,
        } => {
            world
                .get_resource_or_insert_with(ConnectionRegistry::default)
                .insert(connection, sender);
            engine::player_connected(world, connection, &name, &record);
        }
        GameCommand::Packet { connection, packet } => {
            engine::handle_packet(world, connection, packet);
        }
        GameCommand::Disconnect { connection } => {
            if let Some((name, record)) = engine::player_disconnected(world, connection) {
                queue_save(world, name, record);
            }
            if let Some(mut registry) = world.get_resource_mut::<ConnectionRegistry>() {
                registry.remove(connection);
            }
        }
        GameCommand::Shutdown => {
            let records = engine::online_records(world);
            info!("Shutdown requested, saving {} online players", records.len());
            for (name, record) in records {
                queue_save(world, name, record);
            }
            world.send_event(AppExit::Success);
        }
    }
}

fn queue_save(world: &World, name: String, record: PlayerRecord) {
    let Some(queue) = world.get_resource::<PersistenceQueue>() else {
        warn!("No persistence queue, record for {} dropped", name);
        return;
    };
    if queue.sender.send(SaveRequest { name, record }).is_err() {
        error!("Persistence worker is gone, record dropped");
    }
}

/// Encodes everything in the outbox and hands it to connection writers.
pub fn flush_outbox(world: &mut World) {
    let outgoing = match world.get_resource_mut::<Outbox>() {
        Some(mut outbox) => outbox.drain(),
        None => return,
    };
    if outgoing.is_empty() {
        return;
    }

    let metrics = world.get_resource::<MetricsResource>().map(|m| m.0.clone());
    let Some(registry) = world.get_resource::<ConnectionRegistry>() else {
        return;
    };

    for Outgoing { connection, packet } in outgoing {
        let line = match encode_server_line(&packet) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode {}: {}", packet.kind(), e);
                continue;
            }
        };
        let delivered = registry
            .get(connection)
            .is_some_and(|sender| sender.send(line).is_ok());

        match (&metrics, delivered) {
            (Some(m), true) => ServerMetrics::incr(&m.packets_out),
            (Some(m), false) => ServerMetrics::incr(&m.send_failures),
            (None, _) => {}
        }
        if !delivered {
            debug!("{} gone, dropped {}", connection, packet.kind());
        }
    }
}

pub fn update_uptime(time: Res<Time>, mut uptime: ResMut<ServerUptime>) {
    uptime.ticks += 1;
    uptime.total_time += time.delta_secs() as f64;
}

pub fn update_world_snapshot(world: &mut World) {
    let Some(shared) = world
        .get_resource::<WorldSnapshotResource>()
        .map(|res| res.snapshot.clone())
    else {
        return;
    };

    let (tick, uptime_secs) = world
        .get_resource::<ServerUptime>()
        .map_or((0, 0.0), |u| (u.ticks, u.total_time));
    let map_name = world
        .get_resource::<GameMap>()
        .map(|map| map.name().to_string())
        .unwrap_or_default();

    let mut snap = WorldSnapshot {
        tick,
        uptime_secs,
        map_name,
        ..Default::default()
    };

    let mut query = world.query::<(
        Entity,
        &EntityKind,
        Option<&Position>,
        Option<&Health>,
        Option<&Stats>,
        Option<&PlayerClass>,
    )>();
    let mut players = Vec::new();
    for (entity, kind, position, health, stats, class) in query.iter(world) {
        snap.entity_count += 1;
        match kind {
            EntityKind::Monster => snap.monster_count += 1,
            EntityKind::Player => players.push((
                entity,
                position.copied(),
                health.copied(),
                stats.map(|s| s.level),
                class.map(|c| c.name.clone()),
            )),
        }
    }
    for (entity, position, health, level, class_name) in players {
        let position = position.unwrap_or_default();
        snap.players.push(PlayerSnapshot {
            entity_id: store::wire_id(entity),
            name: store::display_name(world, entity),
            class_name: class_name.unwrap_or_default(),
            level: level.unwrap_or(1),
            position: [position.x, position.y],
            health: health.map_or(0, |h| h.current()),
            max_health: health.map_or(0, |h| h.max()),
        });
    }
    snap.players.sort_by(|a, b| a.name.cmp(&b.name));

    *shared.write().unwrap_or_else(|e| e.into_inner()) = snap;
}

// ============================================================================
// Plugin & Channel Factory
// ============================================================================

/// Registers the bridge systems around the simulation phases. The channel
/// resources (`GameCommandReceiver`, `WorldSnapshotResource`,
/// `PersistenceQueue`, `MetricsResource`) are inserted by the caller.
pub struct BridgePlugin;

impl Plugin for BridgePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ConnectionRegistry>()
            .init_resource::<ServerUptime>()
            .add_systems(Update, process_game_commands.in_set(RealmSet::Ingest))
            .add_systems(
                Update,
                (flush_outbox, update_uptime, update_world_snapshot)
                    .chain()
                    .in_set(RealmSet::Egress),
            );
    }
}

/// Returns (CommandSender for connection tasks, GameCommandReceiver for
/// Bevy, SharedWorldSnapshot for the API)
pub fn create_bridge() -> (CommandSender, GameCommandReceiver, SharedWorldSnapshot) {
    let (tx, rx) = mpsc::unbounded_channel();
    let snapshot = Arc::new(RwLock::new(WorldSnapshot::default()));

    (tx, GameCommandReceiver { receiver: rx }, snapshot)
}

// ============================================================================
// Tests
// ============================================================================
