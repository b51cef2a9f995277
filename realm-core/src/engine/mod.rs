//! Session layer over the world.
//!
//! The server translates socket events into three calls, always from the
//! thread that owns the `World`:
//!
//! ```text
//!   login accepted ──▶ player_connected    spawn, MAP_DATA, introductions
//!   packet         ──▶ handle_packet       move / damage / evolve / chat
//!   socket closed  ──▶ player_disconnected record for storage, despawn
//! ```
//!
//! Everything they produce lands in the `Outbox`.

pub mod chat;
pub mod config;
pub mod plugin;
pub mod spawn;

use std::collections::HashMap;

use bevy::prelude::*;
use tracing::{debug, info, warn};

use crate::ai::SimRng;
use crate::aoi::{self, SelfDelivery};
use crate::assets::{AssetCatalog, AssetError};
use crate::combat::{self, CombatRejection};
use crate::components::ConnectionId;
use crate::map::GameMap;
use crate::movement;
use crate::outbox::{self, Outbox};
use crate::persistence::PlayerRecord;
use crate::progression;
use crate::protocol::{ClientPacket, ServerPacket};
use crate::serialization;
use crate::store;

pub use config::EngineConfig;
pub use plugin::{RealmPlugin, RealmSet};
pub use spawn::{populate_spawn_zones, spawn_monster, spawn_player};

/// Which entity each live connection controls.
#[derive(Resource, Debug, Default)]
pub struct PlayerIndex {
    by_connection: HashMap<ConnectionId, Entity>,
}

impl PlayerIndex {
    pub fn get(&self, connection: ConnectionId) -> Option<Entity> {
        self.by_connection.get(&connection).copied()
    }

    pub fn insert(&mut self, connection: ConnectionId, entity: Entity) {
        self.by_connection.insert(connection, entity);
    }

    pub fn remove(&mut self, connection: ConnectionId) -> Option<Entity> {
        self.by_connection.remove(&connection)
    }

    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConnectionId, Entity)> + '_ {
        self.by_connection.iter().map(|(c, e)| (*c, *e))
    }
}

/// Puts every resource the simulation needs into `world` and populates the
/// active map's spawn zones. Returns the number of monsters spawned.
pub fn install(
    world: &mut World,
    config: EngineConfig,
    catalog: &AssetCatalog,
) -> Result<usize, AssetError> {
    let map = catalog.build_map(&config.map_name)?;
    info!(
        "Installing world on {} ({}x{}), seed {}",
        map.name(),
        map.width(),
        map.height(),
        config.seed
    );
    world.insert_resource(map);
    world.insert_resource(catalog.classes.clone());
    world.insert_resource(catalog.monsters.clone());
    world.insert_resource(SimRng::seeded(config.seed));
    world.insert_resource(config);
    world.init_resource::<Outbox>();
    world.init_resource::<PlayerIndex>();
    Ok(populate_spawn_zones(world))
}

/// Spawns the player for a freshly authenticated connection and introduces
/// it to the world.
pub fn player_connected(
    world: &mut World,
    connection: ConnectionId,
    name: &str,
    record: &PlayerRecord,
) -> Entity {
    let entity = spawn_player(world, connection, name, record);
    world.resource_mut::<PlayerIndex>().insert(connection, entity);

    if let Some(map) = world.get_resource::<GameMap>() {
        let packet = ServerPacket::MapData {
            data: map.map_data(),
        };
        outbox::send_to(world, connection, packet);
    }
    let own = serialization::entity_new(world, entity, true);
    outbox::send_to(world, connection, own);
    aoi::refresh_viewport(world, entity);

    let introduction = serialization::entity_new(world, entity, false);
    aoi::broadcast_mutation(world, entity, introduction, SelfDelivery::Exclude);
    outbox::send_to_all(
        world,
        ServerPacket::system(format!("User {} has joined.", name)),
        Some(connection),
    );
    info!("{} joined as {:?} on {}", name, entity, connection);
    entity
}

/// Removes the connection's player. Returns its name and a record to
/// persist, or `None` if the connection never had a player.
pub fn player_disconnected(
    world: &mut World,
    connection: ConnectionId,
) -> Option<(String, PlayerRecord)> {
    let entity = world.resource_mut::<PlayerIndex>().remove(connection)?;
    let name = store::display_name(world, entity);
    let record = PlayerRecord::capture(world, entity);

    aoi::broadcast_removal(world, entity);
    store::remove(world, entity);
    outbox::send_to_all(
        world,
        ServerPacket::system(format!("User {} has left.", name)),
        Some(connection),
    );
    info!("{} left ({})", name, connection);
    record.map(|record| (name, record))
}

/// Records for every online player, for a shutdown flush.
pub fn online_records(world: &World) -> Vec<(String, PlayerRecord)> {
    let Some(index) = world.get_resource::<PlayerIndex>() else {
        return Vec::new();
    };
    index
        .iter()
        .filter_map(|(_, entity)| {
            let record = PlayerRecord::capture(world, entity)?;
            Some((store::display_name(world, entity), record))
        })
        .collect()
}

/// Dispatches one in-game packet from `connection`.
pub fn handle_packet(world: &mut World, connection: ConnectionId, packet: ClientPacket) {
    let Some(entity) = world.resource::<PlayerIndex>().get(connection) else {
        warn!("{} sent {} without a player", connection, packet.kind());
        return;
    };
    debug!("{} -> {}", connection, packet.kind());

    match packet {
        ClientPacket::Move { dx, dy } => {
            let _ = movement::handle_move_request(world, entity, dx, dy);
        }
        ClientPacket::Damage { target_entity_id } => {
            match store::entity_from_wire(world, target_entity_id) {
                Some(target) => {
                    let _ = combat::handle_damage_request(world, entity, target);
                }
                None => outbox::notify(world, entity, CombatRejection::UnknownTarget.to_string()),
            }
        }
        ClientPacket::Evolve { class_name } => {
            let _ = progression::change_class(world, entity, &class_name);
        }
        ClientPacket::ChatMessage { content } => chat::handle_chat(world, entity, &content),
        ClientPacket::Auth { .. } | ClientPacket::Register { .. } => {
            warn!("{} sent {} after login, ignored", connection, packet.kind());
        }
    }
}
