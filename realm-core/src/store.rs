//! Entity/component store on top of the bevy `World`.
//!
//! Systems talk to the world through these helpers so that the wire id
//! mapping and the "missing entity is not an error" rule live in one place.

use bevy::prelude::*;

use crate::components::{ConnectionId, EntityKind, NetworkIdentity};

/// Stable integer id sent to clients.
pub fn wire_id(entity: Entity) -> u64 {
    entity.to_bits()
}

/// Resolves a client-supplied id. Unknown or stale ids resolve to `None`.
pub fn entity_from_wire(world: &World, id: u64) -> Option<Entity> {
    Entity::try_from_bits(id)
        .ok()
        .filter(|entity| world.entities().contains(*entity))
}

pub fn create(world: &mut World) -> Entity {
    world.spawn_empty().id()
}

/// Attaches (or replaces) a component. Returns false if the entity is gone.
pub fn attach<C: Component>(world: &mut World, entity: Entity, component: C) -> bool {
    if !world.entities().contains(entity) {
        return false;
    }
    world.entity_mut(entity).insert(component);
    true
}

pub fn get<C: Component>(world: &World, entity: Entity) -> Option<&C> {
    world.get::<C>(entity)
}

/// Despawns the entity. Removing an entity that does not exist is a no-op.
pub fn remove(world: &mut World, entity: Entity) -> bool {
    if !world.entities().contains(entity) {
        return false;
    }
    world.despawn(entity)
}

/// Every entity carrying `C`.
pub fn entities_with<C: Component>(world: &mut World) -> Vec<Entity> {
    let mut query = world.query_filtered::<Entity, With<C>>();
    query.iter(world).collect()
}

/// Players that currently own a live connection.
pub fn connected_players(world: &mut World) -> Vec<(Entity, ConnectionId)> {
    let mut query = world.query::<(Entity, &NetworkIdentity)>();
    query
        .iter(world)
        .filter_map(|(entity, identity)| identity.connection.map(|conn| (entity, conn)))
        .collect()
}

pub fn connection_of(world: &World, entity: Entity) -> Option<ConnectionId> {
    world
        .get::<NetworkIdentity>(entity)
        .and_then(|identity| identity.connection)
}

/// Display name, or `"{kind}_{id}"` when the entity has no identity.
pub fn display_name(world: &World, entity: Entity) -> String {
    if let Some(identity) = world.get::<NetworkIdentity>(entity) {
        return identity.name.clone();
    }
    let kind = world
        .get::<EntityKind>(entity)
        .map(|kind| kind.as_str())
        .unwrap_or("entity");
    format!("{}_{}", kind, wire_id(entity))
}
