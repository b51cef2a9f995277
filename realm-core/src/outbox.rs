//! Per-tick queue of addressed packets.
//!
//! Systems never touch sockets; they push `(connection, packet)` pairs here
//! and whoever owns the transport drains the queue once per tick.

use bevy::prelude::*;

use crate::components::ConnectionId;
use crate::protocol::ServerPacket;
use crate::store;

#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub connection: ConnectionId,
    pub packet: ServerPacket,
}

#[derive(Resource, Debug, Default)]
pub struct Outbox {
    queue: Vec<Outgoing>,
}

impl Outbox {
    pub fn send(&mut self, connection: ConnectionId, packet: ServerPacket) {
        self.queue.push(Outgoing { connection, packet });
    }

    pub fn drain(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.queue)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Everything queued for one connection, in order, without consuming.
    pub fn for_connection(&self, connection: ConnectionId) -> Vec<&ServerPacket> {
        self.queue
            .iter()
            .filter(|out| out.connection == connection)
            .map(|out| &out.packet)
            .collect()
    }
}

/// Queues a packet for a connection.
pub fn send_to(world: &mut World, connection: ConnectionId, packet: ServerPacket) {
    world.resource_mut::<Outbox>().send(connection, packet);
}

/// Queues a packet for the entity's owner, if it has a live connection.
pub fn send_to_entity(world: &mut World, entity: Entity, packet: ServerPacket) {
    if let Some(connection) = store::connection_of(world, entity) {
        send_to(world, connection, packet);
    }
}

/// `SYSTEM_MESSAGE` to one entity's owner.
pub fn notify(world: &mut World, entity: Entity, content: impl Into<String>) {
    send_to_entity(world, entity, ServerPacket::system(content));
}

/// Queues a packet for every connected player except `except`.
pub fn send_to_all(world: &mut World, packet: ServerPacket, except: Option<ConnectionId>) {
    let recipients = store::connected_players(world);
    let mut outbox = world.resource_mut::<Outbox>();
    for (_, connection) in recipients {
        if Some(connection) != except {
            outbox.send(connection, packet.clone());
        }
    }
}
