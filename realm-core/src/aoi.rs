//! Area-of-interest broadcast.
//!
//! Every connected player owns a `Viewport`: the set of entities its client
//! currently knows. Any mutation of a subject is routed per observer:
//!
//! ```text
//!                    in range now?
//!                   yes          no
//!   known  yes   narrow packet   ENTITY_REMOVE + evict
//!          no    ENTITY_NEW      (nothing)
//!                + remember
//! ```
//!
//! The mover's own viewport is refreshed separately (`refresh_viewport`), so
//! a pair of players always learns about each other in both directions.

use bevy::prelude::*;
use tracing::trace;

use crate::components::{ConnectionId, NetworkIdentity, Position, Viewport};
use crate::outbox::{self, Outbox};
use crate::protocol::ServerPacket;
use crate::serialization;

/// Whether the subject's own connection receives the narrow packet too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfDelivery {
    Include,
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Enter,
    Update,
    Leave,
}

/// Routes one mutation of `subject` to every player that sees it, starts
/// seeing it, or stops seeing it.
pub fn broadcast_mutation(
    world: &mut World,
    subject: Entity,
    packet: ServerPacket,
    delivery: SelfDelivery,
) {
    let Some(subject_pos) = world.get::<Position>(subject).copied() else {
        trace!("Dropping {} for {:?}: no position", packet.kind(), subject);
        return;
    };

    if delivery == SelfDelivery::Include {
        outbox::send_to_entity(world, subject, packet.clone());
    }

    let mut observers = world.query::<(Entity, &NetworkIdentity, &Position, &Viewport)>();
    let transitions: Vec<(Entity, ConnectionId, Transition)> = observers
        .iter(world)
        .filter(|(observer, ..)| *observer != subject)
        .filter_map(|(observer, identity, pos, viewport)| {
            let connection = identity.connection?;
            let transition = match (viewport.covers(*pos, subject_pos), viewport.sees(subject)) {
                (true, false) => Transition::Enter,
                (true, true) => Transition::Update,
                (false, true) => Transition::Leave,
                (false, false) => return None,
            };
            Some((observer, connection, transition))
        })
        .collect();

    if transitions.is_empty() {
        return;
    }

    let mut full_record = None;
    for (observer, connection, transition) in transitions {
        let outgoing = match transition {
            Transition::Enter => {
                if let Some(mut viewport) = world.get_mut::<Viewport>(observer) {
                    viewport.visible.insert(subject);
                }
                full_record
                    .get_or_insert_with(|| serialization::entity_new(world, subject, false))
                    .clone()
            }
            Transition::Update => packet.clone(),
            Transition::Leave => {
                if let Some(mut viewport) = world.get_mut::<Viewport>(observer) {
                    viewport.visible.remove(&subject);
                }
                serialization::entity_remove(world, subject)
            }
        };
        world.resource_mut::<Outbox>().send(connection, outgoing);
    }
}

/// Re-evaluates what `observer` can see from where it stands now: entities
/// that came into range are introduced, ones that left are removed.
/// Also seeds the viewport of a freshly connected player.
pub fn refresh_viewport(world: &mut World, observer: Entity) {
    let Some(connection) = crate::store::connection_of(world, observer) else {
        return;
    };
    let (Some(pos), Some(viewport)) = (
        world.get::<Position>(observer).copied(),
        world.get::<Viewport>(observer).cloned(),
    ) else {
        return;
    };

    let mut candidates = world.query::<(Entity, &Position)>();
    let in_range: Vec<Entity> = candidates
        .iter(world)
        .filter(|(other, other_pos)| *other != observer && viewport.covers(pos, **other_pos))
        .map(|(other, _)| other)
        .collect();

    let leaving: Vec<Entity> = viewport
        .visible
        .iter()
        .copied()
        .filter(|known| !in_range.contains(known))
        .collect();
    let entering: Vec<Entity> = in_range
        .into_iter()
        .filter(|other| !viewport.sees(*other))
        .collect();

    for gone in &leaving {
        let packet = serialization::entity_remove(world, *gone);
        world.resource_mut::<Outbox>().send(connection, packet);
    }
    for new in &entering {
        let packet = serialization::entity_new(world, *new, false);
        world.resource_mut::<Outbox>().send(connection, packet);
    }

    if let Some(mut viewport) = world.get_mut::<Viewport>(observer) {
        for gone in &leaving {
            viewport.visible.remove(gone);
        }
        viewport.visible.extend(entering.iter().copied());
    }
}

/// Tells every player that knows `subject` that it is gone and forgets it.
/// Call before despawning.
pub fn broadcast_removal(world: &mut World, subject: Entity) {
    let packet = serialization::entity_remove(world, subject);
    let mut observers = world.query::<(&NetworkIdentity, &mut Viewport)>();
    let mut recipients = Vec::new();
    for (identity, mut viewport) in observers.iter_mut(world) {
        if viewport.visible.remove(&subject) {
            if let Some(connection) = identity.connection {
                recipients.push(connection);
            }
        }
    }
    let mut outbox = world.resource_mut::<Outbox>();
    for connection in recipients {
        outbox.send(connection, packet.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{EntityKind, Health};

    fn setup() -> World {
        let mut world = World::new();
        world.init_resource::<Outbox>();
        world
    }

    fn player(world: &mut World, conn: u64, x: f32, y: f32) -> Entity {
        world
            .spawn((
                EntityKind::Player,
                NetworkIdentity::player(ConnectionId(conn), format!("p{conn}")),
                Position::new(x, y),
                Viewport::default(),
            ))
            .id()
    }

    fn kinds(world: &World, conn: u64) -> Vec<&'static str> {
        world
            .resource::<Outbox>()
            .for_connection(ConnectionId(conn))
            .iter()
            .map(|p| p.kind())
            .collect()
    }

    #[test]
    fn test_enter_then_update_then_leave() {
        let mut world = setup();
        let observer = player(&mut world, 1, 0.0, 0.0);
        let subject = world
            .spawn((EntityKind::Monster, Position::new(10.0, 0.0), Health::new(10)))
            .id();

        let narrow = serialization::health_update(&world, subject).unwrap();
        broadcast_mutation(&mut world, subject, narrow.clone(), SelfDelivery::Exclude);
        broadcast_mutation(&mut world, subject, narrow, SelfDelivery::Exclude);
        assert_eq!(kinds(&world, 1), vec!["ENTITY_NEW", "HEALTH_UPDATE"]);
        assert!(world.get::<Viewport>(observer).unwrap().sees(subject));

        world.get_mut::<Position>(subject).unwrap().x = 40.0;
        let narrow = serialization::position_update(&world, subject).unwrap();
        broadcast_mutation(&mut world, subject, narrow, SelfDelivery::Exclude);
        assert_eq!(
            kinds(&world, 1),
            vec!["ENTITY_NEW", "HEALTH_UPDATE", "ENTITY_REMOVE"]
        );
        assert!(!world.get::<Viewport>(observer).unwrap().sees(subject));
    }

    #[test]
    fn test_out_of_range_unknown_subject_sends_nothing() {
        let mut world = setup();
        player(&mut world, 1, 0.0, 0.0);
        let far = world.spawn((EntityKind::Monster, Position::new(60.0, 60.0))).id();
        let packet = serialization::position_update(&world, far).unwrap();
        broadcast_mutation(&mut world, far, packet, SelfDelivery::Exclude);
        assert!(world.resource::<Outbox>().is_empty());
    }

    #[test]
    fn test_self_delivery_include() {
        let mut world = setup();
        let me = player(&mut world, 1, 0.0, 0.0);
        broadcast_mutation(&mut world, me, ServerPacket::system("x"), SelfDelivery::Include);
        assert_eq!(kinds(&world, 1), vec!["SYSTEM_MESSAGE"]);
        broadcast_mutation(&mut world, me, ServerPacket::system("x"), SelfDelivery::Exclude);
        assert_eq!(kinds(&world, 1).len(), 1);
    }

    #[test]
    fn test_subject_without_position_is_dropped() {
        let mut world = setup();
        player(&mut world, 1, 0.0, 0.0);
        let ghost = world.spawn(EntityKind::Monster).id();
        broadcast_mutation(&mut world, ghost, ServerPacket::system("x"), SelfDelivery::Include);
        assert!(world.resource::<Outbox>().is_empty());
    }

    #[test]
    fn test_refresh_viewport_introduces_and_forgets() {
        let mut world = setup();
        let me = player(&mut world, 1, 0.0, 0.0);
        let near = world.spawn((EntityKind::Monster, Position::new(5.0, 5.0))).id();
        world.spawn((EntityKind::Monster, Position::new(90.0, 5.0)));

        refresh_viewport(&mut world, me);
        assert_eq!(kinds(&world, 1), vec!["ENTITY_NEW"]);
        assert_eq!(world.get::<Viewport>(me).unwrap().visible.len(), 1);

        world.get_mut::<Position>(me).unwrap().x = 50.0;
        refresh_viewport(&mut world, me);
        assert_eq!(kinds(&world, 1), vec!["ENTITY_NEW", "ENTITY_REMOVE"]);
        assert!(!world.get::<Viewport>(me).unwrap().sees(near));
    }

    #[test]
    fn test_broadcast_removal_only_reaches_those_who_knew() {
        let mut world = setup();
        let a = player(&mut world, 1, 0.0, 0.0);
        player(&mut world, 2, 0.0, 0.0);
        let mob = world.spawn((EntityKind::Monster, Position::new(1.0, 1.0))).id();
        world.get_mut::<Viewport>(a).unwrap().visible.insert(mob);

        broadcast_removal(&mut world, mob);
        assert_eq!(kinds(&world, 1), vec!["ENTITY_REMOVE"]);
        assert!(kinds(&world, 2).is_empty());
        assert!(!world.get::<Viewport>(a).unwrap().sees(mob));
    }
}
