//! Melee combat: validation, damage, death.
//!
//! ```text
//! DAMAGE request
//!   ├─ self target / no position / out of range / already dead ─▶ notice to attacker
//!   └─ damage = max(1, attack_power - defense)
//!        ├─ HEALTH_UPDATE ─▶ target + target's AOI
//!        ├─ notices ─▶ attacker, target
//!        └─ health hit 0 ─▶ "X has been defeated!" to everyone
//!             ├─ player:  respawn at (10, 10), full heal, resync
//!             └─ monster: ENTITY_REMOVE to AOI, despawn
//! ```

use bevy::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::aoi::{self, SelfDelivery};
use crate::components::{EntityKind, Health, Position, Stats};
use crate::constants::{ATTACK_RANGE, RESPAWN_X, RESPAWN_Y};
use crate::engine::EngineConfig;
use crate::outbox;
use crate::protocol::ServerPacket;
use crate::serialization;
use crate::store;

// ============================================================================
// Types
// ============================================================================

/// Display text is what the attacker is told.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CombatRejection {
    #[error("You cannot attack yourself.")]
    SelfTarget,
    #[error("Target not found.")]
    UnknownTarget,
    #[error("Server error: Target or self position not found.")]
    MissingPosition,
    #[error("Target is too far to attack.")]
    OutOfRange { distance: f32 },
    #[error("That target cannot be attacked.")]
    NotDamageable,
    #[error("Target is already defeated.")]
    AlreadyDefeated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DamageOutcome {
    pub damage: u32,
    pub remaining_health: u32,
    pub defeated: bool,
}

// ============================================================================
// Formula
// ============================================================================

/// `max(1, attack_power - defense)`; 1 when either side has no stats.
pub fn compute_damage(attacker: Option<&Stats>, defender: Option<&Stats>) -> u32 {
    match (attacker, defender) {
        (Some(attacker), Some(defender)) => attacker
            .attack_power()
            .saturating_sub(defender.defense())
            .max(1),
        _ => 1,
    }
}

// ============================================================================
// Request handling
// ============================================================================

fn validate(world: &World, attacker: Entity, target: Entity) -> Result<u32, CombatRejection> {
    if attacker == target {
        return Err(CombatRejection::SelfTarget);
    }
    if !world.entities().contains(target) {
        return Err(CombatRejection::UnknownTarget);
    }
    let (Some(from), Some(to)) = (
        world.get::<Position>(attacker),
        world.get::<Position>(target),
    ) else {
        return Err(CombatRejection::MissingPosition);
    };
    let distance = from.distance(to);
    let range = world
        .get_resource::<EngineConfig>()
        .map_or(ATTACK_RANGE, |config| config.attack_range);
    if distance > range {
        return Err(CombatRejection::OutOfRange { distance });
    }
    let health = world
        .get::<Health>(target)
        .ok_or(CombatRejection::NotDamageable)?;
    if health.is_dead() {
        return Err(CombatRejection::AlreadyDefeated);
    }
    Ok(compute_damage(
        world.get::<Stats>(attacker),
        world.get::<Stats>(target),
    ))
}

/// Client DAMAGE. Rejections are reported to the attacker only.
pub fn handle_damage_request(
    world: &mut World,
    attacker: Entity,
    target: Entity,
) -> Result<DamageOutcome, CombatRejection> {
    match validate(world, attacker, target) {
        Ok(damage) => Ok(apply_damage(world, attacker, target, damage)),
        Err(rejection) => {
            debug!("Attack {:?} -> {:?} rejected: {:?}", attacker, target, rejection);
            outbox::notify(world, attacker, rejection.to_string());
            Err(rejection)
        }
    }
}

fn apply_damage(world: &mut World, attacker: Entity, target: Entity, damage: u32) -> DamageOutcome {
    let (applied, health) = match world.get_mut::<Health>(target) {
        Some(mut health) => {
            let applied = health.take_damage(damage);
            (applied, *health)
        }
        None => {
            return DamageOutcome {
                damage: 0,
                remaining_health: 0,
                defeated: false,
            }
        }
    };

    if let Some(packet) = serialization::health_update(world, target) {
        outbox::send_to_entity(world, target, packet.clone());
        aoi::broadcast_mutation(world, target, packet, SelfDelivery::Exclude);
    }

    let attacker_name = store::display_name(world, attacker);
    let target_name = store::display_name(world, target);
    outbox::notify(
        world,
        attacker,
        format!("You dealt {} of damage to {}.", applied, target_name),
    );
    outbox::notify(
        world,
        target,
        format!(
            "You received {} of damage from {}. Health left: {}/{}",
            applied,
            attacker_name,
            health.current(),
            health.max()
        ),
    );

    let outcome = DamageOutcome {
        damage: applied,
        remaining_health: health.current(),
        defeated: health.is_dead(),
    };
    if outcome.defeated {
        handle_death(world, target);
    }
    outcome
}

// ============================================================================
// Death
// ============================================================================

pub fn handle_death(world: &mut World, entity: Entity) {
    let name = store::display_name(world, entity);
    info!("{} has been defeated", name);
    outbox::send_to_all(
        world,
        ServerPacket::system(format!("{} has been defeated!", name)),
        None,
    );

    match world.get::<EntityKind>(entity).copied() {
        Some(EntityKind::Player) => respawn_player(world, entity),
        _ => {
            aoi::broadcast_removal(world, entity);
            store::remove(world, entity);
        }
    }
}

/// Sends a defeated player back to the spawn point at full health.
pub fn respawn_player(world: &mut World, entity: Entity) {
    if let Some(mut position) = world.get_mut::<Position>(entity) {
        *position = Position::new(RESPAWN_X, RESPAWN_Y);
    }
    if let Some(mut health) = world.get_mut::<Health>(entity) {
        health.heal_to_full();
    }
    outbox::notify(world, entity, "You have been defeated! Returning to spawn.");

    for packet in [
        serialization::position_update(world, entity),
        serialization::health_update(world, entity),
    ]
    .into_iter()
    .flatten()
    {
        outbox::send_to_entity(world, entity, packet.clone());
        aoi::broadcast_mutation(world, entity, packet, SelfDelivery::Exclude);
    }
    aoi::refresh_viewport(world, entity);
}
