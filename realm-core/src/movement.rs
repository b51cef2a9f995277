//! Movement validation and commit.
//!
//! Player moves are checked against a speed budget before collision; NPC
//! moves come from the AI and skip the budget. Either way the position only
//! changes when collision accepts the destination.

use bevy::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::aoi::{self, SelfDelivery};
use crate::collision::{self, Blocker};
use crate::components::{Position, Stats};
use crate::constants::{MAX_MOVE_DISTANCE, MOVE_TIME_SLICE_SECS};
use crate::outbox;
use crate::serialization;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum MoveRejection {
    #[error("displacement is not a finite number")]
    NonFinite,
    #[error("displacement {requested:.2} exceeds budget {budget:.2}")]
    OverBudget { requested: f32, budget: f32 },
    #[error("destination blocked by {0:?}")]
    Blocked(Blocker),
    #[error("entity has no position")]
    NoPosition,
}

/// Largest displacement one request may cover.
pub fn move_budget(world: &World, entity: Entity) -> f32 {
    world
        .get::<Stats>(entity)
        .map(|stats| stats.movement_speed() * MOVE_TIME_SLICE_SECS)
        .unwrap_or(MAX_MOVE_DISTANCE)
}

fn commit(world: &mut World, entity: Entity, dx: f32, dy: f32) -> Result<Position, MoveRejection> {
    let from = *world
        .get::<Position>(entity)
        .ok_or(MoveRejection::NoPosition)?;
    let resolution = collision::resolve(world, entity, from, from.offset(dx, dy));
    if let Some(blocker) = resolution.blocked_by {
        return Err(MoveRejection::Blocked(blocker));
    }
    let Some(mut position) = world.get_mut::<Position>(entity) else {
        return Err(MoveRejection::NoPosition);
    };
    *position = resolution.final_position;
    Ok(resolution.final_position)
}

/// Client MOVE. On rejection the requester alone is re-synced to its last
/// confirmed position; on success everyone in range hears about it and the
/// requester gets an echo.
pub fn handle_move_request(
    world: &mut World,
    entity: Entity,
    dx: f32,
    dy: f32,
) -> Result<Position, MoveRejection> {
    let result = if !dx.is_finite() || !dy.is_finite() {
        Err(MoveRejection::NonFinite)
    } else {
        let requested = dx.hypot(dy);
        let budget = move_budget(world, entity);
        if requested > budget {
            Err(MoveRejection::OverBudget { requested, budget })
        } else {
            commit(world, entity, dx, dy)
        }
    };

    match result {
        Ok(_) => {
            if let Some(packet) = serialization::position_update(world, entity) {
                aoi::broadcast_mutation(world, entity, packet.clone(), SelfDelivery::Exclude);
                outbox::send_to_entity(world, entity, packet);
            }
            aoi::refresh_viewport(world, entity);
        }
        Err(rejection) => {
            debug!("Move of {:?} rejected: {}", entity, rejection);
            if let Some(packet) = serialization::position_update(world, entity) {
                outbox::send_to_entity(world, entity, packet);
            }
        }
    }
    result
}

/// Trusted displacement from the AI: no budget, still collides.
pub fn npc_move(
    world: &mut World,
    entity: Entity,
    dx: f32,
    dy: f32,
) -> Result<Position, MoveRejection> {
    let position = commit(world, entity, dx, dy)?;
    if let Some(packet) = serialization::position_update(world, entity) {
        aoi::broadcast_mutation(world, entity, packet, SelfDelivery::Include);
    }
    Ok(position)
}
