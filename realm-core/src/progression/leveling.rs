use bevy::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::aoi::{self, SelfDelivery};
use crate::components::{Attribute, Health, Stats};
use crate::constants::STAT_POINTS_PER_LEVEL;
use crate::outbox;
use crate::serialization;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatError {
    #[error("You cannot allocate stats right now.")]
    MissingStats,
    #[error("You have no stat points to spend.")]
    NoPoints,
    #[error("Unknown attribute '{0}'. Use one of: strength, agility, vitality, intelligence, dexterity, luck.")]
    UnknownAttribute(String),
}

/// Adds experience and consumes every threshold it crosses. Returns the
/// number of levels gained.
///
/// The threshold is the one of the level the grant started at and holds for
/// the whole grant; the next grant uses the new level's threshold.
pub fn apply_experience(stats: &mut Stats, amount: u64) -> u32 {
    stats.experience = stats.experience.saturating_add(amount);
    let threshold = stats.xp_threshold().max(1);
    let mut gained = 0;
    while stats.experience >= threshold {
        stats.experience -= threshold;
        stats.level += 1;
        stats.stat_points = stats.stat_points.saturating_add(STAT_POINTS_PER_LEVEL);
        gained += 1;
    }
    gained
}

/// Grants experience. Any level-up raises max health, heals to it and is
/// announced to the entity's AOI.
pub fn add_experience(world: &mut World, entity: Entity, amount: u64) -> u32 {
    let Some(mut stats) = world.get_mut::<Stats>(entity) else {
        return 0;
    };
    let gained = apply_experience(&mut stats, amount);
    if gained == 0 {
        return 0;
    }
    let (level, max_health) = (stats.level, stats.max_health());

    if let Some(mut health) = world.get_mut::<Health>(entity) {
        health.set_max(max_health);
        health.heal_to_full();
    }
    info!("{:?} reached level {} (+{})", entity, level, gained);
    outbox::notify(
        world,
        entity,
        format!(
            "LEVEL UP! You reached level {}. (+{} points per level)",
            level, STAT_POINTS_PER_LEVEL
        ),
    );
    if let Some(packet) = serialization::level_up(world, entity) {
        aoi::broadcast_mutation(world, entity, packet, SelfDelivery::Include);
    }
    gained
}

/// Spends one stat point on `attribute_name`. Vitality raises max health
/// but does not heal. Returns the new base value.
pub fn add_stat(world: &mut World, entity: Entity, attribute_name: &str) -> Result<u32, StatError> {
    let result = allocate(world, entity, attribute_name);
    match &result {
        Ok(value) => {
            let (attribute, left) = match (
                Attribute::parse(attribute_name),
                world.get::<Stats>(entity),
            ) {
                (Some(attribute), Some(stats)) => (attribute, stats.stat_points),
                _ => return result,
            };
            outbox::notify(
                world,
                entity,
                format!(
                    "{} increased to {}. Stat points left: {}",
                    attribute, value, left
                ),
            );
            let packet = serialization::entity_update(world, entity);
            aoi::broadcast_mutation(world, entity, packet, SelfDelivery::Include);
        }
        Err(error) => outbox::notify(world, entity, error.to_string()),
    }
    result
}

fn allocate(world: &mut World, entity: Entity, attribute_name: &str) -> Result<u32, StatError> {
    let mut stats = world
        .get_mut::<Stats>(entity)
        .ok_or(StatError::MissingStats)?;
    if stats.stat_points == 0 {
        return Err(StatError::NoPoints);
    }
    let attribute = Attribute::parse(attribute_name)
        .ok_or_else(|| StatError::UnknownAttribute(attribute_name.to_string()))?;

    let slot = stats.base.get_mut(attribute);
    *slot = slot.saturating_add(1);
    let value = *slot;
    stats.stat_points -= 1;
    let max_health = stats.max_health();

    if attribute == Attribute::Vitality {
        if let Some(mut health) = world.get_mut::<Health>(entity) {
            health.set_max(max_health);
        }
    }
    Ok(value)
}
