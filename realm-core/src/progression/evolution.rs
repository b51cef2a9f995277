use bevy::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::aoi::{self, SelfDelivery};
use crate::assets::{ClassMetadata, ClassRegistry};
use crate::components::{Health, PlayerClass, Stats};
use crate::outbox;
use crate::serialization;

/// Display text is what the player is told.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvolutionError {
    #[error("You cannot evolve right now.")]
    MissingComponents,
    #[error("Class data for '{0}' is unavailable.")]
    UnknownClass(String),
    #[error("'{current}' cannot evolve into '{target}'.")]
    NotAllowed { current: String, target: String },
    #[error("You must reach level {required} to evolve (current level: {level}).")]
    LevelTooLow { required: u32, level: u32 },
}

/// Checks the current class's evolution rule. Returns the canonical target
/// name (matching is case-insensitive) and its metadata.
fn validate(
    world: &World,
    entity: Entity,
    target: &str,
) -> Result<(String, ClassMetadata), EvolutionError> {
    let (Some(class), Some(stats)) = (
        world.get::<PlayerClass>(entity),
        world.get::<Stats>(entity),
    ) else {
        return Err(EvolutionError::MissingComponents);
    };
    let registry = world
        .get_resource::<ClassRegistry>()
        .ok_or_else(|| EvolutionError::UnknownClass(class.name.clone()))?;
    let current = registry
        .get(&class.name)
        .ok_or_else(|| EvolutionError::UnknownClass(class.name.clone()))?;

    let not_allowed = || EvolutionError::NotAllowed {
        current: class.name.clone(),
        target: target.to_string(),
    };
    let rule = current.evolution.as_ref().ok_or_else(not_allowed)?;
    let canonical = rule
        .to_classes
        .iter()
        .find(|name| name.eq_ignore_ascii_case(target))
        .ok_or_else(not_allowed)?;
    if stats.level < rule.level {
        return Err(EvolutionError::LevelTooLow {
            required: rule.level,
            level: stats.level,
        });
    }
    let metadata = registry
        .get(canonical)
        .cloned()
        .ok_or_else(|| EvolutionError::UnknownClass(canonical.clone()))?;
    Ok((canonical.clone(), metadata))
}

/// Evolves `entity` into `target`. On success the class bonus and base
/// health are replaced, health is refilled and the new record is shown to
/// the AOI. Rejections are reported to the player.
pub fn change_class(world: &mut World, entity: Entity, target: &str) -> Result<String, EvolutionError> {
    let (name, metadata) = match validate(world, entity, target) {
        Ok(found) => found,
        Err(error) => {
            outbox::notify(world, entity, error.to_string());
            return Err(error);
        }
    };

    let max_health = {
        let Some(mut stats) = world.get_mut::<Stats>(entity) else {
            return Err(EvolutionError::MissingComponents);
        };
        stats.class_bonus = metadata.class_bonus;
        stats.base_health = metadata.base_health;
        stats.max_health()
    };
    if let Some(mut class) = world.get_mut::<PlayerClass>(entity) {
        class.name = name.clone();
    }
    if let Some(mut health) = world.get_mut::<Health>(entity) {
        health.set_max(max_health);
        health.heal_to_full();
    }

    info!("{:?} evolved into {}", entity, name);
    outbox::notify(
        world,
        entity,
        format!("*** CONGRATULATIONS! You have evolved into '{}'! ***", name),
    );
    let packet = serialization::entity_update(world, entity);
    aoi::broadcast_mutation(world, entity, packet, SelfDelivery::Include);
    Ok(name)
}
