//! Shape of a stored player and the rules for turning it back into
//! components. Storage backends live in the server crate.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::assets::ClassMetadata;
use crate::components::{Attribute, Attributes, Health, PlayerClass, Position, Stats};
use crate::constants::{DEFAULT_BASE_HEALTH, DEFAULT_CLASS, RESPAWN_X, RESPAWN_Y};

/// Every field is optional so that records written by older builds, or by
/// hand, still load. Attributes are stored without the class bonus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerRecord {
    pub pos_x: Option<f32>,
    pub pos_y: Option<f32>,
    pub level: Option<u32>,
    pub experience: Option<u64>,
    pub stat_points: Option<u32>,
    pub current_health: Option<i64>,
    pub class_name: Option<String>,
    pub strength: Option<u32>,
    pub agility: Option<u32>,
    pub vitality: Option<u32>,
    pub intelligence: Option<u32>,
    pub dexterity: Option<u32>,
    pub luck: Option<u32>,
}

impl PlayerRecord {
    /// Snapshot of a live player. `None` if it lacks stats or a position.
    pub fn capture(world: &World, entity: Entity) -> Option<Self> {
        let pos = world.get::<Position>(entity)?;
        let stats = world.get::<Stats>(entity)?;
        let health = world.get::<Health>(entity);
        let class = world.get::<PlayerClass>(entity);
        Some(Self {
            pos_x: Some(pos.x),
            pos_y: Some(pos.y),
            level: Some(stats.level),
            experience: Some(stats.experience),
            stat_points: Some(stats.stat_points),
            current_health: health.map(|h| i64::from(h.current())),
            class_name: class.map(|c| c.name.clone()),
            strength: Some(stats.base.strength),
            agility: Some(stats.base.agility),
            vitality: Some(stats.base.vitality),
            intelligence: Some(stats.base.intelligence),
            dexterity: Some(stats.base.dexterity),
            luck: Some(stats.base.luck),
        })
    }

    fn stored(&self, attribute: Attribute) -> Option<u32> {
        match attribute {
            Attribute::Strength => self.strength,
            Attribute::Agility => self.agility,
            Attribute::Vitality => self.vitality,
            Attribute::Intelligence => self.intelligence,
            Attribute::Dexterity => self.dexterity,
            Attribute::Luck => self.luck,
        }
    }

    /// Stored position, or the spawn point if missing or not finite.
    pub fn position(&self) -> Position {
        match (self.pos_x, self.pos_y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Position::new(x, y),
            _ => Position::new(RESPAWN_X, RESPAWN_Y),
        }
    }

    pub fn class_name(&self) -> &str {
        self.class_name.as_deref().unwrap_or(DEFAULT_CLASS)
    }

    /// Rebuilds stats; the class bonus and base health come from `class`.
    pub fn stats(&self, class: Option<&ClassMetadata>) -> Stats {
        let mut base = Attributes::default();
        for attribute in Attribute::ALL {
            *base.get_mut(attribute) = self.stored(attribute).unwrap_or(1);
        }
        Stats {
            level: self.level.unwrap_or(1).max(1),
            experience: self.experience.unwrap_or(0),
            stat_points: self.stat_points.unwrap_or(0),
            base_health: class.map_or(DEFAULT_BASE_HEALTH, |c| c.base_health),
            base,
            class_bonus: class.map(|c| c.class_bonus).unwrap_or_default(),
        }
    }

    /// Stored health clamped into `1..=max`; absent or non-positive means full.
    pub fn health(&self, max: u32) -> Health {
        match self.current_health {
            Some(current) if current > 0 => {
                Health::with_current(u32::try_from(current).unwrap_or(max).min(max), max)
            }
            _ => Health::new(max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_gives_new_player_defaults() {
        let record: PlayerRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record.position(), Position::new(10.0, 10.0));
        assert_eq!(record.class_name(), "Novice");
        let stats = record.stats(None);
        assert_eq!(stats, Stats::default());
        assert_eq!(record.health(stats.max_health()).current(), 118);
    }

    #[test]
    fn test_health_clamping() {
        let mut record = PlayerRecord::default();
        record.current_health = Some(0);
        assert_eq!(record.health(120).current(), 120);
        record.current_health = Some(-5);
        assert_eq!(record.health(120).current(), 120);
        record.current_health = Some(500);
        assert_eq!(record.health(120).current(), 120);
        record.current_health = Some(40);
        assert_eq!(record.health(120).current(), 40);
    }

    #[test]
    fn test_class_bonus_is_not_stored() {
        let mut world = World::new();
        let mut bonus = Attributes::default();
        bonus.strength = 5;
        let warrior = ClassMetadata {
            base_health: 150,
            class_bonus: bonus,
            evolution: None,
        };
        let stats = PlayerRecord {
            strength: Some(4),
            ..Default::default()
        }
        .stats(Some(&warrior));
        assert_eq!(stats.total(Attribute::Strength), 9);

        let entity = world
            .spawn((Position::new(3.0, 4.0), stats.clone(), Health::new(stats.max_health())))
            .id();
        let record = PlayerRecord::capture(&world, entity).unwrap();
        assert_eq!(record.strength, Some(4));
        assert_eq!(record.stats(Some(&warrior)), stats);
    }

    #[test]
    fn test_partial_json_loads() {
        let record: PlayerRecord =
            serde_json::from_str(r#"{"level": 7, "pos_x": 12.5, "class_name": "Mage"}"#).unwrap();
        assert_eq!(record.level, Some(7));
        // y missing: whole position falls back
        assert_eq!(record.position(), Position::new(10.0, 10.0));
        assert_eq!(record.class_name(), "Mage");
    }
}
