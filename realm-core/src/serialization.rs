//! Entity → flat wire record.
//!
//! Each component kind has one section writer; `serialize_entity` runs them
//! in a fixed order and skips the ones whose component is absent, so NPCs
//! and players share one encoder.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::{
    Attribute, Attributes, ColliderShape, Collision, EntityKind, Health, PlayerClass, Position,
    Stats,
};
use crate::protocol::ServerPacket;
use crate::store;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFields {
    pub x: f32,
    pub y: f32,
}

/// Attribute values are totals (base + class bonus).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsFields {
    pub level: u32,
    pub experience: u64,
    pub stat_points: u32,
    pub base_health: u32,
    pub strength: u32,
    pub agility: u32,
    pub vitality: u32,
    pub intelligence: u32,
    pub dexterity: u32,
    pub luck: u32,
    pub movement_speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthFields {
    pub current_health: u32,
    pub max_health: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColliderRecord {
    #[serde(rename = "type")]
    pub shape: String,
    pub offset_x: f32,
    pub offset_y: f32,
    pub is_trigger: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
}

impl From<&Collision> for ColliderRecord {
    fn from(collision: &Collision) -> Self {
        let (shape, width, height, radius) = match collision.shape {
            ColliderShape::Box {
                half_width,
                half_height,
            } => ("box", Some(half_width * 2.0), Some(half_height * 2.0), None),
            ColliderShape::Sprite {
                half_width,
                half_height,
            } => ("sprite", Some(half_width * 2.0), Some(half_height * 2.0), None),
            ColliderShape::Circle { radius } => ("circle", None, None, Some(radius)),
        };
        Self {
            shape: shape.to_string(),
            offset_x: collision.offset_x,
            offset_y: collision.offset_y,
            is_trigger: collision.is_trigger,
            width,
            height,
            radius,
        }
    }
}

impl ColliderRecord {
    pub fn to_collision(&self) -> Option<Collision> {
        let shape = match self.shape.as_str() {
            "circle" => ColliderShape::Circle {
                radius: self.radius?,
            },
            "box" => ColliderShape::Box {
                half_width: self.width? / 2.0,
                half_height: self.height? / 2.0,
            },
            "sprite" => ColliderShape::Sprite {
                half_width: self.width? / 2.0,
                half_height: self.height? / 2.0,
            },
            _ => return None,
        };
        Some(Collision {
            shape,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            is_trigger: self.is_trigger,
        })
    }
}

/// Flat record sent in `ENTITY_NEW` / `ENTITY_UPDATE`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_id: u64,
    pub asset_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityKind>,
    #[serde(flatten)]
    pub position: Option<PositionFields>,
    #[serde(flatten)]
    pub stats: Option<StatsFields>,
    #[serde(flatten)]
    pub health: Option<HealthFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collider: Option<ColliderRecord>,
}

type SectionWriter = fn(&World, Entity, &mut EntityRecord);

const SECTIONS: &[SectionWriter] = &[
    write_kind,
    write_position,
    write_stats,
    write_health,
    write_class,
    write_collider,
];

fn write_kind(world: &World, entity: Entity, record: &mut EntityRecord) {
    record.entity_type = world.get::<EntityKind>(entity).copied();
}

fn write_position(world: &World, entity: Entity, record: &mut EntityRecord) {
    record.position = world
        .get::<Position>(entity)
        .map(|p| PositionFields { x: p.x, y: p.y });
}

fn write_stats(world: &World, entity: Entity, record: &mut EntityRecord) {
    record.stats = world.get::<Stats>(entity).map(|stats| {
        let totals = stats.totals();
        StatsFields {
            level: stats.level,
            experience: stats.experience,
            stat_points: stats.stat_points,
            base_health: stats.base_health,
            strength: totals.strength,
            agility: totals.agility,
            vitality: totals.vitality,
            intelligence: totals.intelligence,
            dexterity: totals.dexterity,
            luck: totals.luck,
            movement_speed: stats.movement_speed(),
        }
    });
}

fn write_health(world: &World, entity: Entity, record: &mut EntityRecord) {
    record.health = world.get::<Health>(entity).map(|h| HealthFields {
        current_health: h.current(),
        max_health: h.max(),
    });
}

fn write_class(world: &World, entity: Entity, record: &mut EntityRecord) {
    record.class_name = world
        .get::<PlayerClass>(entity)
        .map(|class| class.name.clone());
}

fn write_collider(world: &World, entity: Entity, record: &mut EntityRecord) {
    record.collider = world.get::<Collision>(entity).map(ColliderRecord::from);
}

/// Full record of whatever components the entity currently has.
pub fn serialize_entity(world: &World, entity: Entity) -> EntityRecord {
    let mut record = EntityRecord {
        entity_id: store::wire_id(entity),
        asset_type: store::display_name(world, entity),
        ..Default::default()
    };
    for section in SECTIONS {
        section(world, entity, &mut record);
    }
    record
}

/// Writes a record's sections onto `entity`. Attribute totals become base
/// values with no class bonus, so re-serializing yields the same totals.
pub fn apply_record(world: &mut World, entity: Entity, record: &EntityRecord) {
    if !world.entities().contains(entity) {
        return;
    }
    let mut target = world.entity_mut(entity);
    if let Some(kind) = record.entity_type {
        target.insert(kind);
    }
    if let Some(pos) = record.position {
        target.insert(Position::new(pos.x, pos.y));
    }
    if let Some(fields) = record.stats {
        let mut base = Attributes::default();
        for (attribute, value) in [
            (Attribute::Strength, fields.strength),
            (Attribute::Agility, fields.agility),
            (Attribute::Vitality, fields.vitality),
            (Attribute::Intelligence, fields.intelligence),
            (Attribute::Dexterity, fields.dexterity),
            (Attribute::Luck, fields.luck),
        ] {
            *base.get_mut(attribute) = value;
        }
        target.insert(Stats {
            level: fields.level,
            experience: fields.experience,
            stat_points: fields.stat_points,
            base_health: fields.base_health,
            base,
            class_bonus: Attributes::default(),
        });
    }
    if let Some(fields) = record.health {
        target.insert(Health::with_current(fields.current_health, fields.max_health));
    }
    if let Some(class_name) = &record.class_name {
        target.insert(PlayerClass::new(class_name.clone()));
    }
    if let Some(collision) = record.collider.as_ref().and_then(ColliderRecord::to_collision) {
        target.insert(collision);
    }
}

// ============================================================================
// Narrow mutation records
// ============================================================================

pub fn entity_new(world: &World, entity: Entity, is_local_player: bool) -> ServerPacket {
    ServerPacket::EntityNew {
        entity: serialize_entity(world, entity),
        is_local_player,
    }
}

pub fn entity_update(world: &World, entity: Entity) -> ServerPacket {
    ServerPacket::EntityUpdate {
        entity: serialize_entity(world, entity),
    }
}

pub fn entity_remove(world: &World, entity: Entity) -> ServerPacket {
    ServerPacket::EntityRemove {
        entity_id: store::wire_id(entity),
        asset_type: store::display_name(world, entity),
    }
}

pub fn position_update(world: &World, entity: Entity) -> Option<ServerPacket> {
    let pos = world.get::<Position>(entity)?;
    Some(ServerPacket::PosUpdate {
        entity_id: store::wire_id(entity),
        x: pos.x,
        y: pos.y,
        asset_type: store::display_name(world, entity),
    })
}

pub fn health_update(world: &World, entity: Entity) -> Option<ServerPacket> {
    let health = world.get::<Health>(entity)?;
    Some(ServerPacket::HealthUpdate {
        entity_id: store::wire_id(entity),
        current_health: health.current(),
        max_health: health.max(),
    })
}

pub fn level_up(world: &World, entity: Entity) -> Option<ServerPacket> {
    let stats = world.get::<Stats>(entity)?;
    let health = world.get::<Health>(entity)?;
    Some(ServerPacket::PlayerLevelUp {
        entity_id: store::wire_id(entity),
        level: stats.level,
        stat_points: stats.stat_points,
        max_health: health.max(),
    })
}
