//! ECS components shared by every realm system.
//!
//! The set is closed: every fact the simulation tracks about an entity is
//! one of the components below, attached or absent.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::Add;

use crate::constants::{
    AOI_RADIUS, BASE_DEFENSE, BASE_MOVEMENT_SPEED, DEFAULT_BASE_HEALTH, HEALTH_PER_LEVEL,
    HEALTH_PER_VITALITY, XP_PER_LEVEL,
};

// ============================================================================
// Identity
// ============================================================================

/// Handle of a live client connection, assigned by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Display name plus the owning connection. NPCs carry one with no connection.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    pub connection: Option<ConnectionId>,
    pub name: String,
}

impl NetworkIdentity {
    pub fn player(connection: ConnectionId, name: impl Into<String>) -> Self {
        Self {
            connection: Some(connection),
            name: name.into(),
        }
    }

    pub fn npc(name: impl Into<String>) -> Self {
        Self {
            connection: None,
            name: name.into(),
        }
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Monster,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Player => "player",
            EntityKind::Monster => "monster",
        }
    }
}

// ============================================================================
// Spatial
// ============================================================================

#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColliderShape {
    Box { half_width: f32, half_height: f32 },
    Circle { radius: f32 },
    /// Box sized from a sprite's pixel dimensions.
    Sprite { half_width: f32, half_height: f32 },
}

impl ColliderShape {
    /// 100 sprite pixels span one world unit.
    pub fn from_sprite(width_px: f32, height_px: f32, scale: f32) -> Self {
        ColliderShape::Sprite {
            half_width: width_px / 100.0 * scale / 2.0,
            half_height: height_px / 100.0 * scale / 2.0,
        }
    }

    /// Half-extents of the axis-aligned box enclosing the shape.
    pub fn half_extents(&self) -> (f32, f32) {
        match *self {
            ColliderShape::Box {
                half_width,
                half_height,
            }
            | ColliderShape::Sprite {
                half_width,
                half_height,
            } => (half_width, half_height),
            ColliderShape::Circle { radius } => (radius, radius),
        }
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collision {
    pub shape: ColliderShape,
    pub offset_x: f32,
    pub offset_y: f32,
    /// Triggers never block movement.
    pub is_trigger: bool,
}

impl Collision {
    pub fn circle(radius: f32) -> Self {
        Self::from_shape(ColliderShape::Circle { radius })
    }

    pub fn rect(width: f32, height: f32) -> Self {
        Self::from_shape(ColliderShape::Box {
            half_width: width / 2.0,
            half_height: height / 2.0,
        })
    }

    pub fn from_shape(shape: ColliderShape) -> Self {
        Self {
            shape,
            offset_x: 0.0,
            offset_y: 0.0,
            is_trigger: false,
        }
    }

    /// Shape center when the owner stands at `at`.
    pub fn center(&self, at: Position) -> Position {
        at.offset(self.offset_x, self.offset_y)
    }
}

// ============================================================================
// Vitals and progression
// ============================================================================

/// Hit points. `current` never exceeds `max`; a dead entity ignores damage.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    current: u32,
    max: u32,
    is_dead: bool,
}

impl Health {
    pub fn new(max: u32) -> Self {
        let max = max.max(1);
        Self {
            current: max,
            max,
            is_dead: false,
        }
    }

    pub fn with_current(current: u32, max: u32) -> Self {
        let max = max.max(1);
        let current = current.min(max);
        Self {
            current,
            max,
            is_dead: current == 0,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_dead(&self) -> bool {
        self.is_dead
    }

    /// Returns the amount actually removed.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        if self.is_dead {
            return 0;
        }
        let applied = amount.min(self.current);
        self.current -= applied;
        if self.current == 0 {
            self.is_dead = true;
        }
        applied
    }

    pub fn heal_to_full(&mut self) {
        self.current = self.max;
        self.is_dead = false;
    }

    /// Changes the ceiling without healing; current is clamped down if needed.
    pub fn set_max(&mut self, max: u32) {
        self.max = max.max(1);
        self.current = self.current.min(self.max);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Strength,
    Agility,
    Vitality,
    Intelligence,
    Dexterity,
    Luck,
}

impl Attribute {
    pub const ALL: [Attribute; 6] = [
        Attribute::Strength,
        Attribute::Agility,
        Attribute::Vitality,
        Attribute::Intelligence,
        Attribute::Dexterity,
        Attribute::Luck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Strength => "strength",
            Attribute::Agility => "agility",
            Attribute::Vitality => "vitality",
            Attribute::Intelligence => "intelligence",
            Attribute::Dexterity => "dexterity",
            Attribute::Luck => "luck",
        }
    }

    /// Accepts full names and the usual three-letter abbreviations.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "strength" | "str" => Some(Attribute::Strength),
            "agility" | "agi" => Some(Attribute::Agility),
            "vitality" | "vit" => Some(Attribute::Vitality),
            "intelligence" | "int" => Some(Attribute::Intelligence),
            "dexterity" | "dex" => Some(Attribute::Dexterity),
            "luck" | "luk" => Some(Attribute::Luck),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per attribute. Missing keys deserialize as zero, which is what a
/// class bonus table wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    pub strength: u32,
    pub agility: u32,
    pub vitality: u32,
    pub intelligence: u32,
    pub dexterity: u32,
    pub luck: u32,
}

impl Attributes {
    pub fn uniform(value: u32) -> Self {
        Self {
            strength: value,
            agility: value,
            vitality: value,
            intelligence: value,
            dexterity: value,
            luck: value,
        }
    }

    pub fn get(&self, attribute: Attribute) -> u32 {
        match attribute {
            Attribute::Strength => self.strength,
            Attribute::Agility => self.agility,
            Attribute::Vitality => self.vitality,
            Attribute::Intelligence => self.intelligence,
            Attribute::Dexterity => self.dexterity,
            Attribute::Luck => self.luck,
        }
    }

    pub fn get_mut(&mut self, attribute: Attribute) -> &mut u32 {
        match attribute {
            Attribute::Strength => &mut self.strength,
            Attribute::Agility => &mut self.agility,
            Attribute::Vitality => &mut self.vitality,
            Attribute::Intelligence => &mut self.intelligence,
            Attribute::Dexterity => &mut self.dexterity,
            Attribute::Luck => &mut self.luck,
        }
    }
}

impl Add for Attributes {
    type Output = Attributes;

    fn add(self, rhs: Attributes) -> Attributes {
        let mut out = self;
        for attribute in Attribute::ALL {
            let slot = out.get_mut(attribute);
            *slot = slot.saturating_add(rhs.get(attribute));
        }
        out
    }
}

/// Level, experience and attributes. Derived values are pure functions of
/// the totals (`base + class_bonus`) and the level.
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub level: u32,
    pub experience: u64,
    pub stat_points: u32,
    pub base_health: u32,
    pub base: Attributes,
    pub class_bonus: Attributes,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            level: 1,
            experience: 0,
            stat_points: 0,
            base_health: DEFAULT_BASE_HEALTH,
            base: Attributes::uniform(1),
            class_bonus: Attributes::default(),
        }
    }
}

impl Stats {
    pub fn total(&self, attribute: Attribute) -> u32 {
        self.base
            .get(attribute)
            .saturating_add(self.class_bonus.get(attribute))
    }

    pub fn totals(&self) -> Attributes {
        self.base + self.class_bonus
    }

    pub fn max_health(&self) -> u32 {
        self.base_health
            .saturating_add(self.level.saturating_mul(HEALTH_PER_LEVEL))
            .saturating_add(
                self.total(Attribute::Vitality)
                    .saturating_mul(HEALTH_PER_VITALITY),
            )
            .max(1)
    }

    pub fn attack_power(&self) -> u32 {
        self.total(Attribute::Strength)
            .saturating_mul(2)
            .saturating_add(self.total(Attribute::Dexterity) / 5)
    }

    pub fn defense(&self) -> u32 {
        BASE_DEFENSE.saturating_add(self.total(Attribute::Vitality))
    }

    /// World units per second.
    pub fn movement_speed(&self) -> f32 {
        BASE_MOVEMENT_SPEED + self.total(Attribute::Agility) as f32 * 0.1
    }

    /// Experience needed to leave the current level.
    pub fn xp_threshold(&self) -> u64 {
        u64::from(self.level).saturating_mul(XP_PER_LEVEL)
    }
}

#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct PlayerClass {
    pub name: String,
}

impl PlayerClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

// ============================================================================
// Behaviour and visibility
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiState {
    #[default]
    Idle,
    Wandering,
    Chasing,
    Attacking,
    Returning,
}

#[derive(Component, Debug, Clone, PartialEq)]
pub struct Ai {
    pub state: AiState,
    pub target: Option<Entity>,
    /// Anchor that wandering stays near.
    pub home: Position,
}

impl Ai {
    pub fn wandering(home: Position) -> Self {
        Self {
            state: AiState::Wandering,
            target: None,
            home,
        }
    }
}

/// Per-player record of which entities the client currently knows about.
/// Only `aoi` mutates `visible`.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Viewport {
    pub radius: f32,
    pub visible: HashSet<Entity>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(AOI_RADIUS)
    }
}

impl Viewport {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            visible: HashSet::new(),
        }
    }

    pub fn sees(&self, entity: Entity) -> bool {
        self.visible.contains(&entity)
    }

    /// Square test, inclusive on the border.
    pub fn covers(&self, observer: Position, target: Position) -> bool {
        (observer.x - target.x).abs() <= self.radius && (observer.y - target.y).abs() <= self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_floors_at_zero_and_marks_dead() {
        let mut health = Health::new(30);
        assert_eq!(health.take_damage(50), 30);
        assert_eq!(health.current(), 0);
        assert!(health.is_dead());
        assert_eq!(health.take_damage(10), 0, "dead entities ignore damage");
    }

    #[test]
    fn test_health_set_max_clamps_without_healing() {
        let mut health = Health::with_current(40, 100);
        health.set_max(120);
        assert_eq!(health.current(), 40);
        health.set_max(20);
        assert_eq!(health.current(), 20);
        assert_eq!(health.max(), 20);
    }

    #[test]
    fn test_health_heal_revives() {
        let mut health = Health::new(10);
        health.take_damage(10);
        health.heal_to_full();
        assert!(!health.is_dead());
        assert_eq!(health.current(), 10);
    }

    #[test]
    fn test_with_current_clamps_above_max() {
        let health = Health::with_current(500, 120);
        assert_eq!(health.current(), 120);
    }

    #[test]
    fn test_default_stats_derived_values() {
        let stats = Stats::default();
        // 100 + 1*10 + 1*8
        assert_eq!(stats.max_health(), 118);
        assert_eq!(stats.attack_power(), 2);
        assert_eq!(stats.defense(), 6);
        assert!((stats.movement_speed() - 5.1).abs() < 1e-6);
        assert_eq!(stats.xp_threshold(), 1000);
    }

    #[test]
    fn test_totals_include_class_bonus() {
        let mut stats = Stats::default();
        stats.class_bonus.strength = 4;
        stats.class_bonus.dexterity = 9;
        assert_eq!(stats.total(Attribute::Strength), 5);
        // 5*2 + 10/5
        assert_eq!(stats.attack_power(), 12);
        assert_eq!(stats.totals().dexterity, 10);
    }

    #[test]
    fn test_attribute_parse() {
        assert_eq!(Attribute::parse("STR"), Some(Attribute::Strength));
        assert_eq!(Attribute::parse("vitality"), Some(Attribute::Vitality));
        assert_eq!(Attribute::parse("luk"), Some(Attribute::Luck));
        assert_eq!(Attribute::parse("charisma"), None);
    }

    #[test]
    fn test_class_bonus_missing_keys_are_zero() {
        let bonus: Attributes = serde_json::from_str(r#"{"strength": 3}"#).unwrap();
        assert_eq!(bonus.strength, 3);
        assert_eq!(bonus.luck, 0);
    }

    #[test]
    fn test_sprite_collider_scale() {
        let shape = ColliderShape::from_sprite(64.0, 32.0, 2.0);
        let (hw, hh) = shape.half_extents();
        assert!((hw - 0.64).abs() < 1e-6);
        assert!((hh - 0.32).abs() < 1e-6);
    }

    #[test]
    fn test_viewport_square_border_is_inclusive() {
        let viewport = Viewport::new(25.0);
        let origin = Position::new(0.0, 0.0);
        assert!(viewport.covers(origin, Position::new(25.0, -25.0)));
        assert!(!viewport.covers(origin, Position::new(25.1, 0.0)));
    }
}
