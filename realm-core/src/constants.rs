//! Centralized game constants for the realm simulation.
//!
//! Formula coefficients live next to the component that owns the formula
//! (`components::Stats`); everything tunable per deployment lives in
//! `engine::EngineConfig`. These are the fixed rules of the world.

// =====================================================
// Spawning
// =====================================================

/// Where new players appear and where defeated players are sent back to.
pub const RESPAWN_X: f32 = 10.0;
pub const RESPAWN_Y: f32 = 10.0;

/// Class assigned to a character with no saved class.
pub const DEFAULT_CLASS: &str = "Novice";

/// Base health used when the class metadata does not name one.
pub const DEFAULT_BASE_HEALTH: u32 = 100;

/// Collider radius for players and for monster templates without one.
pub const DEFAULT_COLLIDER_RADIUS: f32 = 0.5;

// =====================================================
// Movement
// =====================================================

/// Seconds of movement a single MOVE request may cover.
pub const MOVE_TIME_SLICE_SECS: f32 = 1.0;

/// Budget for movers that carry no stats.
pub const MAX_MOVE_DISTANCE: f32 = 5.0;

/// Base movement speed in units per second, before agility.
pub const BASE_MOVEMENT_SPEED: f32 = 5.0;

// =====================================================
// Combat
// =====================================================

/// Maximum center distance for a melee hit.
pub const ATTACK_RANGE: f32 = 2.0;

/// Flat defense every stat-bearing entity has.
pub const BASE_DEFENSE: u32 = 5;

// =====================================================
// Progression
// =====================================================

/// Experience per level: threshold = level * XP_PER_LEVEL.
pub const XP_PER_LEVEL: u64 = 1000;

/// Unallocated points granted for each level gained.
pub const STAT_POINTS_PER_LEVEL: u32 = 5;

/// Max health granted per character level.
pub const HEALTH_PER_LEVEL: u32 = 10;

/// Max health granted per point of total vitality.
pub const HEALTH_PER_VITALITY: u32 = 8;

// =====================================================
// Area of interest
// =====================================================

/// Half-width of the square each player observes.
pub const AOI_RADIUS: f32 = 25.0;

// =====================================================
// NPC behaviour
// =====================================================

/// Per-tick probability that a wandering NPC takes a step.
pub const WANDER_CHANCE: f64 = 0.1;

/// Largest per-axis displacement of a single wander step.
pub const NPC_STEP: f32 = 0.5;

/// Half-width of the square around home that wandering stays inside.
pub const WANDER_RADIUS: f32 = 5.0;
