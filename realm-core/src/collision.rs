//! Collision resolution for a proposed move.
//!
//! Two passes, both against the destination:
//! 1. terrain: box/sprite shapes test their four corners, circles their center
//! 2. entities: circle/circle by center distance, everything else by AABB
//!
//! The first blocking hit rejects the move and the mover stays where it was.

use bevy::prelude::*;

use crate::components::{ColliderShape, Collision, Position};
use crate::map::GameMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocker {
    Terrain,
    Entity(Entity),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub accepted: bool,
    /// Destination when accepted, the starting point otherwise.
    pub final_position: Position,
    pub blocked_by: Option<Blocker>,
}

impl Resolution {
    fn accept(to: Position) -> Self {
        Self {
            accepted: true,
            final_position: to,
            blocked_by: None,
        }
    }

    fn reject(from: Position, blocker: Blocker) -> Self {
        Self {
            accepted: false,
            final_position: from,
            blocked_by: Some(blocker),
        }
    }
}

/// Points of the shape that must stand on walkable ground.
fn probe_points(collision: &Collision, at: Position) -> Vec<Position> {
    let center = collision.center(at);
    match collision.shape {
        ColliderShape::Circle { .. } => vec![center],
        ColliderShape::Box {
            half_width,
            half_height,
        }
        | ColliderShape::Sprite {
            half_width,
            half_height,
        } => vec![
            center.offset(-half_width, -half_height),
            center.offset(half_width, -half_height),
            center.offset(-half_width, half_height),
            center.offset(half_width, half_height),
        ],
    }
}

pub fn terrain_allows(map: &GameMap, collision: &Collision, at: Position) -> bool {
    probe_points(collision, at)
        .iter()
        .all(|p| map.is_walkable(p.x, p.y))
}

/// Strict overlap: touching shapes do not block.
pub fn shapes_overlap(a: &Collision, a_at: Position, b: &Collision, b_at: Position) -> bool {
    let (ca, cb) = (a.center(a_at), b.center(b_at));
    match (a.shape, b.shape) {
        (ColliderShape::Circle { radius: ra }, ColliderShape::Circle { radius: rb }) => {
            ca.distance(&cb) < ra + rb
        }
        _ => {
            let (ahw, ahh) = a.shape.half_extents();
            let (bhw, bhh) = b.shape.half_extents();
            (ca.x - cb.x).abs() < ahw + bhw && (ca.y - cb.y).abs() < ahh + bhh
        }
    }
}

/// Checks whether `mover` may go from `from` to `to`.
pub fn resolve(world: &mut World, mover: Entity, from: Position, to: Position) -> Resolution {
    let Some(collision) = world.get::<Collision>(mover).copied() else {
        return Resolution::accept(to);
    };

    if let Some(map) = world.get_resource::<GameMap>() {
        if !terrain_allows(map, &collision, to) {
            return Resolution::reject(from, Blocker::Terrain);
        }
    }

    if collision.is_trigger {
        return Resolution::accept(to);
    }

    let mut others = world.query::<(Entity, &Position, &Collision)>();
    let blocker = others
        .iter(world)
        .filter(|(other, _, other_collision)| *other != mover && !other_collision.is_trigger)
        .find(|(_, other_pos, other_collision)| {
            shapes_overlap(&collision, to, other_collision, **other_pos)
        })
        .map(|(other, _, _)| other);

    match blocker {
        Some(other) => Resolution::reject(from, Blocker::Entity(other)),
        None => Resolution::accept(to),
    }
}
