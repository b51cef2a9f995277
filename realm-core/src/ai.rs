//! Monster AI tick.
//!
//! Only `Wandering` has behaviour: with a small chance per tick the monster
//! takes a random step, staying inside a square around its home. `Idle`
//! stands still. `Chasing`, `Attacking` and `Returning` have no transitions
//! yet; monsters in those states are left untouched.

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::trace;

use crate::components::{Ai, AiState, EntityKind, Position};
use crate::constants::{NPC_STEP, WANDER_CHANCE, WANDER_RADIUS};
use crate::movement;

/// Seeded RNG for every random decision the simulation makes.
#[derive(Resource, Debug, Clone)]
pub struct SimRng(pub Xoshiro256PlusPlus);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(Xoshiro256PlusPlus::seed_from_u64(seed))
    }
}

/// A wander step, or `None` if the monster stays put this tick.
fn plan_wander(rng: &mut impl Rng, at: Position, home: Position) -> Option<(f32, f32)> {
    if !rng.gen_bool(WANDER_CHANCE) {
        return None;
    }
    let dx = rng.gen_range(-NPC_STEP..=NPC_STEP);
    let dy = rng.gen_range(-NPC_STEP..=NPC_STEP);
    let next = at.offset(dx, dy);
    let inside = (next.x - home.x).abs() <= WANDER_RADIUS && (next.y - home.y).abs() <= WANDER_RADIUS;
    inside.then_some((dx, dy))
}

/// Runs one AI step for every monster. Exclusive system.
pub fn run_ai(world: &mut World) {
    let mut query = world.query::<(Entity, &EntityKind, &Position, &Ai)>();
    let monsters: Vec<(Entity, Position, AiState, Position)> = query
        .iter(world)
        .filter(|(_, kind, ..)| **kind == EntityKind::Monster)
        .map(|(entity, _, pos, ai)| (entity, *pos, ai.state, ai.home))
        .collect();

    for (entity, at, state, home) in monsters {
        match state {
            AiState::Wandering => {
                let step = {
                    let mut rng = world.resource_mut::<SimRng>();
                    plan_wander(&mut rng.0, at, home)
                };
                if let Some((dx, dy)) = step {
                    if let Err(rejection) = movement::npc_move(world, entity, dx, dy) {
                        trace!("Wander step of {:?} refused: {}", entity, rejection);
                    }
                }
            }
            AiState::Idle => {}
            AiState::Chasing | AiState::Attacking | AiState::Returning => {
                trace!("{:?} in {:?}: no behaviour for this state", entity, state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Collision;
    use crate::map::GameMap;
    use crate::outbox::Outbox;

    fn setup(seed: u64) -> World {
        let mut world = World::new();
        world.init_resource::<Outbox>();
        world.insert_resource(GameMap::generate_default("test", 100, 100));
        world.insert_resource(SimRng::seeded(seed));
        world
    }

    fn monster(world: &mut World, state: AiState) -> Entity {
        let home = Position::new(50.0, 20.0);
        world
            .spawn((
                EntityKind::Monster,
                home,
                Collision::circle(0.5),
                Ai {
                    state,
                    target: None,
                    home,
                },
            ))
            .id()
    }

    #[test]
    fn test_wandering_monster_eventually_moves_and_stays_leashed() {
        let mut world = setup(7);
        let wolf = monster(&mut world, AiState::Wandering);
        for _ in 0..2000 {
            run_ai(&mut world);
        }
        let pos = *world.get::<Position>(wolf).unwrap();
        assert_ne!(pos, Position::new(50.0, 20.0));
        assert!((pos.x - 50.0).abs() <= WANDER_RADIUS);
        assert!((pos.y - 20.0).abs() <= WANDER_RADIUS);
    }

    #[test]
    fn test_other_states_do_not_move() {
        let mut world = setup(7);
        let idle = monster(&mut world, AiState::Idle);
        let chasing = monster(&mut world, AiState::Chasing);
        for _ in 0..500 {
            run_ai(&mut world);
        }
        assert_eq!(world.get::<Position>(idle), Some(&Position::new(50.0, 20.0)));
        assert_eq!(world.get::<Position>(chasing), Some(&Position::new(50.0, 20.0)));
    }

    #[test]
    fn test_same_seed_same_path() {
        let run = |seed| {
            let mut world = setup(seed);
            let wolf = monster(&mut world, AiState::Wandering);
            for _ in 0..300 {
                run_ai(&mut world);
            }
            *world.get::<Position>(wolf).unwrap()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_plan_wander_step_is_bounded() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let home = Position::new(0.0, 0.0);
        for _ in 0..1000 {
            if let Some((dx, dy)) = plan_wander(&mut rng, home, home) {
                assert!(dx.abs() <= NPC_STEP && dy.abs() <= NPC_STEP);
            }
        }
    }
}
