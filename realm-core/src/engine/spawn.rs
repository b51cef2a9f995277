use bevy::prelude::*;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::ai::SimRng;
use crate::assets::{ClassRegistry, MonsterCatalog, MonsterTemplate, SpawnZone};
use crate::components::{
    Ai, Attributes, Collision, ConnectionId, EntityKind, Health, NetworkIdentity, PlayerClass,
    Position, Stats, Viewport,
};
use crate::constants::{AOI_RADIUS, DEFAULT_COLLIDER_RADIUS};
use crate::engine::EngineConfig;
use crate::map::GameMap;
use crate::persistence::PlayerRecord;

/// Placement attempts per monster before the slot is skipped.
const PLACEMENT_ATTEMPTS: usize = 16;

/// Creates a player from its stored record (or defaults for a new one).
pub fn spawn_player(
    world: &mut World,
    connection: ConnectionId,
    name: &str,
    record: &PlayerRecord,
) -> Entity {
    let class_name = record.class_name().to_string();
    let class = world
        .get_resource::<ClassRegistry>()
        .and_then(|registry| registry.get(&class_name))
        .cloned();
    if class.is_none() {
        warn!("No metadata for class {}, using defaults", class_name);
    }
    let stats = record.stats(class.as_ref());
    let health = record.health(stats.max_health());
    let radius = world
        .get_resource::<EngineConfig>()
        .map_or(AOI_RADIUS, |config| config.aoi_radius);

    world
        .spawn((
            EntityKind::Player,
            record.position(),
            NetworkIdentity::player(connection, name),
            Collision::circle(DEFAULT_COLLIDER_RADIUS),
            stats,
            health,
            PlayerClass::new(class_name),
            Viewport::new(radius),
        ))
        .id()
}

/// Creates a wandering monster anchored at `at`.
pub fn spawn_monster(world: &mut World, template: &MonsterTemplate, at: Position) -> Entity {
    let mut base = Attributes::uniform(1);
    base.strength = template.strength;
    base.vitality = template.vitality;
    let stats = Stats {
        level: template.level.max(1),
        base_health: template.base_health,
        base,
        ..Stats::default()
    };
    let health = Health::new(stats.max_health());

    world
        .spawn((
            EntityKind::Monster,
            at,
            NetworkIdentity::npc(template.asset_type.clone()),
            Collision::circle(template.radius.unwrap_or(DEFAULT_COLLIDER_RADIUS)),
            stats,
            health,
            Ai::wandering(at),
        ))
        .id()
}

fn pick_spot(rng: &mut impl Rng, zone: &SpawnZone, map: Option<&GameMap>) -> Option<Position> {
    for _ in 0..PLACEMENT_ATTEMPTS {
        let at = Position::new(
            rng.gen_range(zone.min_x..=zone.max_x),
            rng.gen_range(zone.min_y..=zone.max_y),
        );
        if map.map_or(true, |map| map.is_walkable(at.x, at.y)) {
            return Some(at);
        }
    }
    None
}

/// Fills every spawn zone of the active map up to its cap. Returns the
/// number of monsters created.
pub fn populate_spawn_zones(world: &mut World) -> usize {
    let Some(map_name) = world.get_resource::<GameMap>().map(|map| map.name().to_string()) else {
        warn!("No map loaded, skipping NPC population");
        return 0;
    };
    let Some(catalog) = world.get_resource::<MonsterCatalog>() else {
        return 0;
    };
    let zones: Vec<(SpawnZone, MonsterTemplate)> = catalog
        .zones_for_map(&map_name)
        .filter_map(|zone| match catalog.template(&zone.monster_asset_type) {
            Some(template) => Some((zone.clone(), template.clone())),
            None => {
                warn!("Zone {} has no template {}", zone.zone_name, zone.monster_asset_type);
                None
            }
        })
        .collect();

    let mut spawned = 0;
    for (zone, template) in zones {
        if zone.min_x > zone.max_x || zone.min_y > zone.max_y {
            warn!("Zone {} has inverted bounds, skipped", zone.zone_name);
            continue;
        }
        let mut spots = Vec::with_capacity(zone.max_mobs_in_zone as usize);
        world.resource_scope(|world, mut rng: Mut<SimRng>| {
            let map = world.get_resource::<GameMap>();
            for _ in 0..zone.max_mobs_in_zone {
                match pick_spot(&mut rng.0, &zone, map) {
                    Some(at) => spots.push(at),
                    None => debug!("No walkable tile found in {}", zone.zone_name),
                }
            }
        });
        for at in spots {
            spawn_monster(world, &template, at);
            spawned += 1;
        }
        debug!("Populated {} with {}", zone.zone_name, template.asset_type);
    }
    info!("Spawned {} monsters on {}", spawned, map_name);
    spawned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{ClassMetadata, EvolutionRule};

    fn slime() -> MonsterTemplate {
        MonsterTemplate {
            asset_type: "slime".into(),
            level: 2,
            base_health: 30,
            strength: 3,
            vitality: 2,
            radius: Some(0.4),
        }
    }

    fn zone(map: &str, max: u32) -> SpawnZone {
        SpawnZone {
            zone_name: "meadow".into(),
            monster_asset_type: "slime".into(),
            map_name: map.into(),
            min_x: 30.0,
            max_x: 40.0,
            min_y: 5.0,
            max_y: 15.0,
            max_mobs_in_zone: max,
            respawn_time_seconds: 30.0,
        }
    }

    #[test]
    fn test_new_player_defaults() {
        let mut world = World::new();
        let mut registry = ClassRegistry::default();
        registry.insert(
            "Novice",
            ClassMetadata {
                base_health: 100,
                class_bonus: Attributes::default(),
                evolution: Some(EvolutionRule {
                    level: 10,
                    to_classes: vec![],
                }),
            },
        );
        world.insert_resource(registry);

        let player = spawn_player(&mut world, ConnectionId(3), "ana", &PlayerRecord::default());
        assert_eq!(world.get::<Position>(player), Some(&Position::new(10.0, 10.0)));
        assert_eq!(world.get::<PlayerClass>(player).unwrap().name, "Novice");
        assert_eq!(world.get::<Stats>(player), Some(&Stats::default()));
        assert_eq!(world.get::<Health>(player).unwrap().current(), 118);
        assert_eq!(world.get::<Viewport>(player).unwrap().radius, 25.0);
    }

    #[test]
    fn test_monster_from_template() {
        let mut world = World::new();
        let mob = spawn_monster(&mut world, &slime(), Position::new(35.0, 8.0));
        let stats = world.get::<Stats>(mob).unwrap();
        assert_eq!(stats.level, 2);
        assert_eq!(stats.base.strength, 3);
        assert_eq!(stats.base.agility, 1);
        // 30 + 2*10 + 2*8
        assert_eq!(world.get::<Health>(mob).unwrap().max(), 66);
        assert_eq!(world.get::<Ai>(mob).unwrap().home, Position::new(35.0, 8.0));
        assert_eq!(world.get::<NetworkIdentity>(mob).unwrap().connection, None);
    }

    #[test]
    fn test_population_respects_cap_bounds_and_map() {
        let mut world = World::new();
        world.insert_resource(GameMap::generate_default("Starting_Area", 100, 100));
        world.insert_resource(SimRng::seeded(9));
        world.insert_resource(MonsterCatalog::new(
            vec![slime()],
            vec![zone("Starting_Area", 5), zone("Elsewhere", 7)],
        ));

        assert_eq!(populate_spawn_zones(&mut world), 5);
        let mut query = world.query::<(&EntityKind, &Position)>();
        for (kind, pos) in query.iter(&world) {
            assert_eq!(*kind, EntityKind::Monster);
            assert!((30.0..=40.0).contains(&pos.x));
            assert!((5.0..=15.0).contains(&pos.y));
        }
    }
}
