//! Property-based tests using proptest
//!
//! Invariants that must hold for ALL inputs:
//! - Health: 0 <= current <= max after any damage, heal or resize
//! - Combat: damage is at least 1
//! - Movement: over-budget moves never change position
//! - Progression: N thresholds crossed -> +N levels, +5N points
//! - Evolution: unlisted targets leave class and stats untouched
//! - AOI: viewport membership matches range after any move sequence
//! - Serialization: serialize -> apply reproduces the entity

use bevy::prelude::*;
use proptest::prelude::*;

use realm_core::assets::{AssetCatalog, ClassRegistry};
use realm_core::combat::compute_damage;
use realm_core::components::{
    Attributes, ConnectionId, EntityKind, Health, PlayerClass, Position, Stats, Viewport,
};
use realm_core::engine::{self, PlayerIndex};
use realm_core::map::GameMap;
use realm_core::movement::{self, MoveRejection};
use realm_core::outbox::Outbox;
use realm_core::persistence::PlayerRecord;
use realm_core::progression::{self, apply_experience};
use realm_core::serialization::{apply_record, serialize_entity};

fn attributes() -> impl Strategy<Value = Attributes> {
    prop::array::uniform6(0u32..200).prop_map(|[s, a, v, i, d, l]| Attributes {
        strength: s,
        agility: a,
        vitality: v,
        intelligence: i,
        dexterity: d,
        luck: l,
    })
}

fn stats() -> impl Strategy<Value = Stats> {
    (1u32..80, 0u64..5000, 0u32..50, 50u32..300, attributes(), attributes()).prop_map(
        |(level, experience, stat_points, base_health, base, class_bonus)| Stats {
            level,
            experience,
            stat_points,
            base_health,
            base,
            class_bonus,
        },
    )
}

#[derive(Debug, Clone)]
enum HealthOp {
    Damage(u32),
    Heal,
    Resize(u32),
}

fn health_op() -> impl Strategy<Value = HealthOp> {
    prop_oneof![
        (0u32..500).prop_map(HealthOp::Damage),
        Just(HealthOp::Heal),
        (0u32..500).prop_map(HealthOp::Resize),
    ]
}

fn session_world() -> World {
    let mut world = World::new();
    world.init_resource::<Outbox>();
    world.init_resource::<PlayerIndex>();
    world
}

// ============================================================
// Health & Combat Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_health_stays_in_bounds(max in 1u32..1000, ops in prop::collection::vec(health_op(), 0..40)) {
        let mut health = Health::new(max);
        for op in ops {
            match op {
                HealthOp::Damage(amount) => { health.take_damage(amount); }
                HealthOp::Heal => health.heal_to_full(),
                HealthOp::Resize(max) => health.set_max(max),
            }
            prop_assert!(health.current() <= health.max());
            prop_assert_eq!(health.is_dead(), health.current() == 0);
        }
    }

    #[test]
    fn prop_damage_is_at_least_one(attacker in stats(), defender in stats()) {
        prop_assert!(compute_damage(Some(&attacker), Some(&defender)) >= 1);
        prop_assert!(compute_damage(None, Some(&defender)) >= 1);
    }

    #[test]
    fn prop_crossing_n_thresholds(start in 1u32..40, levels in 0u32..8, extra_fraction in 0.0f64..1.0) {
        let mut stats = Stats { level: start, ..Default::default() };
        let threshold = stats.xp_threshold();
        let extra = (threshold as f64 * extra_fraction) as u64;
        let gained = apply_experience(&mut stats, u64::from(levels) * threshold + extra.min(threshold - 1));
        prop_assert_eq!(gained, levels);
        prop_assert_eq!(stats.level, start + levels);
        prop_assert_eq!(stats.stat_points, 5 * levels);
        prop_assert!(stats.experience < stats.xp_threshold());
    }
}

// ============================================================
// Movement Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_over_budget_move_is_rejected(
        angle in 0.0f32..std::f32::consts::TAU,
        distance in 5.2f32..100.0,
    ) {
        let mut world = session_world();
        world.insert_resource(GameMap::generate_default("test", 200, 200));
        let record = PlayerRecord { pos_x: Some(100.0), pos_y: Some(100.0), ..Default::default() };
        let player = engine::player_connected(&mut world, ConnectionId(1), "p", &record);

        let result = movement::handle_move_request(
            &mut world,
            player,
            distance * angle.cos(),
            distance * angle.sin(),
        );
        let over_budget = matches!(result, Err(MoveRejection::OverBudget { .. }));
        prop_assert!(over_budget);
        prop_assert_eq!(world.get::<Position>(player), Some(&Position::new(100.0, 100.0)));
    }

    #[test]
    fn prop_blocked_move_keeps_position(dx in -1.5f32..1.5, dy in 0.5f32..3.0) {
        let mut world = session_world();
        world.insert_resource(GameMap::generate_default("test", 100, 100));
        // just below the mountain block at y 20..30
        let record = PlayerRecord { pos_x: Some(25.0), pos_y: Some(17.5), ..Default::default() };
        let player = engine::player_connected(&mut world, ConnectionId(1), "p", &record);

        let result = movement::handle_move_request(&mut world, player, dx, dy);
        // circle colliders probe their centre only
        if 17.5 + dy >= 20.0 {
            prop_assert!(result.is_err());
            prop_assert_eq!(world.get::<Position>(player), Some(&Position::new(25.0, 17.5)));
        } else {
            prop_assert!(result.is_ok());
        }
    }
}

// ============================================================
// Progression Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_unlisted_evolution_changes_nothing(level in 1u32..100, target in "[A-Za-z]{1,12}") {
        prop_assume!(!["warrior", "mage", "archer"].contains(&target.to_ascii_lowercase().as_str()));
        let catalog = AssetCatalog::bundled().unwrap();
        let mut world = session_world();
        world.insert_resource::<ClassRegistry>(catalog.classes.clone());
        let record = PlayerRecord { level: Some(level), ..Default::default() };
        let player = engine::player_connected(&mut world, ConnectionId(1), "p", &record);
        let before = world.get::<Stats>(player).cloned();

        prop_assert!(progression::change_class(&mut world, player, &target).is_err());
        prop_assert_eq!(&world.get::<PlayerClass>(player).unwrap().name, "Novice");
        prop_assert_eq!(world.get::<Stats>(player).cloned(), before);
    }
}

// ============================================================
// AOI Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_viewport_matches_range_after_moves(
        starts in prop::collection::vec((0.0f32..120.0, 0.0f32..120.0), 2..6),
        moves in prop::collection::vec((0usize..6, -3.5f32..3.5, -3.5f32..3.5), 0..60),
    ) {
        let mut world = session_world();
        let players: Vec<Entity> = starts
            .iter()
            .enumerate()
            .map(|(i, (x, y))| {
                let record = PlayerRecord { pos_x: Some(*x), pos_y: Some(*y), ..Default::default() };
                engine::player_connected(&mut world, ConnectionId(i as u64), &format!("p{i}"), &record)
            })
            .collect();

        for (who, dx, dy) in moves {
            let mover = players[who % players.len()];
            let _ = movement::handle_move_request(&mut world, mover, dx, dy);
        }

        for &a in &players {
            let viewport = world.get::<Viewport>(a).unwrap();
            let a_pos = *world.get::<Position>(a).unwrap();
            for &b in &players {
                if a == b {
                    continue;
                }
                let b_pos = *world.get::<Position>(b).unwrap();
                prop_assert_eq!(viewport.sees(b), viewport.covers(a_pos, b_pos));
            }
        }
    }
}

// ============================================================
// Serialization Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_serialize_apply_reproduces_entity(
        stats in stats(),
        x in -500.0f32..500.0,
        y in -500.0f32..500.0,
        damage in 0u32..2000,
        class in "[A-Z][a-z]{2,10}",
    ) {
        let mut world = World::new();
        let mut health = Health::new(stats.max_health());
        health.take_damage(damage);
        let source = world
            .spawn((EntityKind::Player, Position::new(x, y), stats, health, PlayerClass::new(class)))
            .id();
        let record = serialize_entity(&world, source);

        let copy = world.spawn_empty().id();
        apply_record(&mut world, copy, &record);
        let again = serialize_entity(&world, copy);

        prop_assert_eq!(again.entity_type, record.entity_type);
        prop_assert_eq!(again.position, record.position);
        prop_assert_eq!(again.stats, record.stats);
        prop_assert_eq!(again.health, record.health);
        prop_assert_eq!(again.class_name, record.class_name);
    }
}
