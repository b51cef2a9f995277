//! Public chat and slash commands.

use bevy::prelude::*;
use tracing::debug;

use crate::components::{Attribute, Health, PlayerClass, Stats};
use crate::outbox;
use crate::progression;
use crate::protocol::ServerPacket;
use crate::store;

pub fn handle_chat(world: &mut World, sender: Entity, content: &str) {
    let content = content.trim();
    if content.is_empty() {
        return;
    }
    if content.starts_with('/') {
        run_command(world, sender, content);
        return;
    }

    let name = store::display_name(world, sender);
    debug!("[{}]: {}", name, content);
    outbox::send_to_all(
        world,
        ServerPacket::ChatMessage {
            content: format!("[{}]: {}", name, content),
        },
        store::connection_of(world, sender),
    );
}

fn run_command(world: &mut World, sender: Entity, line: &str) {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let argument = parts.next();

    match (command, argument) {
        ("/stats", _) => {
            if let Some(report) = stats_report(world, sender) {
                outbox::notify(world, sender, report);
            }
        }
        ("/evolve", Some(class_name)) => {
            let _ = progression::change_class(world, sender, class_name);
        }
        ("/evolve", None) => outbox::notify(world, sender, "Usage: /evolve <class>"),
        ("/add", Some(attribute)) => {
            let _ = progression::add_stat(world, sender, attribute);
        }
        ("/add", None) => outbox::notify(world, sender, "Usage: /add <attribute>"),
        _ => outbox::notify(world, sender, format!("Unknown command: {}", command)),
    }
}

/// Multi-line character sheet for `/stats`.
pub fn stats_report(world: &World, entity: Entity) -> Option<String> {
    let stats = world.get::<Stats>(entity)?;
    let health = world.get::<Health>(entity)?;
    let class = world
        .get::<PlayerClass>(entity)
        .map_or("-", |class| class.name.as_str());

    let attributes = Attribute::ALL
        .iter()
        .map(|attribute| format!("{}: {}", attribute, stats.total(*attribute)))
        .collect::<Vec<_>>()
        .join(" | ");

    Some(format!(
        "--- {} ({}) ---\nLevel: {} | Exp: {}/{} | Stat points: {}\nHealth: {}/{} | Attack: {} | Defense: {}\n{}",
        store::display_name(world, entity),
        class,
        stats.level,
        stats.experience,
        stats.xp_threshold(),
        stats.stat_points,
        health.current(),
        health.max(),
        stats.attack_power(),
        stats.defense(),
        attributes,
    ))
}
