use bevy::prelude::*;

use crate::ai;

/// Phases of one server tick, run in order.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum RealmSet {
    /// Apply queued client commands.
    Ingest,
    Simulate,
    /// Flush the outbox and publish snapshots.
    Egress,
}

/// Orders the tick phases and registers the AI. World resources are put in
/// place separately by [`crate::engine::install`].
pub struct RealmPlugin;

impl Plugin for RealmPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (RealmSet::Ingest, RealmSet::Simulate, RealmSet::Egress).chain(),
        )
        .add_systems(Update, ai::run_ai.in_set(RealmSet::Simulate));
    }
}
