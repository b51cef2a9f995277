//! Character progression: experience and levels, stat allocation, class
//! evolution. All three recompute max health from the new totals.

pub mod evolution;
pub mod leveling;

pub use evolution::{change_class, EvolutionError};
pub use leveling::{add_experience, add_stat, apply_experience, StatError};
