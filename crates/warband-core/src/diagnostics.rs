//! Run counters and per-tick reports.
//!
//! Every recovered error lands in [`Diagnostics`] so callers can assert on
//! error rates instead of relying on log output.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detector::Detection;
use crate::error::RegistryError;

// =============================================================================
// Diagnostics
// =============================================================================

/// Counters accumulated over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Hook-returned commands that failed to parse.
    pub parse_errors: u64,
    /// `new_unit` deltas for an id already in use.
    pub duplicate_ids: u64,
    /// Deltas addressed to an id that was never created.
    pub unknown_ids: u64,
    /// `command(..)` deltas issued by something other than a general.
    pub rejected_commanders: u64,
    /// Create deltas for a role only the engine spawns.
    pub unspawnable_roles: u64,
    /// Hook calls that failed, panicked or ran over budget.
    pub hook_errors: u64,
    /// Deltas that changed the registry.
    pub deltas_applied: u64,
    /// Hook calls made.
    pub hooks_invoked: u64,
    /// `enter_view` events emitted (one per direction).
    pub enter_view_events: u64,
    /// `exit_view` events emitted (one per direction).
    pub exit_view_events: u64,
    /// Collision events emitted (one per pair).
    pub collision_events: u64,
    /// Bullets spawned by shooters.
    pub bullets_fired: u64,
    /// State-change reactions pushed to the following tick.
    pub deferred_reactions: u64,
}

impl Diagnostics {
    /// Counts a rejected delta under its error kind.
    pub fn record_registry_error(&mut self, err: &RegistryError) {
        match err {
            RegistryError::DuplicateId(_) => self.duplicate_ids += 1,
            RegistryError::UnknownId(_) => self.unknown_ids += 1,
            RegistryError::NotACommander(..) => self.rejected_commanders += 1,
            RegistryError::NotSpawnable(..) => self.unspawnable_roles += 1,
        }
    }

    /// Total recovered errors of every kind.
    #[must_use]
    pub const fn total_errors(&self) -> u64 {
        self.parse_errors
            + self.duplicate_ids
            + self.unknown_ids
            + self.rejected_commanders
            + self.unspawnable_roles
            + self.hook_errors
    }
}

// =============================================================================
// TickReport
// =============================================================================

/// Summary of one call to [`Simulation::step`](crate::simulation::Simulation::step).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Tick that was executed.
    pub tick: u64,
    /// Timeline deltas released this tick.
    pub released: usize,
    /// Sightings and contacts found by the detector.
    pub detection: Detection,
    /// Hook calls made.
    pub hooks_invoked: usize,
    /// Idle entities whose state-change hook waits for the next tick.
    pub deferred: usize,
    /// Wall-clock time spent in the tick.
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityId, Role};

    #[test]
    fn registry_errors_are_bucketed() {
        let mut diag = Diagnostics::default();
        diag.record_registry_error(&RegistryError::DuplicateId(EntityId::new("a")));
        diag.record_registry_error(&RegistryError::UnknownId(EntityId::new("b")));
        diag.record_registry_error(&RegistryError::UnknownId(EntityId::new("c")));
        diag.record_registry_error(&RegistryError::NotACommander(
            EntityId::new("s"),
            Role::Soldier,
        ));
        diag.record_registry_error(&RegistryError::NotSpawnable(
            EntityId::new("x"),
            Role::Bullet,
        ));
        assert_eq!(diag.duplicate_ids, 1);
        assert_eq!(diag.unknown_ids, 2);
        assert_eq!(diag.rejected_commanders, 1);
        assert_eq!(diag.unspawnable_roles, 1);
        assert_eq!(diag.total_errors(), 5);
    }

    #[test]
    fn serializes_to_flat_json() {
        let diag = Diagnostics {
            hook_errors: 2,
            ..Diagnostics::default()
        };
        let value = serde_json::to_value(diag).unwrap();
        assert_eq!(value["hook_errors"], 2);
        assert_eq!(value["parse_errors"], 0);
    }
}
