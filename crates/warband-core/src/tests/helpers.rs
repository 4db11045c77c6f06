//! Test helper functions for building simulations and inspecting them.

use glam::DVec2;

use crate::config::SimConfig;
use crate::detector::Sighting;
use crate::diagnostics::TickReport;
use crate::entity::{EntityId, UnitState};
use crate::hook::HookTable;
use crate::random::SeededRandom;
use crate::simulation::Simulation;
use crate::timeline::Timeline;

// =============================================================================
// Timelines
// =============================================================================

/// Two far-apart soldiers; A is sent toward the origin at tick 5.
pub const EXAMPLE_TIMELINE: &str = r#"{
    "0": ["new_unit(soldier, A, 0, 0, 0, 1)", "new_unit(soldier, B, 500, 500, 0, 2)"],
    "5": ["move(A, 10, 10)"]
}"#;

/// Two teams of one general and three soldiers each, in opposite corners.
pub const SKIRMISH_TIMELINE: &str = r#"{
    "0": [
        "new_unit(general, g1, 100, 100, 0, 1)",
        "new_unit(soldier, a1, 140, 100, 0, 1)",
        "new_unit(soldier, a2, 100, 140, 0, 1)",
        "new_unit(soldier, a3, 140, 140, 0, 1)",
        "new_unit(general, g2, 700, 700, 0, 2)",
        "new_unit(soldier, b1, 660, 700, 0, 2)",
        "new_unit(soldier, b2, 700, 660, 0, 2)",
        "new_unit(soldier, b3, 660, 660, 0, 2)"
    ],
    "120": ["command(a1, move(400, 400))", "command(b1, move(400, 400))"]
}"#;

/// `b` walks into `a`'s view, back out after tick 200, and in again after
/// tick 400.
pub const BACK_AND_FORTH_TIMELINE: &str = r#"{
    "0": ["new_unit(soldier, a, 0, 0, 0, 1)", "new_unit(soldier, b, 500, 0, 0, 2)"],
    "1": ["move(b, 100, 0)"],
    "200": ["move(b, 500, 0)"],
    "400": ["move(b, 100, 0)"]
}"#;

// =============================================================================
// Simulation setup
// =============================================================================

/// Default config with sequential detection.
pub fn test_config() -> SimConfig {
    SimConfig {
        parallel_detection: false,
        ..SimConfig::default()
    }
}

/// Builds a simulation from JSON timeline text.
pub fn simulation(timeline: &str, hooks: HookTable, config: SimConfig, seed: u64) -> Simulation {
    let timeline = Timeline::from_json_str(timeline).expect("test timeline parses");
    Simulation::new(config, timeline, hooks, Box::new(SeededRandom::new(seed)))
        .expect("test config is valid")
}

/// Simulation with no hooks at all.
pub fn silent_simulation(timeline: &str) -> Simulation {
    simulation(timeline, HookTable::new(), test_config(), 0)
}

/// Runs `ticks` ticks and collects every report.
pub fn run_reports(sim: &mut Simulation, ticks: u64) -> Vec<TickReport> {
    (0..ticks)
        .map(|_| sim.step().expect("timeline advances"))
        .collect()
}

// =============================================================================
// Lookups
// =============================================================================

/// Current state of `name`.
pub fn state_of(sim: &Simulation, name: &str) -> UnitState {
    sim.registry()
        .get(&EntityId::new(name))
        .unwrap_or_else(|| panic!("no entity {name}"))
        .state()
        .clone()
}

/// Current position of `name`.
pub fn position_of(sim: &Simulation, name: &str) -> DVec2 {
    sim.registry()
        .get(&EntityId::new(name))
        .unwrap_or_else(|| panic!("no entity {name}"))
        .position()
}

/// Number of new sightings in `report` between `a` and `b`, either direction.
pub fn sightings_between(report: &TickReport, a: &str, b: &str) -> usize {
    count_pair(&report.detection.enter_view, a, b)
}

/// Number of lost sightings in `report` between `a` and `b`, either direction.
pub fn exits_between(report: &TickReport, a: &str, b: &str) -> usize {
    count_pair(&report.detection.exit_view, a, b)
}

fn count_pair(sightings: &[Sighting], a: &str, b: &str) -> usize {
    sightings
        .iter()
        .filter(|s| {
            let (o, t) = (s.observer.as_str(), s.target.as_str());
            (o == a && t == b) || (o == b && t == a)
        })
        .count()
}
