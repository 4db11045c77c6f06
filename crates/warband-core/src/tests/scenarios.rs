//! End-to-end scenarios for the tick pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use glam::DVec2;

use crate::command::parse_delta;
use crate::config::SimConfig;
use crate::diagnostics::Diagnostics;
use crate::dispatch::{Dispatcher, Event};
use crate::entity::{EntityId, Role, Team, UnitState};
use crate::error::SchedulerError;
use crate::hook::{EntityView, HookEnv, HookResult, HookTable, RoleHooks};
use crate::random::SeededRandom;
use crate::registry::{Applied, Registry};
use crate::scripts::{self, builders};
use crate::timeline::Timeline;

use super::helpers::{
    exits_between, position_of, run_reports, silent_simulation, simulation, sightings_between,
    state_of, test_config, BACK_AND_FORTH_TIMELINE, EXAMPLE_TIMELINE,
};

fn id(s: &str) -> EntityId {
    EntityId::new(s)
}

// =============================================================================
// Test hooks
// =============================================================================

/// Counts state-change calls and never answers.
struct Counting(Arc<AtomicUsize>);

impl RoleHooks for Counting {
    fn on_state_change(&self, _env: &mut HookEnv<'_>, _me: &EntityView) -> HookResult {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

/// Stops any moving soldier that comes into view.
struct Halter;

impl RoleHooks for Halter {
    fn on_enter_view(
        &self,
        _env: &mut HookEnv<'_>,
        _me: &EntityView,
        other: &EntityView,
    ) -> HookResult {
        let moving = matches!(other.state, UnitState::Moving { .. });
        Ok((other.role == Role::Soldier && moving)
            .then(|| builders::command(&other.id, &builders::idle())))
    }
}

/// Answers every state change with the same text.
struct Fixed(&'static str);

impl RoleHooks for Fixed {
    fn on_state_change(&self, _env: &mut HookEnv<'_>, _me: &EntityView) -> HookResult {
        Ok(Some(self.0.to_string()))
    }
}

/// Counts exit-view calls.
struct Leaving(Arc<AtomicUsize>);

impl RoleHooks for Leaving {
    fn on_exit_view(
        &self,
        _env: &mut HookEnv<'_>,
        _me: &EntityView,
        _other: &EntityView,
    ) -> HookResult {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

/// Dies on contact with a bullet and logs every sighting it is handed.
#[derive(Default)]
struct Witness {
    seen: Mutex<Vec<(EntityId, EntityId, UnitState)>>,
}

impl RoleHooks for Witness {
    fn on_collision(
        &self,
        _env: &mut HookEnv<'_>,
        _me: &EntityView,
        other: &EntityView,
    ) -> HookResult {
        Ok((other.role == Role::Bullet).then(builders::dead))
    }

    fn on_enter_view(
        &self,
        _env: &mut HookEnv<'_>,
        me: &EntityView,
        other: &EntityView,
    ) -> HookResult {
        self.seen
            .lock()
            .unwrap()
            .push((me.id.clone(), other.id.clone(), other.state.clone()));
        Ok(None)
    }
}

// =============================================================================
// Timeline-only runs
// =============================================================================

mod timeline_scenarios {
    use super::*;

    #[test]
    fn far_apart_units_never_see_or_hit_each_other() {
        let mut sim = silent_simulation(EXAMPLE_TIMELINE);
        let reports = run_reports(&mut sim, 200);

        for report in &reports[..5] {
            assert!(report.detection.enter_view.is_empty(), "tick {}", report.tick);
        }
        assert!(reports.iter().all(|r| r.detection.collisions.is_empty()));
        assert_eq!(reports[0].released, 2);
        assert_eq!(reports[5].released, 1);

        assert_eq!(position_of(&sim, "A"), DVec2::new(10.0, 10.0));
        assert_eq!(state_of(&sim, "A"), UnitState::Idle);
        assert_eq!(position_of(&sim, "B"), DVec2::new(500.0, 500.0));
        assert_eq!(sim.diagnostics().total_errors(), 0);
    }

    #[test]
    fn timeline_errors_are_counted_not_fatal() {
        let mut sim = silent_simulation(
            r#"{
                "0": ["new_unit(soldier, a, 0, 0, 0, 1)"],
                "2": ["new_unit(general, a, 5, 5, 0, 2)", "move(ghost, 1, 1)", "move(a, 1, 0)"]
            }"#,
        );
        sim.run(5).unwrap();
        let diag = sim.diagnostics();
        assert_eq!(diag.duplicate_ids, 1);
        assert_eq!(diag.unknown_ids, 1);
        assert_eq!(sim.registry().len(), 1);
        assert_eq!(position_of(&sim, "a"), DVec2::new(1.0, 0.0));
    }

    #[test]
    fn enter_view_fires_once_per_interval() {
        let mut sim = silent_simulation(BACK_AND_FORTH_TIMELINE);
        let reports = run_reports(&mut sim, 600);

        let ticks: Vec<u64> = reports
            .iter()
            .filter(|r| sightings_between(r, "a", "b") > 0)
            .map(|r| r.tick)
            .collect();
        assert_eq!(ticks.len(), 2, "sightings at {ticks:?}");
        assert!(ticks[0] < 200);
        assert!(ticks[1] > 400);
        for &tick in &ticks {
            assert_eq!(sightings_between(&reports[tick as usize], "a", "b"), 2);
        }
        assert_eq!(sim.diagnostics().enter_view_events, 4);
    }

    #[test]
    fn exit_view_fires_once_per_departure() {
        let mut sim = silent_simulation(BACK_AND_FORTH_TIMELINE);
        let reports = run_reports(&mut sim, 600);

        let ticks: Vec<u64> = reports
            .iter()
            .filter(|r| exits_between(r, "a", "b") > 0)
            .map(|r| r.tick)
            .collect();
        assert_eq!(ticks.len(), 1, "exits at {ticks:?}");
        assert!(ticks[0] > 200 && ticks[0] < 400);
        assert_eq!(exits_between(&reports[ticks[0] as usize], "a", "b"), 2);
        assert_eq!(sim.diagnostics().exit_view_events, 2);
    }

    #[test]
    fn collisions_repeat_while_nobody_reacts() {
        let mut sim = silent_simulation(
            r#"{
                "0": [
                    "new_unit(soldier, s1, 100, 100, 3.14159, 1)",
                    "new_unit(soldier, t, 100, 130, 0, 2)"
                ],
                "1": ["shoot(s1, t)"]
            }"#,
        );
        let reports = run_reports(&mut sim, 30);

        assert!(reports[0].detection.collisions.is_empty());
        for report in &reports[1..] {
            let pairs: Vec<_> = report
                .detection
                .collisions
                .iter()
                .map(|c| (c.a.as_str(), c.b.as_str()))
                .collect();
            assert_eq!(pairs, [("t", "s1.shot1")], "tick {}", report.tick);
        }
        assert_eq!(sim.diagnostics().bullets_fired, 1);
        assert_eq!(state_of(&sim, "s1"), UnitState::Idle);
        assert_eq!(position_of(&sim, "s1.shot1"), DVec2::new(100.0, 130.0));
    }

    #[test]
    fn shooting_a_missing_target_gives_up() {
        let mut sim = silent_simulation(
            r#"{
                "0": ["new_unit(soldier, s1, 0, 0, 0, 1)", "new_unit(soldier, t, 50, 0, 0, 2)"],
                "1": ["update_state(t, dead)", "shoot(s1, t)"]
            }"#,
        );
        sim.run(3).unwrap();
        assert_eq!(state_of(&sim, "s1"), UnitState::Idle);
        assert_eq!(sim.diagnostics().bullets_fired, 0);
    }
}

// =============================================================================
// Hook-driven runs
// =============================================================================

mod hook_scenarios {
    use super::*;

    #[test]
    fn soldier_hit_by_bullet_dies_exactly_once() {
        let mut registry = Registry::new();
        let team = |n| Team::new(n).unwrap();
        registry
            .create(id("s"), Role::Soldier, team(1), DVec2::ZERO, 0.0)
            .unwrap();
        registry
            .create(id("x.shot1"), Role::Bullet, team(2), DVec2::new(5.0, 0.0), 0.0)
            .unwrap();

        let dispatcher = Dispatcher::new(HookTable::builtin(), &test_config());
        let mut random = SeededRandom::new(0);
        let mut diagnostics = Diagnostics::default();
        let hit = Event::Collision {
            subject: id("s"),
            other: id("x.shot1"),
        };

        dispatcher.dispatch(&hit, &mut registry, &mut random, &mut diagnostics, 0);
        assert_eq!(registry.get(&id("s")).unwrap().state(), &UnitState::Dead);
        let invoked = diagnostics.hooks_invoked;

        dispatcher.dispatch(&hit, &mut registry, &mut random, &mut diagnostics, 1);
        assert_eq!(registry.get(&id("s")).unwrap().state(), &UnitState::Dead);
        assert_eq!(diagnostics.hooks_invoked, invoked);
        assert_eq!(
            registry.apply(parse_delta("update_state(s, dead)", None).unwrap()),
            Ok(Applied::Unchanged)
        );
    }

    #[test]
    fn general_orders_idle_soldier_of_its_team() {
        let mut registry = Registry::new();
        for text in [
            "new_unit(general, g, 100, 100, 0, 1)",
            "new_unit(soldier, s, 150, 100, 0, 1)",
        ] {
            registry.apply(parse_delta(text, None).unwrap()).unwrap();
        }
        let general = EntityView::from(registry.get(&id("g")).unwrap());
        let soldier = EntityView::from(registry.get(&id("s")).unwrap());

        let mut random = SeededRandom::new(3);
        let mut env = HookEnv::new(&mut random, DVec2::new(800.0, 800.0), 0, 100);
        let text = scripts::General
            .on_enter_view(&mut env, &general, &soldier)
            .unwrap()
            .unwrap();
        assert!(text.starts_with("command(s, move("), "{text}");

        registry.apply(parse_delta(&text, Some(&general.id)).unwrap()).unwrap();
        let UnitState::Moving { x, y } = registry.get(&id("s")).unwrap().state().clone() else {
            panic!("soldier still idle after {text}");
        };
        assert!((0.0..=800.0).contains(&x));
        assert!((0.0..=800.0).contains(&y));
    }

    #[test]
    fn general_command_lands_in_the_same_tick() {
        let mut hooks = HookTable::new();
        hooks.register(Role::General, Arc::new(scripts::General));
        let mut sim = simulation(
            r#"{
                "0": [
                    "new_unit(general, g, 100, 100, 0, 1)",
                    "new_unit(soldier, s, 150, 100, 0, 1)"
                ]
            }"#,
            hooks,
            test_config(),
            9,
        );
        let report = sim.step().unwrap();
        assert_eq!(report.detection.enter_view.len(), 2);
        assert!(matches!(state_of(&sim, "s"), UnitState::Moving { .. }));
        assert_eq!(state_of(&sim, "g"), UnitState::Idle);
    }

    #[test]
    fn bullet_kills_general_and_retires_on_arrival() {
        let mut sim = simulation(
            r#"{
                "0": [
                    "new_unit(soldier, s1, 100, 100, 3.14159, 1)",
                    "new_unit(general, g, 100, 130, 0, 2)"
                ]
            }"#,
            HookTable::builtin(),
            test_config(),
            1,
        );

        sim.step().unwrap();
        assert_eq!(state_of(&sim, "s1"), UnitState::Shooting { target: id("g") });

        // The general reacts first; the bullet's side of the contact then has
        // a dead partner and is dropped.
        let report = sim.step().unwrap();
        assert_eq!(report.detection.collisions.len(), 1);
        assert_eq!(state_of(&sim, "g"), UnitState::Dead);
        assert!(matches!(state_of(&sim, "s1.shot1"), UnitState::Moving { .. }));
        assert!(matches!(state_of(&sim, "s1"), UnitState::Moving { .. }));

        let later = run_reports(&mut sim, 10);
        assert!(later.iter().all(|r| r.detection.collisions.is_empty()));
        assert_eq!(state_of(&sim, "s1.shot1"), UnitState::Dead);
        assert_eq!(position_of(&sim, "s1.shot1"), DVec2::new(100.0, 130.0));
        assert_eq!(sim.registry().alive_count(), 1);
    }

    #[test]
    fn victims_of_this_tick_are_not_seen_by_others() {
        let witness = Arc::new(Witness::default());
        let mut hooks = HookTable::new();
        hooks.register(Role::Soldier, Arc::clone(&witness) as Arc<dyn RoleHooks>);
        let mut sim = simulation("{}", hooks, test_config(), 0);

        let team = |n| Team::new(n).unwrap();
        let registry = sim.registry_mut();
        registry
            .create(id("a"), Role::Soldier, team(1), DVec2::ZERO, 0.0)
            .unwrap();
        registry
            .create(id("x"), Role::Bullet, team(2), DVec2::new(5.0, 0.0), 0.0)
            .unwrap();
        registry
            .create(id("b"), Role::Soldier, team(2), DVec2::new(100.0, 0.0), 0.0)
            .unwrap();

        let report = sim.step().unwrap();
        assert_eq!(report.detection.collisions.len(), 1);
        assert_eq!(report.detection.enter_view.len(), 6);
        assert_eq!(state_of(&sim, "a"), UnitState::Dead);

        let seen = witness.seen.lock().unwrap();
        assert_eq!(*seen, vec![(id("b"), id("x"), UnitState::Idle)]);
    }

    #[test]
    fn exit_view_hook_fires_for_each_side() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut hooks = HookTable::new();
        hooks.register(Role::Soldier, Arc::new(Leaving(Arc::clone(&counter))));
        let mut sim = simulation(BACK_AND_FORTH_TIMELINE, hooks, test_config(), 0);

        sim.run(300).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        sim.run(300).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(sim.diagnostics().hook_errors, 0);
    }

    #[test]
    fn created_units_get_state_change_in_first_tick() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut hooks = HookTable::new();
        hooks.register(Role::Soldier, Arc::new(Counting(Arc::clone(&counter))));
        let mut sim = simulation(EXAMPLE_TIMELINE, hooks, test_config(), 0);

        sim.step().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        sim.step().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn bad_hook_output_is_counted_and_ignored() {
        let mut hooks = HookTable::new();
        hooks.register(Role::Soldier, Arc::new(Fixed("teleport(1, 2)")));
        let mut sim = simulation(EXAMPLE_TIMELINE, hooks, test_config(), 0);
        sim.step().unwrap();
        assert_eq!(sim.diagnostics().parse_errors, 2);
        assert_eq!(state_of(&sim, "A"), UnitState::Idle);
    }
}

// =============================================================================
// Re-trigger bounds
// =============================================================================

mod retrigger_scenarios {
    use super::*;

    const APPROACH: &str = r#"{
        "0": ["new_unit(general, g, 100, 100, 0, 1)", "new_unit(soldier, s, 400, 100, 0, 1)"],
        "1": ["move(s, 100, 100)"]
    }"#;

    fn approach(rounds: u32) -> (crate::simulation::Simulation, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut hooks = HookTable::new();
        hooks.register(Role::Soldier, Arc::new(Counting(Arc::clone(&counter))));
        hooks.register(Role::General, Arc::new(Halter));
        let config = SimConfig {
            dispatch_rounds: rounds,
            ..test_config()
        };
        (simulation(APPROACH, hooks, config, 0), counter)
    }

    #[test]
    fn hook_caused_idle_waits_for_next_tick() {
        let (mut sim, counter) = approach(1);
        sim.step().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let report = loop {
            let report = sim.step().unwrap();
            if !report.detection.enter_view.is_empty() {
                break report;
            }
            assert!(sim.tick() < 500, "soldier never came into view");
        };
        assert_eq!(state_of(&sim, "s"), UnitState::Idle);
        assert_eq!(report.deferred, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let next = sim.step().unwrap();
        assert_eq!(next.deferred, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(sim.diagnostics().deferred_reactions, 1);
    }

    #[test]
    fn extra_round_settles_in_same_tick() {
        let (mut sim, counter) = approach(2);
        let report = loop {
            let report = sim.step().unwrap();
            if !report.detection.enter_view.is_empty() {
                break report;
            }
            assert!(sim.tick() < 500, "soldier never came into view");
        };
        assert_eq!(report.deferred, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn externally_applied_idle_is_dispatched_next_tick() {
        let (mut sim, counter) = approach(1);
        sim.run(3).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let applied = sim
            .apply(parse_delta("update_state(s, idle)", None).unwrap())
            .unwrap();
        assert!(applied.changed());
        sim.step().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}

// =============================================================================
// Scheduler
// =============================================================================

#[test]
fn scheduler_refuses_to_go_back() {
    let mut timeline = Timeline::from_json_str(EXAMPLE_TIMELINE).unwrap();
    timeline.advance(3).unwrap();
    assert_eq!(
        timeline.advance(1),
        Err(SchedulerError::OrderingViolation {
            previous: 3,
            requested: 1
        })
    );
}
