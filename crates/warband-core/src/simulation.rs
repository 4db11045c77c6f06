//! Simulation tick pipeline.
//!
//! The `Simulation` owns every piece of mutable state of a run and executes
//! ticks in a fixed sequence:
//!
//! 1. **RELEASE**: the timeline hands over every delta due at this tick;
//!    each is applied to the registry in authored order
//! 2. **MOTION**: moving entities step toward their target, shooters turn
//!    toward theirs and fire once facing it
//! 3. **DETECT**: the detector computes new and lost sightings and current
//!    collisions
//! 4. **REACT**: collision hooks (both sides of each pair), then enter-view
//!    hooks, then exit-view hooks; returned commands are applied immediately.
//!    An entity killed during REACT receives no further events this tick and
//!    no longer appears as the other side of one
//! 5. **SETTLE**: state-change hooks fire for entities that became idle,
//!    for at most `dispatch_rounds` rounds; anything left waits for the next
//!    tick
//!
//! # Determinism
//!
//! Nothing in the pipeline depends on hash order or thread timing: entities
//! are visited in creation order, detector output is sorted, and the only
//! randomness comes from the injected [`RandomService`]. The same timeline,
//! hooks, config and seed reproduce a run exactly.
//!
//! # Example
//!
//! ```
//! use warband_core::config::SimConfig;
//! use warband_core::hook::HookTable;
//! use warband_core::random::SeededRandom;
//! use warband_core::simulation::Simulation;
//! use warband_core::timeline::Timeline;
//!
//! let timeline = Timeline::from_json_str(r#"{
//!     "0": ["new_unit(soldier, a, 100, 100, 0, 1)", "new_unit(soldier, b, 700, 700, 0, 2)"]
//! }"#).unwrap();
//!
//! let mut sim = Simulation::new(
//!     SimConfig::default(),
//!     timeline,
//!     HookTable::builtin(),
//!     Box::new(SeededRandom::new(42)),
//! ).unwrap();
//!
//! sim.run(60).unwrap();
//! assert_eq!(sim.tick(), 60);
//! assert_eq!(sim.registry().len(), 2);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

use glam::DVec2;
use tracing::{debug, warn};

use crate::command::Delta;
use crate::config::SimConfig;
use crate::detector::Detector;
use crate::diagnostics::{Diagnostics, TickReport};
use crate::dispatch::{Dispatcher, Event};
use crate::entity::{Entity, EntityId, Role, Team, UnitState};
use crate::error::{ConfigError, RegistryError, SchedulerError};
use crate::hook::HookTable;
use crate::random::RandomService;
use crate::registry::{Applied, Registry, UnitSnapshot};
use crate::timeline::Timeline;

// =============================================================================
// Simulation
// =============================================================================

/// Explicitly owned context for one run.
pub struct Simulation {
    config: SimConfig,
    registry: Registry,
    timeline: Timeline,
    detector: Detector,
    dispatcher: Dispatcher,
    random: Box<dyn RandomService>,
    diagnostics: Diagnostics,
    /// Tick the next `step` executes.
    tick: u64,
    /// Idle entities whose state-change hook was pushed to the next tick.
    deferred: Vec<EntityId>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("entities", &self.registry.len())
            .field("pending_deltas", &self.timeline.pending())
            .field("deferred", &self.deferred)
            .field("dispatcher", &self.dispatcher)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Creates a simulation at tick 0 with an empty registry.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` does not validate.
    pub fn new(
        config: SimConfig,
        timeline: Timeline,
        hooks: HookTable,
        random: Box<dyn RandomService>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            registry: Registry::new(),
            timeline,
            detector: Detector::new(
                config.view_radius,
                config.collision_radius,
                config.parallel_detection,
            ),
            dispatcher: Dispatcher::new(hooks, &config),
            random,
            diagnostics: Diagnostics::default(),
            tick: 0,
            deferred: Vec::new(),
            config,
        })
    }

    /// Executes one tick.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] if the timeline refuses to advance. This is
    /// the only fatal condition; every other failure is logged, counted and
    /// skipped.
    pub fn step(&mut self) -> Result<TickReport, SchedulerError> {
        let start = Instant::now();
        let tick = self.tick;
        let hooks_before = self.diagnostics.hooks_invoked;
        let mut became_idle = std::mem::take(&mut self.deferred);

        // RELEASE
        let released = self.timeline.advance(tick)?;
        let released_count = released.len();
        for delta in released {
            became_idle.extend(self.apply_logged(delta));
        }

        // MOTION
        became_idle.extend(self.advance_motion());

        // DETECT
        let snapshot = self.registry.positions_snapshot();
        let detection = self.detector.detect(&snapshot);
        self.diagnostics.enter_view_events += detection.enter_view.len() as u64;
        self.diagnostics.exit_view_events += detection.exit_view.len() as u64;
        self.diagnostics.collision_events += detection.collisions.len() as u64;

        // REACT
        let mut retriggered = Vec::new();
        for contact in &detection.collisions {
            for (subject, other) in [(&contact.a, &contact.b), (&contact.b, &contact.a)] {
                let event = Event::Collision {
                    subject: subject.clone(),
                    other: other.clone(),
                };
                retriggered.extend(self.dispatch(&event));
            }
        }
        for sighting in &detection.enter_view {
            let event = Event::EnterView {
                subject: sighting.observer.clone(),
                other: sighting.target.clone(),
            };
            retriggered.extend(self.dispatch(&event));
        }
        for sighting in &detection.exit_view {
            let event = Event::ExitView {
                subject: sighting.observer.clone(),
                other: sighting.target.clone(),
            };
            retriggered.extend(self.dispatch(&event));
        }

        // SETTLE
        let mut queue = became_idle;
        for _ in 0..self.config.dispatch_rounds {
            let batch = self.idle_in_creation_order(std::mem::take(&mut queue));
            queue = std::mem::take(&mut retriggered);
            for subject in batch {
                queue.extend(self.dispatch(&Event::StateChange { subject }));
            }
            if queue.is_empty() {
                break;
            }
        }
        self.deferred = self.idle_in_creation_order(queue);
        self.diagnostics.deferred_reactions += self.deferred.len() as u64;

        self.tick += 1;

        let report = TickReport {
            tick,
            released: released_count,
            hooks_invoked: usize::try_from(self.diagnostics.hooks_invoked - hooks_before)
                .unwrap_or(usize::MAX),
            deferred: self.deferred.len(),
            elapsed: start.elapsed(),
            detection,
        };
        debug!(
            tick,
            released = report.released,
            enter_view = report.detection.enter_view.len(),
            exit_view = report.detection.exit_view.len(),
            collisions = report.detection.collisions.len(),
            hooks = report.hooks_invoked,
            deferred = report.deferred,
            "tick complete"
        );
        Ok(report)
    }

    /// Executes `ticks` ticks.
    ///
    /// # Errors
    ///
    /// Stops at the first [`SchedulerError`].
    pub fn run(&mut self, ticks: u64) -> Result<(), SchedulerError> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// Applies a delta from outside the tick pipeline.
    ///
    /// An entity that becomes idle gets its state-change hook on the next
    /// tick.
    ///
    /// # Errors
    ///
    /// Returns the registry's error; the registry is left unchanged.
    pub fn apply(&mut self, delta: Delta) -> Result<Applied, RegistryError> {
        let applied = self.registry.apply(delta)?;
        if applied.changed() {
            self.diagnostics.deltas_applied += 1;
        }
        if let Some(id) = applied.became_idle() {
            self.deferred.push(id.clone());
        }
        Ok(applied)
    }

    // =========================================================================
    // Pipeline stages
    // =========================================================================

    /// Applies a timeline delta, logging and counting a rejection.
    fn apply_logged(&mut self, delta: Delta) -> Option<EntityId> {
        let shown = delta.to_string();
        match self.registry.apply(delta) {
            Ok(applied) => {
                if applied.changed() {
                    self.diagnostics.deltas_applied += 1;
                }
                applied.became_idle().cloned()
            }
            Err(err) => {
                self.diagnostics.record_registry_error(&err);
                warn!(tick = self.tick, command = %shown, error = %err, "dropped timeline delta");
                None
            }
        }
    }

    fn dispatch(&mut self, event: &Event) -> Option<EntityId> {
        self.dispatcher.dispatch(
            event,
            &mut self.registry,
            self.random.as_mut(),
            &mut self.diagnostics,
            self.tick,
        )
    }

    /// Moves and aims every living entity. Returns those that became idle.
    fn advance_motion(&mut self) -> Vec<EntityId> {
        let mut done = Vec::new();
        // Bullets fired during this pass sit at the end and wait a tick.
        for slot in 0..self.registry.len() {
            let Some(entity) = self.registry.at(slot) else {
                continue;
            };
            let role = entity.role();
            let finished = match entity.state().clone() {
                UnitState::Moving { x, y } => {
                    let step = self.config.step_for(role);
                    self.step_entity(slot, DVec2::new(x, y), step)
                }
                UnitState::Shooting { target } => self.aim_entity(slot, &target),
                _ => None,
            };
            done.extend(finished);
        }
        done
    }

    /// Steps the entity at `slot` toward `target`. Returns its id on arrival.
    fn step_entity(&mut self, slot: usize, target: DVec2, step: f64) -> Option<EntityId> {
        let entity = self.registry.at_mut(slot)?;
        let (position, reached) = entity.pose().step_towards(target, step);
        let pose = entity.pose_mut();
        if position != pose.position {
            pose.rotation = pose.heading_to(target);
        }
        pose.position = position;
        if !reached {
            return None;
        }
        entity.replace_state(UnitState::Idle);
        debug!(tick = self.tick, entity = %entity.id(), "arrived");
        Some(entity.id().clone())
    }

    /// Turns the entity at `slot` toward `target` and fires once facing it.
    /// Returns its id once the shooter is idle again.
    fn aim_entity(&mut self, slot: usize, target: &EntityId) -> Option<EntityId> {
        let target_position = self
            .registry
            .get(target)
            .filter(|t| t.is_alive())
            .map(Entity::position);
        let max_turn = self.config.turn_rate * self.config.dt;
        let shooter = self.registry.at_mut(slot)?;

        let Some(aim_point) = target_position else {
            shooter.replace_state(UnitState::Idle);
            debug!(tick = self.tick, entity = %shooter.id(), target = %target, "target gone");
            return Some(shooter.id().clone());
        };

        let (rotation, facing) = shooter.pose().turn_towards(aim_point, max_turn);
        shooter.pose_mut().rotation = rotation;
        if !facing {
            return None;
        }

        let bullet_id = shooter.next_bullet_id();
        let team = shooter.team();
        let muzzle = shooter.pose().point_toward(aim_point, self.config.muzzle_offset);
        shooter.replace_state(UnitState::Idle);
        let shooter_id = shooter.id().clone();

        self.spawn_bullet(bullet_id, team, muzzle, rotation, aim_point, &shooter_id);
        Some(shooter_id)
    }

    fn spawn_bullet(
        &mut self,
        id: EntityId,
        team: Team,
        muzzle: DVec2,
        rotation: f64,
        aim_point: DVec2,
        shooter: &EntityId,
    ) {
        match self.registry.create(id.clone(), Role::Bullet, team, muzzle, rotation) {
            Ok(_) => {
                if let Some(bullet) = self.registry.get_mut(&id) {
                    bullet.replace_state(UnitState::Moving {
                        x: aim_point.x,
                        y: aim_point.y,
                    });
                }
                self.diagnostics.bullets_fired += 1;
                debug!(tick = self.tick, entity = %shooter, bullet = %id, "fired");
            }
            Err(err) => {
                self.diagnostics.record_registry_error(&err);
                warn!(tick = self.tick, entity = %shooter, error = %err, "bullet not spawned");
            }
        }
    }

    /// Keeps ids that exist and are idle right now, once each, in creation
    /// order.
    fn idle_in_creation_order(&self, ids: Vec<EntityId>) -> Vec<EntityId> {
        let mut seen = HashSet::new();
        let mut slots: Vec<usize> = ids
            .iter()
            .filter_map(|id| self.registry.creation_index(id))
            .filter(|&slot| seen.insert(slot))
            .filter(|&slot| self.registry.at(slot).is_some_and(|e| e.state().is_idle()))
            .collect();
        slots.sort_unstable();
        slots
            .into_iter()
            .filter_map(|slot| self.registry.at(slot).map(|e| e.id().clone()))
            .collect()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Tick the next [`Simulation::step`] will execute.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Entity registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable registry access for tests that need engine-only roles.
    #[cfg(test)]
    pub(crate) fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Counters accumulated so far.
    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Remaining timeline.
    #[must_use]
    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Visibility state.
    #[must_use]
    pub const fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Every entity in creation order, dead ones included.
    #[must_use]
    pub fn roster(&self) -> Vec<UnitSnapshot> {
        self.registry.positions_snapshot()
    }

    /// Restarts the random sequence handed to hooks.
    pub fn reseed(&mut self, seed: u64) {
        self.random.reseed(seed);
    }
}
