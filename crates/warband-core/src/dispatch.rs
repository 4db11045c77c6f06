//! Hook dispatcher.
//!
//! Routes one [`Event`] to the hooks registered for its subject's role, then
//! feeds the returned command back through the codec into the registry.
//!
//! A single dispatch never fails: hook errors, unparsable commands and
//! rejected deltas are logged, counted in [`Diagnostics`], and treated as
//! "no command".
//!
//! # Sandbox
//!
//! Hooks run under a step budget (fuel burned through [`HookEnv`]), a
//! wall-clock budget and `catch_unwind` so a panicking script cannot take the
//! tick down with it.
//!
//! Hook execution is never preempted. The step budget only counts calls to
//! [`HookEnv::random_in_range`], so a hook that loops without calling it is
//! not stopped by fuel. The time budget is checked once the call returns: an
//! overrunning hook still blocks the tick until it finishes, and its command
//! is then discarded as [`HookError::Timeout`].

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use glam::DVec2;
use serde::Serialize;
use tracing::{debug, warn};

use crate::command;
use crate::config::SimConfig;
use crate::diagnostics::Diagnostics;
use crate::entity::EntityId;
use crate::error::HookError;
use crate::hook::{self, EntityView, EventKind, HookEnv, HookTable};
use crate::random::RandomService;
use crate::registry::Registry;

// =============================================================================
// Event
// =============================================================================

/// A transient hook trigger. Holds ids only; entities are looked up at
/// dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Event {
    /// `subject` became idle.
    StateChange {
        /// Entity whose hook fires.
        subject: EntityId,
    },
    /// `subject` is colliding with `other`.
    Collision {
        /// Entity whose hook fires.
        subject: EntityId,
        /// The entity it touches.
        other: EntityId,
    },
    /// `other` came into `subject`'s view.
    EnterView {
        /// Entity whose hook fires.
        subject: EntityId,
        /// The entity that came into view.
        other: EntityId,
    },
    /// `other` left `subject`'s view.
    ExitView {
        /// Entity whose hook fires.
        subject: EntityId,
        /// The entity that left view.
        other: EntityId,
    },
}

impl Event {
    /// Which hook this event calls.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::StateChange { .. } => EventKind::StateChange,
            Self::Collision { .. } => EventKind::Collision,
            Self::EnterView { .. } => EventKind::EnterView,
            Self::ExitView { .. } => EventKind::ExitView,
        }
    }

    /// Entity whose hook fires.
    #[must_use]
    pub const fn subject(&self) -> &EntityId {
        match self {
            Self::StateChange { subject }
            | Self::Collision { subject, .. }
            | Self::EnterView { subject, .. }
            | Self::ExitView { subject, .. } => subject,
        }
    }

    /// The other entity, for two-party events.
    #[must_use]
    pub const fn other(&self) -> Option<&EntityId> {
        match self {
            Self::StateChange { .. } => None,
            Self::Collision { other, .. }
            | Self::EnterView { other, .. }
            | Self::ExitView { other, .. } => Some(other),
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Calls hooks and applies what they return.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    hooks: HookTable,
    step_budget: u32,
    time_budget: Duration,
    bounds: DVec2,
}

impl Dispatcher {
    /// Creates a dispatcher using the hook budgets and field size from `config`.
    #[must_use]
    pub fn new(hooks: HookTable, config: &SimConfig) -> Self {
        Self {
            hooks,
            step_budget: config.hook_step_budget,
            time_budget: config.hook_time_budget(),
            bounds: config.arena_size(),
        }
    }

    /// Hook table in use.
    #[must_use]
    pub const fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    /// Dispatches one event.
    ///
    /// Events whose subject is unknown or dead are skipped, as are two-party
    /// events whose other entity is unknown or dead. Detection runs before
    /// anyone reacts, so an entity killed earlier in the same pass drops out
    /// of every event still queued against it.
    ///
    /// Returns the id of an entity that became idle as a result, so the
    /// caller can schedule its state-change hook.
    pub fn dispatch(
        &self,
        event: &Event,
        registry: &mut Registry,
        random: &mut dyn RandomService,
        diagnostics: &mut Diagnostics,
        tick: u64,
    ) -> Option<EntityId> {
        let kind = event.kind();
        let me = registry.get(event.subject()).filter(|e| e.is_alive())?;
        let other = match event.other() {
            Some(id) => Some(EntityView::from(
                registry.get(id).filter(|e| e.is_alive())?,
            )),
            None => None,
        };
        let hooks = self.hooks.hooks_for(me.role())?;
        let me = EntityView::from(me);

        diagnostics.hooks_invoked += 1;
        let result = self.call(hooks.as_ref(), kind, random, &me, other.as_ref(), tick);

        let text = match result {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(err) => {
                diagnostics.hook_errors += 1;
                warn!(tick, entity = %me.id, event = %kind, error = %err, "hook failed");
                return None;
            }
        };

        let delta = match command::parse_delta(&text, Some(&me.id)) {
            Ok(delta) => delta,
            Err(err) => {
                diagnostics.parse_errors += 1;
                warn!(
                    tick,
                    entity = %me.id,
                    event = %kind,
                    command = %text,
                    error = %err,
                    "dropped hook command"
                );
                return None;
            }
        };

        match registry.apply(delta) {
            Ok(applied) => {
                debug!(
                    tick,
                    entity = %me.id,
                    event = %kind,
                    command = %text,
                    "applied hook command"
                );
                if applied.changed() {
                    diagnostics.deltas_applied += 1;
                }
                applied.became_idle().cloned()
            }
            Err(err) => {
                diagnostics.record_registry_error(&err);
                warn!(
                    tick,
                    entity = %me.id,
                    event = %kind,
                    command = %text,
                    error = %err,
                    "rejected hook command"
                );
                None
            }
        }
    }

    /// Runs the hook inside the sandbox.
    fn call(
        &self,
        hooks: &dyn hook::RoleHooks,
        kind: EventKind,
        random: &mut dyn RandomService,
        me: &EntityView,
        other: Option<&EntityView>,
        tick: u64,
    ) -> Result<Option<String>, HookError> {
        let mut env = HookEnv::new(random, self.bounds, tick, self.step_budget);
        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            hook::invoke(hooks, kind, &mut env, me, other)
        }));
        let elapsed = start.elapsed();

        let result = outcome
            .map_err(|payload| HookError::Panicked(panic_message(payload.as_ref())))??;
        if elapsed > self.time_budget {
            return Err(HookError::Timeout {
                elapsed_ms: elapsed.as_millis(),
                budget_ms: u64::try_from(self.time_budget.as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(result)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::command::parse_delta;
    use crate::entity::{Role, UnitState};
    use crate::hook::{HookResult, RoleHooks};
    use crate::random::SeededRandom;

    struct Scripted(&'static str);

    impl RoleHooks for Scripted {
        fn on_state_change(&self, _env: &mut HookEnv<'_>, _me: &EntityView) -> HookResult {
            Ok(Some(self.0.to_string()))
        }

        fn on_collision(
            &self,
            _env: &mut HookEnv<'_>,
            _me: &EntityView,
            _other: &EntityView,
        ) -> HookResult {
            Ok(Some(self.0.to_string()))
        }

        fn on_enter_view(
            &self,
            _env: &mut HookEnv<'_>,
            _me: &EntityView,
            _other: &EntityView,
        ) -> HookResult {
            Ok(Some(self.0.to_string()))
        }

        fn on_exit_view(
            &self,
            _env: &mut HookEnv<'_>,
            _me: &EntityView,
            _other: &EntityView,
        ) -> HookResult {
            Ok(Some(self.0.to_string()))
        }
    }

    struct Panicking;

    impl RoleHooks for Panicking {
        fn on_state_change(&self, _env: &mut HookEnv<'_>, _me: &EntityView) -> HookResult {
            panic!("script blew up");
        }
    }

    struct Greedy;

    impl RoleHooks for Greedy {
        fn on_state_change(&self, env: &mut HookEnv<'_>, _me: &EntityView) -> HookResult {
            loop {
                env.random_in_range(0.0, 1.0)?;
            }
        }
    }

    struct Slow;

    impl RoleHooks for Slow {
        fn on_state_change(&self, _env: &mut HookEnv<'_>, _me: &EntityView) -> HookResult {
            std::thread::sleep(Duration::from_millis(5));
            Ok(Some("move(10, 10)".to_string()))
        }
    }

    struct Harness {
        registry: Registry,
        random: SeededRandom,
        diagnostics: Diagnostics,
    }

    impl Harness {
        fn new() -> Self {
            let mut registry = Registry::new();
            for text in [
                "new_unit(soldier, s, 0, 0, 0, 1)",
                "new_unit(general, g, 5, 0, 0, 1)",
            ] {
                registry.apply(parse_delta(text, None).unwrap()).unwrap();
            }
            Self {
                registry,
                random: SeededRandom::new(1),
                diagnostics: Diagnostics::default(),
            }
        }

        fn run(&mut self, dispatcher: &Dispatcher, event: &Event) -> Option<EntityId> {
            dispatcher.dispatch(
                event,
                &mut self.registry,
                &mut self.random,
                &mut self.diagnostics,
                0,
            )
        }

        fn state(&self, name: &str) -> UnitState {
            self.registry.get(&EntityId::new(name)).unwrap().state().clone()
        }
    }

    fn dispatcher_with(role: Role, hooks: Arc<dyn RoleHooks>) -> Dispatcher {
        let mut table = HookTable::new();
        table.register(role, hooks);
        Dispatcher::new(table, &SimConfig::default())
    }

    fn state_change(name: &str) -> Event {
        Event::StateChange {
            subject: EntityId::new(name),
        }
    }

    mod routing_tests {
        use super::*;

        #[test]
        fn applies_returned_command_to_owner() {
            let mut h = Harness::new();
            let d = dispatcher_with(Role::Soldier, Arc::new(Scripted("move(10, 10)")));
            assert_eq!(h.run(&d, &state_change("s")), None);
            assert_eq!(h.state("s"), UnitState::Moving { x: 10.0, y: 10.0 });
            assert_eq!(h.diagnostics.hooks_invoked, 1);
            assert_eq!(h.diagnostics.deltas_applied, 1);
        }

        #[test]
        fn roles_without_hooks_do_nothing() {
            let mut h = Harness::new();
            let d = dispatcher_with(Role::Soldier, Arc::new(Scripted("dead")));
            assert_eq!(h.run(&d, &state_change("g")), None);
            assert_eq!(h.state("g"), UnitState::Idle);
            assert_eq!(h.diagnostics.hooks_invoked, 0);
        }

        #[test]
        fn dead_and_unknown_subjects_are_skipped() {
            let mut h = Harness::new();
            let d = dispatcher_with(Role::Soldier, Arc::new(Scripted("move(1, 1)")));
            h.registry
                .apply(parse_delta("update_state(s, dead)", None).unwrap())
                .unwrap();
            h.run(&d, &state_change("s"));
            h.run(&d, &state_change("nobody"));
            assert_eq!(h.diagnostics.hooks_invoked, 0);
        }

        #[test]
        fn reports_entities_that_became_idle() {
            let mut h = Harness::new();
            h.registry
                .apply(parse_delta("move(s, 3, 3)", None).unwrap())
                .unwrap();
            let d = dispatcher_with(Role::General, Arc::new(Scripted("command(s, idle)")));
            let idle = h.run(
                &d,
                &Event::Collision {
                    subject: EntityId::new("g"),
                    other: EntityId::new("s"),
                },
            );
            assert_eq!(idle, Some(EntityId::new("s")));
        }

        #[test]
        fn events_against_a_dead_other_are_skipped() {
            let mut h = Harness::new();
            h.registry
                .apply(parse_delta("update_state(g, dead)", None).unwrap())
                .unwrap();
            let d = dispatcher_with(Role::Soldier, Arc::new(Scripted("move(7, 7)")));
            let (s, g) = (EntityId::new("s"), EntityId::new("g"));
            for event in [
                Event::Collision {
                    subject: s.clone(),
                    other: g.clone(),
                },
                Event::EnterView {
                    subject: s.clone(),
                    other: g.clone(),
                },
                Event::ExitView {
                    subject: s,
                    other: g,
                },
            ] {
                assert_eq!(h.run(&d, &event), None);
            }
            assert_eq!(h.diagnostics.hooks_invoked, 0);
            assert_eq!(h.state("s"), UnitState::Idle);
        }

        #[test]
        fn exit_view_reaches_its_hook() {
            let mut h = Harness::new();
            let d = dispatcher_with(Role::Soldier, Arc::new(Scripted("move(2, 2)")));
            let event = Event::ExitView {
                subject: EntityId::new("s"),
                other: EntityId::new("g"),
            };
            assert_eq!(event.kind(), EventKind::ExitView);
            h.run(&d, &event);
            assert_eq!(h.state("s"), UnitState::Moving { x: 2.0, y: 2.0 });
        }
    }

    mod recovery_tests {
        use super::*;

        #[test]
        fn malformed_command_is_counted() {
            let mut h = Harness::new();
            let d = dispatcher_with(Role::Soldier, Arc::new(Scripted("fly(1, 2)")));
            h.run(&d, &state_change("s"));
            assert_eq!(h.diagnostics.parse_errors, 1);
            assert_eq!(h.state("s"), UnitState::Idle);
        }

        #[test]
        fn rejected_delta_is_counted() {
            let mut h = Harness::new();
            let d = dispatcher_with(Role::Soldier, Arc::new(Scripted("command(g, dead)")));
            h.run(&d, &state_change("s"));
            assert_eq!(h.diagnostics.rejected_commanders, 1);
            assert_eq!(h.state("g"), UnitState::Idle);
        }

        #[test]
        fn panicking_hook_is_contained() {
            let mut h = Harness::new();
            let d = dispatcher_with(Role::Soldier, Arc::new(Panicking));
            assert_eq!(h.run(&d, &state_change("s")), None);
            assert_eq!(h.diagnostics.hook_errors, 1);
            assert_eq!(h.state("s"), UnitState::Idle);
        }

        #[test]
        fn runaway_hook_hits_step_budget() {
            let mut h = Harness::new();
            let d = dispatcher_with(Role::Soldier, Arc::new(Greedy));
            h.run(&d, &state_change("s"));
            assert_eq!(h.diagnostics.hook_errors, 1);
        }

        #[test]
        fn slow_hook_hits_time_budget() {
            let mut h = Harness::new();
            let mut table = HookTable::new();
            table.register(Role::Soldier, Arc::new(Slow));
            let config = SimConfig {
                hook_time_budget_ms: 1,
                ..SimConfig::default()
            };
            let d = Dispatcher::new(table, &config);
            assert_eq!(h.run(&d, &state_change("s")), None);
            assert_eq!(h.diagnostics.hook_errors, 1);
            assert_eq!(h.diagnostics.deltas_applied, 0);
            assert_eq!(h.state("s"), UnitState::Idle);
        }

        #[test]
        fn panic_payloads_become_messages() {
            assert_eq!(panic_message(&"boom"), "boom");
            assert_eq!(panic_message(&String::from("bang")), "bang");
            assert_eq!(panic_message(&42_u8), "non-string panic payload");
        }
    }
}
