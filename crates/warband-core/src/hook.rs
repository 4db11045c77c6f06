//! Scripted hook contract.
//!
//! Behaviour lives in hooks, not in the engine. A [`RoleHooks`] value
//! handles the events for one role and answers with an optional
//! command string; the [`HookTable`] maps each role to its hooks.
//!
//! Hooks only see [`EntityView`]s (copies of public fields) and a
//! [`HookEnv`] holding the random service and a fuel meter. They cannot
//! touch the registry: the string they return goes through the codec like
//! any other command.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use warband_core::entity::Role;
//! use warband_core::error::HookError;
//! use warband_core::hook::{EntityView, HookEnv, HookTable, RoleHooks};
//!
//! struct Coward;
//!
//! impl RoleHooks for Coward {
//!     fn on_enter_view(
//!         &self,
//!         env: &mut HookEnv<'_>,
//!         _me: &EntityView,
//!         _other: &EntityView,
//!     ) -> Result<Option<String>, HookError> {
//!         let x = env.random_in_range(0.0, env.bounds().x)?;
//!         Ok(Some(format!("move({x}, 0)")))
//!     }
//! }
//!
//! let mut table = HookTable::new();
//! table.register(Role::Soldier, Arc::new(Coward));
//! assert!(table.hooks_for(Role::Soldier).is_some());
//! assert!(table.hooks_for(Role::General).is_none());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use glam::DVec2;
use serde::Serialize;

use crate::entity::{Entity, EntityId, Role, Team, UnitState};
use crate::error::HookError;
use crate::random::RandomService;
use crate::scripts;

// =============================================================================
// Events and views
// =============================================================================

/// The hook entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    /// The entity became idle.
    StateChange,
    /// The entity is touching another one.
    Collision,
    /// Another entity came into view.
    EnterView,
    /// Another entity left view.
    ExitView,
}

impl EventKind {
    /// Hook name as scripts know it.
    #[must_use]
    pub const fn hook_name(self) -> &'static str {
        match self {
            Self::StateChange => "on_state_change",
            Self::Collision => "on_collision",
            Self::EnterView => "on_enter_view",
            Self::ExitView => "on_exit_view",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hook_name())
    }
}

/// Read-only copy of an entity's public fields, handed to hooks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityView {
    /// Identifier.
    pub id: EntityId,
    /// Role.
    pub role: Role,
    /// Team.
    pub team: Team,
    /// Current state.
    pub state: UnitState,
    /// Position.
    pub position: DVec2,
    /// Rotation in radians.
    pub rotation: f64,
}

impl From<&Entity> for EntityView {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id().clone(),
            role: entity.role(),
            team: entity.team(),
            state: entity.state().clone(),
            position: entity.position(),
            rotation: entity.pose().rotation,
        }
    }
}

// =============================================================================
// Hook environment
// =============================================================================

/// Services available to a hook during one call.
///
/// Every service call burns fuel. A hook that runs out gets
/// [`HookError::BudgetExceeded`] from the call and should propagate it.
pub struct HookEnv<'a> {
    random: &'a mut dyn RandomService,
    bounds: DVec2,
    tick: u64,
    fuel_used: u32,
    budget: u32,
}

impl<'a> HookEnv<'a> {
    /// Creates an environment with a fresh fuel meter.
    pub fn new(random: &'a mut dyn RandomService, bounds: DVec2, tick: u64, budget: u32) -> Self {
        Self {
            random,
            bounds,
            tick,
            fuel_used: 0,
            budget,
        }
    }

    /// Draws a number in `[min, max]` from the injected random service.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::BudgetExceeded`] when out of fuel.
    pub fn random_in_range(&mut self, min: f64, max: f64) -> Result<f64, HookError> {
        self.burn(1)?;
        Ok(self.random.random_in_range(min, max))
    }

    /// Consumes `steps` units of fuel.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::BudgetExceeded`] once the total passes the budget.
    pub fn burn(&mut self, steps: u32) -> Result<(), HookError> {
        self.fuel_used = self.fuel_used.saturating_add(steps);
        if self.fuel_used > self.budget {
            return Err(HookError::BudgetExceeded {
                budget: self.budget,
            });
        }
        Ok(())
    }

    /// Upper corner of the playing field; the lower corner is the origin.
    #[must_use]
    pub const fn bounds(&self) -> DVec2 {
        self.bounds
    }

    /// Tick being executed.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Fuel burned so far in this call.
    #[must_use]
    pub const fn fuel_used(&self) -> u32 {
        self.fuel_used
    }
}

impl fmt::Debug for HookEnv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEnv")
            .field("bounds", &self.bounds)
            .field("tick", &self.tick)
            .field("fuel_used", &self.fuel_used)
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RoleHooks
// =============================================================================

/// What a hook call returns: an optional command string.
pub type HookResult = Result<Option<String>, HookError>;

/// Event handlers for one role.
///
/// Every method defaults to returning no command, so an implementation only
/// writes the hooks it cares about.
///
/// # Thread Safety
///
/// Hook tables are shared through `Arc` and must be `Send + Sync`. Hooks are
/// always called from the simulation thread, one at a time.
pub trait RoleHooks: Send + Sync {
    /// `me` just became idle.
    fn on_state_change(&self, env: &mut HookEnv<'_>, me: &EntityView) -> HookResult {
        let _ = (env, me);
        Ok(None)
    }

    /// `me` is colliding with `other`.
    fn on_collision(
        &self,
        env: &mut HookEnv<'_>,
        me: &EntityView,
        other: &EntityView,
    ) -> HookResult {
        let _ = (env, me, other);
        Ok(None)
    }

    /// `other` just came into `me`'s view.
    fn on_enter_view(
        &self,
        env: &mut HookEnv<'_>,
        me: &EntityView,
        other: &EntityView,
    ) -> HookResult {
        let _ = (env, me, other);
        Ok(None)
    }

    /// `other` just left `me`'s view. None of the built-in scripts use it.
    fn on_exit_view(
        &self,
        env: &mut HookEnv<'_>,
        me: &EntityView,
        other: &EntityView,
    ) -> HookResult {
        let _ = (env, me, other);
        Ok(None)
    }
}

/// Hooks that never return a command.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl RoleHooks for NoopHooks {}

/// Calls the hook for `kind`.
///
/// `other` is ignored for state changes. A two-party call without `other`
/// returns no command.
pub(crate) fn invoke(
    hooks: &dyn RoleHooks,
    kind: EventKind,
    env: &mut HookEnv<'_>,
    me: &EntityView,
    other: Option<&EntityView>,
) -> HookResult {
    match (kind, other) {
        (EventKind::StateChange, _) => hooks.on_state_change(env, me),
        (EventKind::Collision, Some(other)) => hooks.on_collision(env, me, other),
        (EventKind::EnterView, Some(other)) => hooks.on_enter_view(env, me, other),
        (EventKind::ExitView, Some(other)) => hooks.on_exit_view(env, me, other),
        (_, None) => Ok(None),
    }
}

// =============================================================================
// HookTable
// =============================================================================

/// Role-to-hooks lookup.
///
/// Roles without an entry have no hooks: their events produce no command.
#[derive(Clone, Default)]
pub struct HookTable {
    tables: HashMap<Role, Arc<dyn RoleHooks>>,
}

impl HookTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the built-in soldier, general and bullet scripts.
    #[must_use]
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.register(Role::Soldier, Arc::new(scripts::Soldier));
        table.register(Role::General, Arc::new(scripts::General));
        table.register(Role::Bullet, Arc::new(scripts::Bullet));
        table
    }

    /// Sets the hooks for `role`, replacing any previous entry.
    pub fn register(&mut self, role: Role, hooks: Arc<dyn RoleHooks>) {
        self.tables.insert(role, hooks);
    }

    /// Hooks for `role`, if any.
    #[must_use]
    pub fn hooks_for(&self, role: Role) -> Option<&Arc<dyn RoleHooks>> {
        self.tables.get(&role)
    }

    /// Returns `true` if no role has hooks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut roles: Vec<_> = self.tables.keys().copied().collect();
        roles.sort();
        f.debug_struct("HookTable").field("roles", &roles).finish()
    }
}
