//! Entity registry.
//!
//! The registry owns every [`Entity`] of a run. It provides:
//! - Creation with caller-supplied ids (duplicates rejected)
//! - Delta application, the only way entity state changes
//! - Stable iteration in creation order, used for every dispatch pass
//! - Position snapshots for the detector and simple radius queries
//!
//! # Ordering
//!
//! Entities live in a `Vec` in creation order. The `HashMap` beside it is only
//! an id-to-slot lookup and is never iterated, so hash order cannot leak into
//! the simulation.
//!
//! # Example
//!
//! ```
//! use warband_core::command::parse_delta;
//! use warband_core::entity::{EntityId, UnitState};
//! use warband_core::registry::Registry;
//!
//! let mut registry = Registry::new();
//! registry.apply(parse_delta("new_unit(soldier, a, 0, 0, 0, 1)", None).unwrap()).unwrap();
//! registry.apply(parse_delta("move(a, 10, 10)", None).unwrap()).unwrap();
//!
//! let a = registry.get(&EntityId::new("a")).unwrap();
//! assert_eq!(a.state(), &UnitState::Moving { x: 10.0, y: 10.0 });
//! ```

use std::collections::HashMap;

use glam::DVec2;
use serde::Serialize;
use tracing::debug;

use crate::command::Delta;
use crate::entity::{Entity, EntityId, Role, Team, UnitState};
use crate::error::RegistryError;

// =============================================================================
// Snapshot
// =============================================================================

/// Public fields of one entity at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSnapshot {
    /// Identifier.
    pub id: EntityId,
    /// Position.
    pub position: DVec2,
    /// Team.
    pub team: Team,
    /// Role.
    pub role: Role,
    /// State.
    pub state: UnitState,
}

impl UnitSnapshot {
    /// Returns `true` unless the entity is dead.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.state.is_dead()
    }
}

impl From<&Entity> for UnitSnapshot {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id().clone(),
            position: entity.position(),
            team: entity.team(),
            role: entity.role(),
            state: entity.state().clone(),
        }
    }
}

// =============================================================================
// Applied
// =============================================================================

/// What a successfully applied delta did.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// A new entity was created (it starts idle).
    Created(EntityId),
    /// An entity changed state.
    Transition {
        /// Entity that changed.
        id: EntityId,
        /// Previous state.
        from: UnitState,
        /// New state.
        to: UnitState,
    },
    /// The delta was valid but had no effect (dead target, same state,
    /// dead issuer).
    Unchanged,
}

impl Applied {
    /// Id of the entity that is now idle because of this delta, if any.
    ///
    /// Creation counts: new entities start idle.
    #[must_use]
    pub fn became_idle(&self) -> Option<&EntityId> {
        match self {
            Self::Created(id) => Some(id),
            Self::Transition {
                id,
                to: UnitState::Idle,
                ..
            } => Some(id),
            _ => None,
        }
    }

    /// Returns `true` if the registry changed.
    #[must_use]
    pub const fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Owner of all entities in a run.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// Entities in creation order.
    entities: Vec<Entity>,
    /// Id to slot in `entities`. Lookup only.
    index: HashMap<EntityId, usize>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an idle entity.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateId`] if `id` is taken. The registry
    /// is left unchanged.
    pub fn create(
        &mut self,
        id: EntityId,
        role: Role,
        team: Team,
        position: DVec2,
        rotation: f64,
    ) -> Result<&Entity, RegistryError> {
        if self.index.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        let slot = self.entities.len();
        self.index.insert(id.clone(), slot);
        self.entities
            .push(Entity::new(id, role, team, position, rotation));
        Ok(&self.entities[slot])
    }

    /// Applies a delta.
    ///
    /// State changes addressed to a dead entity are accepted and ignored.
    /// A `command` with an issuer is only obeyed if the issuer is a living
    /// general.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::DuplicateId`] for a create with a taken id
    /// - [`RegistryError::UnknownId`] if the target or issuer does not exist
    /// - [`RegistryError::NotACommander`] if the issuer is not a general
    /// - [`RegistryError::NotSpawnable`] for a create with a role only the
    ///   engine may spawn
    pub fn apply(&mut self, delta: Delta) -> Result<Applied, RegistryError> {
        match delta {
            Delta::Create(spec) => {
                if !spec.role.is_spawnable() {
                    return Err(RegistryError::NotSpawnable(spec.id, spec.role));
                }
                let position = spec.position();
                let entity =
                    self.create(spec.id, spec.role, spec.team, position, spec.rotation)?;
                debug!(
                    entity = %entity.id(),
                    role = %entity.role(),
                    team = %entity.team(),
                    "created"
                );
                Ok(Applied::Created(entity.id().clone()))
            }
            Delta::SetState { target, state } => self.set_state(target, state),
            Delta::Order {
                issuer: Some(issuer),
                target,
                state,
            } => {
                let commander = self
                    .get(&issuer)
                    .ok_or_else(|| RegistryError::UnknownId(issuer.clone()))?;
                if !commander.is_alive() {
                    return Ok(Applied::Unchanged);
                }
                if commander.role() != Role::General {
                    return Err(RegistryError::NotACommander(issuer, commander.role()));
                }
                self.set_state(target, state)
            }
            Delta::Order {
                issuer: None,
                target,
                state,
            } => self.set_state(target, state),
        }
    }

    fn set_state(&mut self, id: EntityId, state: UnitState) -> Result<Applied, RegistryError> {
        let Some(entity) = self.get_mut(&id) else {
            return Err(RegistryError::UnknownId(id));
        };
        if !entity.is_alive() || entity.state() == &state {
            return Ok(Applied::Unchanged);
        }
        let from = entity.replace_state(state.clone());
        debug!(entity = %id, from = %from, to = %state, "state change");
        Ok(Applied::Transition { id, from, to: state })
    }

    /// Looks up an entity.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.index.get(id).map(|&slot| &self.entities[slot])
    }

    pub(crate) fn get_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        let slot = *self.index.get(id)?;
        self.entities.get_mut(slot)
    }

    /// Position of `id` in creation order.
    #[must_use]
    pub fn creation_index(&self, id: &EntityId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Entity at a creation-order slot.
    #[must_use]
    pub fn at(&self, slot: usize) -> Option<&Entity> {
        self.entities.get(slot)
    }

    pub(crate) fn at_mut(&mut self, slot: usize) -> Option<&mut Entity> {
        self.entities.get_mut(slot)
    }

    /// Iterates entities in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.iter()
    }

    /// Snapshot of every entity, dead ones included, in creation order.
    #[must_use]
    pub fn positions_snapshot(&self) -> Vec<UnitSnapshot> {
        self.entities.iter().map(UnitSnapshot::from).collect()
    }

    /// Living entities strictly within `radius` of `center`, in creation order.
    #[must_use]
    pub fn query_radius(&self, center: DVec2, radius: f64) -> Vec<EntityId> {
        let radius_sq = radius * radius;
        self.entities
            .iter()
            .filter(|e| e.is_alive() && e.position().distance_squared(center) < radius_sq)
            .map(|e| e.id().clone())
            .collect()
    }

    /// Number of entities, dead ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if nothing was ever created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of living entities.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.entities.iter().filter(|e| e.is_alive()).count()
    }
}
