//! Textual command protocol.
//!
//! Commands are the only channel between scripts (or the timeline) and the
//! world. Text is read into a [`Command`] syntax tree, which is then resolved
//! against an optional owning entity into a [`Delta`]: the normalised
//! instruction the [`Registry`](crate::registry::Registry) applies.
//!
//! Grammar (whitespace-insensitive):
//!
//! ```text
//! command    := new_unit(role, id, x, y, rotation, team)
//!             | update_state(id, state_expr)
//!             | move(id, x, y) | move(x, y)
//!             | shoot(id, id)  | shoot(id)
//!             | command(id, order)
//!             | idle | dead
//! state_expr := order | command(id, order)
//! order      := idle | dead | move(x, y) | shoot(id)
//! ```
//!
//! The short forms `move(x, y)`, `shoot(id)`, `idle` and `dead` address the
//! entity that owns the hook returning them.
//!
//! # Example
//!
//! ```
//! use warband_core::command::{self, Delta};
//! use warband_core::entity::{EntityId, UnitState};
//!
//! let owner = EntityId::new("s1");
//! let delta = command::parse_delta("move(10, 20.5)", Some(&owner)).unwrap();
//! assert_eq!(
//!     delta,
//!     Delta::SetState {
//!         target: owner,
//!         state: UnitState::Moving { x: 10.0, y: 20.5 },
//!     }
//! );
//! assert_eq!(command::format(&delta), "update_state(s1, move(10, 20.5))");
//! ```

mod parser;

use std::fmt;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, Role, Team, UnitState};
use crate::error::{ParseError, ParseErrorKind};

// =============================================================================
// Syntax tree
// =============================================================================

/// A state an entity can be put into by a command.
///
/// Kept separate from [`UnitState`] so that `command(..)` can only wrap a
/// plain order, never another `command(..)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Order {
    /// `idle`
    Idle,
    /// `move(x, y)`
    Move {
        /// Target x.
        x: f64,
        /// Target y.
        y: f64,
    },
    /// `shoot(id)`
    Shoot {
        /// Entity to fire on.
        target: EntityId,
    },
    /// `dead`
    Dead,
}

impl Order {
    /// The entity state this order produces.
    #[must_use]
    pub fn into_state(self) -> UnitState {
        match self {
            Self::Idle => UnitState::Idle,
            Self::Move { x, y } => UnitState::Moving { x, y },
            Self::Shoot { target } => UnitState::Shooting { target },
            Self::Dead => UnitState::Dead,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Move { x, y } => write!(f, "move({x}, {y})"),
            Self::Shoot { target } => write!(f, "shoot({target})"),
            Self::Dead => f.write_str("dead"),
        }
    }
}

/// Second argument of `update_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateExpr {
    /// A plain order for the addressed entity.
    Order(Order),
    /// The addressed entity orders another one.
    Command {
        /// Entity receiving the order.
        target: EntityId,
        /// The order given.
        order: Order,
    },
}

impl fmt::Display for StateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Order(order) => order.fmt(f),
            Self::Command { target, order } => write!(f, "command({target}, {order})"),
        }
    }
}

/// Payload of `new_unit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Role of the new unit.
    pub role: Role,
    /// Caller-supplied identifier.
    pub id: EntityId,
    /// Initial x.
    pub x: f64,
    /// Initial y.
    pub y: f64,
    /// Initial rotation in radians.
    pub rotation: f64,
    /// Team number.
    pub team: Team,
}

impl UnitSpec {
    /// Initial position.
    #[must_use]
    pub const fn position(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }
}

/// A parsed command, before the implicit subject is filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// `new_unit(role, id, x, y, rotation, team)`
    NewUnit(UnitSpec),
    /// `update_state(id, state_expr)`
    UpdateState {
        /// Entity addressed.
        id: EntityId,
        /// New state, or an order it gives.
        state: StateExpr,
    },
    /// `move(id, x, y)` or the short form `move(x, y)`.
    Move {
        /// Explicit subject, if written.
        subject: Option<EntityId>,
        /// Target x.
        x: f64,
        /// Target y.
        y: f64,
    },
    /// `shoot(id, target)` or the short form `shoot(target)`.
    Shoot {
        /// Explicit subject, if written.
        subject: Option<EntityId>,
        /// Entity to fire on.
        target: EntityId,
    },
    /// `command(id, order)`: the owner orders `target`.
    Order {
        /// Entity receiving the order.
        target: EntityId,
        /// The order given.
        order: Order,
    },
    /// Bare `idle` or `dead` applied to the owner.
    Bare(Order),
}

impl Command {
    /// Leading keyword of the command.
    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::NewUnit(_) => "new_unit",
            Self::UpdateState { .. } => "update_state",
            Self::Move { .. } => "move",
            Self::Shoot { .. } => "shoot",
            Self::Order { .. } => "command",
            Self::Bare(Order::Dead) => "dead",
            Self::Bare(_) => "idle",
        }
    }

    /// Resolves the command into a delta.
    ///
    /// `owner` is the entity whose hook produced the command, or `None` for
    /// timeline commands.
    ///
    /// # Errors
    ///
    /// Returns [`ParseErrorKind::MissingSubject`] when a short form is used
    /// without an owner.
    pub fn resolve(self, owner: Option<&EntityId>) -> Result<Delta, ParseError> {
        let subject = |explicit: Option<EntityId>, shown: &dyn fmt::Display| {
            explicit
                .or_else(|| owner.cloned())
                .ok_or_else(|| ParseError::new(ParseErrorKind::MissingSubject, shown.to_string()))
        };

        let delta = match self {
            Self::NewUnit(spec) => Delta::Create(spec),
            Self::UpdateState {
                id,
                state: StateExpr::Order(order),
            } => Delta::SetState {
                target: id,
                state: order.into_state(),
            },
            Self::UpdateState {
                id,
                state: StateExpr::Command { target, order },
            } => Delta::Order {
                issuer: Some(id),
                target,
                state: order.into_state(),
            },
            Self::Move { subject: s, x, y } => {
                let shown = Order::Move { x, y };
                Delta::SetState {
                    target: subject(s, &shown)?,
                    state: UnitState::Moving { x, y },
                }
            }
            Self::Shoot { subject: s, target } => {
                let shown = Order::Shoot {
                    target: target.clone(),
                };
                Delta::SetState {
                    target: subject(s, &shown)?,
                    state: UnitState::Shooting { target },
                }
            }
            Self::Order { target, order } => Delta::Order {
                issuer: owner.cloned(),
                target,
                state: order.into_state(),
            },
            Self::Bare(order) => Delta::SetState {
                target: subject(None, &order)?,
                state: order.into_state(),
            },
        };
        Ok(delta)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewUnit(spec) => write!(
                f,
                "new_unit({}, {}, {}, {}, {}, {})",
                spec.role, spec.id, spec.x, spec.y, spec.rotation, spec.team
            ),
            Self::UpdateState { id, state } => write!(f, "update_state({id}, {state})"),
            Self::Move {
                subject: Some(id),
                x,
                y,
            } => write!(f, "move({id}, {x}, {y})"),
            Self::Move { subject: None, x, y } => write!(f, "move({x}, {y})"),
            Self::Shoot {
                subject: Some(id),
                target,
            } => write!(f, "shoot({id}, {target})"),
            Self::Shoot {
                subject: None,
                target,
            } => write!(f, "shoot({target})"),
            Self::Order { target, order } => write!(f, "command({target}, {order})"),
            Self::Bare(order) => order.fmt(f),
        }
    }
}

// =============================================================================
// Deltas
// =============================================================================

/// A normalised instruction for the registry.
///
/// Deltas are immutable once built and are consumed by
/// [`Registry::apply`](crate::registry::Registry::apply).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Delta {
    /// Create a new unit.
    Create(UnitSpec),
    /// Put `target` into `state`.
    SetState {
        /// Entity addressed.
        target: EntityId,
        /// New state.
        state: UnitState,
    },
    /// `issuer` orders `target` into `state`.
    ///
    /// Timeline commands have no issuer and are always obeyed.
    Order {
        /// Commanding entity, if any.
        issuer: Option<EntityId>,
        /// Entity receiving the order.
        target: EntityId,
        /// New state.
        state: UnitState,
    },
}

impl Delta {
    /// The entity the delta creates or mutates.
    #[must_use]
    pub fn target(&self) -> &EntityId {
        match self {
            Self::Create(spec) => &spec.id,
            Self::SetState { target, .. } | Self::Order { target, .. } => target,
        }
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create(spec) => Command::NewUnit(spec.clone()).fmt(f),
            Self::SetState { target, state } => write!(f, "update_state({target}, {state})"),
            Self::Order {
                issuer: Some(issuer),
                target,
                state,
            } => write!(f, "update_state({issuer}, command({target}, {state}))"),
            Self::Order {
                issuer: None,
                target,
                state,
            } => write!(f, "command({target}, {state})"),
        }
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Parses command text into a syntax tree.
///
/// # Errors
///
/// Returns a [`ParseError`] carrying the offending fragment for any malformed
/// token, wrong arity, unknown keyword or role, or out-of-range value.
pub fn parse(text: &str) -> Result<Command, ParseError> {
    parser::parse_command(text)
}

/// Parses command text and resolves it against `owner` in one step.
///
/// # Errors
///
/// Same as [`parse`], plus [`ParseErrorKind::MissingSubject`] for short forms
/// without an owner.
pub fn parse_delta(text: &str, owner: Option<&EntityId>) -> Result<Delta, ParseError> {
    parse(text)?.resolve(owner)
}

/// Formats a delta as command text that parses back to the same delta.
#[must_use]
pub fn format(delta: &Delta) -> String {
    delta.to_string()
}
