//! Entity model.
//!
//! This module provides the core unit types:
//! - [`EntityId`]: Opaque, caller-supplied identifier
//! - [`Role`]: Behaviour class used to select a hook table
//! - [`Team`]: Positive team number
//! - [`UnitState`]: Tagged state machine value
//! - [`Entity`]: The complete unit record held by the registry
//!
//! # Example
//!
//! ```
//! use warband_core::entity::{Entity, EntityId, Role, Team, UnitState};
//! use glam::DVec2;
//!
//! let unit = Entity::new(
//!     EntityId::new("a1"),
//!     Role::Soldier,
//!     Team::new(1).unwrap(),
//!     DVec2::new(10.0, 20.0),
//!     0.0,
//! );
//!
//! assert_eq!(unit.state(), &UnitState::Idle);
//! assert!(unit.is_alive());
//! ```

pub mod geometry;

use std::fmt;
use std::str::FromStr;

use glam::DVec2;
use serde::{Deserialize, Serialize};

pub use geometry::Pose;

/// Unique identifier for an entity.
///
/// Identifiers are generated outside the engine and treated as opaque
/// comparable tokens. The only constraint is the command alphabet: ASCII
/// letters, digits, `_`, `-` and `.`.
///
/// # Example
///
/// ```
/// use warband_core::entity::EntityId;
///
/// let id = EntityId::new("9f1c2a70-5e6b-4a11-8c3d-0a1b2c3d4e5f");
/// assert!(EntityId::is_valid_token(id.as_str()));
/// assert!(!EntityId::is_valid_token("two words"));
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Creates an identifier from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `token` can be written and read back by the codec.
    ///
    /// The bare state keywords `idle` and `dead` are reserved.
    #[must_use]
    pub fn is_valid_token(token: &str) -> bool {
        !token.is_empty()
            && token != "idle"
            && token != "dead"
            && token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Behaviour class of an entity.
///
/// The role selects which hook table handles the entity's events. `Bullet`
/// is the transient projectile kind produced when a shooter fires; it cannot
/// be created through `new_unit`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Front-line unit that wanders, shoots enemies and dies to bullets.
    Soldier,
    /// Commander that directs idle soldiers of its own team.
    General,
    /// Projectile spawned by a shot.
    Bullet,
}

impl Role {
    /// Returns the keyword used for this role in commands and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Soldier => "soldier",
            Self::General => "general",
            Self::Bullet => "bullet",
        }
    }

    /// Returns `true` for roles that timelines and hooks may create.
    #[must_use]
    pub const fn is_spawnable(self) -> bool {
        matches!(self, Self::Soldier | Self::General)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "soldier" => Ok(Self::Soldier),
            "general" => Ok(Self::General),
            "bullet" => Ok(Self::Bullet),
            other => Err(other.to_string()),
        }
    }
}

/// Team number. Always at least 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Team(u32);

impl Team {
    /// Creates a team, rejecting 0.
    #[must_use]
    pub const fn new(team: u32) -> Option<Self> {
        if team == 0 {
            None
        } else {
            Some(Self(team))
        }
    }

    /// Returns the raw team number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current state of an entity.
///
/// Formats with the same syntax the command codec reads, so a state can be
/// dropped straight into `update_state(id, <state>)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// Waiting for orders.
    Idle,
    /// Travelling to a point.
    Moving {
        /// Target x coordinate.
        x: f64,
        /// Target y coordinate.
        y: f64,
    },
    /// Aiming at, then firing on, another entity.
    Shooting {
        /// Entity being shot at.
        target: EntityId,
    },
    /// Destroyed. Terminal.
    Dead,
    /// Host-defined state the engine carries but does not interpret.
    Opaque(String),
}

impl UnitState {
    /// Returns `true` for [`UnitState::Idle`].
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns `true` for [`UnitState::Dead`].
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        matches!(self, Self::Dead)
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Moving { x, y } => write!(f, "move({x}, {y})"),
            Self::Shooting { target } => write!(f, "shoot({target})"),
            Self::Dead => f.write_str("dead"),
            Self::Opaque(raw) => f.write_str(raw),
        }
    }
}

/// A unit in the simulation.
///
/// # Invariants
///
/// - The id never changes after creation
/// - Once the state is [`UnitState::Dead`] it stays dead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    role: Role,
    team: Team,
    pose: Pose,
    state: UnitState,
    shots_fired: u32,
}

impl Entity {
    /// Creates an idle entity.
    #[must_use]
    pub fn new(id: EntityId, role: Role, team: Team, position: DVec2, rotation: f64) -> Self {
        Self {
            id,
            role,
            team,
            pose: Pose::new(position, rotation),
            state: UnitState::Idle,
            shots_fired: 0,
        }
    }

    /// Returns the entity's identifier.
    #[must_use]
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Returns the entity's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns the entity's team.
    #[must_use]
    pub const fn team(&self) -> Team {
        self.team
    }

    /// Returns position and rotation.
    #[must_use]
    pub const fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Returns the current position.
    #[must_use]
    pub const fn position(&self) -> DVec2 {
        self.pose.position
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &UnitState {
        &self.state
    }

    /// Returns `true` unless the entity is dead.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.state.is_dead()
    }

    /// Number of bullets this entity has fired.
    #[must_use]
    pub const fn shots_fired(&self) -> u32 {
        self.shots_fired
    }

    pub(crate) fn pose_mut(&mut self) -> &mut Pose {
        &mut self.pose
    }

    /// Replaces the state, returning the previous one.
    pub(crate) fn replace_state(&mut self, state: UnitState) -> UnitState {
        std::mem::replace(&mut self.state, state)
    }

    /// Counts a shot and returns the id of the bullet it produces.
    pub(crate) fn next_bullet_id(&mut self) -> EntityId {
        self.shots_fired += 1;
        EntityId::new(format!("{}.shot{}", self.id, self.shots_fired))
    }
}
