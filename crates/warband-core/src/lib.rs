//! # Warband Core
//!
//! Scripted, timeline-driven entity simulation engine.
//!
//! Units (soldiers, generals and the bullets they fire) move, see each other
//! and collide on a 2D field. The engine decides nothing on its own: every
//! reaction comes from per-role hook scripts, and every world event that is
//! not a reaction comes from a pre-authored timeline. Both talk to the world
//! through one textual command protocol.
//!
//! ## Architecture
//!
//! - **Codec** ([`command`]): command text to typed [`Delta`](command::Delta) and back
//! - **Registry** ([`registry`]): owns entities, applies deltas
//! - **Detector** ([`detector`]): enter-view and collision events per tick
//! - **Dispatcher** ([`dispatch`], [`hook`]): routes events to role hooks,
//!   applies what they return
//! - **Scheduler** ([`timeline`]): releases authored deltas as time advances
//! - **Pipeline** ([`simulation`]): runs the above in a fixed order each tick
//!
//! ## Usage
//!
//! ```
//! use warband_core::prelude::*;
//!
//! let timeline = Timeline::from_json_str(r#"{
//!     "0": ["new_unit(soldier, a, 0, 0, 0, 1)", "new_unit(soldier, b, 500, 500, 0, 2)"],
//!     "5": ["move(a, 10, 10)"]
//! }"#)?;
//!
//! let mut sim = Simulation::new(
//!     SimConfig::default(),
//!     timeline,
//!     HookTable::new(),
//!     Box::new(SeededRandom::new(7)),
//! )?;
//! sim.run(10)?;
//!
//! let a = sim.registry().get(&EntityId::new("a")).unwrap();
//! assert!(matches!(a.state(), UnitState::Moving { .. }));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod command;
pub mod config;
pub mod detector;
pub mod diagnostics;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod hook;
pub mod random;
pub mod registry;
pub mod scripts;
pub mod simulation;
pub mod timeline;

#[cfg(test)]
mod tests;

/// Common imports for embedding the engine.
pub mod prelude {
    pub use crate::command::{format, parse, parse_delta, Command, Delta};
    pub use crate::config::SimConfig;
    pub use crate::diagnostics::{Diagnostics, TickReport};
    pub use crate::entity::{Entity, EntityId, Role, Team, UnitState};
    pub use crate::error::{HookError, LoadError, ParseError, RegistryError, SchedulerError};
    pub use crate::hook::{EntityView, HookEnv, HookResult, HookTable, RoleHooks};
    pub use crate::random::{RandomService, SeededRandom};
    pub use crate::registry::{Registry, UnitSnapshot};
    pub use crate::simulation::Simulation;
    pub use crate::timeline::Timeline;
}
