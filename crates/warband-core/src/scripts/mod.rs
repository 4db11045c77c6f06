//! Built-in role scripts.
//!
//! - [`Soldier`]: wanders when idle, shoots enemies it sees, dies to bullets
//! - [`General`]: sends idle soldiers of its team to random points, dies to bullets
//! - [`Bullet`]: dies on contact or when it reaches its target point
//!
//! Scripts build their answers with the [`builders`] helpers and never touch
//! engine state. [`HookTable::builtin`](crate::hook::HookTable::builtin)
//! registers all three.

pub mod builders;
mod bullet;
mod general;
mod soldier;

pub use bullet::Bullet;
pub use general::General;
pub use soldier::Soldier;

use glam::DVec2;

use crate::error::HookError;
use crate::hook::HookEnv;

/// Random point inside the playing field.
fn random_point(env: &mut HookEnv<'_>) -> Result<DVec2, HookError> {
    let bounds = env.bounds();
    let x = env.random_in_range(0.0, bounds.x)?;
    let y = env.random_in_range(0.0, bounds.y)?;
    Ok(DVec2::new(x, y))
}
