use crate::hook::{EntityView, HookEnv, HookResult, RoleHooks};

use super::builders::dead;

/// Projectile.
///
/// A bullet is spawned already moving. Becoming idle means it reached its
/// target point without hitting anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bullet;

impl RoleHooks for Bullet {
    fn on_state_change(&self, _env: &mut HookEnv<'_>, me: &EntityView) -> HookResult {
        Ok(me.state.is_idle().then(dead))
    }

    fn on_collision(
        &self,
        _env: &mut HookEnv<'_>,
        _me: &EntityView,
        _other: &EntityView,
    ) -> HookResult {
        Ok(Some(dead()))
    }
}
